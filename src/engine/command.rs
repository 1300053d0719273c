// ABOUTME: Host engine contract: command descriptors and completion signaling
// ABOUTME: Defines how tasks hand work to the sequential command engine

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::error::{ExecutionError, Result};

/// One unit of work for the host engine: a named action, an optional target
/// device, and an arbitrary payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub action: String,
    pub device: Option<String>,
    pub payload: Value,
}

impl Command {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            device: None,
            payload: Value::Null,
        }
    }

    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Completion signal for a long-running engine operation.
///
/// The engine (or a device monitor) holds the [`CompletionHandle`] and
/// resolves it when the operation finishes; the issuing task awaits the
/// `Completion`. This is the cooperative suspension point: a task parked on
/// a completion frees the engine to process commands from other tasks.
#[derive(Debug)]
pub struct Completion {
    rx: oneshot::Receiver<std::result::Result<(), String>>,
}

#[derive(Debug)]
pub struct CompletionHandle {
    tx: oneshot::Sender<std::result::Result<(), String>>,
}

impl Completion {
    pub fn channel() -> (CompletionHandle, Completion) {
        let (tx, rx) = oneshot::channel();
        (CompletionHandle { tx }, Completion { rx })
    }

    /// Wait for the operation to finish. A dropped handle means the engine
    /// abandoned the operation and is reported as an engine error.
    pub async fn wait(self) -> Result<()> {
        match self.rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(message)) => Err(ExecutionError::Engine(message)),
            Err(_) => Err(ExecutionError::Engine(
                "completion handle dropped before operation finished".into(),
            )),
        }
    }
}

impl CompletionHandle {
    pub fn finish(self) {
        let _ = self.tx.send(Ok(()));
    }

    pub fn fail(self, message: impl Into<String>) {
        let _ = self.tx.send(Err(message.into()));
    }
}

/// The host execution engine.
///
/// The engine processes one command at a time; concurrency between tasks
/// comes from tasks parked on the completions of long-running operations.
/// `issue` returning `None` means the command finished synchronously;
/// `Some(completion)` must be awaited before the operation can be considered
/// done.
#[async_trait]
pub trait CommandEngine: Send + Sync {
    async fn issue(&self, command: Command) -> Result<Option<Completion>>;
}

/// Engine that acknowledges every command synchronously. Useful in tests and
/// for graphs whose tasks carry no long-running device operations.
#[derive(Debug, Default)]
pub struct ImmediateEngine;

#[async_trait]
impl CommandEngine for ImmediateEngine {
    async fn issue(&self, command: Command) -> Result<Option<Completion>> {
        debug!(action = %command.action, device = ?command.device, "command acknowledged");
        Ok(None)
    }
}

/// The host engine's pause mechanism, invoked by the control loop when a
/// task name crosses its consecutive-failure threshold.
#[async_trait]
pub trait SuspensionHook: Send + Sync {
    async fn suspend(&self, task_name: &str, failures: u32);
}

/// Log-only suspender used when no engine-backed hook is installed.
#[derive(Debug, Default)]
pub struct LoggingSuspender;

#[async_trait]
impl SuspensionHook for LoggingSuspender {
    async fn suspend(&self, task_name: &str, failures: u32) {
        warn!(
            task = task_name,
            failures, "failure threshold crossed, suspension requested"
        );
    }
}
