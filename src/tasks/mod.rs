// ABOUTME: Built-in task behaviors for common graph plumbing
// ABOUTME: No-op, pass-through, closure, sleep, and device-set behaviors

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::sleep;
use tracing::debug;

use crate::engine::command::{Command, CommandEngine};
use crate::engine::error::{ExecutionError, Result};
use crate::graph::Behavior;

/// Completes immediately with no results. Useful as a fan-in marker or as a
/// conditional branch that changes nothing.
pub struct NoOpTask;

#[async_trait]
impl Behavior for NoOpTask {
    async fn run(&self, _inputs: Vec<Value>, _engine: &dyn CommandEngine) -> Result<Vec<Value>> {
        Ok(Vec::new())
    }
}

/// Returns its inputs as its results, in order.
///
/// Since output binding truncates to the shorter list, this works well as
/// the alternative branch of a conditional: the declared outputs come back
/// unchanged from the inputs.
pub struct PassThroughTask;

#[async_trait]
impl Behavior for PassThroughTask {
    async fn run(&self, inputs: Vec<Value>, _engine: &dyn CommandEngine) -> Result<Vec<Value>> {
        Ok(inputs)
    }
}

/// Wraps a plain function as a task behavior.
pub struct FnTask<F> {
    func: F,
}

impl<F> FnTask<F>
where
    F: Fn(Vec<Value>) -> Result<Vec<Value>> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> Behavior for FnTask<F>
where
    F: Fn(Vec<Value>) -> Result<Vec<Value>> + Send + Sync,
{
    async fn run(&self, inputs: Vec<Value>, _engine: &dyn CommandEngine) -> Result<Vec<Value>> {
        (self.func)(inputs)
    }
}

/// Sleeps without blocking the engine.
///
/// The first input, when present and numeric, overrides the configured
/// duration (in seconds).
pub struct SleepTask {
    duration: Duration,
}

impl SleepTask {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

#[async_trait]
impl Behavior for SleepTask {
    async fn run(&self, inputs: Vec<Value>, _engine: &dyn CommandEngine) -> Result<Vec<Value>> {
        let duration = inputs
            .first()
            .and_then(Value::as_f64)
            .map(Duration::from_secs_f64)
            .unwrap_or(self.duration);
        debug!(?duration, "sleeping");
        sleep(duration).await;
        Ok(Vec::new())
    }
}

/// Sets a device to a value through the engine.
///
/// Inputs: the device name, then the value. Awaits the engine's completion
/// signal when the move is long-running. Result: the value written.
pub struct SetValueTask;

#[async_trait]
impl Behavior for SetValueTask {
    async fn run(&self, inputs: Vec<Value>, engine: &dyn CommandEngine) -> Result<Vec<Value>> {
        let device = inputs
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ExecutionError::InvalidArguments(
                    "set task requires a device name as its first input".into(),
                )
            })?
            .to_string();
        let value = inputs.get(1).cloned().ok_or_else(|| {
            ExecutionError::InvalidArguments("set task requires a value as its second input".into())
        })?;

        let command = Command::new("set")
            .with_device(&device)
            .with_payload(value.clone());
        if let Some(completion) = engine.issue(command).await? {
            completion.wait().await?;
        }
        Ok(vec![value])
    }
}
