// ABOUTME: Shared helpers for stagehand integration tests
// ABOUTME: Recording engine, ordering log, suspender spy, and graph sources

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use stagehand::engine::error::Result as ExecResult;
use stagehand::engine::{
    Command, CommandEngine, Completion, GraphSource, KnownValues, SuspensionHook,
};
use stagehand::graph::TaskGraph;
use stagehand::tasks::FnTask;
use stagehand::Task;

/// Install a test-writer subscriber so failures come with their trace output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Engine that records every issued command and acknowledges synchronously.
#[derive(Default)]
pub struct RecordingEngine {
    commands: Mutex<Vec<Command>>,
}

impl RecordingEngine {
    pub fn commands(&self) -> Vec<Command> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandEngine for RecordingEngine {
    async fn issue(&self, command: Command) -> ExecResult<Option<Completion>> {
        self.commands.lock().unwrap().push(command);
        Ok(None)
    }
}

/// Shared log of task start events, for ordering assertions.
#[derive(Clone, Default)]
pub struct OrderLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl OrderLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    pub fn position(&self, entry: &str) -> usize {
        self.entries()
            .iter()
            .position(|e| e == entry)
            .unwrap_or_else(|| panic!("'{entry}' never ran"))
    }
}

/// A task that records its own name when it runs and returns fixed results.
pub fn logging_task(name: &str, log: &OrderLog, results: Vec<Value>) -> Task {
    let log = log.clone();
    let task_name = name.to_string();
    Task::new(
        name,
        FnTask::new(move |_| {
            log.push(task_name.clone());
            Ok(results.clone())
        }),
    )
}

/// Suspension hook that records every call.
#[derive(Default)]
pub struct RecordingSuspender {
    calls: Mutex<Vec<(String, u32)>>,
}

impl RecordingSuspender {
    pub fn calls(&self) -> Vec<(String, u32)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SuspensionHook for RecordingSuspender {
    async fn suspend(&self, task_name: &str, failures: u32) {
        self.calls
            .lock()
            .unwrap()
            .push((task_name.to_string(), failures));
    }
}

/// Graph source backed by a closure.
pub struct FnSource<F>(pub F);

#[async_trait]
impl<F> GraphSource for FnSource<F>
where
    F: FnMut(&KnownValues) -> Option<TaskGraph> + Send,
{
    async fn next_graph(&mut self, known: &KnownValues) -> ExecResult<Option<TaskGraph>> {
        Ok((self.0)(known))
    }
}
