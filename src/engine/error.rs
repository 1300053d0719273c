// ABOUTME: Error types for task graph execution
// ABOUTME: Defines scheduler, input resolution, and engine failure kinds

use thiserror::Error;

use crate::graph::GraphError;

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Missing input '{name}' for task '{task}'")]
    MissingInput { task: String, name: String },

    #[error("Task execution failed: {task} - {message}")]
    TaskFailed { task: String, message: String },

    #[error("Task already executed: {task}")]
    DuplicateExecution { task: String },

    #[error("Output mismatch for task '{task}': {names} declared names, {values} result values")]
    OutputMismatch {
        task: String,
        names: usize,
        values: usize,
    },

    #[error("Conditional task not resolved before execution: {task}")]
    UnresolvedConditional { task: String },

    #[error("Invalid task arguments: {0}")]
    InvalidArguments(String),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, ExecutionError>;
