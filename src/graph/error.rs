// ABOUTME: Error types for task graph construction and validation
// ABOUTME: Defines construction-time failures for dependency topologies

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Circular dependency detected: {tasks:?}")]
    CycleDetected { tasks: Vec<String> },

    #[error("Task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency { task: String, dependency: String },
}

pub type Result<T> = std::result::Result<T, GraphError>;
