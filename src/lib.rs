// ABOUTME: Main library module for the stagehand task graph engine
// ABOUTME: Exports all core modules and provides the public API

pub mod engine;
pub mod graph;
pub mod tasks;

// Re-export commonly used types
pub use engine::{
    Command, CommandEngine, ControlLoop, DecisionEnginePlan, FailureTracker, GraphReport,
    GraphSource, GraphStatus, ImmediateEngine, KnownValues, SuspensionHook, TaskStatus,
};
pub use graph::{Behavior, GraphError, Task, TaskGraph, TaskId};

// Error handling
pub type Result<T> = anyhow::Result<T>;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
