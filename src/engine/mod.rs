// ABOUTME: Execution engine module for the stagehand task graph library
// ABOUTME: Scheduling, known-values propagation, control loop, and engine contract

pub mod command;
pub mod context;
pub mod control;
pub mod error;
pub mod plan;
pub mod report;

pub use command::{
    Command, CommandEngine, Completion, CompletionHandle, ImmediateEngine, LoggingSuspender,
    SuspensionHook,
};
pub use context::KnownValues;
pub use control::{ControlLoop, ControlSummary, FailureTracker, GraphSource};
pub use error::{ExecutionError, Result};
pub use plan::DecisionEnginePlan;
pub use report::{GraphReport, GraphStatus, GraphSummary, TaskReport, TaskStatus};
