// ABOUTME: Task graph module for the stagehand engine
// ABOUTME: Defines tasks, completion signals, and the dependency graph algebra

pub mod error;
pub mod graph;
pub mod task;

pub use error::GraphError;
pub use graph::TaskGraph;
pub use task::{Behavior, Outcome, Task, TaskId, TaskSignal};
