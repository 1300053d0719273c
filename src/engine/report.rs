// ABOUTME: Per-task and per-graph execution reports
// ABOUTME: Aggregates terminal states, timings, and a run summary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::graph::TaskId;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum TaskStatus {
    Pending,
    Running,
    Finished,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    pub task_id: TaskId,
    pub name: String,
    pub status: TaskStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum GraphStatus {
    Running,
    Finished,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphReport {
    pub run_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration: Option<Duration>,
    pub status: GraphStatus,
    pub tasks: Vec<TaskReport>,
    pub summary: GraphSummary,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSummary {
    pub total_tasks: usize,
    pub finished_tasks: usize,
    pub failed_tasks: usize,
    pub skipped_tasks: usize,
}

impl TaskReport {
    pub fn new(task_id: TaskId, name: impl Into<String>) -> Self {
        Self {
            task_id,
            name: name.into(),
            status: TaskStatus::Pending,
            start_time: None,
            end_time: None,
            error: None,
        }
    }

    pub fn mark_started(&mut self) {
        self.status = TaskStatus::Running;
        self.start_time = Some(Utc::now());
    }

    pub fn mark_completed(&mut self, status: TaskStatus, error: Option<String>) {
        self.status = status;
        self.end_time = Some(Utc::now());
        self.error = error;
    }

    pub fn is_failed(&self) -> bool {
        self.status == TaskStatus::Failed
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self.status, TaskStatus::Pending | TaskStatus::Running)
    }
}

impl GraphReport {
    pub fn new() -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            start_time: Utc::now(),
            end_time: None,
            duration: None,
            status: GraphStatus::Running,
            tasks: Vec::new(),
            summary: GraphSummary::default(),
        }
    }

    pub fn push(&mut self, report: TaskReport) {
        self.tasks.push(report);
        self.update_summary();
    }

    pub fn task(&self, name: &str) -> Option<&TaskReport> {
        self.tasks.iter().find(|t| t.name == name)
    }

    pub fn task_by_id(&self, task_id: TaskId) -> Option<&TaskReport> {
        self.tasks.iter().find(|t| t.task_id == task_id)
    }

    pub fn task_mut(&mut self, task_id: TaskId) -> Option<&mut TaskReport> {
        self.tasks.iter_mut().find(|t| t.task_id == task_id)
    }

    pub fn has_failures(&self) -> bool {
        self.tasks.iter().any(TaskReport::is_failed)
    }

    pub fn mark_completed(&mut self, status: GraphStatus) {
        self.end_time = Some(Utc::now());
        self.duration = Some(
            (Utc::now() - self.start_time)
                .to_std()
                .unwrap_or(Duration::ZERO),
        );
        self.status = status;
        self.update_summary();
    }

    pub(crate) fn update_summary(&mut self) {
        self.summary = GraphSummary {
            total_tasks: self.tasks.len(),
            finished_tasks: self
                .tasks
                .iter()
                .filter(|t| t.status == TaskStatus::Finished)
                .count(),
            failed_tasks: self.tasks.iter().filter(|t| t.is_failed()).count(),
            skipped_tasks: self
                .tasks
                .iter()
                .filter(|t| t.status == TaskStatus::Skipped)
                .count(),
        };
    }
}

impl Default for GraphReport {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Finished => write!(f, "finished"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Skipped => write!(f, "skipped"),
        }
    }
}

impl std::fmt::Display for GraphStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphStatus::Running => write!(f, "running"),
            GraphStatus::Finished => write!(f, "finished"),
            GraphStatus::Failed => write!(f, "failed"),
        }
    }
}
