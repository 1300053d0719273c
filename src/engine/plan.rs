// ABOUTME: Decision engine plan: executes one task graph to completion
// ABOUTME: Ready-set scheduling, input resolution, and fail-fast draining

use std::sync::Arc;

use indexmap::IndexSet;
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use super::command::CommandEngine;
use super::context::KnownValues;
use super::error::{ExecutionError, Result};
use super::report::{GraphReport, GraphStatus, TaskReport, TaskStatus};
use crate::graph::task::Selection;
use crate::graph::{Outcome, Task, TaskGraph, TaskId};

/// The scheduler that executes one [`TaskGraph`] to completion.
///
/// Maintains a ready set of tasks whose dependencies have all reached a
/// terminal state, resolves each task's inputs from the known-values store,
/// runs it against the host engine, and folds its outputs back into the
/// store for later tasks. Tasks with no dependency path between them run
/// concurrently; a dependency edge is both an ordering and a
/// mutual-exclusion constraint.
///
/// Tie-breaking between simultaneously ready tasks follows graph insertion
/// order, so a given graph schedules deterministically.
#[derive(Debug, Clone, Default)]
pub struct DecisionEnginePlan {
    strict_outputs: bool,
}

impl DecisionEnginePlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Error on a declared-output/result-value arity mismatch instead of the
    /// default zip-and-truncate binding.
    pub fn with_strict_outputs(mut self, strict: bool) -> Self {
        self.strict_outputs = strict;
        self
    }

    /// Run the graph against the engine, mutating `known` as tasks finish.
    ///
    /// Task failures do not abort the run with an error: the failure stops
    /// new tasks from starting while running siblings drain, and is surfaced
    /// in the returned report. `Err` is reserved for aborts: an invalid
    /// graph, a missing input at resolution time, or an attempt to re-run a
    /// task instance.
    #[instrument(skip_all, fields(tasks = graph.len()))]
    pub async fn run(
        &self,
        graph: TaskGraph,
        known: &mut KnownValues,
        engine: Arc<dyn CommandEngine>,
    ) -> Result<GraphReport> {
        graph.validate()?;

        let mut report = GraphReport::new();
        for task in graph.tasks() {
            report.push(TaskReport::new(task.id(), task.name()));
        }
        info!(run_id = %report.run_id, tasks = graph.len(), "starting graph run");

        let mut started: IndexSet<TaskId> = IndexSet::new();
        let mut finished: IndexSet<TaskId> = IndexSet::new();
        let mut failed = false;
        let mut fatal: Option<ExecutionError> = None;
        let mut running: JoinSet<(TaskId, Vec<Task>, Result<Vec<Value>>)> = JoinSet::new();

        loop {
            if !failed && fatal.is_none() {
                // An immediately-skipped conditional releases its dependents
                // without a completion wave, so keep starting until quiescent.
                let mut made_progress = true;
                while made_progress && fatal.is_none() {
                    made_progress = false;
                    let ready: Vec<Task> = graph
                        .tasks()
                        .filter(|t| !started.contains(&t.id()))
                        .filter(|t| graph.dependency_ids(t.id()).all(|d| finished.contains(&d)))
                        .cloned()
                        .collect();
                    for task in ready {
                        if task.has_started() {
                            fatal = Some(ExecutionError::DuplicateExecution {
                                task: task.name().to_string(),
                            });
                            break;
                        }
                        match task.select(known) {
                            Selection::Skip { wrappers } => {
                                info!(task = %task.name(), "conditional selected skip");
                                if let Err(err) =
                                    finish_wrappers(&wrappers, Outcome::Finished(Vec::new()))
                                {
                                    fatal = Some(err);
                                    break;
                                }
                                started.insert(task.id());
                                finished.insert(task.id());
                                if let Some(tr) = report.task_mut(task.id()) {
                                    tr.mark_completed(TaskStatus::Skipped, None);
                                }
                                made_progress = true;
                            }
                            Selection::Run { leaf, wrappers } => {
                                let inputs =
                                    match known.resolve(task.name(), graph.input_names(task.id())) {
                                        Ok(inputs) => inputs,
                                        Err(err) => {
                                            fatal = Some(err);
                                            break;
                                        }
                                    };
                                if let Err(err) = start_wrappers(&wrappers) {
                                    fatal = Some(err);
                                    break;
                                }
                                started.insert(task.id());
                                if let Some(tr) = report.task_mut(task.id()) {
                                    tr.mark_started();
                                }
                                debug!(task = %task.name(), leaf = %leaf.name(), "task scheduled");
                                let engine = Arc::clone(&engine);
                                let id = task.id();
                                running.spawn(async move {
                                    let result = leaf.execute(inputs, engine.as_ref()).await;
                                    (id, wrappers, result)
                                });
                            }
                        }
                    }
                }
            }

            // Nothing in flight: either every task finished or the run is
            // winding down after a failure or abort.
            let Some(joined) = running.join_next().await else {
                break;
            };
            let (id, wrappers, result) = match joined {
                Ok(completion) => completion,
                Err(join_err) => {
                    error!(error = %join_err, "task panicked");
                    if fatal.is_none() {
                        fatal = Some(ExecutionError::from(join_err));
                    }
                    failed = true;
                    continue;
                }
            };
            let task_name = report
                .task_by_id(id)
                .map(|t| t.name.clone())
                .unwrap_or_default();
            match result {
                Ok(values) => {
                    if let Err(err) = finish_wrappers(&wrappers, Outcome::Finished(values.clone()))
                    {
                        if fatal.is_none() {
                            fatal = Some(err);
                        }
                        failed = true;
                        continue;
                    }
                    if let Err(err) = known.bind_outputs(
                        &task_name,
                        graph.output_names(id),
                        values,
                        self.strict_outputs,
                    ) {
                        if fatal.is_none() {
                            fatal = Some(err);
                        }
                        failed = true;
                        continue;
                    }
                    finished.insert(id);
                    if let Some(tr) = report.task_mut(id) {
                        tr.mark_completed(TaskStatus::Finished, None);
                    }
                }
                Err(err) => {
                    let message = err.to_string();
                    warn!(task = %task_name, error = %message, "task failed, no new tasks will start");
                    let _ = finish_wrappers(&wrappers, Outcome::Failed(message.clone()));
                    failed = true;
                    if let Some(tr) = report.task_mut(id) {
                        tr.mark_completed(TaskStatus::Failed, Some(message));
                    }
                }
            }
        }

        // Tasks never started because an upstream task failed or the run
        // aborted.
        for task in graph.tasks() {
            if !started.contains(&task.id()) {
                if let Some(tr) = report.task_mut(task.id()) {
                    tr.mark_completed(
                        TaskStatus::Skipped,
                        Some("dependencies not satisfied".to_string()),
                    );
                }
            }
        }

        if let Some(err) = fatal {
            report.mark_completed(GraphStatus::Failed);
            return Err(err);
        }
        let status = if failed {
            GraphStatus::Failed
        } else {
            GraphStatus::Finished
        };
        report.mark_completed(status.clone());
        info!(run_id = %report.run_id, status = %status, "graph run complete");
        Ok(report)
    }
}

fn start_wrappers(wrappers: &[Task]) -> Result<()> {
    for wrapper in wrappers {
        wrapper.mark_started()?;
    }
    Ok(())
}

fn finish_wrappers(wrappers: &[Task], outcome: Outcome) -> Result<()> {
    for wrapper in wrappers {
        if !wrapper.has_started() {
            wrapper.mark_started()?;
        }
        wrapper.resolve_signal(outcome.clone())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::command::ImmediateEngine;
    use crate::tasks::FnTask;
    use serde_json::json;

    fn engine() -> Arc<dyn CommandEngine> {
        Arc::new(ImmediateEngine)
    }

    #[tokio::test]
    async fn test_output_propagates_to_dependent_input() {
        let producer = Task::new("producer", FnTask::new(|_| Ok(vec![json!(42)])));
        let consumer = Task::new(
            "consumer",
            FnTask::new(|inputs| {
                assert_eq!(inputs, vec![json!(42)]);
                Ok(Vec::new())
            }),
        );

        let graph = TaskGraph::from_task_with_io(consumer.clone(), ["v"], Vec::<String>::new())
            .depends_on(TaskGraph::from_task_with_io(
                producer.clone(),
                Vec::<String>::new(),
                ["v"],
            ))
            .unwrap();

        let mut known = KnownValues::new();
        let report = DecisionEnginePlan::new()
            .run(graph, &mut known, engine())
            .await
            .unwrap();

        assert_eq!(report.status, GraphStatus::Finished);
        assert_eq!(known.get("v"), Some(&json!(42)));
    }

    #[tokio::test]
    async fn test_failure_stops_new_tasks() {
        let broken = Task::new(
            "broken",
            FnTask::new(|_| Err(ExecutionError::Engine("shutter stuck".into()))),
        );
        let downstream = Task::new("downstream", FnTask::new(|_| Ok(Vec::new())));

        let graph = TaskGraph::from_task(downstream.clone())
            .depends_on(TaskGraph::from_task(broken.clone()))
            .unwrap();

        let mut known = KnownValues::new();
        let report = DecisionEnginePlan::new()
            .run(graph, &mut known, engine())
            .await
            .unwrap();

        assert_eq!(report.status, GraphStatus::Failed);
        assert_eq!(report.task("broken").unwrap().status, TaskStatus::Failed);
        assert_eq!(report.task("downstream").unwrap().status, TaskStatus::Skipped);
        assert!(!downstream.has_started());
    }

    #[tokio::test]
    async fn test_strict_output_mode_rejects_arity_mismatch() {
        let producer = Task::new("producer", FnTask::new(|_| Ok(vec![json!(1)])));
        let graph =
            TaskGraph::from_task_with_io(producer, Vec::<String>::new(), ["x", "y"]);

        let mut known = KnownValues::new();
        let err = DecisionEnginePlan::new()
            .with_strict_outputs(true)
            .run(graph, &mut known, engine())
            .await
            .unwrap_err();

        assert!(matches!(err, ExecutionError::OutputMismatch { .. }));
    }

    #[tokio::test]
    async fn test_empty_graph_finishes() {
        let mut known = KnownValues::new();
        let report = DecisionEnginePlan::new()
            .run(TaskGraph::new(), &mut known, engine())
            .await
            .unwrap();
        assert_eq!(report.status, GraphStatus::Finished);
        assert_eq!(report.summary.total_tasks, 0);
    }
}
