// ABOUTME: Task handles, execution behaviors, and completion signaling
// ABOUTME: Defines the schedulable unit of work and its one-shot terminal state

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Notify;
use tracing::{debug, error, info};

use crate::engine::command::CommandEngine;
use crate::engine::context::KnownValues;
use crate::engine::error::{ExecutionError, Result};

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity for a task, independent of reference identity.
///
/// Graph mappings are keyed by `TaskId`, so two clones of the same `Task`
/// handle refer to the same node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Execution logic for a task.
///
/// A behavior consumes the input values resolved from the known-values store
/// (positionally, per the graph's declared input names) and drives its work
/// through the host engine by issuing commands and awaiting their
/// completions. It returns the ordered list of result values, which the
/// scheduler binds to the graph's declared output names.
#[async_trait]
pub trait Behavior: Send + Sync {
    async fn run(&self, inputs: Vec<Value>, engine: &dyn CommandEngine) -> Result<Vec<Value>>;
}

/// Terminal state of a task.
#[derive(Debug, Clone)]
pub enum Outcome {
    Finished(Vec<Value>),
    Failed(String),
}

impl Outcome {
    pub fn is_finished(&self) -> bool {
        matches!(self, Outcome::Finished(_))
    }

    pub fn results(&self) -> Option<&[Value]> {
        match self {
            Outcome::Finished(values) => Some(values),
            Outcome::Failed(_) => None,
        }
    }
}

/// Completion/failure signal for a single task.
///
/// Created with the task and driven to a terminal outcome exactly once,
/// either by the task's own execution or by completion machinery propagating
/// a wrapped task's outcome. Observers await the terminal state with
/// [`TaskSignal::wait`].
#[derive(Debug, Default)]
pub struct TaskSignal {
    outcome: Mutex<Option<Outcome>>,
    notify: Notify,
}

impl TaskSignal {
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome.lock().expect("signal lock poisoned").clone()
    }

    pub fn is_terminal(&self) -> bool {
        self.outcome.lock().expect("signal lock poisoned").is_some()
    }

    /// Wait for the terminal outcome, however it is reached.
    pub async fn wait(&self) -> Outcome {
        loop {
            let notified = self.notify.notified();
            if let Some(outcome) = self.outcome() {
                return outcome;
            }
            notified.await;
        }
    }

    fn resolve(&self, task: &str, outcome: Outcome) -> Result<()> {
        let mut slot = self.outcome.lock().expect("signal lock poisoned");
        if slot.is_some() {
            return Err(ExecutionError::DuplicateExecution {
                task: task.to_string(),
            });
        }
        *slot = Some(outcome);
        drop(slot);
        self.notify.notify_waiters();
        Ok(())
    }
}

enum TaskKind {
    Action(Box<dyn Behavior>),
    Conditional {
        predicate: Box<dyn Fn(&KnownValues) -> bool + Send + Sync>,
        primary: Task,
        alternative: Option<Task>,
    },
}

struct TaskInner {
    id: TaskId,
    name: String,
    kind: TaskKind,
    signal: TaskSignal,
    started: AtomicBool,
}

/// A single schedulable unit of behavior.
///
/// `Task` is a cheap handle: clones share identity, the completion signal,
/// and the started flag, so a caller can keep a handle to a task it has
/// placed in a graph. A task instance runs at most once; handing the same
/// instance to a second graph run is rejected with
/// [`ExecutionError::DuplicateExecution`].
#[derive(Clone)]
pub struct Task {
    inner: Arc<TaskInner>,
}

/// Resolution of a task immediately before scheduling.
///
/// Conditional tasks collapse to the selected leaf plus the chain of
/// conditional wrappers whose signals must follow the leaf's outcome.
pub(crate) enum Selection {
    Run { leaf: Task, wrappers: Vec<Task> },
    Skip { wrappers: Vec<Task> },
}

impl Task {
    pub fn new(name: impl Into<String>, behavior: impl Behavior + 'static) -> Self {
        Self::with_kind(name.into(), TaskKind::Action(Box::new(behavior)))
    }

    /// A task that selects between two wrapped tasks when the scheduler is
    /// ready to run it. The predicate is evaluated against the known values
    /// at that moment: `true` runs `primary`, `false` runs `alternative` if
    /// present, otherwise the task completes immediately with no results and
    /// still releases its dependents.
    pub fn conditional(
        name: impl Into<String>,
        predicate: impl Fn(&KnownValues) -> bool + Send + Sync + 'static,
        primary: Task,
        alternative: Option<Task>,
    ) -> Self {
        Self::with_kind(
            name.into(),
            TaskKind::Conditional {
                predicate: Box::new(predicate),
                primary,
                alternative,
            },
        )
    }

    fn with_kind(name: String, kind: TaskKind) -> Self {
        Self {
            inner: Arc::new(TaskInner {
                id: TaskId::next(),
                name,
                kind,
                signal: TaskSignal::default(),
                started: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn signal(&self) -> &TaskSignal {
        &self.inner.signal
    }

    pub fn is_complete(&self) -> bool {
        self.inner.signal.is_terminal()
    }

    pub fn has_started(&self) -> bool {
        self.inner.started.load(Ordering::SeqCst)
    }

    /// Follow the conditional chain down to the leaf that will actually run,
    /// or to a skip if an unselected branch has no alternative.
    pub(crate) fn select(&self, known: &KnownValues) -> Selection {
        let mut wrappers = Vec::new();
        let mut current = self.clone();
        loop {
            let chosen = match &current.inner.kind {
                TaskKind::Action(_) => {
                    return Selection::Run {
                        leaf: current,
                        wrappers,
                    }
                }
                TaskKind::Conditional {
                    predicate,
                    primary,
                    alternative,
                } => {
                    if predicate(known) {
                        Some(primary.clone())
                    } else {
                        alternative.clone()
                    }
                }
            };
            match chosen {
                Some(next) => {
                    wrappers.push(current);
                    current = next;
                }
                None => {
                    wrappers.push(current);
                    return Selection::Skip { wrappers };
                }
            }
        }
    }

    pub(crate) fn mark_started(&self) -> Result<()> {
        if self
            .inner
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ExecutionError::DuplicateExecution {
                task: self.inner.name.clone(),
            });
        }
        Ok(())
    }

    pub(crate) fn resolve_signal(&self, outcome: Outcome) -> Result<()> {
        self.inner.signal.resolve(&self.inner.name, outcome)
    }

    /// Run the task logic to its terminal state and return the results.
    ///
    /// Exactly one terminal transition happens per task: success drives the
    /// signal to `Finished` with the result values, any behavior error drives
    /// it to `Failed`. Conditional tasks must be resolved by the scheduler
    /// first.
    pub async fn execute(&self, inputs: Vec<Value>, engine: &dyn CommandEngine) -> Result<Vec<Value>> {
        self.mark_started()?;
        let behavior = match &self.inner.kind {
            TaskKind::Action(behavior) => behavior,
            TaskKind::Conditional { .. } => {
                return Err(ExecutionError::UnresolvedConditional {
                    task: self.inner.name.clone(),
                })
            }
        };
        info!(task = %self.inner.name, "task started");
        debug!(task = %self.inner.name, args = ?inputs, "task arguments");
        match behavior.run(inputs, engine).await {
            Ok(results) => {
                self.resolve_signal(Outcome::Finished(results.clone()))?;
                info!(task = %self.inner.name, "task finished");
                Ok(results)
            }
            Err(err) => {
                let message = err.to_string();
                error!(task = %self.inner.name, error = %message, "task failed");
                self.resolve_signal(Outcome::Failed(message.clone()))?;
                Err(ExecutionError::TaskFailed {
                    task: self.inner.name.clone(),
                    message,
                })
            }
        }
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Task {}

impl std::hash::Hash for Task {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .finish()
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.signal.outcome() {
            Some(Outcome::Finished(results)) => {
                write!(f, "{} complete: {:?}", self.inner.name, results)
            }
            Some(Outcome::Failed(message)) => {
                write!(f, "{} failed: {}", self.inner.name, message)
            }
            None => write!(f, "{}: not finished", self.inner.name),
        }
    }
}
