// ABOUTME: Control loop that runs successive task graphs with failure policy
// ABOUTME: Tracks consecutive per-name failures and requests engine suspension

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, instrument, warn};

use super::command::{CommandEngine, LoggingSuspender, SuspensionHook};
use super::context::KnownValues;
use super::error::Result;
use super::plan::DecisionEnginePlan;
use super::report::TaskStatus;
use crate::graph::TaskGraph;

/// Collaborator that constructs the next graph to run, parameterized by the
/// accumulated known values. Returning `None` ends the session cleanly.
#[async_trait]
pub trait GraphSource: Send {
    async fn next_graph(&mut self, known: &KnownValues) -> Result<Option<TaskGraph>>;
}

/// Consecutive-failure counters keyed by task name.
///
/// All tasks sharing a name share one counter: a failure increments it, a
/// success resets it. Crossing the configured threshold trips the tracker,
/// which the control loop converts into a suspension request. A threshold of
/// zero disables tripping; failures are still recorded.
#[derive(Debug)]
pub struct FailureTracker {
    threshold: u32,
    counts: HashMap<String, u32>,
}

impl FailureTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            counts: HashMap::new(),
        }
    }

    pub fn record_failure(&mut self, task_name: &str) -> u32 {
        let count = self.counts.entry(task_name.to_string()).or_insert(0);
        *count += 1;
        warn!(
            task = task_name,
            consecutive_failures = *count,
            "task failure recorded"
        );
        *count
    }

    pub fn record_success(&mut self, task_name: &str) {
        if let Some(count) = self.counts.get_mut(task_name) {
            if *count > 0 {
                info!(task = task_name, previous_failures = *count, "task recovered");
            }
            *count = 0;
        }
    }

    pub fn failures(&self, task_name: &str) -> u32 {
        self.counts.get(task_name).copied().unwrap_or(0)
    }

    /// First task name at or over the threshold, if any.
    pub fn tripped(&self) -> Option<(&str, u32)> {
        if self.threshold == 0 {
            return None;
        }
        self.counts
            .iter()
            .find(|(_, count)| **count >= self.threshold)
            .map(|(name, count)| (name.as_str(), *count))
    }

    pub fn clear(&mut self, task_name: Option<&str>) {
        match task_name {
            Some(name) => {
                self.counts.remove(name);
            }
            None => self.counts.clear(),
        }
    }
}

/// Outcome of one control loop session.
#[derive(Debug, Clone)]
pub struct ControlSummary {
    pub graphs_run: usize,
    pub suspended: bool,
}

/// Outer driver that runs successive task graphs against an accumulating
/// known-values store.
///
/// Each iteration honors the stop flag, checks the failure tracker, asks the
/// [`GraphSource`] for the next graph, and runs it via the
/// [`DecisionEnginePlan`]. Every task failure is recorded and counted; when
/// a task name crosses the consecutive-failure threshold, control is handed
/// to the host engine's [`SuspensionHook`] instead of starting another
/// graph.
pub struct ControlLoop {
    plan: DecisionEnginePlan,
    engine: Arc<dyn CommandEngine>,
    suspender: Arc<dyn SuspensionHook>,
    known: KnownValues,
    tracker: FailureTracker,
    stop: Arc<AtomicBool>,
}

impl ControlLoop {
    pub fn new(engine: Arc<dyn CommandEngine>, known: KnownValues, failure_threshold: u32) -> Self {
        Self {
            plan: DecisionEnginePlan::new(),
            engine,
            suspender: Arc::new(LoggingSuspender),
            known,
            tracker: FailureTracker::new(failure_threshold),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_suspender<S: SuspensionHook + 'static>(mut self, suspender: Arc<S>) -> Self {
        self.suspender = suspender;
        self
    }

    pub fn with_plan(mut self, plan: DecisionEnginePlan) -> Self {
        self.plan = plan;
        self
    }

    /// Shared flag that stops the loop before the next graph starts.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn known_values(&self) -> &KnownValues {
        &self.known
    }

    pub fn insert_value(&mut self, name: impl Into<String>, value: Value) {
        self.known.insert(name, value);
    }

    pub fn extend_values(&mut self, entries: impl IntoIterator<Item = (String, Value)>) {
        self.known.extend(entries);
    }

    pub fn remove_value(&mut self, name: &str) -> Option<Value> {
        self.known.remove(name)
    }

    pub fn failures(&self, task_name: &str) -> u32 {
        self.tracker.failures(task_name)
    }

    #[instrument(skip_all)]
    pub async fn run(&mut self, source: &mut dyn GraphSource) -> Result<ControlSummary> {
        let mut summary = ControlSummary {
            graphs_run: 0,
            suspended: false,
        };
        loop {
            if self.stop.load(Ordering::SeqCst) {
                info!("stop requested, handing control back");
                break;
            }
            if let Some((name, failures)) = self.tracker.tripped() {
                let name = name.to_string();
                warn!(task = %name, failures, "failure threshold crossed");
                self.suspender.suspend(&name, failures).await;
                summary.suspended = true;
                break;
            }
            let Some(graph) = source.next_graph(&self.known).await? else {
                info!("graph source exhausted");
                break;
            };
            let report = self
                .plan
                .run(graph, &mut self.known, Arc::clone(&self.engine))
                .await?;
            summary.graphs_run += 1;
            for task in &report.tasks {
                match task.status {
                    TaskStatus::Failed => {
                        self.tracker.record_failure(&task.name);
                    }
                    TaskStatus::Finished => self.tracker.record_success(&task.name),
                    _ => {}
                }
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_counts_and_resets() {
        let mut tracker = FailureTracker::new(3);

        assert_eq!(tracker.record_failure("Move"), 1);
        assert_eq!(tracker.record_failure("Move"), 2);
        assert!(tracker.tripped().is_none());

        tracker.record_success("Move");
        assert_eq!(tracker.failures("Move"), 0);

        tracker.record_failure("Move");
        tracker.record_failure("Move");
        assert_eq!(tracker.record_failure("Move"), 3);
        let (name, count) = tracker.tripped().unwrap();
        assert_eq!(name, "Move");
        assert_eq!(count, 3);
    }

    #[test]
    fn test_tracker_counters_are_per_name() {
        let mut tracker = FailureTracker::new(2);
        tracker.record_failure("Move");
        tracker.record_failure("Scan");
        assert!(tracker.tripped().is_none());

        // a second same-name failure trips, regardless of which instance failed
        tracker.record_failure("Move");
        assert_eq!(tracker.tripped().unwrap().0, "Move");
    }

    #[test]
    fn test_tracker_zero_threshold_never_trips() {
        let mut tracker = FailureTracker::new(0);
        tracker.record_failure("Move");
        assert!(tracker.tripped().is_none());
        assert_eq!(tracker.failures("Move"), 1);
    }

    #[test]
    fn test_tracker_clear() {
        let mut tracker = FailureTracker::new(1);
        tracker.record_failure("Move");
        tracker.record_failure("Scan");

        tracker.clear(Some("Move"));
        assert_eq!(tracker.failures("Move"), 0);
        assert_eq!(tracker.failures("Scan"), 1);

        tracker.clear(None);
        assert!(tracker.tripped().is_none());
    }
}
