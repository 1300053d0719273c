// ABOUTME: Integration tests for graph composition and execution ordering
// ABOUTME: Verifies the algebra produces schedules that honor the partial order

use std::sync::Arc;

use stagehand::engine::{DecisionEnginePlan, GraphStatus, ImmediateEngine, KnownValues};
use stagehand::graph::{GraphError, TaskGraph};

mod common;
use common::{logging_task, OrderLog};

#[tokio::test]
async fn test_linear_chain_runs_in_order() {
    let log = OrderLog::new();
    let first = logging_task("first", &log, vec![]);
    let second = logging_task("second", &log, vec![]);
    let third = logging_task("third", &log, vec![]);

    let mut graph = TaskGraph::from_task(first.clone())
        .union(TaskGraph::from_task(second.clone()))
        .unwrap()
        .union(TaskGraph::from_task(third.clone()))
        .unwrap();
    graph.add_dependency(&second, &first).unwrap();
    graph.add_dependency(&third, &second).unwrap();

    let mut known = KnownValues::new();
    let report = DecisionEnginePlan::new()
        .run(graph, &mut known, Arc::new(ImmediateEngine))
        .await
        .unwrap();

    assert_eq!(report.status, GraphStatus::Finished);
    assert_eq!(log.entries(), vec!["first", "second", "third"]);
}

#[tokio::test]
async fn test_depends_on_runs_other_graph_first() {
    let log = OrderLog::new();
    let a1 = logging_task("a1", &log, vec![]);
    let a2 = logging_task("a2", &log, vec![]);
    let b1 = logging_task("b1", &log, vec![]);
    let b2 = logging_task("b2", &log, vec![]);

    let upper = TaskGraph::from_task(a1)
        .union(TaskGraph::from_task(a2))
        .unwrap();
    let lower = TaskGraph::from_task(b1)
        .union(TaskGraph::from_task(b2))
        .unwrap();
    let graph = upper.depends_on(lower).unwrap();

    let mut known = KnownValues::new();
    let report = DecisionEnginePlan::new()
        .run(graph, &mut known, Arc::new(ImmediateEngine))
        .await
        .unwrap();
    assert_eq!(report.status, GraphStatus::Finished);

    for b in ["b1", "b2"] {
        for a in ["a1", "a2"] {
            assert!(
                log.position(b) < log.position(a),
                "{b} must run before {a}: {:?}",
                log.entries()
            );
        }
    }
}

#[tokio::test]
async fn test_is_depended_on_by_runs_self_first() {
    let log = OrderLog::new();
    let setup = logging_task("setup", &log, vec![]);
    let work = logging_task("work", &log, vec![]);

    let graph = TaskGraph::from_task(setup)
        .is_depended_on_by(TaskGraph::from_task(work))
        .unwrap();

    let mut known = KnownValues::new();
    DecisionEnginePlan::new()
        .run(graph, &mut known, Arc::new(ImmediateEngine))
        .await
        .unwrap();

    assert_eq!(log.entries(), vec!["setup", "work"]);
}

#[tokio::test]
async fn test_chained_composition_schedules_every_layer() {
    let log = OrderLog::new();
    let final_task = logging_task("final", &log, vec![]);
    let middle = logging_task("middle", &log, vec![]);
    let start = logging_task("start", &log, vec![]);

    // suggested composition style: later stages declared first
    let graph = TaskGraph::from_task(final_task)
        .depends_on(TaskGraph::from_task(middle))
        .unwrap()
        .depends_on(TaskGraph::from_task(start))
        .unwrap();

    let mut known = KnownValues::new();
    let report = DecisionEnginePlan::new()
        .run(graph, &mut known, Arc::new(ImmediateEngine))
        .await
        .unwrap();

    assert_eq!(report.summary.finished_tasks, 3);
    assert!(log.position("start") < log.position("middle"));
    assert!(log.position("middle") < log.position("final"));
}

#[tokio::test]
async fn test_simultaneously_ready_tasks_start_in_insertion_order() {
    let log = OrderLog::new();
    let a = logging_task("a", &log, vec![]);
    let b = logging_task("b", &log, vec![]);
    let c = logging_task("c", &log, vec![]);

    // no dependencies: all three are ready at once, so the only ordering
    // left is the scheduler's insertion-order tie-break
    let graph = TaskGraph::from_task(a)
        .union(TaskGraph::from_task(b))
        .unwrap()
        .union(TaskGraph::from_task(c))
        .unwrap();

    let mut known = KnownValues::new();
    let report = DecisionEnginePlan::new()
        .run(graph, &mut known, Arc::new(ImmediateEngine))
        .await
        .unwrap();

    assert_eq!(report.status, GraphStatus::Finished);
    assert_eq!(log.entries(), vec!["a", "b", "c"]);
}

#[test]
fn test_composition_loop_is_rejected() {
    let log = OrderLog::new();
    let a = logging_task("a", &log, vec![]);
    let b = logging_task("b", &log, vec![]);

    let mut graph = TaskGraph::from_task(a.clone())
        .union(TaskGraph::from_task(b.clone()))
        .unwrap();
    graph.add_dependency(&a, &b).unwrap();

    let err = graph.add_dependency(&b, &a).unwrap_err();
    assert!(matches!(err, GraphError::CycleDetected { .. }));
}

#[test]
fn test_graph_depending_on_itself_is_rejected() {
    let log = OrderLog::new();
    let t = logging_task("t", &log, vec![]);

    let err = TaskGraph::from_task(t.clone())
        .depends_on(TaskGraph::from_task(t))
        .unwrap_err();
    assert!(matches!(err, GraphError::CycleDetected { .. }));
}
