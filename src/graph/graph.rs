// ABOUTME: TaskGraph container and its composition algebra
// ABOUTME: Maps tasks to dependencies and argument names, with cycle validation

use std::fmt;

use indexmap::{IndexMap, IndexSet};
use petgraph::algo::toposort;
use petgraph::graph::NodeIndex;
use petgraph::Graph;

use super::error::{GraphError, Result};
use super::task::{Task, TaskId};

/// A dependency and argument topology over a set of tasks.
///
/// Three mappings, all keyed by task identity: `dependencies` ("must not run
/// until all of these have finished", which also forbids overlapping
/// execution), `inputs` (ordered argument names resolved from the
/// known-values store at run time) and `outputs` (names a task's result
/// values are bound to).
///
/// Graphs compose by value: [`TaskGraph::union`], [`TaskGraph::depends_on`]
/// and [`TaskGraph::is_depended_on_by`] consume their operands, so a task
/// instance ends up in exactly one executable graph.
#[derive(Debug, Default)]
pub struct TaskGraph {
    tasks: IndexMap<TaskId, Task>,
    dependencies: IndexMap<TaskId, IndexSet<TaskId>>,
    inputs: IndexMap<TaskId, Vec<String>>,
    outputs: IndexMap<TaskId, Vec<String>>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single-task graph with no declared inputs or outputs.
    pub fn from_task(task: Task) -> Self {
        let mut graph = Self::new();
        graph.insert_task(task);
        graph
    }

    /// A single-task graph with declared input and output argument names.
    pub fn from_task_with_io<I, O>(task: Task, inputs: I, outputs: O) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
    {
        let mut graph = Self::from_task(task.clone());
        graph
            .inputs
            .insert(task.id(), inputs.into_iter().map(Into::into).collect());
        graph
            .outputs
            .insert(task.id(), outputs.into_iter().map(Into::into).collect());
        graph
    }

    fn insert_task(&mut self, task: Task) {
        let id = task.id();
        self.tasks.insert(id, task);
        self.dependencies.entry(id).or_default();
    }

    /// Add a dependency edge between two member tasks: `task` must not run
    /// until `dependency` has finished.
    pub fn add_dependency(&mut self, task: &Task, dependency: &Task) -> Result<()> {
        if !self.tasks.contains_key(&task.id()) {
            return Err(GraphError::UnknownDependency {
                task: task.name().to_string(),
                dependency: dependency.name().to_string(),
            });
        }
        if !self.tasks.contains_key(&dependency.id()) {
            return Err(GraphError::UnknownDependency {
                task: task.name().to_string(),
                dependency: dependency.name().to_string(),
            });
        }
        let inserted = self
            .dependencies
            .entry(task.id())
            .or_default()
            .insert(dependency.id());
        if let Err(err) = self.validate() {
            if inserted {
                self.dependencies
                    .entry(task.id())
                    .or_default()
                    .swap_remove(&dependency.id());
            }
            return Err(err);
        }
        Ok(())
    }

    /// Key-wise union of two graphs.
    ///
    /// `other` overwrites `self` for `inputs` and `outputs` on key collision;
    /// dependency sets for a task present in both are merged by set union,
    /// never dropped. Both operands are consumed so the member tasks cannot
    /// accidentally be scheduled from two graphs.
    pub fn union(mut self, other: TaskGraph) -> Result<TaskGraph> {
        for (id, task) in other.tasks {
            self.tasks.insert(id, task);
        }
        for (id, deps) in other.dependencies {
            self.dependencies.entry(id).or_default().extend(deps);
        }
        for (id, names) in other.inputs {
            self.inputs.insert(id, names);
        }
        for (id, names) in other.outputs {
            self.outputs.insert(id, names);
        }
        self.validate()?;
        Ok(self)
    }

    /// All tasks of `other` must finish before any task of `self` may start.
    ///
    /// Every task in `self` gains every task of `other` as a dependency, and
    /// the graphs are merged. Construction that would introduce a cycle
    /// (including making a graph depend on itself) fails.
    pub fn depends_on(mut self, other: TaskGraph) -> Result<TaskGraph> {
        let new_dependencies: Vec<TaskId> = other.tasks.keys().copied().collect();
        for deps in self.dependencies.values_mut() {
            deps.extend(new_dependencies.iter().copied());
        }
        self.union(other)
    }

    /// The mirror of [`TaskGraph::depends_on`]: all tasks of `self` must
    /// finish before any task of `other` may start.
    pub fn is_depended_on_by(self, other: TaskGraph) -> Result<TaskGraph> {
        other.depends_on(self)
    }

    /// Check the two structural invariants: every dependency edge targets a
    /// member task, and the directed graph is acyclic.
    pub fn validate(&self) -> Result<()> {
        for (id, deps) in &self.dependencies {
            for dep in deps {
                if !self.tasks.contains_key(dep) {
                    return Err(GraphError::UnknownDependency {
                        task: self.task_name(*id),
                        dependency: format!("task #{dep}"),
                    });
                }
            }
        }

        let mut graph: Graph<TaskId, ()> = Graph::new();
        let mut indices: IndexMap<TaskId, NodeIndex> = IndexMap::new();
        for id in self.tasks.keys() {
            indices.insert(*id, graph.add_node(*id));
        }
        for (id, deps) in &self.dependencies {
            for dep in deps {
                graph.add_edge(indices[dep], indices[id], ());
            }
        }
        toposort(&graph, None)
            .map(|_| ())
            .map_err(|cycle| GraphError::CycleDetected {
                tasks: vec![self.task_name(graph[cycle.node_id()])],
            })
    }

    fn task_name(&self, id: TaskId) -> String {
        self.tasks
            .get(&id)
            .map(|t| t.name().to_string())
            .unwrap_or_else(|| format!("task #{id}"))
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn contains(&self, task: &Task) -> bool {
        self.tasks.contains_key(&task.id())
    }

    /// Member tasks in insertion order. The scheduler uses this order as its
    /// deterministic tie-break when several tasks are ready at once.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    pub fn dependency_ids(&self, id: TaskId) -> impl Iterator<Item = TaskId> + '_ {
        self.dependencies.get(&id).into_iter().flatten().copied()
    }

    pub fn input_names(&self, id: TaskId) -> &[String] {
        self.inputs.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn output_names(&self, id: TaskId) -> &[String] {
        self.outputs.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Tasks with no dependencies.
    pub fn roots(&self) -> Vec<&Task> {
        self.tasks
            .values()
            .filter(|t| self.dependencies.get(&t.id()).map_or(true, IndexSet::is_empty))
            .collect()
    }
}

impl fmt::Display for TaskGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for task in self.tasks.values() {
            if !first {
                write!(f, "; ")?;
            }
            first = false;
            let deps: Vec<&str> = self
                .dependency_ids(task.id())
                .filter_map(|dep| self.tasks.get(&dep).map(Task::name))
                .collect();
            write!(
                f,
                "{}: depends on: {:?}, has inputs: {:?}, has outputs: {:?}",
                task.name(),
                deps,
                self.input_names(task.id()),
                self.output_names(task.id()),
            )?;
        }
        Ok(())
    }
}
