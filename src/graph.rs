//! Directed dependency graph over scoped task identities.
//!
//! Adjacency is kept in insertion-ordered maps so every traversal, including
//! the topological sort, is reproducible for a given input.

use indexmap::{IndexMap, IndexSet};
use std::collections::VecDeque;

use crate::{
    error::{F2sError, Result},
    scope::{Scope, TaskKey},
    source::{SerializedGraph, TaskSource},
    task::TaskDescriptor,
};

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    successors: IndexMap<TaskKey, IndexSet<TaskKey>>,
    predecessors: IndexMap<TaskKey, IndexSet<TaskKey>>,
    tasks: IndexMap<TaskKey, TaskDescriptor>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Graph of a flat task list: all local and cross edges plus isolated tasks.
    pub fn from_tasks(tasks: impl IntoIterator<Item = TaskDescriptor>) -> Self {
        let mut graph = DependencyGraph::new();
        for task in tasks {
            graph.insert_task(task);
        }
        graph
    }

    pub fn add_node(&mut self, key: TaskKey) {
        self.successors.entry(key.clone()).or_default();
        self.predecessors.entry(key).or_default();
    }

    /// Add `from -> to`; returns `false` for self-loops and repeated edges.
    pub fn add_edge(&mut self, from: TaskKey, to: TaskKey) -> bool {
        if from == to {
            return false;
        }
        self.add_node(from.clone());
        self.add_node(to.clone());
        let inserted = self
            .successors
            .get_mut(&from)
            .map(|succ| succ.insert(to.clone()))
            .unwrap_or(false);
        if let Some(pred) = self.predecessors.get_mut(&to) {
            pred.insert(from);
        }
        inserted
    }

    /// Register a task node with its descriptor and every edge it induces.
    pub fn insert_task(&mut self, task: TaskDescriptor) {
        let key = task.key();
        self.add_node(key.clone());
        let edges: Vec<_> = task.edges().chain(task.cross_edges()).collect();
        for (from, to) in edges {
            self.add_edge(from, to);
        }
        if let Some(previous) = self.tasks.insert(key.clone(), task) {
            tracing::warn!(
                "task {} defined more than once (kind {}); keeping the last definition",
                key,
                previous.kind
            );
        }
    }

    pub fn task(&self, key: &TaskKey) -> Option<&TaskDescriptor> {
        self.tasks.get(key)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &TaskDescriptor> {
        self.tasks.values()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TaskKey> {
        self.successors.keys()
    }

    pub fn contains(&self, key: &TaskKey) -> bool {
        self.successors.contains_key(key)
    }

    pub fn node_count(&self) -> usize {
        self.successors.len()
    }

    pub fn edge_count(&self) -> usize {
        self.successors.values().map(IndexSet::len).sum()
    }

    pub fn has_edge(&self, from: &TaskKey, to: &TaskKey) -> bool {
        self.successors
            .get(from)
            .is_some_and(|succ| succ.contains(to))
    }

    pub fn successors<'a>(
        &'a self,
        key: &TaskKey,
    ) -> impl Iterator<Item = &'a TaskKey> + use<'a> {
        self.successors.get(key).into_iter().flatten()
    }

    pub fn predecessors<'a>(
        &'a self,
        key: &TaskKey,
    ) -> impl Iterator<Item = &'a TaskKey> + use<'a> {
        self.predecessors.get(key).into_iter().flatten()
    }

    pub fn edges(&self) -> impl Iterator<Item = (&TaskKey, &TaskKey)> {
        self.successors
            .iter()
            .flat_map(|(from, succ)| succ.iter().map(move |to| (from, to)))
    }

    /// Kahn's algorithm; ties are broken by insertion order.
    pub fn topological_sort(&self) -> Result<Vec<&TaskKey>> {
        let mut in_degree: IndexMap<&TaskKey, usize> = self
            .predecessors
            .iter()
            .map(|(key, pred)| (key, pred.len()))
            .collect();
        let mut ready: VecDeque<&TaskKey> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(key, _)| *key)
            .collect();

        let mut order = Vec::with_capacity(self.successors.len());
        while let Some(key) = ready.pop_front() {
            order.push(key);
            for next in self.successors(key) {
                if let Some(degree) = in_degree.get_mut(next) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push_back(next);
                    }
                }
            }
        }

        if order.len() != self.successors.len() {
            let nodes = in_degree
                .into_iter()
                .filter(|(_, degree)| *degree > 0)
                .map(|(key, _)| key.canonical_name())
                .collect();
            return Err(F2sError::Cycle { nodes });
        }
        Ok(order)
    }
}

/// Assembles the graph of the requested scopes from a task source.
pub struct GraphBuilder<'a> {
    source: &'a dyn TaskSource,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(source: &'a dyn TaskSource) -> Self {
        GraphBuilder { source }
    }

    pub fn build(&self, env: &str, scopes: &[Scope]) -> Result<DependencyGraph> {
        let serialized = self.source.fetch_graph(env)?;
        build_from_serialized(serialized, env, scopes)
    }
}

/// Graph of `scopes` out of an already fetched serialized graph.
pub fn build_from_serialized(
    mut serialized: SerializedGraph,
    env: &str,
    scopes: &[Scope],
) -> Result<DependencyGraph> {
    let mut graph = DependencyGraph::new();
    for scope in scopes {
        let tasks = serialized
            .tasks_graph
            .swap_remove(scope)
            .ok_or_else(|| F2sError::MissingScope {
                scope: scope.to_string(),
                env: env.to_string(),
            })?;
        tracing::debug!("{} tasks in {}", tasks.len(), scope);
        for mut task in tasks {
            if task.parameters.is_empty()
                && let Some(entry) = serialized.tasks_directory.get(&task.id)
            {
                task.parameters = entry.parameters.clone();
            }
            graph.insert_task(task);
        }
    }
    Ok(graph)
}
