use crate::{graph::DependencyGraph, task::TaskKind};

#[derive(Clone, Debug, Default)]
pub struct ActionableKindRule;

impl ActionableKindRule {
    /// Group tasks are expected to be graph-only; any other unknown kind
    /// would abort the assign path.
    pub fn check(graph: &DependencyGraph) -> Vec<String> {
        graph
            .tasks()
            .filter(|task| matches!(task.kind, TaskKind::Other(_)))
            .map(|task| {
                format!(
                    "actionable_kind: task '{}' in {} has unsupported type '{}'",
                    task.id, task.scope, task.kind
                )
            })
            .collect()
    }
}
