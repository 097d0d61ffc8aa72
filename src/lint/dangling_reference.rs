use crate::graph::DependencyGraph;

#[derive(Clone, Debug, Default)]
pub struct DanglingReferenceRule;

impl DanglingReferenceRule {
    pub fn check(graph: &DependencyGraph) -> Vec<String> {
        let mut errors = Vec::new();
        for key in graph.nodes() {
            if graph.task(key).is_some() {
                continue;
            }
            let referrers: Vec<String> = graph
                .predecessors(key)
                .chain(graph.successors(key))
                .map(|other| other.canonical_name())
                .collect();
            errors.push(format!(
                "dangling_reference: '{}' in {} has no descriptor (referenced by {})",
                key.task,
                key.scope,
                referrers.join(", ")
            ));
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        scope::Scope,
        task::{DependencyRef, TaskDescriptor, TaskKind},
    };

    #[test]
    fn reports_missing_targets() {
        let mut task = TaskDescriptor::new("netconfig", TaskKind::Puppet, Scope::node("1"));
        task.requires.push(DependencyRef::local("hiera"));
        let errors = DanglingReferenceRule::check(&DependencyGraph::from_tasks([task]));
        assert_eq!(
            errors,
            vec![
                "dangling_reference: 'hiera' in node 1 has no descriptor (referenced by netconfig_1)"
            ]
        );
    }
}
