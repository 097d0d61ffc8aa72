use crate::{graph::DependencyGraph, util::is_valid_task_id};

#[derive(Clone, Debug, Default)]
pub struct TaskIdShapeRule;

impl TaskIdShapeRule {
    pub fn check(graph: &DependencyGraph) -> Vec<String> {
        let mut errors = Vec::new();
        for (idx, task) in graph.tasks().enumerate() {
            if !is_valid_task_id(&task.id) {
                errors.push(format!(
                    "task_id_shape: task #{idx} ('{}') cannot be used as a resource or file name",
                    task.id
                ));
            }
        }
        errors
    }
}
