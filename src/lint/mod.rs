mod actionable_kind;
mod dangling_reference;
mod task_id_shape;

use crate::graph::DependencyGraph;

pub use actionable_kind::ActionableKindRule;
pub use dangling_reference::DanglingReferenceRule;
pub use task_id_shape::TaskIdShapeRule;

/// Run the built-in lint rules over a built graph. None of them is fatal.
pub fn lint_builtin_rules(graph: &DependencyGraph) -> Vec<String> {
    let mut errors = DanglingReferenceRule::check(graph);
    errors.extend(ActionableKindRule::check(graph));
    errors.extend(TaskIdShapeRule::check(graph));
    errors
}
