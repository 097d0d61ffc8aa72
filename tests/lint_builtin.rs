use f2s::{
    Scope, TaskKind, library_graph, lint::lint_builtin_rules, loader::load_task_list_from_str,
    DependencyGraph,
};

fn graph_of(yaml: &str) -> DependencyGraph {
    DependencyGraph::from_tasks(load_task_list_from_str(yaml, Scope::Anchor).unwrap())
}

#[test]
fn lint_flags_unresolved_requirement() {
    let graph = graph_of(
        r#"
- id: netconfig
  type: puppet
  requires: [globals]
  parameters: {puppet_manifest: netconfig.pp}
"#,
    );
    let errors = lint_builtin_rules(&graph);
    assert!(
        errors
            .iter()
            .any(|e| e.starts_with("dangling_reference: 'globals'") && e.contains("netconfig")),
        "expected dangling reference lint, got {errors:?}"
    );
}

#[test]
fn lint_flags_unsupported_kind_and_odd_ids() {
    let graph = graph_of(
        r#"
- id: reboot_all
  type: reboot
- id: "../escape"
  type: skipped
"#,
    );
    let errors = lint_builtin_rules(&graph);
    assert!(
        errors
            .iter()
            .any(|e| e.starts_with("actionable_kind:") && e.contains("'reboot'")),
        "{errors:?}"
    );
    assert!(
        errors
            .iter()
            .any(|e| e.starts_with("task_id_shape:") && e.contains("../escape")),
        "{errors:?}"
    );
}

#[test]
fn group_kind_is_not_flagged() {
    let graph = graph_of("- id: compute\n  type: group\n");
    assert_eq!(
        graph.tasks().next().map(|t| t.kind.clone()),
        Some(TaskKind::Group)
    );
    assert!(lint_builtin_rules(&graph).is_empty());
}

#[test]
fn library_fixture_is_clean() {
    let graph = library_graph("fixtures/library").unwrap();
    let errors = lint_builtin_rules(&graph);
    assert!(errors.is_empty(), "unexpected lint errors: {errors:?}");
}
