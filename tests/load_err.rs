use f2s::{
    F2sError, Scope,
    loader::{load_serialized_graph_from_path, load_serialized_graph_from_str, load_task_list_from_str},
};
use std::path::Path;

#[test]
fn task_without_id_points_at_the_entry() {
    let err = load_serialized_graph_from_str(
        r#"
tasks_graph:
  "1":
    - type: puppet
"#,
    )
    .unwrap_err();
    let F2sError::Schema { details, .. } = err else {
        panic!("expected schema error, got {err:?}");
    };
    assert_eq!(
        details[0].location.json_pointer.as_deref(),
        Some("/tasks_graph/1/0")
    );
    assert!(details[0].message.contains("id"), "{}", details[0].message);
}

#[test]
fn node_id_must_be_scalar() {
    let err = load_serialized_graph_from_str(
        r#"
tasks_graph:
  "1":
    - id: hosts
      type: puppet
      requires:
        - name: globals
          node_id: [1, 2]
"#,
    )
    .unwrap_err();
    assert!(matches!(err, F2sError::Schema { .. }), "{err}");
}

#[test]
fn library_entry_without_type_is_rejected() {
    let err = load_task_list_from_str("- id: netconfig\n  requires: [globals]\n", Scope::Anchor)
        .unwrap_err();
    let msg = err.to_string();
    assert!(msg.starts_with("Schema validation failed"), "{msg}");
    assert!(msg.contains("(/0)"), "{msg}");
}

#[test]
fn yaml_error_reports_line() {
    let err = load_serialized_graph_from_str("tasks_graph:\n  \"1\": [\n    {id: a\n").unwrap_err();
    let location = err.location().cloned().unwrap_or_default();
    assert!(matches!(err, F2sError::Yaml { .. }), "{err}");
    assert_eq!(location.path.as_deref(), Some("<inline>"));
    assert!(location.line.is_some());
}

#[test]
fn missing_file_names_the_path() {
    let err = load_serialized_graph_from_path(Path::new("fixtures/does_not_exist.yaml"))
        .unwrap_err();
    assert_eq!(
        err.location().and_then(|l| l.describe()).as_deref(),
        Some("fixtures/does_not_exist.yaml")
    );
}
