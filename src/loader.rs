use crate::{
    error::{ErrorLocation, F2sError, Result, SchemaErrorDetail},
    model::{SerializedGraphDoc, TaskDoc},
    scope::Scope,
    source::{DirectoryEntry, SerializedGraph},
    task::TaskDescriptor,
};
use indexmap::IndexMap;
use jsonschema::Draft;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use serde_yaml_bw::Location as YamlLocation;
use std::{fs, path::Path};

const INLINE_SOURCE: &str = "<inline>";
const SERIALIZED_SCHEMA_LABEL: &str = "serialized_tasks.schema.json";
const SERIALIZED_SCHEMA: &str = include_str!("../schemas/serialized_tasks.schema.json");
const TASK_LIST_SCHEMA_LABEL: &str = "task_list.schema.json";
const TASK_LIST_SCHEMA: &str = include_str!("../schemas/task_list.schema.json");

/// Load a serialized task graph (JSON or YAML) from a string.
pub fn load_serialized_graph_from_str(text: &str) -> Result<SerializedGraph> {
    load_serialized_graph(text, INLINE_SOURCE, None)
}

/// Load a serialized task graph (JSON or YAML) from a file.
pub fn load_serialized_graph_from_path(path: &Path) -> Result<SerializedGraph> {
    let content = read_source(path)?;
    load_serialized_graph(&content, &path.display().to_string(), Some(path))
}

/// Load a flat list of task descriptors, all placed in `scope`.
pub fn load_task_list_from_str(text: &str, scope: Scope) -> Result<Vec<TaskDescriptor>> {
    load_task_list(text, scope, INLINE_SOURCE, None)
}

pub fn load_task_list_from_path(path: &Path, scope: Scope) -> Result<Vec<TaskDescriptor>> {
    let content = read_source(path)?;
    load_task_list(&content, scope, &path.display().to_string(), Some(path))
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| F2sError::Internal {
        message: format!("failed to read {}: {e}", path.display()),
        location: ErrorLocation::at_path(path.display().to_string()).with_source_path(Some(path)),
    })
}

fn load_serialized_graph(
    text: &str,
    source_label: &str,
    source_path: Option<&Path>,
) -> Result<SerializedGraph> {
    let value = yaml_to_json(text, source_label, source_path)?;
    validate_json(
        &value,
        SERIALIZED_SCHEMA,
        SERIALIZED_SCHEMA_LABEL,
        source_label,
        source_path,
    )?;
    let doc: SerializedGraphDoc = decode(value, source_label, source_path)?;

    let mut tasks_graph = IndexMap::new();
    for (scope_key, tasks) in doc.tasks_graph {
        let scope = Scope::parse(&scope_key);
        let mut descriptors = Vec::new();
        for (idx, task) in tasks.unwrap_or_default().into_iter().enumerate() {
            let location = ErrorLocation::at_path(format!(
                "{source_label}::tasks_graph.{scope_key}[{idx}]"
            ))
            .with_source_path(source_path);
            descriptors.push(TaskDescriptor::from_doc(task, scope.clone(), location)?);
        }
        tasks_graph.insert(scope, descriptors);
    }

    let tasks_directory = doc
        .tasks_directory
        .into_iter()
        .map(|(id, entry)| {
            let parameters = match entry.parameters {
                Some(Value::Object(map)) => map,
                _ => Map::new(),
            };
            (id, DirectoryEntry { parameters })
        })
        .collect();

    Ok(SerializedGraph {
        tasks_graph,
        tasks_directory,
    })
}

fn load_task_list(
    text: &str,
    scope: Scope,
    source_label: &str,
    source_path: Option<&Path>,
) -> Result<Vec<TaskDescriptor>> {
    let value = yaml_to_json(text, source_label, source_path)?;
    if value.is_null() {
        return Ok(Vec::new());
    }
    validate_json(
        &value,
        TASK_LIST_SCHEMA,
        TASK_LIST_SCHEMA_LABEL,
        source_label,
        source_path,
    )?;
    let docs: Vec<TaskDoc> = decode(value, source_label, source_path)?;
    docs.into_iter()
        .enumerate()
        .map(|(idx, doc)| {
            let location = ErrorLocation::at_path(format!("{source_label}::[{idx}]"))
                .with_source_path(source_path);
            TaskDescriptor::from_doc(doc, scope.clone(), location)
        })
        .collect()
}

fn yaml_to_json(text: &str, source_label: &str, source_path: Option<&Path>) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    let v_yaml: serde_yaml_bw::Value =
        serde_yaml_bw::from_str(text).map_err(|e| F2sError::Yaml {
            message: e.to_string(),
            location: yaml_error_location(source_label, source_path, e.location()),
        })?;
    serde_json::to_value(&v_yaml).map_err(|e| F2sError::Internal {
        message: format!("yaml->json: {e}"),
        location: ErrorLocation::at_path(source_label.to_string()).with_source_path(source_path),
    })
}

fn decode<T: DeserializeOwned>(
    value: Value,
    source_label: &str,
    source_path: Option<&Path>,
) -> Result<T> {
    serde_json::from_value(value).map_err(|e| F2sError::Internal {
        message: format!("decode {source_label}: {e}"),
        location: ErrorLocation::at_path(source_label.to_string()).with_source_path(source_path),
    })
}

fn validate_json(
    doc: &Value,
    schema_text: &str,
    schema_label: &str,
    source_label: &str,
    source_path: Option<&Path>,
) -> Result<()> {
    let schema: Value = serde_json::from_str(schema_text).map_err(|e| F2sError::Internal {
        message: format!("schema parse for {schema_label}: {e}"),
        location: ErrorLocation::at_path(schema_label.to_string()),
    })?;
    let validator = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .map_err(|e| F2sError::Internal {
            message: format!("schema compile for {schema_label}: {e}"),
            location: ErrorLocation::at_path(schema_label.to_string()),
        })?;
    let details: Vec<SchemaErrorDetail> = validator
        .iter_errors(doc)
        .map(|e| {
            let pointer = e.instance_path().to_string();
            let pointer = if pointer.is_empty() {
                "/".to_string()
            } else {
                pointer
            };
            SchemaErrorDetail {
                message: e.to_string(),
                location: ErrorLocation::at_path(format!("{source_label}{pointer}"))
                    .with_source_path(source_path)
                    .with_json_pointer(Some(pointer.clone())),
            }
        })
        .collect();
    if !details.is_empty() {
        let message = details
            .iter()
            .map(|detail| {
                let where_str = detail
                    .location
                    .describe()
                    .unwrap_or_else(|| source_label.to_string());
                let pointer = detail.location.json_pointer.as_deref().unwrap_or("/");
                format!("{where_str} ({pointer}): {}", detail.message)
            })
            .collect::<Vec<_>>()
            .join("\n");
        return Err(F2sError::Schema {
            message,
            details,
            location: ErrorLocation::at_path(source_label.to_string())
                .with_source_path(source_path),
        });
    }
    Ok(())
}

pub(crate) fn yaml_error_location(
    source_label: &str,
    source_path: Option<&Path>,
    loc: Option<YamlLocation>,
) -> ErrorLocation {
    if let Some(loc) = loc {
        ErrorLocation::at_path_with_position(
            source_label.to_string(),
            Some(loc.line()),
            Some(loc.column()),
        )
        .with_source_path(source_path)
    } else {
        ErrorLocation::at_path(source_label.to_string()).with_source_path(source_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskKind;

    #[test]
    fn anchor_scope_and_directory() {
        let graph = load_serialized_graph_from_str(
            r#"
tasks_graph:
  "null":
    - {id: pre_deployment_start, type: skipped}
  "1":
    - id: hosts
      type: puppet
      requires: [{name: pre_deployment_start, node_id: null}]
tasks_directory:
  hosts:
    type: puppet
    parameters: {puppet_manifest: /etc/puppet/modules/hosts.pp}
"#,
        )
        .unwrap();
        let anchor = &graph.tasks_graph[&Scope::Anchor];
        assert_eq!(anchor[0].kind, TaskKind::Skipped);
        let node = &graph.tasks_graph[&Scope::node("1")];
        assert_eq!(node[0].requires[0].node, Some(Scope::Anchor));
        assert!(graph.tasks_directory["hosts"].parameters.contains_key("puppet_manifest"));
    }

    #[test]
    fn schema_rejects_descriptor_without_type() {
        let err = load_task_list_from_str("- id: lonely\n", Scope::Anchor).unwrap_err();
        match err {
            F2sError::Schema { details, .. } => {
                assert_eq!(details[0].location.json_pointer.as_deref(), Some("/0"));
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn empty_library_file_is_empty_list() {
        assert!(load_task_list_from_str("", Scope::Anchor).unwrap().is_empty());
    }

    #[test]
    fn yaml_errors_carry_position() {
        let err = load_serialized_graph_from_str("tasks_graph: [unclosed").unwrap_err();
        assert!(matches!(err, F2sError::Yaml { .. }));
    }
}
