//! Task kind dispatch onto resource templates.

use serde_json::{Map, Value};

use crate::{
    config::Config,
    error::{F2sError, Result},
    report::{BatchReport, Ownership, Stage},
    scope::Scope,
    store::{ResourceDefinition, ResourceHandle, ResourceStore, Upsert, upsert},
    task::{TaskDescriptor, TaskKind},
};

/// Kind-specific resource shape, validated before anything touches a store.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceSpec {
    Noop,
    Command { cmd: String, timeout: u64 },
    Sync { src: String, dst: String },
    BatchSource { sources: Vec<Value> },
    /// Per-task resource definition that already exists under the task id.
    Manifest { task: String },
    Content { path: String, data: String },
}

impl ResourceSpec {
    pub fn for_task(task: &TaskDescriptor, config: &Config) -> Result<Self> {
        let params = &task.parameters;
        let invalid = |message: String| F2sError::InvalidParameters {
            task: task.id.clone(),
            scope: task.scope.to_string(),
            message,
        };
        let spec = match &task.kind {
            TaskKind::Skipped => ResourceSpec::Noop,
            TaskKind::Shell => ResourceSpec::Command {
                cmd: required_str(params, "cmd").map_err(invalid)?,
                timeout: optional_u64(params, "timeout")
                    .map_err(invalid)?
                    .unwrap_or(config.shell_timeout),
            },
            TaskKind::Sync => ResourceSpec::Sync {
                src: required_str(params, "src").map_err(invalid)?,
                dst: required_str(params, "dst").map_err(invalid)?,
            },
            TaskKind::CopyFiles => match params.get("files") {
                Some(Value::Array(files)) => ResourceSpec::BatchSource {
                    sources: files.clone(),
                },
                Some(other) => {
                    return Err(invalid(format!("'files' must be a list, found {other}")));
                }
                None => return Err(invalid("missing 'files'".to_string())),
            },
            TaskKind::Puppet => ResourceSpec::Manifest {
                task: task.id.clone(),
            },
            TaskKind::UploadFile => ResourceSpec::Content {
                path: required_str(params, "path").map_err(invalid)?,
                data: required_str(params, "data").map_err(invalid)?,
            },
            TaskKind::Group | TaskKind::Other(_) => {
                return Err(F2sError::UnknownKind {
                    task: task.id.clone(),
                    scope: task.scope.to_string(),
                    kind: task.kind.to_string(),
                });
            }
        };
        Ok(spec)
    }

    pub fn definition(&self, config: &Config) -> ResourceDefinition {
        match self {
            ResourceSpec::Noop => ResourceDefinition::new(config.template("noop")),
            ResourceSpec::Command { cmd, timeout } => {
                ResourceDefinition::new(config.template("command"))
                    .with_input("cmd", cmd.as_str())
                    .with_input("timeout", *timeout)
            }
            ResourceSpec::Sync { src, dst } => ResourceDefinition::new(config.template("sync"))
                .with_input("src", src.as_str())
                .with_input("dst", dst.as_str()),
            ResourceSpec::BatchSource { sources } => {
                ResourceDefinition::new(config.template("sources"))
                    .with_input("sources", Value::Array(sources.clone()))
            }
            ResourceSpec::Manifest { task } => ResourceDefinition::new(config.template(task)),
            ResourceSpec::Content { path, data } => {
                ResourceDefinition::new(config.template("content"))
                    .with_input("path", path.as_str())
                    .with_input("data", data.as_str())
            }
        }
    }
}

fn required_str(params: &Map<String, Value>, key: &str) -> std::result::Result<String, String> {
    match params.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::String(_)) | None => Err(format!("missing '{key}'")),
        Some(other) => Err(format!("'{key}' must be a string, found {other}")),
    }
}

fn optional_u64(params: &Map<String, Value>, key: &str) -> std::result::Result<Option<u64>, String> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| format!("'{key}' must be a non-negative integer, found {n}")),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| format!("'{key}' must be a non-negative integer, found '{s}'")),
        Some(other) => Err(format!("'{key}' must be a non-negative integer, found {other}")),
    }
}

/// A resource ready to be applied: canonical name, owning scope, definition.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedResource {
    pub name: String,
    pub scope: Scope,
    pub spec: ResourceSpec,
    pub definition: ResourceDefinition,
}

pub struct ResourceMapper<'c> {
    config: &'c Config,
}

impl<'c> ResourceMapper<'c> {
    pub fn new(config: &'c Config) -> Self {
        ResourceMapper { config }
    }

    /// Dispatch `task` by kind; unknown kinds and bad parameters are fatal.
    pub fn plan(&self, task: &TaskDescriptor) -> Result<PlannedResource> {
        let spec = ResourceSpec::for_task(task, self.config)?;
        let definition = spec.definition(self.config);
        Ok(PlannedResource {
            name: task.canonical_name(),
            scope: task.scope.clone(),
            spec,
            definition,
        })
    }

    /// Load-or-create the planned resource and attach new node-scoped
    /// resources to their node. Store failures land in `report`.
    pub fn apply<S: ResourceStore + ?Sized>(
        &self,
        store: &mut S,
        planned: &PlannedResource,
        report: &mut BatchReport,
    ) -> Upsert {
        let outcome = upsert(store, &planned.name, &planned.definition);
        report.record_upsert(&planned.name, &outcome);
        tracing::debug!("resource {} -> {:?}", planned.name, outcome);

        if let (Upsert::Created(handle), Some(node_id)) = (&outcome, planned.scope.node_id()) {
            attach_to_node(store, &self.config.node_resource(node_id), handle, report);
        }
        outcome
    }
}

/// Connect `child` to the node resource `node_name`, recording any failure.
pub fn attach_to_node<S: ResourceStore + ?Sized>(
    store: &mut S,
    node_name: &str,
    child: &ResourceHandle,
    report: &mut BatchReport,
) {
    match store.load(node_name) {
        Ok(Some(node)) => match store.connect(&node, child) {
            Ok(()) => report.connected.push(Ownership {
                parent: node_name.to_string(),
                child: child.name.clone(),
            }),
            Err(err) => report.fail(Stage::Ownership, &child.name, &err),
        },
        Ok(None) => report.fail(
            Stage::Ownership,
            &child.name,
            &F2sError::store(format!("node resource '{node_name}' not found")),
        ),
        Err(err) => report.fail(Stage::Ownership, &child.name, &err),
    }
}
