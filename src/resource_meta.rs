//! Resource definitions (`meta.yaml`) for library tasks.
//!
//! Only the metadata is rendered; manifests are copied by the packaging step.

use anyhow::Context;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fs, path::Path, path::PathBuf};

use crate::{
    config::Config,
    error::{F2sError, Result},
    path_safety::join_under_root,
    task::{TaskDescriptor, TaskKind},
};

pub const META_VERSION: &str = "8.0";
pub const META_FILE: &str = "meta.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceMeta {
    pub id: String,
    pub handler: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub actions: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<IndexMap<String, InputSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<IndexMap<String, InputSpec>>,
}

impl ResourceMeta {
    pub fn for_task(task: &TaskDescriptor, config: &Config) -> Result<Self> {
        match task.kind {
            TaskKind::Puppet => {
                let manifest = match task.parameters.get("puppet_manifest") {
                    Some(Value::String(path)) if !path.is_empty() => path.clone(),
                    _ => {
                        return Err(F2sError::InvalidParameters {
                            task: task.id.clone(),
                            scope: task.scope.to_string(),
                            message: "missing 'puppet_manifest'".to_string(),
                        });
                    }
                };
                let actions = ["run", "update"]
                    .into_iter()
                    .map(|action| (action.to_string(), manifest.clone()))
                    .collect();
                let mut input = IndexMap::new();
                input.insert(
                    "puppet_modules".to_string(),
                    InputSpec {
                        kind: "str!".to_string(),
                        value: config.puppet_modules.clone(),
                    },
                );
                Ok(ResourceMeta {
                    id: task.id.clone(),
                    handler: "puppetv2".to_string(),
                    version: META_VERSION.to_string(),
                    actions,
                    input: Some(input),
                    inputs: None,
                })
            }
            TaskKind::Skipped => Ok(ResourceMeta {
                id: task.id.clone(),
                handler: "none".to_string(),
                version: META_VERSION.to_string(),
                actions: IndexMap::new(),
                input: None,
                inputs: Some(IndexMap::new()),
            }),
            _ => Err(F2sError::UnknownKind {
                task: task.id.clone(),
                scope: task.scope.to_string(),
                kind: task.kind.to_string(),
            }),
        }
    }

    /// Write `<out>/<id>/meta.yaml` and return its path.
    pub fn write_under(&self, out: &Path) -> anyhow::Result<PathBuf> {
        let dir = join_under_root(out, Path::new(&self.id))?;
        fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
        let path = dir.join(META_FILE);
        let yaml = serde_yaml_bw::to_string(self)
            .with_context(|| format!("failed to render metadata for {}", self.id))?;
        fs::write(&path, yaml).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}

/// Metadata for every task that has a resource handler. Tasks of other kinds,
/// or without a manifest, are reported back by id and skipped.
pub fn render_all<'a>(
    tasks: impl IntoIterator<Item = &'a TaskDescriptor>,
    config: &Config,
) -> (Vec<ResourceMeta>, Vec<String>) {
    let mut metas = Vec::new();
    let mut skipped = Vec::new();
    for task in tasks {
        match ResourceMeta::for_task(task, config) {
            Ok(meta) => metas.push(meta),
            Err(err) => {
                tracing::debug!("no resource metadata for {}: {err}", task.id);
                skipped.push(task.id.clone());
            }
        }
    }
    (metas, skipped)
}
