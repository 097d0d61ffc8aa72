//! Typed task descriptors and the dependency pairs they induce.

use serde_json::{Map, Value};
use std::fmt;

use crate::{
    error::{ErrorLocation, F2sError, Result},
    model::{DepRefDoc, TaskDoc},
    scope::{Scope, TaskKey},
};

/// Closed set of task types understood by the resource mapper.
///
/// Kinds outside the set are kept as [`TaskKind::Other`] so they still take
/// part in the graph; they are rejected only when a resource is planned.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Ordinary configuration apply backed by a per-task manifest.
    Puppet,
    Shell,
    Sync,
    CopyFiles,
    /// No-op placeholder.
    Skipped,
    UploadFile,
    /// Virtual node closing over its member tasks.
    Group,
    Other(String),
}

impl TaskKind {
    pub fn parse(raw: &str) -> TaskKind {
        match raw {
            "puppet" => TaskKind::Puppet,
            "shell" => TaskKind::Shell,
            "sync" => TaskKind::Sync,
            "copy_files" => TaskKind::CopyFiles,
            "skipped" => TaskKind::Skipped,
            "upload_file" => TaskKind::UploadFile,
            "group" => TaskKind::Group,
            other => TaskKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TaskKind::Puppet => "puppet",
            TaskKind::Shell => "shell",
            TaskKind::Sync => "sync",
            TaskKind::CopyFiles => "copy_files",
            TaskKind::Skipped => "skipped",
            TaskKind::UploadFile => "upload_file",
            TaskKind::Group => "group",
            TaskKind::Other(other) => other,
        }
    }

    /// Whether the kind maps onto a resource.
    pub fn is_actionable(&self) -> bool {
        !matches!(self, TaskKind::Group | TaskKind::Other(_))
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to another task, optionally pinned to a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRef {
    pub name: String,
    pub node: Option<Scope>,
}

impl DependencyRef {
    pub fn local(name: impl Into<String>) -> Self {
        DependencyRef {
            name: name.into(),
            node: None,
        }
    }

    pub fn on(name: impl Into<String>, scope: Scope) -> Self {
        DependencyRef {
            name: name.into(),
            node: Some(scope),
        }
    }

    /// Graph identity of the target, defaulting to the referrer's scope.
    pub fn resolve(&self, referrer: &Scope) -> TaskKey {
        let scope = self.node.clone().unwrap_or_else(|| referrer.clone());
        TaskKey::new(scope, self.name.clone())
    }

    fn from_doc(doc: DepRefDoc) -> Self {
        match doc {
            DepRefDoc::Name(name) => DependencyRef::local(name),
            DepRefDoc::Ref { name, node_id, .. } => DependencyRef {
                name,
                node: node_id.map(|id| match id {
                    Some(id) => Scope::parse(&id.to_string()),
                    None => Scope::Anchor,
                }),
            },
        }
    }

    fn is_other_scope(&self, own: &Scope) -> bool {
        self.node.as_ref() != Some(own)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskDescriptor {
    pub id: String,
    pub kind: TaskKind,
    pub scope: Scope,
    pub parameters: Map<String, Value>,
    pub requires: Vec<DependencyRef>,
    pub required_for: Vec<DependencyRef>,
    pub groups: Vec<String>,
    pub tasks: Vec<String>,
    pub roles: Vec<String>,
    pub cross_depends: Vec<DependencyRef>,
    pub cross_depended_by: Vec<DependencyRef>,
    pub condition: Option<Value>,
}

impl TaskDescriptor {
    /// Minimal descriptor, mostly useful for building graphs by hand.
    pub fn new(id: impl Into<String>, kind: TaskKind, scope: Scope) -> Self {
        TaskDescriptor {
            id: id.into(),
            kind,
            scope,
            parameters: Map::new(),
            requires: Vec::new(),
            required_for: Vec::new(),
            groups: Vec::new(),
            tasks: Vec::new(),
            roles: Vec::new(),
            cross_depends: Vec::new(),
            cross_depended_by: Vec::new(),
            condition: None,
        }
    }

    /// Normalize a raw descriptor loaded from `scope`.
    pub fn from_doc(doc: TaskDoc, scope: Scope, location: ErrorLocation) -> Result<Self> {
        let id = doc
            .id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| F2sError::MissingField {
                field: "id",
                location: location.clone(),
            })?;
        let kind = doc
            .kind
            .filter(|kind| !kind.trim().is_empty())
            .ok_or_else(|| F2sError::MissingField {
                field: "type",
                location: location.clone(),
            })?;
        let parameters = match doc.parameters {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(F2sError::InvalidParameters {
                    task: id,
                    scope: scope.to_string(),
                    message: format!("parameters must be a mapping, found {other}"),
                });
            }
        };
        let refs = |list: Option<Vec<DepRefDoc>>| -> Vec<DependencyRef> {
            list.unwrap_or_default()
                .into_iter()
                .map(DependencyRef::from_doc)
                .collect()
        };

        Ok(TaskDescriptor {
            id,
            kind: TaskKind::parse(kind.trim()),
            scope,
            parameters,
            requires: refs(doc.requires),
            required_for: refs(doc.required_for),
            groups: doc.groups.unwrap_or_default(),
            tasks: doc.tasks.unwrap_or_default(),
            roles: doc.roles.map(|r| r.into_vec()).unwrap_or_default(),
            cross_depends: refs(doc.cross_depends),
            cross_depended_by: refs(doc.cross_depended_by),
            condition: doc.condition.filter(|c| !c.is_null()),
        })
    }

    pub fn key(&self) -> TaskKey {
        TaskKey::new(self.scope.clone(), self.id.clone())
    }

    pub fn canonical_name(&self) -> String {
        self.key().canonical_name()
    }

    /// Local dependency pairs `(before, after)`; never yields a self pair.
    pub fn edges(&self) -> impl Iterator<Item = (TaskKey, TaskKey)> + '_ {
        let required_for = self
            .required_for
            .iter()
            .map(|dep| (self.key(), dep.resolve(&self.scope)));
        let requires = self
            .requires
            .iter()
            .map(|dep| (dep.resolve(&self.scope), self.key()));
        let groups = self
            .groups
            .iter()
            .map(|group| (self.key(), TaskKey::new(self.scope.clone(), group.clone())));
        let members = self
            .tasks
            .iter()
            .map(|member| (TaskKey::new(self.scope.clone(), member.clone()), self.key()));

        required_for
            .chain(requires)
            .chain(groups)
            .chain(members)
            .filter(|(from, to)| from != to)
    }

    /// Pairs towards concrete tasks on other nodes.
    pub fn cross_edges(&self) -> impl Iterator<Item = (TaskKey, TaskKey)> + '_ {
        let preds = self
            .cross_depends
            .iter()
            .filter(|dep| dep.node.is_some() && dep.is_other_scope(&self.scope))
            .map(|dep| (dep.resolve(&self.scope), self.key()));
        let succs = self
            .cross_depended_by
            .iter()
            .filter(|dep| dep.node.is_some() && dep.is_other_scope(&self.scope))
            .map(|dep| (self.key(), dep.resolve(&self.scope)));
        preds.chain(succs)
    }

    /// Ids of tasks this one waits for on other nodes.
    pub fn cross_node(&self) -> impl Iterator<Item = &str> + '_ {
        self.cross_depends
            .iter()
            .filter(|dep| dep.is_other_scope(&self.scope))
            .map(|dep| dep.name.as_str())
    }

    /// Ids of tasks on other nodes waiting for this one.
    pub fn cross_successors(&self) -> impl Iterator<Item = &str> + '_ {
        self.cross_depended_by
            .iter()
            .filter(|dep| dep.is_other_scope(&self.scope))
            .map(|dep| dep.name.as_str())
    }

    pub fn is_conditional(&self) -> bool {
        match &self.condition {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        }
    }

    /// Role names used to aggregate compositions; falls back to `groups`.
    pub fn grouping(&self) -> &[String] {
        if self.roles.is_empty() {
            &self.groups
        } else {
            &self.roles
        }
    }
}
