//! Raw document shapes as produced by the cluster manager and the task library.
//!
//! These types are deliberately permissive: every field is optional so the
//! loader can report missing identities with its own diagnostics, and unknown
//! keys are preserved in `extra`.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Identifier that may be serialized either as a string or as an integer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarId {
    Str(String),
    Int(i64),
}

impl fmt::Display for ScalarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarId::Str(s) => f.write_str(s),
            ScalarId::Int(i) => write!(f, "{i}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DepRefDoc {
    Name(String),
    Ref {
        name: String,
        /// Absent: same scope as the referrer. Explicit null: the anchor scope.
        #[serde(
            default,
            deserialize_with = "present_or_null",
            skip_serializing_if = "Option::is_none"
        )]
        node_id: Option<Option<ScalarId>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role: Option<Value>,
    },
}

fn present_or_null<'de, D>(de: D) -> Result<Option<Option<ScalarId>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<ScalarId>::deserialize(de).map(Some)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrList {
    One(String),
    Many(Vec<String>),
}

impl StringOrList {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            StringOrList::One(one) => vec![one],
            StringOrList::Many(many) => many,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskDoc {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub parameters: Option<Value>,
    #[serde(default)]
    pub requires: Option<Vec<DepRefDoc>>,
    #[serde(default)]
    pub required_for: Option<Vec<DepRefDoc>>,
    #[serde(default)]
    pub groups: Option<Vec<String>>,
    #[serde(default)]
    pub tasks: Option<Vec<String>>,
    #[serde(default, alias = "role")]
    pub roles: Option<StringOrList>,
    #[serde(default, rename = "cross-depends")]
    pub cross_depends: Option<Vec<DepRefDoc>>,
    #[serde(default, rename = "cross-depended-by")]
    pub cross_depended_by: Option<Vec<DepRefDoc>>,
    #[serde(default)]
    pub condition: Option<Value>,
    #[serde(flatten, default)]
    pub extra: IndexMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryEntryDoc {
    #[serde(default)]
    pub parameters: Option<Value>,
    #[serde(flatten, default)]
    pub extra: IndexMap<String, Value>,
}

/// Response of the cluster manager's serialized task endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SerializedGraphDoc {
    #[serde(default)]
    pub tasks_graph: IndexMap<String, Option<Vec<TaskDoc>>>,
    #[serde(default)]
    pub tasks_directory: IndexMap<String, DirectoryEntryDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDoc {
    pub id: ScalarId,
    pub ip: String,
    #[serde(default)]
    pub cluster: Option<ScalarId>,
    #[serde(default)]
    pub roles: Vec<String>,
    /// Deployment facts served for the node.
    #[serde(default)]
    pub facts: serde_json::Map<String, Value>,
}

/// Inventory file consumed by the file-backed node source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodesDoc {
    #[serde(default)]
    pub master: Option<NodeDoc>,
    #[serde(default)]
    pub nodes: Vec<NodeDoc>,
}
