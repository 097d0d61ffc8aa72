//! Scopes and canonical naming.
//!
//! A task lives either on a concrete node or in the anchor scope, which holds
//! global ordering-only tasks. The store identity of a task is derived from
//! both, so equal ids on different nodes never collide.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Serialized key used by the cluster manager for the anchor scope.
pub const ANCHOR_KEY: &str = "null";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Scope {
    Anchor,
    Node(String),
}

impl Scope {
    /// Parse a scope key as found in `tasks_graph`.
    pub fn parse(raw: &str) -> Scope {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == ANCHOR_KEY || trimmed == "~" {
            Scope::Anchor
        } else {
            Scope::Node(trimmed.to_string())
        }
    }

    pub fn node(id: impl Into<String>) -> Scope {
        Scope::Node(id.into())
    }

    pub fn is_anchor(&self) -> bool {
        matches!(self, Scope::Anchor)
    }

    pub fn node_id(&self) -> Option<&str> {
        match self {
            Scope::Anchor => None,
            Scope::Node(id) => Some(id),
        }
    }

    pub fn as_key(&self) -> &str {
        self.node_id().unwrap_or(ANCHOR_KEY)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Anchor => write!(f, "<anchor>"),
            Scope::Node(id) => write!(f, "node {id}"),
        }
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> String {
        scope.as_key().to_string()
    }
}

impl From<String> for Scope {
    fn from(raw: String) -> Scope {
        Scope::parse(&raw)
    }
}

/// Store-unique name of `task_id` within `scope`.
pub fn name_from(scope: &Scope, task_id: &str) -> String {
    match scope {
        Scope::Anchor => task_id.to_string(),
        Scope::Node(node) => format!("{task_id}_{node}"),
    }
}

/// Identity of a graph node: a task id qualified by its scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskKey {
    pub scope: Scope,
    pub task: String,
}

impl TaskKey {
    pub fn new(scope: Scope, task: impl Into<String>) -> Self {
        TaskKey {
            scope,
            task: task.into(),
        }
    }

    pub fn anchor(task: impl Into<String>) -> Self {
        TaskKey::new(Scope::Anchor, task)
    }

    pub fn canonical_name(&self) -> String {
        name_from(&self.scope, &self.task)
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_names() {
        assert_eq!(name_from(&Scope::Anchor, "foo"), "foo");
        assert_eq!(name_from(&Scope::node("5"), "foo"), "foo_5");
    }

    #[test]
    fn same_id_in_different_scopes_never_collides() {
        let a = TaskKey::new(Scope::node("1"), "netconfig");
        let b = TaskKey::new(Scope::node("2"), "netconfig");
        let c = TaskKey::anchor("netconfig");
        assert_ne!(a.canonical_name(), b.canonical_name());
        assert_ne!(a.canonical_name(), c.canonical_name());
    }

    #[test]
    fn parse_anchor_keys() {
        assert_eq!(Scope::parse("null"), Scope::Anchor);
        assert_eq!(Scope::parse(""), Scope::Anchor);
        assert_eq!(Scope::parse(" 7 "), Scope::node("7"));
        assert_eq!(Scope::node("7").as_key(), "7");
        assert_eq!(Scope::Anchor.as_key(), "null");
    }
}
