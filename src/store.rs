//! Resource and event store interfaces.
//!
//! [`MemoryStore`] implements both and can be persisted as a YAML snapshot,
//! which is what the command line uses between runs.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{fmt, fs, path::Path};

use crate::error::{F2sError, Result};

/// Template reference plus inputs for a resource to be created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDefinition {
    pub template: String,
    #[serde(default)]
    pub inputs: Map<String, Value>,
}

impl ResourceDefinition {
    pub fn new(template: impl Into<String>) -> Self {
        ResourceDefinition {
            template: template.into(),
            inputs: Map::new(),
        }
    }

    pub fn with_input(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.inputs.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceHandle {
    pub name: String,
    pub template: String,
}

pub trait ResourceStore {
    fn load(&self, name: &str) -> Result<Option<ResourceHandle>>;
    fn create(&mut self, name: &str, definition: &ResourceDefinition) -> Result<ResourceHandle>;
    /// Record that `child` belongs to `parent`. This is not an ordering edge.
    fn connect(&mut self, parent: &ResourceHandle, child: &ResourceHandle) -> Result<()>;
    /// Merge `inputs` into an existing resource, declaring inputs it lacks.
    /// Returns the names of the newly declared inputs.
    fn update(&mut self, name: &str, inputs: &Map<String, Value>) -> Result<Vec<String>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Run,
    Update,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Run => "run",
            Action::Update => "update",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Actions every derived event is declared for.
pub const DEFAULT_ACTIONS: [Action; 2] = [Action::Run, Action::Update];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Ordering gate: the child action waits for the parent's success.
    DependsOn,
    /// Best-effort notification: success of the parent triggers the child.
    ReactOn,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::DependsOn => "depends_on",
            EventKind::ReactOn => "react_on",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait EventStore {
    fn add_ordering_dependency(&mut self, from: &str, to: &str, actions: &[Action]) -> Result<()>;
    fn add_notification(&mut self, from: &str, to: &str, actions: &[Action]) -> Result<()>;
}

/// Outcome of a load-or-create call.
#[derive(Debug)]
pub enum Upsert {
    Created(ResourceHandle),
    Existing(ResourceHandle),
    Failed(F2sError),
}

impl Upsert {
    pub fn handle(&self) -> Option<&ResourceHandle> {
        match self {
            Upsert::Created(handle) | Upsert::Existing(handle) => Some(handle),
            Upsert::Failed(_) => None,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Upsert::Created(_))
    }
}

/// Load `name`, creating it from `definition` only when absent.
///
/// A create that loses a race against a concurrent writer resolves to the
/// resource that won.
pub fn upsert<S: ResourceStore + ?Sized>(
    store: &mut S,
    name: &str,
    definition: &ResourceDefinition,
) -> Upsert {
    match store.load(name) {
        Ok(Some(handle)) => Upsert::Existing(handle),
        Ok(None) => match store.create(name, definition) {
            Ok(handle) => Upsert::Created(handle),
            Err(err) => match store.load(name) {
                Ok(Some(handle)) => Upsert::Existing(handle),
                _ => Upsert::Failed(err),
            },
        },
        Err(err) => Upsert::Failed(err),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResource {
    pub template: String,
    #[serde(default)]
    pub inputs: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub parent: String,
    pub parent_action: Action,
    pub state: String,
    pub child: String,
    pub child_action: Action,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStore {
    #[serde(default)]
    resources: IndexMap<String, StoredResource>,
    #[serde(default)]
    events: Vec<StoredEvent>,
    #[serde(skip)]
    create_calls: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot; a missing file yields an empty store.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(MemoryStore::new());
        }
        let text = fs::read_to_string(path)
            .map_err(|e| F2sError::store(format!("failed to read {}: {e}", path.display())))?;
        if text.trim().is_empty() {
            return Ok(MemoryStore::new());
        }
        serde_yaml_bw::from_str(&text)
            .map_err(|e| F2sError::store(format!("invalid snapshot {}: {e}", path.display())))
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml_bw::to_string(self)
            .map_err(|e| F2sError::store(format!("serialize snapshot: {e}")))?;
        fs::write(path, yaml)
            .map_err(|e| F2sError::store(format!("failed to write {}: {e}", path.display())))
    }

    pub fn resource(&self, name: &str) -> Option<&StoredResource> {
        self.resources.get(name)
    }

    pub fn resources(&self) -> impl Iterator<Item = (&String, &StoredResource)> {
        self.resources.iter()
    }

    pub fn events(&self) -> &[StoredEvent] {
        &self.events
    }

    /// Number of successful `create` calls since this store was constructed.
    pub fn create_calls(&self) -> usize {
        self.create_calls
    }

    fn require(&self, name: &str) -> Result<()> {
        if self.resources.contains_key(name) {
            Ok(())
        } else {
            Err(F2sError::store(format!("resource '{name}' not found")))
        }
    }

    fn add_events(
        &mut self,
        kind: EventKind,
        from: &str,
        to: &str,
        actions: &[Action],
    ) -> Result<()> {
        self.require(from)?;
        self.require(to)?;
        for action in actions {
            let event = StoredEvent {
                kind,
                parent: from.to_string(),
                parent_action: *action,
                state: "success".to_string(),
                child: to.to_string(),
                child_action: *action,
            };
            if !self.events.contains(&event) {
                self.events.push(event);
            }
        }
        Ok(())
    }
}

impl ResourceStore for MemoryStore {
    fn load(&self, name: &str) -> Result<Option<ResourceHandle>> {
        Ok(self.resources.get(name).map(|res| ResourceHandle {
            name: name.to_string(),
            template: res.template.clone(),
        }))
    }

    fn create(&mut self, name: &str, definition: &ResourceDefinition) -> Result<ResourceHandle> {
        if self.resources.contains_key(name) {
            return Err(F2sError::store(format!("resource '{name}' already exists")));
        }
        self.resources.insert(
            name.to_string(),
            StoredResource {
                template: definition.template.clone(),
                inputs: definition.inputs.clone(),
                children: Vec::new(),
            },
        );
        self.create_calls += 1;
        Ok(ResourceHandle {
            name: name.to_string(),
            template: definition.template.clone(),
        })
    }

    fn connect(&mut self, parent: &ResourceHandle, child: &ResourceHandle) -> Result<()> {
        self.require(&child.name)?;
        let stored = self
            .resources
            .get_mut(&parent.name)
            .ok_or_else(|| F2sError::store(format!("resource '{}' not found", parent.name)))?;
        if !stored.children.contains(&child.name) {
            stored.children.push(child.name.clone());
        }
        Ok(())
    }

    fn update(&mut self, name: &str, inputs: &Map<String, Value>) -> Result<Vec<String>> {
        let stored = self
            .resources
            .get_mut(name)
            .ok_or_else(|| F2sError::store(format!("resource '{name}' not found")))?;
        let mut added = Vec::new();
        for (key, value) in inputs {
            if !stored.inputs.contains_key(key) {
                added.push(key.clone());
            }
            stored.inputs.insert(key.clone(), value.clone());
        }
        Ok(added)
    }
}

impl EventStore for MemoryStore {
    fn add_ordering_dependency(&mut self, from: &str, to: &str, actions: &[Action]) -> Result<()> {
        self.add_events(EventKind::DependsOn, from, to, actions)
    }

    fn add_notification(&mut self, from: &str, to: &str, actions: &[Action]) -> Result<()> {
        self.add_events(EventKind::ReactOn, from, to, actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_is_idempotent() {
        let mut store = MemoryStore::new();
        let def = ResourceDefinition::new("f2s/noop");
        let first = upsert(&mut store, "hosts_1", &def);
        let second = upsert(&mut store, "hosts_1", &def);
        assert!(first.is_created());
        assert!(matches!(second, Upsert::Existing(_)));
        assert_eq!(first.handle(), second.handle());
        assert_eq!(store.create_calls(), 1);
    }

    #[test]
    fn events_require_both_resources() {
        let mut store = MemoryStore::new();
        store
            .create("a", &ResourceDefinition::new("f2s/noop"))
            .unwrap();
        let err = store
            .add_ordering_dependency("a", "b", &DEFAULT_ACTIONS)
            .unwrap_err();
        assert!(err.to_string().contains("'b' not found"));
        assert!(store.events().is_empty());
    }

    #[test]
    fn repeated_events_are_stored_once() {
        let mut store = MemoryStore::new();
        for name in ["a", "b"] {
            store
                .create(name, &ResourceDefinition::new("f2s/noop"))
                .unwrap();
        }
        store.add_notification("a", "b", &DEFAULT_ACTIONS).unwrap();
        store.add_notification("a", "b", &DEFAULT_ACTIONS).unwrap();
        assert_eq!(store.events().len(), 2);
        assert_eq!(store.events()[0].kind, EventKind::ReactOn);
    }

    #[test]
    fn update_declares_missing_inputs() {
        let mut store = MemoryStore::new();
        store
            .create(
                "fuel_data1",
                &ResourceDefinition::new("f2s/fuel_data").with_input("uid", 1),
            )
            .unwrap();
        let mut facts = Map::new();
        facts.insert("uid".to_string(), Value::from(1));
        facts.insert("fqdn".to_string(), Value::from("node-1.domain.tld"));

        let added = store.update("fuel_data1", &facts).unwrap();
        assert_eq!(added, vec!["fqdn"]);
        assert_eq!(
            store.resource("fuel_data1").unwrap().inputs["fqdn"],
            Value::from("node-1.domain.tld")
        );
        assert!(store.update("fuel_data9", &facts).is_err());
    }

    #[test]
    fn snapshot_round_trip_keeps_resources() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.yaml");
        let mut store = MemoryStore::new();
        store
            .create(
                "node1",
                &ResourceDefinition::new("f2s/fuel_node").with_input("ip", "10.0.0.1"),
            )
            .unwrap();
        store.save_to_path(&path).unwrap();

        let reloaded = MemoryStore::load_from_path(&path).unwrap();
        assert_eq!(reloaded.resource("node1"), store.resource("node1"));
        assert_eq!(reloaded.create_calls(), 0);
    }
}
