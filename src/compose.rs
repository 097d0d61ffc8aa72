//! Template-mode compositions.
//!
//! Every actionable task becomes a single composition whose events select
//! their parents by tag (`resource=<id>`, optionally `node=<placeholder>`)
//! rather than by concrete resource name, so node binding happens when the
//! template is instantiated. Tasks sharing a role or group are gathered into
//! collection compositions that reference the singles by relative path.

use anyhow::Context;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Path, PathBuf},
};

use crate::{
    config::Config,
    error::Result,
    graph::DependencyGraph,
    path_safety::join_under_root,
    task::TaskKind,
    util::is_valid_task_id,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceEntry {
    pub id: String,
    pub from: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentSelector {
    pub with_tags: Vec<String>,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub state: String,
    pub parent: ParentSelector,
    pub depend_action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionDoc {
    pub name: String,
    pub resources: Vec<ResourceEntry>,
    pub events: Vec<EventEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberInput {
    pub node: String,
    pub index: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionMember {
    pub from: String,
    pub input: MemberInput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionDoc {
    pub id: String,
    pub resources: Vec<CollectionMember>,
    pub tags: String,
}

/// One task and everything it is ordered against, by task id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SingleComposition {
    pub id: String,
    pub grouping: Vec<String>,
    pub succ: BTreeSet<String>,
    pub pred: BTreeSet<String>,
    pub succ_cross: BTreeSet<String>,
    pub pred_cross: BTreeSet<String>,
}

impl SingleComposition {
    pub fn new(id: impl Into<String>) -> Self {
        SingleComposition {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn file_name(&self) -> String {
        format!("vr_{}.yaml", self.id)
    }

    pub fn relative_path(&self, config: &Config) -> String {
        config.template(&format!("vr_{}", self.id))
    }

    fn event(&self, config: &Config, tags: Vec<String>, child: &str) -> EventEntry {
        EventEntry {
            kind: "depends_on".to_string(),
            state: "success".to_string(),
            parent: ParentSelector {
                with_tags: tags,
                action: "run".to_string(),
            },
            depend_action: format!("{child}{}.run", config.index_placeholder),
        }
    }

    /// Events for successors, predecessors, cross successors and cross
    /// predecessors, in that order. Links touching excluded tasks are dropped.
    pub fn events(&self, config: &Config) -> Vec<EventEntry> {
        let own = format!("resource={}", self.id);
        let on_node = format!("node={}", config.node_placeholder);
        let kept = |set: &BTreeSet<String>| -> Vec<String> {
            set.iter()
                .filter(|other| !config.is_excluded(other))
                .cloned()
                .collect()
        };

        let mut events = Vec::new();
        for succ in kept(&self.succ) {
            events.push(self.event(config, vec![own.clone(), on_node.clone()], &succ));
        }
        for pred in kept(&self.pred) {
            let tags = vec![format!("resource={pred}"), on_node.clone()];
            events.push(self.event(config, tags, &self.id));
        }
        for succ in kept(&self.succ_cross) {
            events.push(self.event(config, vec![own.clone()], &succ));
        }
        for pred in kept(&self.pred_cross) {
            events.push(self.event(config, vec![format!("resource={pred}")], &self.id));
        }
        events
    }

    pub fn document(&self, config: &Config) -> CompositionDoc {
        CompositionDoc {
            name: format!("composition_{}", self.id),
            resources: vec![ResourceEntry {
                id: self.id.clone(),
                from: config.template(&self.id),
                location: config.node_placeholder.clone(),
            }],
            events: self.events(config),
        }
    }
}

/// Named bundle of single compositions sharing a role or group.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionComposition {
    pub name: String,
    pub grouping: String,
    pub members: Vec<String>,
}

impl CollectionComposition {
    pub fn file_name(&self) -> String {
        format!("{}_{}.yaml", self.grouping, self.name)
    }

    pub fn document(&self, config: &Config) -> CollectionDoc {
        CollectionDoc {
            id: self.name.clone(),
            resources: self
                .members
                .iter()
                .map(|member| CollectionMember {
                    from: config.template(&format!("vr_{member}")),
                    input: MemberInput {
                        node: config.node_placeholder.clone(),
                        index: config.index_placeholder.clone(),
                    },
                })
                .collect(),
            tags: format!("{}={}", self.grouping, self.name),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Compositions {
    pub singles: Vec<SingleComposition>,
    pub collections: Vec<CollectionComposition>,
    /// Ids of emitted tasks carrying a condition; the condition itself is
    /// left to the consumer.
    pub conditional: Vec<String>,
}

/// Build compositions for every actionable task in topological order.
pub fn assemble(graph: &DependencyGraph, config: &Config) -> Result<Compositions> {
    let order = graph.topological_sort()?;

    // Inverse of cross references: who waits for / is waited on by an id.
    let mut waited_on_by: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
    let mut waits_for: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
    for task in graph.tasks() {
        for target in task.cross_node() {
            waited_on_by
                .entry(target)
                .or_default()
                .insert(task.id.clone());
        }
        for target in task.cross_successors() {
            waits_for.entry(target).or_default().insert(task.id.clone());
        }
    }

    let mut out = Compositions::default();
    let mut collections: IndexMap<String, CollectionComposition> = IndexMap::new();
    for key in order {
        let Some(task) = graph.task(key) else {
            continue;
        };
        if task.kind == TaskKind::Group {
            collections
                .entry(task.id.clone())
                .or_insert_with(|| CollectionComposition {
                    name: task.id.clone(),
                    grouping: config.collection_grouping.clone(),
                    members: Vec::new(),
                });
            continue;
        }
        if !task.kind.is_actionable() {
            tracing::debug!("no composition for {} of kind {}", task.id, task.kind);
            continue;
        }
        if config.is_excluded(&task.id) {
            continue;
        }

        let mut single = SingleComposition::new(task.id.clone());
        single.grouping = task.grouping().to_vec();
        single.succ = graph.successors(key).map(|k| k.task.clone()).collect();
        single.pred = graph.predecessors(key).map(|k| k.task.clone()).collect();
        single.succ_cross = task.cross_successors().map(str::to_string).collect();
        single.pred_cross = task.cross_node().map(str::to_string).collect();
        if let Some(dependents) = waited_on_by.get(task.id.as_str()) {
            single.succ_cross.extend(dependents.iter().cloned());
        }
        if let Some(dependencies) = waits_for.get(task.id.as_str()) {
            single.pred_cross.extend(dependencies.iter().cloned());
        }
        single.succ_cross.remove(&task.id);
        single.pred_cross.remove(&task.id);
        if task.is_conditional() {
            out.conditional.push(task.id.clone());
        }
        out.singles.push(single);
    }

    for single in &out.singles {
        for name in &single.grouping {
            if !is_valid_task_id(name) {
                tracing::debug!("{}: grouping '{name}' is not a collection name", single.id);
                continue;
            }
            collections
                .entry(name.clone())
                .or_insert_with(|| CollectionComposition {
                    name: name.clone(),
                    grouping: config.collection_grouping.clone(),
                    members: Vec::new(),
                })
                .members
                .push(single.id.clone());
        }
    }
    out.collections = collections.into_values().collect();
    Ok(out)
}

impl Compositions {
    pub fn single(&self, id: &str) -> Option<&SingleComposition> {
        self.singles.iter().find(|s| s.id == id)
    }

    pub fn collection(&self, name: &str) -> Option<&CollectionComposition> {
        self.collections.iter().find(|c| c.name == name)
    }

    /// Write every composition under `out` and return the written paths.
    pub fn write_all(&self, out: &Path, config: &Config) -> anyhow::Result<Vec<PathBuf>> {
        fs::create_dir_all(out).with_context(|| format!("failed to create {}", out.display()))?;
        let mut written = Vec::new();
        for single in &self.singles {
            let path = join_under_root(out, Path::new(&single.file_name()))?;
            write_yaml(&path, &single.document(config))?;
            written.push(path);
        }
        for collection in &self.collections {
            let path = join_under_root(out, Path::new(&collection.file_name()))?;
            write_yaml(&path, &collection.document(config))?;
            written.push(path);
        }
        Ok(written)
    }
}

fn write_yaml<T: Serialize>(path: &Path, doc: &T) -> anyhow::Result<()> {
    let yaml = serde_yaml_bw::to_string(doc)
        .with_context(|| format!("failed to render {}", path.display()))?;
    fs::write(path, yaml).with_context(|| format!("failed to write {}", path.display()))
}
