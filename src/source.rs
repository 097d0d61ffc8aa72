//! Task and node sources.
//!
//! The graph builder and the bootstrap helpers take their sources as
//! explicit trait objects, so a real cluster manager client, a file dump and a
//! stub can be swapped per invocation.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    error::{F2sError, Result},
    loader::{load_serialized_graph_from_path, load_task_list_from_path},
    model::NodesDoc,
    scope::Scope,
    task::TaskDescriptor,
};

/// Per-environment task graph as served by the cluster manager.
#[derive(Debug, Clone, Default)]
pub struct SerializedGraph {
    pub tasks_graph: IndexMap<Scope, Vec<TaskDescriptor>>,
    pub tasks_directory: IndexMap<String, DirectoryEntry>,
}

/// Shared metadata for a task id, independent of the node it runs on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectoryEntry {
    pub parameters: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub id: String,
    pub ip: String,
    pub cluster: String,
}

pub trait TaskSource {
    fn fetch_graph(&self, env: &str) -> Result<SerializedGraph>;
}

/// Deployment facts keyed by node id.
pub type NodeFacts = IndexMap<String, Map<String, Value>>;

pub trait NodeSource {
    fn nodes(&self, ids: &[String]) -> Result<Vec<NodeInfo>>;
    fn roles(&self, node_id: &str) -> Result<Vec<String>>;
    fn master(&self) -> Result<NodeInfo>;
    /// Facts of the requested nodes of `env`; nodes without facts are left out.
    fn facts(&self, env: &str, ids: &[String]) -> Result<NodeFacts>;
}

/// Reads a dumped serialized graph and, optionally, a node inventory.
#[derive(Debug, Clone)]
pub struct FileSource {
    graph_path: Option<PathBuf>,
    nodes_path: Option<PathBuf>,
}

impl FileSource {
    pub fn new(graph_path: Option<PathBuf>, nodes_path: Option<PathBuf>) -> Self {
        FileSource {
            graph_path,
            nodes_path,
        }
    }

    fn inventory(&self) -> Result<NodesDoc> {
        let path = self
            .nodes_path
            .as_ref()
            .ok_or_else(|| F2sError::source("no node inventory configured"))?;
        let text = fs::read_to_string(path)
            .map_err(|e| F2sError::source(format!("failed to read {}: {e}", path.display())))?;
        serde_yaml_bw::from_str(&text)
            .map_err(|e| F2sError::source(format!("invalid inventory {}: {e}", path.display())))
    }
}

impl TaskSource for FileSource {
    fn fetch_graph(&self, env: &str) -> Result<SerializedGraph> {
        let path = self
            .graph_path
            .as_ref()
            .ok_or_else(|| F2sError::source(format!("no task graph configured for env {env}")))?;
        load_serialized_graph_from_path(path)
    }
}

impl NodeSource for FileSource {
    fn nodes(&self, ids: &[String]) -> Result<Vec<NodeInfo>> {
        let inventory = self.inventory()?;
        ids.iter()
            .map(|id| {
                inventory
                    .nodes
                    .iter()
                    .find(|node| node.id.to_string() == *id)
                    .map(|node| NodeInfo {
                        id: node.id.to_string(),
                        ip: node.ip.clone(),
                        cluster: node
                            .cluster
                            .as_ref()
                            .map(ToString::to_string)
                            .unwrap_or_default(),
                    })
                    .ok_or_else(|| F2sError::source(format!("node {id} not in inventory")))
            })
            .collect()
    }

    fn roles(&self, node_id: &str) -> Result<Vec<String>> {
        let inventory = self.inventory()?;
        inventory
            .nodes
            .into_iter()
            .find(|node| node.id.to_string() == node_id)
            .map(|node| node.roles)
            .ok_or_else(|| F2sError::source(format!("node {node_id} not in inventory")))
    }

    fn master(&self) -> Result<NodeInfo> {
        let inventory = self.inventory()?;
        let master = inventory
            .master
            .ok_or_else(|| F2sError::source("inventory has no master entry"))?;
        Ok(NodeInfo {
            id: master.id.to_string(),
            ip: master.ip,
            cluster: master.cluster.map(|c| c.to_string()).unwrap_or_default(),
        })
    }

    fn facts(&self, env: &str, ids: &[String]) -> Result<NodeFacts> {
        let inventory = self.inventory()?;
        Ok(inventory
            .nodes
            .into_iter()
            .filter(|node| ids.contains(&node.id.to_string()))
            .filter(|node| {
                node.cluster
                    .as_ref()
                    .is_none_or(|cluster| cluster.to_string() == env)
            })
            .filter(|node| !node.facts.is_empty())
            .map(|node| (node.id.to_string(), node.facts))
            .collect())
    }
}

/// Deterministic node source for offline runs and tests.
#[derive(Debug, Clone, Default)]
pub struct StubNodes;

impl NodeSource for StubNodes {
    fn nodes(&self, ids: &[String]) -> Result<Vec<NodeInfo>> {
        Ok(ids
            .iter()
            .map(|id| NodeInfo {
                id: id.clone(),
                ip: format!("10.0.0.{id}"),
                cluster: "1".to_string(),
            })
            .collect())
    }

    fn roles(&self, _node_id: &str) -> Result<Vec<String>> {
        Ok(vec!["primary-controller".to_string()])
    }

    fn master(&self) -> Result<NodeInfo> {
        Ok(NodeInfo {
            id: "master".to_string(),
            ip: "0.0.0.0".to_string(),
            cluster: String::new(),
        })
    }

    fn facts(&self, _env: &str, ids: &[String]) -> Result<NodeFacts> {
        Ok(ids
            .iter()
            .map(|id| {
                let mut facts = Map::new();
                facts.insert("uid".to_string(), Value::from(id.as_str()));
                facts.insert("fqdn".to_string(), Value::from(format!("node-{id}.test")));
                facts.insert("role".to_string(), Value::from("primary-controller"));
                (id.clone(), facts)
            })
            .collect())
    }
}

/// Walks a task library for `*tasks.yaml` files; every task lands in the
/// anchor scope.
#[derive(Debug, Clone)]
pub struct LibrarySource {
    root: PathBuf,
}

const LIBRARY_FILE_SUFFIX: &str = "tasks.yaml";

impl LibrarySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LibrarySource { root: root.into() }
    }

    /// All task descriptors found under the root, in path order.
    pub fn tasks(&self) -> Result<Vec<TaskDescriptor>> {
        let mut files = Vec::new();
        collect_task_files(&self.root, &mut files)?;
        files.sort();
        let mut tasks = Vec::new();
        for file in files {
            tracing::debug!("loading tasks from {}", file.display());
            tasks.extend(load_task_list_from_path(&file, Scope::Anchor)?);
        }
        Ok(tasks)
    }
}

impl TaskSource for LibrarySource {
    fn fetch_graph(&self, _env: &str) -> Result<SerializedGraph> {
        let mut graph = SerializedGraph::default();
        graph.tasks_graph.insert(Scope::Anchor, self.tasks()?);
        Ok(graph)
    }
}

fn collect_task_files(path: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    if path.is_file() {
        let matches = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(LIBRARY_FILE_SUFFIX));
        if matches {
            out.push(path.to_path_buf());
        }
    } else if path.is_dir() {
        let entries = fs::read_dir(path).map_err(|e| {
            F2sError::source(format!("failed to read directory {}: {e}", path.display()))
        })?;
        for entry in entries {
            let entry = entry.map_err(|e| {
                F2sError::source(format!(
                    "failed to read directory entry in {}: {e}",
                    path.display()
                ))
            })?;
            collect_task_files(&entry.path(), out)?;
        }
    } else {
        return Err(F2sError::source(format!(
            "task library {} does not exist",
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_nodes_are_predictable() {
        let nodes = StubNodes.nodes(&["3".to_string()]).unwrap();
        assert_eq!(nodes[0].ip, "10.0.0.3");
        assert_eq!(StubNodes.roles("3").unwrap(), vec!["primary-controller"]);
        assert_eq!(StubNodes.master().unwrap().ip, "0.0.0.0");
        let facts = StubNodes.facts("1", &["3".to_string()]).unwrap();
        assert_eq!(facts["3"]["fqdn"], Value::from("node-3.test"));
    }

    #[test]
    fn inventory_facts_are_limited_to_the_environment() {
        let source = FileSource::new(None, Some(PathBuf::from("fixtures/nodes.yaml")));
        let ids = vec!["1".to_string(), "2".to_string(), "7".to_string()];
        let facts = source.facts("1", &ids).unwrap();
        assert_eq!(facts.keys().collect::<Vec<_>>(), vec!["1", "2"]);
        assert_eq!(facts["2"]["role"], Value::from("compute"));
        assert!(source.facts("4", &ids).unwrap().is_empty());
    }

    #[test]
    fn missing_graph_path_is_a_source_error() {
        let err = FileSource::new(None, None).fetch_graph("1").unwrap_err();
        assert!(matches!(err, F2sError::Source { .. }));
    }
}
