//! Translates per-node deployment task graphs into resources and the
//! ordering/notification events between them.
//!
//! The assign path ([`batch::run_assign`]) maps tasks onto a resource store
//! and declares events on an event store; the template path
//! ([`compose::assemble`]) renders node-agnostic compositions instead.
#![forbid(unsafe_code)]

pub mod batch;
pub mod bootstrap;
pub mod compose;
pub mod config;
pub mod error;
pub mod events;
pub mod graph;
pub mod json_output;
pub mod lint;
pub mod loader;
pub mod mapper;
pub mod model;
pub mod path_safety;
pub mod report;
pub mod resource_meta;
pub mod scope;
pub mod source;
pub mod store;
pub mod task;
pub mod util;

pub use config::Config;
pub use error::{F2sError, Result};
pub use graph::{DependencyGraph, GraphBuilder};
pub use report::BatchReport;
pub use scope::{Scope, TaskKey, name_from};
pub use task::{DependencyRef, TaskDescriptor, TaskKind};

use std::path::Path;

/// Graph of every task found in a task library (all in the anchor scope).
pub fn library_graph(root: impl AsRef<Path>) -> Result<DependencyGraph> {
    let tasks = source::LibrarySource::new(root.as_ref()).tasks()?;
    Ok(DependencyGraph::from_tasks(tasks))
}

/// Parse a comma or whitespace separated list of node ids into scopes;
/// `null` selects the anchor scope.
pub fn parse_scopes(raw: &[String]) -> Vec<Scope> {
    raw.iter()
        .flat_map(|item| item.split([',', ' ']))
        .filter(|item| !item.trim().is_empty())
        .map(Scope::parse)
        .collect()
}
