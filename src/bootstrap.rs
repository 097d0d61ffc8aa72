//! Node, master, role and per-node data resources.
//!
//! These are the resources task resources hang off; they are created from
//! the node source before the assign path runs. Every call is idempotent.

use serde_json::Value;

use crate::{
    config::Config,
    error::{F2sError, Result},
    mapper::attach_to_node,
    report::{BatchReport, Stage},
    scope::{Scope, name_from},
    source::NodeSource,
    store::{ResourceDefinition, ResourceStore, Upsert, upsert},
};

/// Numeric node ids are stored as numbers, anything else verbatim.
fn index_value(id: &str) -> Value {
    id.parse::<u64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(id))
}

fn put<S: ResourceStore + ?Sized>(
    store: &mut S,
    name: &str,
    definition: &ResourceDefinition,
    report: &mut BatchReport,
) -> Upsert {
    let outcome = upsert(store, name, definition);
    report.record_upsert(name, &outcome);
    outcome
}

pub fn create_nodes<S: ResourceStore + ?Sized>(
    nodes: &dyn NodeSource,
    store: &mut S,
    config: &Config,
    uids: &[String],
) -> Result<BatchReport> {
    let mut report = BatchReport::new();
    for node in nodes.nodes(uids)? {
        let definition = ResourceDefinition::new(config.template("fuel_node"))
            .with_input("index", index_value(&node.id))
            .with_input("ip", node.ip.as_str());
        put(store, &config.node_resource(&node.id), &definition, &mut report);
    }
    Ok(report)
}

/// Master node resource plus the key generation resource of `env`.
pub fn create_master<S: ResourceStore + ?Sized>(
    nodes: &dyn NodeSource,
    store: &mut S,
    config: &Config,
    env: &str,
) -> Result<BatchReport> {
    let master = nodes.master()?;
    let master_name = config.node_resource(&master.id);
    let mut report = BatchReport::new();

    let node = ResourceDefinition::new(config.template("fuel_node"))
        .with_input("index", index_value(&master.id))
        .with_input("ip", master.ip.as_str());
    put(store, &master_name, &node, &mut report);

    let genkeys = ResourceDefinition::new(config.template("genkeys"))
        .with_input("node", master_name.as_str())
        .with_input("index", index_value(env));
    put(store, "genkeys", &genkeys, &mut report);
    Ok(report)
}

/// One role resource per role of each node, owned by that node. The
/// environment is the cluster the node belongs to.
pub fn assign_roles<S: ResourceStore + ?Sized>(
    nodes: &dyn NodeSource,
    store: &mut S,
    config: &Config,
    uids: &[String],
) -> Result<BatchReport> {
    let mut report = BatchReport::new();
    for node in nodes.nodes(uids)? {
        let node_name = config.node_resource(&node.id);
        for role in nodes.roles(&node.id)? {
            let name = name_from(&Scope::node(node.id.as_str()), &role);
            let definition = ResourceDefinition::new(config.template(&format!("role_{role}")))
                .with_input("index", index_value(&node.id))
                .with_input("env", index_value(&node.cluster))
                .with_input("node", node_name.as_str());
            if let Upsert::Created(handle) = put(store, &name, &definition, &mut report) {
                attach_to_node(store, &node_name, &handle, &mut report);
            }
        }
    }
    Ok(report)
}

/// Per-node cluster data resource, owned by the node.
pub fn prepare_data<S: ResourceStore + ?Sized>(
    store: &mut S,
    config: &Config,
    env: &str,
    uids: &[String],
) -> BatchReport {
    let mut report = BatchReport::new();
    for uid in uids {
        let definition = ResourceDefinition::new(config.template("fuel_data"))
            .with_input("uid", index_value(uid))
            .with_input("env", index_value(env));
        let name = data_resource(uid);
        if let Upsert::Created(handle) = put(store, &name, &definition, &mut report) {
            attach_to_node(store, &config.node_resource(uid), &handle, &mut report);
        }
    }
    report
}

fn data_resource(uid: &str) -> String {
    format!("fuel_data{uid}")
}

/// Refresh each `fuel_data<uid>` with the node's deployment facts, declaring
/// any input the resource does not have yet. Resources must already exist.
pub fn prefetch<S: ResourceStore + ?Sized>(
    nodes: &dyn NodeSource,
    store: &mut S,
    env: &str,
    uids: &[String],
) -> Result<BatchReport> {
    let facts = nodes.facts(env, uids)?;
    let mut report = BatchReport::new();
    for uid in uids {
        let name = data_resource(uid);
        let Some(node_facts) = facts.get(uid) else {
            let err = F2sError::source(format!("no facts for node {uid} in env {env}"));
            report.fail(Stage::Resource, &name, &err);
            continue;
        };
        match store.load(&name) {
            Ok(Some(_)) => match store.update(&name, node_facts) {
                Ok(added) => {
                    if !added.is_empty() {
                        tracing::debug!("{name}: new inputs {}", added.join(", "));
                    }
                    report.updated.push(name);
                }
                Err(err) => report.fail(Stage::Resource, &name, &err),
            },
            Ok(None) => {
                let err = F2sError::store(format!("resource '{name}' not found; run prep first"));
                report.fail(Stage::Resource, &name, &err);
            }
            Err(err) => report.fail(Stage::Resource, &name, &err),
        }
    }
    Ok(report)
}
