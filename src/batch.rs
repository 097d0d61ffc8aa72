//! Assign path: graph, resources, then events, for one environment.

use crate::{
    config::Config,
    error::Result,
    events::{emit, translate},
    graph::{DependencyGraph, GraphBuilder},
    mapper::ResourceMapper,
    report::BatchReport,
    scope::Scope,
    source::TaskSource,
    store::{EventStore, ResourceStore},
};

/// Build the graph of `scopes` and apply it to `store`.
///
/// Errors that invalidate the whole batch (missing scope, cycle, unknown kind, bad
/// parameters) are returned before the store is touched. Store failures are
/// collected in the report; rerunning the batch picks up where it stopped.
pub fn run_assign<S>(
    source: &dyn TaskSource,
    store: &mut S,
    config: &Config,
    env: &str,
    scopes: &[Scope],
) -> Result<BatchReport>
where
    S: ResourceStore + EventStore + ?Sized,
{
    let graph = GraphBuilder::new(source).build(env, scopes)?;
    tracing::info!(
        "env {env}: {} tasks, {} edges over {} scopes",
        graph.node_count(),
        graph.edge_count(),
        scopes.len()
    );
    assign_graph(&graph, store, config)
}

/// Apply an already built graph.
pub fn assign_graph<S>(
    graph: &DependencyGraph,
    store: &mut S,
    config: &Config,
) -> Result<BatchReport>
where
    S: ResourceStore + EventStore + ?Sized,
{
    // Cycles are fatal before any store call.
    graph.topological_sort()?;

    let mapper = ResourceMapper::new(config);
    let planned = graph
        .tasks()
        .map(|task| mapper.plan(task))
        .collect::<Result<Vec<_>>>()?;

    let mut report = BatchReport::new();
    for resource in &planned {
        mapper.apply(store, resource, &mut report);
    }

    let links = translate(graph.edges());
    emit(store, &links, &mut report);

    tracing::info!("{}", report.summary());
    Ok(report)
}
