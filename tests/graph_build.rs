use f2s::{
    DependencyGraph, DependencyRef, GraphBuilder, Scope, TaskDescriptor, TaskKey, TaskKind,
    events::{EventLink, translate},
    library_graph, name_from,
    source::FileSource,
    store::EventKind,
};
use pretty_assertions::assert_eq;
use std::path::PathBuf;

fn fixture_graph(scopes: &[Scope]) -> DependencyGraph {
    let source = FileSource::new(Some(PathBuf::from("fixtures/serialized_tasks.yaml")), None);
    GraphBuilder::new(&source).build("1", scopes).unwrap()
}

fn all_scopes() -> Vec<Scope> {
    vec![Scope::Anchor, Scope::node("1"), Scope::node("2")]
}

fn link(kind: EventKind, from: &str, to: &str) -> EventLink {
    EventLink {
        kind,
        from: from.to_string(),
        to: to.to_string(),
    }
}

#[test]
fn canonical_names() {
    assert_eq!(name_from(&Scope::Anchor, "foo"), "foo");
    assert_eq!(name_from(&Scope::node("5"), "foo"), "foo_5");
}

#[test]
fn serialized_graph_translates_to_expected_links() {
    let graph = fixture_graph(&all_scopes());
    assert_eq!(graph.node_count(), 8);

    let links = translate(graph.edges());
    assert_eq!(
        links,
        vec![
            link(EventKind::ReactOn, "deploy_start", "deploy_end"),
            link(EventKind::DependsOn, "deploy_start", "hiera_1"),
            link(EventKind::DependsOn, "hiera_1", "globals_1"),
            link(EventKind::DependsOn, "globals_1", "netconfig_1"),
            link(EventKind::DependsOn, "netconfig_1", "deploy_end"),
            link(EventKind::DependsOn, "netconfig_1", "sync_time_1"),
            link(EventKind::DependsOn, "netconfig_1", "compute_setup_2"),
            link(EventKind::DependsOn, "hiera_2", "compute_setup_2"),
            link(EventKind::DependsOn, "compute_setup_2", "deploy_end"),
        ]
    );
}

#[test]
fn directory_parameters_are_inherited() {
    let graph = fixture_graph(&[Scope::node("1")]);
    let netconfig = graph
        .task(&TaskKey::new(Scope::node("1"), "netconfig"))
        .unwrap();
    assert_eq!(netconfig.kind, TaskKind::Shell);
    assert_eq!(netconfig.parameters["cmd"], "ifup -a");
    assert_eq!(netconfig.parameters["timeout"], 120);
}

#[test]
fn single_scope_keeps_references_to_other_scopes() {
    let graph = fixture_graph(&[Scope::node("2")]);
    assert!(graph.has_edge(
        &TaskKey::new(Scope::node("1"), "netconfig"),
        &TaskKey::new(Scope::node("2"), "compute_setup"),
    ));
    // Referenced but not loaded: present as a node, without a descriptor.
    assert!(
        graph
            .task(&TaskKey::new(Scope::node("1"), "netconfig"))
            .is_none()
    );
}

#[test]
fn anchor_required_for_is_a_single_notification() {
    let mut x = TaskDescriptor::new("X", TaskKind::Skipped, Scope::Anchor);
    x.required_for.push(DependencyRef::local("Y"));
    let y = TaskDescriptor::new("Y", TaskKind::Skipped, Scope::Anchor);
    let graph = DependencyGraph::from_tasks([x, y]);

    let links = translate(graph.edges());
    assert_eq!(links, vec![link(EventKind::ReactOn, "X", "Y")]);
    let declarations: Vec<_> = links[0].declarations().collect();
    assert_eq!(declarations.len(), 2);
    assert!(declarations.iter().all(|d| d.state == "success"));
}

#[test]
fn node_required_for_is_an_ordering_gate() {
    let mut a = TaskDescriptor::new("A", TaskKind::Skipped, Scope::node("5"));
    a.required_for.push(DependencyRef::local("B"));
    let b = TaskDescriptor::new("B", TaskKind::Skipped, Scope::node("5"));
    let graph = DependencyGraph::from_tasks([a, b]);
    assert_eq!(
        translate(graph.edges()),
        vec![link(EventKind::DependsOn, "A_5", "B_5")]
    );
}

#[test]
fn cross_node_reference_becomes_ordering_gate() {
    let mut c = TaskDescriptor::new("C", TaskKind::Skipped, Scope::node("3"));
    c.cross_depends
        .push(DependencyRef::on("D", Scope::node("2")));
    let graph = DependencyGraph::from_tasks([c]);
    assert!(graph.has_edge(
        &TaskKey::new(Scope::node("2"), "D"),
        &TaskKey::new(Scope::node("3"), "C"),
    ));
    assert_eq!(
        translate(graph.edges()),
        vec![link(EventKind::DependsOn, "D_2", "C_3")]
    );
}

#[test]
fn requires_and_cross_depends_on_the_same_pair_emit_once() {
    let mut c = TaskDescriptor::new("C", TaskKind::Skipped, Scope::node("3"));
    c.requires.push(DependencyRef::on("D", Scope::node("2")));
    c.cross_depends
        .push(DependencyRef::on("D", Scope::node("2")));
    let graph = DependencyGraph::from_tasks([c]);
    assert_eq!(translate(graph.edges()).len(), 1);
}

#[test]
fn self_reference_emits_nothing() {
    let mut t = TaskDescriptor::new("T", TaskKind::Skipped, Scope::node("1"));
    t.requires.push(DependencyRef::local("T"));
    let graph = DependencyGraph::from_tasks([t]);
    assert!(translate(graph.edges()).is_empty());
}

#[test]
fn library_graph_keeps_isolated_tasks_and_sorts() {
    let graph = library_graph("fixtures/library").unwrap();
    assert_eq!(graph.tasks().count(), 10);

    let order = graph.topological_sort().unwrap();
    let position = |key: &TaskKey| order.iter().position(|k| *k == key).unwrap();
    for (from, to) in graph.edges() {
        assert!(
            position(from) < position(to),
            "{from} must come before {to}"
        );
    }
    assert_eq!(order.first().map(|k| k.task.as_str()), Some("deploy_start"));
    assert_eq!(order.last().map(|k| k.task.as_str()), Some("deploy_end"));
}
