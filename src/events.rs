//! Graph edges to ordering and notification events.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::{
    report::{BatchReport, Stage},
    scope::TaskKey,
    store::{Action, DEFAULT_ACTIONS, EventKind, EventStore},
};

/// One deduplicated link between two resources, before action expansion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventLink {
    pub kind: EventKind,
    pub from: String,
    pub to: String,
}

impl EventLink {
    /// Anchor-to-anchor edges are best-effort notifications; any edge that
    /// touches a node, in either direction, is an ordering gate.
    pub fn classify(from: &TaskKey, to: &TaskKey) -> EventKind {
        if from.scope.is_anchor() && to.scope.is_anchor() {
            EventKind::ReactOn
        } else {
            EventKind::DependsOn
        }
    }

    pub fn declarations(&self) -> impl Iterator<Item = EventDeclaration> + '_ {
        DEFAULT_ACTIONS.iter().map(move |action| EventDeclaration {
            kind: self.kind,
            state: "success".to_string(),
            parent: self.from.clone(),
            parent_action: *action,
            child: self.to.clone(),
            child_action: *action,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDeclaration {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub state: String,
    pub parent: String,
    pub parent_action: Action,
    pub child: String,
    pub child_action: Action,
}

/// Classify and deduplicate `edges`, keeping first-seen order.
pub fn translate<'a>(
    edges: impl IntoIterator<Item = (&'a TaskKey, &'a TaskKey)>,
) -> Vec<EventLink> {
    let mut links = IndexSet::new();
    for (from, to) in edges {
        if from == to {
            continue;
        }
        let parent = from.canonical_name();
        let child = to.canonical_name();
        if parent == child {
            tracing::debug!("skipping self link on {parent}");
            continue;
        }
        let kind = EventLink::classify(from, to);
        tracing::debug!("{kind} {parent} -> {child}");
        links.insert(EventLink {
            kind,
            from: parent,
            to: child,
        });
    }
    links.into_iter().collect()
}

/// Declare every link on `store`; failures are recorded and skipped.
pub fn emit<S: EventStore + ?Sized>(store: &mut S, links: &[EventLink], report: &mut BatchReport) {
    for link in links {
        let outcome = match link.kind {
            EventKind::DependsOn => {
                store.add_ordering_dependency(&link.from, &link.to, &DEFAULT_ACTIONS)
            }
            EventKind::ReactOn => store.add_notification(&link.from, &link.to, &DEFAULT_ACTIONS),
        };
        match outcome {
            Ok(()) => report.events.extend(link.declarations()),
            Err(err) => report.fail(Stage::Event, format!("{} -> {}", link.from, link.to), &err),
        }
    }
}
