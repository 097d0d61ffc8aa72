//! Outcome accumulator for batch runs.
//!
//! Recoverable failures are collected here instead of aborting; fatal
//! conditions are returned as errors by the batch functions themselves.

use serde::Serialize;
use std::fmt;

use crate::{error::F2sError, events::EventDeclaration, store::Upsert};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Resource,
    Ownership,
    Event,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Resource => "resource",
            Stage::Ownership => "ownership",
            Stage::Event => "event",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub stage: Stage,
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ownership {
    pub parent: String,
    pub child: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub created: Vec<String>,
    pub existing: Vec<String>,
    /// Existing resources whose inputs were refreshed.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub updated: Vec<String>,
    pub connected: Vec<Ownership>,
    pub events: Vec<EventDeclaration>,
    pub failures: Vec<Failure>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_upsert(&mut self, name: &str, outcome: &Upsert) {
        match outcome {
            Upsert::Created(_) => self.created.push(name.to_string()),
            Upsert::Existing(_) => self.existing.push(name.to_string()),
            Upsert::Failed(err) => self.fail(Stage::Resource, name, err),
        }
    }

    pub fn fail(&mut self, stage: Stage, subject: impl Into<String>, err: &F2sError) {
        let subject = subject.into();
        tracing::warn!("{stage} {subject}: {err}");
        self.failures.push(Failure {
            stage,
            subject,
            message: err.to_string(),
        });
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Fold another report into this one, keeping order.
    pub fn merge(&mut self, other: BatchReport) {
        self.created.extend(other.created);
        self.existing.extend(other.existing);
        self.updated.extend(other.updated);
        self.connected.extend(other.connected);
        self.events.extend(other.events);
        self.failures.extend(other.failures);
    }

    pub fn summary(&self) -> String {
        format!(
            "{} created, {} existing, {} updated, {} connected, {} events, {} failures",
            self.created.len(),
            self.existing.len(),
            self.updated.len(),
            self.connected.len(),
            self.events.len(),
            self.failures.len()
        )
    }
}
