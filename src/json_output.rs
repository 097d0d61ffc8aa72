use crate::{
    error::{ErrorLocation, F2sError},
    graph::DependencyGraph,
    lint::lint_builtin_rules,
    report::BatchReport,
};
use serde::Serialize;

#[derive(Serialize, Clone, Debug)]
pub struct JsonDiagnostic {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub col: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_pointer: Option<String>,
}

impl JsonDiagnostic {
    pub fn from_location(message: String, location: ErrorLocation) -> Self {
        let ErrorLocation {
            path,
            source_path,
            line,
            col,
            json_pointer,
        } = location;
        JsonDiagnostic {
            message,
            source_path: source_path
                .as_ref()
                .map(|p| p.display().to_string())
                .or(path),
            line,
            col,
            json_pointer,
        }
    }

    pub fn from_message(message: String, source_path: Option<String>) -> Self {
        JsonDiagnostic {
            message,
            source_path,
            line: None,
            col: None,
            json_pointer: None,
        }
    }
}

/// Result of `f2s doctor --json`.
#[derive(Serialize, Clone, Debug)]
pub struct DoctorJsonOutput {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edges: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<JsonDiagnostic>,
}

impl DoctorJsonOutput {
    pub fn from_graph(graph: &DependencyGraph, source_path: Option<String>) -> Self {
        let mut messages = lint_builtin_rules(graph);
        if let Err(err) = graph.topological_sort() {
            messages.push(err.to_string());
        }
        DoctorJsonOutput {
            ok: messages.is_empty(),
            tasks: Some(graph.node_count()),
            edges: Some(graph.edge_count()),
            errors: messages
                .into_iter()
                .map(|message| JsonDiagnostic::from_message(message, source_path.clone()))
                .collect(),
        }
    }

    pub fn error(err: F2sError) -> Self {
        DoctorJsonOutput {
            ok: false,
            tasks: None,
            edges: None,
            errors: error_to_reports(err),
        }
    }

    pub fn into_string(self) -> String {
        serde_json::to_string(&self).expect("doctor output serialization")
    }
}

/// Result of `f2s assign --json` and the bootstrap commands.
#[derive(Serialize, Clone, Debug)]
pub struct ReportJsonOutput<'a> {
    pub ok: bool,
    pub report: &'a BatchReport,
}

impl<'a> ReportJsonOutput<'a> {
    pub fn new(report: &'a BatchReport) -> Self {
        ReportJsonOutput {
            ok: report.is_clean(),
            report,
        }
    }

    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

pub fn error_to_reports(err: F2sError) -> Vec<JsonDiagnostic> {
    let display_message = err.to_string();
    match err {
        F2sError::Schema {
            details, location, ..
        } => {
            if details.is_empty() {
                vec![JsonDiagnostic::from_location(display_message, location)]
            } else {
                details
                    .into_iter()
                    .map(|detail| JsonDiagnostic::from_location(detail.message, detail.location))
                    .collect()
            }
        }
        F2sError::Yaml { location, .. }
        | F2sError::MissingField { location, .. }
        | F2sError::Internal { location, .. } => {
            vec![JsonDiagnostic::from_location(display_message, location)]
        }
        F2sError::UnknownKind { .. }
        | F2sError::InvalidParameters { .. }
        | F2sError::Cycle { .. }
        | F2sError::MissingScope { .. }
        | F2sError::Source { .. }
        | F2sError::Store { .. } => vec![JsonDiagnostic::from_message(display_message, None)],
    }
}
