use std::path::{Path, PathBuf};
use thiserror::Error;

/// Where in an input document a problem was found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorLocation {
    pub path: Option<String>,
    pub source_path: Option<PathBuf>,
    pub line: Option<usize>,
    pub col: Option<usize>,
    pub json_pointer: Option<String>,
}

impl ErrorLocation {
    pub fn at_path(path: impl Into<String>) -> Self {
        ErrorLocation {
            path: Some(path.into()),
            ..ErrorLocation::default()
        }
    }

    pub fn at_path_with_position(
        path: impl Into<String>,
        line: Option<usize>,
        col: Option<usize>,
    ) -> Self {
        ErrorLocation {
            path: Some(path.into()),
            line,
            col,
            ..ErrorLocation::default()
        }
    }

    pub fn with_source_path(mut self, source_path: Option<&Path>) -> Self {
        self.source_path = source_path.map(Path::to_path_buf);
        self
    }

    pub fn with_json_pointer(mut self, pointer: Option<String>) -> Self {
        self.json_pointer = pointer;
        self
    }

    /// Human readable `file:line:col` style description, if anything is known.
    pub fn describe(&self) -> Option<String> {
        let base = self
            .source_path
            .as_ref()
            .map(|p| p.display().to_string())
            .or_else(|| self.path.clone())?;
        Some(match (self.line, self.col) {
            (Some(line), Some(col)) => format!("{base}:{line}:{col}"),
            (Some(line), None) => format!("{base}:{line}"),
            _ => base,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SchemaErrorDetail {
    pub message: String,
    pub location: ErrorLocation,
}

#[derive(Debug, Error)]
pub enum F2sError {
    #[error("YAML parse error: {message}")]
    Yaml {
        message: String,
        location: ErrorLocation,
    },
    #[error("Schema validation failed:\n{message}")]
    Schema {
        message: String,
        details: Vec<SchemaErrorDetail>,
        location: ErrorLocation,
    },
    #[error("Task descriptor is missing required field '{field}'")]
    MissingField {
        field: &'static str,
        location: ErrorLocation,
    },
    #[error("Unknown task type '{kind}' for task '{task}' in scope {scope}")]
    UnknownKind {
        task: String,
        scope: String,
        kind: String,
    },
    #[error("Invalid parameters for task '{task}' in scope {scope}: {message}")]
    InvalidParameters {
        task: String,
        scope: String,
        message: String,
    },
    #[error("Dependency cycle detected between: {}", nodes.join(", "))]
    Cycle { nodes: Vec<String> },
    #[error("Scope {scope} not present in task graph of environment '{env}'")]
    MissingScope { scope: String, env: String },
    #[error("Task source error: {message}")]
    Source { message: String },
    #[error("Store error: {message}")]
    Store { message: String },
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        location: ErrorLocation,
    },
}

impl F2sError {
    pub fn store(message: impl Into<String>) -> Self {
        F2sError::Store {
            message: message.into(),
        }
    }

    pub fn source(message: impl Into<String>) -> Self {
        F2sError::Source {
            message: message.into(),
        }
    }

    /// Location attached to parse related errors.
    pub fn location(&self) -> Option<&ErrorLocation> {
        match self {
            F2sError::Yaml { location, .. }
            | F2sError::Schema { location, .. }
            | F2sError::MissingField { location, .. }
            | F2sError::Internal { location, .. } => Some(location),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, F2sError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_prefers_source_path_and_position() {
        let loc = ErrorLocation::at_path_with_position("<inline>", Some(3), Some(7))
            .with_source_path(Some(Path::new("graph.yaml")));
        assert_eq!(loc.describe().as_deref(), Some("graph.yaml:3:7"));
        assert_eq!(ErrorLocation::default().describe(), None);
    }

    #[test]
    fn cycle_lists_nodes() {
        let err = F2sError::Cycle {
            nodes: vec!["p".to_string(), "q".to_string()],
        };
        assert_eq!(err.to_string(), "Dependency cycle detected between: p, q");
    }
}
