//! Error types of the engine facade and mapping layer

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Failures surfaced to bridge clients.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("bridge i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::MalformedRequest(_) => "malformed_request",
            EngineError::Io(_) => "io",
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            kind: self.kind().to_string(),
            message: self.to_string(),
        }
    }
}

/// `{ kind, message }` error payload of a failed bridge response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

/// Mapping and row file problems.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse mapping: {0}")]
    Parse(String),

    #[error("invalid mapping:\n  - {}", .0.join("\n  - "))]
    Invalid(Vec<String>),

    #[error("failed to read rows: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {requested} out of range (file has {available} rows)")]
    RowOutOfRange { requested: usize, available: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_request_body() {
        let body = EngineError::MalformedRequest("missing field `steps`".into()).body();
        assert_eq!(body.kind, "malformed_request");
        assert!(body.message.contains("steps"));
    }

    #[test]
    fn invalid_mapping_lists_every_issue() {
        let err = MappingError::Invalid(vec!["first".into(), "second".into()]);
        assert_eq!(err.to_string(), "invalid mapping:\n  - first\n  - second");
    }
}
