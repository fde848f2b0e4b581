// src/error.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GalcatError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported operator '{operator}': {detail}")]
    UnsupportedOperator { operator: String, detail: String },

    #[error("Malformed query: {0}")]
    MalformedQuery(String),

    #[error("Document does not provide a valid identifier in the '{field}' field")]
    MissingIdentifier { field: String },

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Remote store error: {0}")]
    RemoteStore(String),
}

impl GalcatError {
    pub(crate) fn unsupported(operator: impl Into<String>, detail: impl Into<String>) -> Self {
        GalcatError::UnsupportedOperator {
            operator: operator.into(),
            detail: detail.into(),
        }
    }

    pub(crate) fn missing_identifier(field: &str) -> Self {
        GalcatError::MissingIdentifier {
            field: field.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GalcatError>;
