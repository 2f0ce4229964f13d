use std::sync::Arc;

use thiserror::Error;

use crate::builder::state::BuilderState;

/// Transport-level failure talking to the reports API.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http(e) => e.status().map(|s| s.as_u16()),
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Decode(_) | ApiError::InvalidUrl(_) => None,
        }
    }
}

/// Every error the builder surfaces. None of them is fatal: each is scoped to
/// the builder session and recoverable by retrying the operation.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to load report schema: {0}")]
    SchemaLoad(#[source] ApiError),

    #[error("Report schema is malformed: {0}")]
    MalformedSchema(String),

    #[error("Failed to load options for '{field_key}': {source}")]
    RelationOptions {
        field_key: String,
        #[source]
        source: Arc<ApiError>,
    },

    #[error("Failed to generate preview: {0}")]
    Preview(#[source] ApiError),

    #[error("Failed to generate report: {0}")]
    Export(#[source] ApiError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Cannot {operation} while builder is {state}")]
    InvalidState {
        state: BuilderState,
        operation: &'static str,
    },
}

impl ReportError {
    /// Whether this failure came from loading the schema, i.e. the caller
    /// should offer a schema retry rather than an inline message.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            ReportError::SchemaLoad(_) | ReportError::MalformedSchema(_)
        )
    }
}

pub type ReportResult<T> = Result<T, ReportError>;
