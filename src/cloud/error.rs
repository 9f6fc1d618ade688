//! Error types for the dbt Cloud client.
//!
//! [`CloudError`] covers everything that can go wrong while talking to the
//! API: bad configuration, missing identifiers, HTTP failures and payloads
//! that do not match the expected shape. [`RunError`] is the classification
//! of a finished run produced by
//! [`RunStatus::check_progress`](crate::cloud::RunStatus::check_progress).

use thiserror::Error;

/// Errors raised by [`DbtCloudClient`](crate::cloud::DbtCloudClient) and the
/// payload parsers.
#[derive(Debug, Error)]
pub enum CloudError {
    /// A required configuration value is missing or empty.
    #[error("{field} can't be None or Empty String")]
    Config { field: &'static str },

    /// A job operation was called without a job id.
    #[error("No Job ID provided")]
    MissingJobId,

    /// A run operation was called without a run id.
    #[error("Run ID Can't be None")]
    MissingRunId,

    /// The API answered with a non-2xx status.
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Transport failure (DNS, refused connection, timeout, unreadable body).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The response body did not have the expected shape.
    #[error("failed to parse response: {0}")]
    Parse(#[from] ParseError),

    /// The API returned a run status code outside the known table.
    #[error(transparent)]
    UnknownStatusCode(#[from] UnknownStatusCode),
}

impl CloudError {
    /// Whether re-running the whole operation later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            CloudError::Network(_) => true,
            CloudError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// A field lookup on a JSON payload failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("missing field `{path}`")]
    MissingField { path: String },

    #[error("field `{path}` is not a {expected}")]
    InvalidType { path: String, expected: &'static str },
}

/// Raw run status code that has no entry in the status table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown run status code: {0}")]
pub struct UnknownStatusCode(pub i64);

/// Terminal classification of a run that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    /// The local time budget expired before the run finished.
    #[error("Run {run_id} failed to complete, status: {status}")]
    Timeout { run_id: u64, status: String },

    /// The run ended in an error state, or in no recognisable state at all.
    #[error("Job {run_id} failed with status: {status}")]
    Failed { run_id: u64, status: String },
}
