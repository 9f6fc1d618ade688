use thiserror::Error;

use crate::cloud::{CloudError, RunError};

/// Errors surfaced by the orchestrator ops and the CLI.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("dbt Cloud error: {0}")]
    Cloud(#[from] CloudError),

    #[error(transparent)]
    Run(#[from] RunError),

    #[error("invalid timestamp `{value}`: {source}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("no runs found for job {0}")]
    NoRuns(u64),
}

impl RunnerError {
    /// Whether the orchestrator should run the whole op again.
    ///
    /// Transport failures, server errors and runs that failed or timed out
    /// are retried. Bad input, bad configuration and payloads the client
    /// cannot read will fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        match self {
            RunnerError::Cloud(err) => err.is_transient(),
            RunnerError::Run(_) => true,
            RunnerError::InvalidTimestamp { .. } | RunnerError::NoRuns(_) => false,
        }
    }
}
