//! Optional leveled logger handed to the watch loop and to
//! [`RunStatus::check_progress`](crate::cloud::RunStatus::check_progress).
//!
//! Orchestrators usually want these messages in their own run log rather than
//! in the process log, so the sink is a trait. [`TracingLogger`] is the
//! default sink and forwards to `tracing`.

/// Receiver for the progress messages of a run.
pub trait RunLogger: Send + Sync {
    fn info(&self, message: &str);
    fn warning(&self, message: &str);
}

/// Forwards messages to the `tracing` subscriber of the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl RunLogger for TracingLogger {
    fn info(&self, message: &str) {
        tracing::info!(target: "dbt_cloud_runner::run", "{message}");
    }

    fn warning(&self, message: &str) {
        tracing::warn!(target: "dbt_cloud_runner::run", "{message}");
    }
}
