//! Orchestrator-facing operations built on the client and the watch loop.
//!
//! These are what a workflow engine schedules: trigger a job and fail the
//! step unless the run succeeds, and summarise the latest run of a job for a
//! status report. Retrying a failed op is done here, at op level, with
//! exponential backoff; the HTTP client itself never retries.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};
use tokio::time::sleep;

use crate::cloud::{DEFAULT_RUN_LIMIT, DbtCloudClient, JobId, RunApi, RunStatus};
use crate::error::RunnerError;
use crate::run::{RunLogger, RunWatch, TriggerOptions};

/// Layout of `finished_at` in run payloads, e.g. `2024-03-02 09:21:44.512963+00:00`.
const FINISHED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f%:z";

/// Layout of the timestamp in validation reports.
const REPORT_FORMAT: &str = "%Y-%m-%d %I:%M:%S %p";

/// Op-level retry with exponential backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each one after.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Policy that runs the op exactly once.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// delay = base_delay * 2^(attempt - 1)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// retries are used up. `op` receives the attempt number, starting at 0.
    pub async fn retry<T, F, Fut>(&self, mut op: F) -> Result<T, RunnerError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, RunnerError>>,
    {
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.delay_for_attempt(attempt);
                    tracing::warn!(
                        "Retry {attempt}/{}: {err} (waiting {}ms)",
                        self.max_retries,
                        delay.as_millis()
                    );
                    sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Trigger a job and wait for its run, failing unless the run succeeds.
///
/// Every status the watch produces is handed to `on_status` and then
/// classified with [`RunStatus::check_progress`], so a failed or timed-out
/// run surfaces as [`RunnerError::Run`].
pub async fn trigger_and_wait<A: RunApi>(
    api: &A,
    job_id: impl Into<Option<JobId>>,
    options: TriggerOptions,
    logger: Option<&dyn RunLogger>,
    mut on_status: impl FnMut(&RunStatus),
) -> Result<(), RunnerError> {
    let mut watch = RunWatch::new(api, job_id, options, logger)?;
    while let Some(step) = watch.next().await {
        let status = step?;
        on_status(&status);
        status.check_progress(logger)?;
    }
    Ok(())
}

/// One-line report on the most recent run of a job.
///
/// `"<job> finished at <local time> :white_check_mark::"` for a good run,
/// `:x:` instead of the check mark for a failed one.
pub async fn validate_job(
    client: &DbtCloudClient,
    job_id: impl Into<Option<JobId>>,
) -> Result<String, RunnerError> {
    let job_id = job_id.into();
    let runs = client.get_job_runs(job_id, DEFAULT_RUN_LIMIT).await?;
    let run = runs
        .first()
        .ok_or(RunnerError::NoRuns(job_id.unwrap_or_default()))?;
    report_run(run, &Local)
}

/// Format the report for `run`, rendering times in `tz`.
pub fn report_run<Tz>(run: &RunStatus, tz: &Tz) -> Result<String, RunnerError>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let name = run
        .job
        .as_ref()
        .map_or("unknown job", |job| job.name.as_str());

    if run.request_status.code != 200 {
        return Ok(format!(
            "Failed to validate job: {name}, response code: {}",
            run.request_status.code
        ));
    }

    let Some(finished_at) = run.finished_at.as_deref() else {
        return Ok(format!(
            "{name} has not finished, status: {}",
            run.human_status()
        ));
    };

    let finished = format_finished_at(finished_at, tz)?;
    let mark = if run.run_failed() {
        ":x:"
    } else {
        ":white_check_mark:"
    };
    Ok(format!("{name} finished at {finished} {mark}:"))
}

fn format_finished_at<Tz>(value: &str, tz: &Tz) -> Result<String, RunnerError>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let parsed = DateTime::parse_from_str(value, FINISHED_AT_FORMAT).map_err(|source| {
        RunnerError::InvalidTimestamp {
            value: value.to_string(),
            source,
        }
    })?;
    Ok(parsed.with_timezone(tz).format(REPORT_FORMAT).to_string())
}
