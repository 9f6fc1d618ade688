use std::time::Duration;

use tokio::time::{Instant, sleep};

use super::logger::RunLogger;
use crate::cloud::{CloudError, DEFAULT_CAUSE, JobId, RunApi, RunId, RunStatus};

/// Default wall-clock budget for a run, in seconds.
pub const DEFAULT_TIME_LIMIT_SECS: u64 = 600;

/// Default wait between two status checks, in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

/// How a run is triggered and how long it is waited for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerOptions {
    /// Free-text reason stored on the run.
    pub cause: String,
    /// Replaces the job's steps for this run when non-empty.
    pub steps_override: Vec<String>,
    /// Budget measured from the moment the run is created.
    pub time_limit: Duration,
    /// Cancel the remote run when the budget runs out.
    pub terminate_timed_out_run: bool,
    pub poll_interval: Duration,
}

impl Default for TriggerOptions {
    fn default() -> Self {
        Self {
            cause: DEFAULT_CAUSE.to_string(),
            steps_override: Vec::new(),
            time_limit: Duration::from_secs(DEFAULT_TIME_LIMIT_SECS),
            terminate_timed_out_run: true,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }
}

/// Where the watch is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// Nothing sent yet; the next step creates the run.
    Created,
    /// The last produced status was running; the next step polls this run.
    Polling(RunId),
    /// The final status (or an error) has been produced.
    Finished,
}

/// Triggers one run and produces its status snapshots one at a time.
///
/// Each call to [`next`](Self::next) performs one step:
///
/// 1. the first call creates the run and produces its initial status;
/// 2. while the run is running and the time budget is not spent, each call
///    sleeps for the poll interval, refreshes the status and produces it;
/// 3. once the run stops running, or the budget is spent, the final status is
///    produced. A run still running at that point is marked with
///    [`RunStatus::timeout`] and, if configured, cancelled on the server.
///
/// After the final status (or the first error) `next` returns `None`.
/// Dropping the watch stops polling but leaves the remote run alive.
pub struct RunWatch<'a, A: RunApi> {
    api: &'a A,
    job_id: JobId,
    options: TriggerOptions,
    logger: Option<&'a dyn RunLogger>,
    state: WatchState,
    started: Option<Instant>,
}

impl<'a, A: RunApi> RunWatch<'a, A> {
    /// Prepare a watch. Fails with [`CloudError::MissingJobId`] without
    /// touching the API when `job_id` is `None`.
    pub fn new(
        api: &'a A,
        job_id: impl Into<Option<JobId>>,
        options: TriggerOptions,
        logger: Option<&'a dyn RunLogger>,
    ) -> Result<Self, CloudError> {
        let job_id = job_id.into().ok_or(CloudError::MissingJobId)?;
        Ok(Self {
            api,
            job_id,
            options,
            logger,
            state: WatchState::Created,
            started: None,
        })
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn options(&self) -> &TriggerOptions {
        &self.options
    }

    /// Perform the next step and return the status it produced.
    pub async fn next(&mut self) -> Option<Result<RunStatus, CloudError>> {
        let step = match std::mem::replace(&mut self.state, WatchState::Finished) {
            WatchState::Created => self.create().await,
            WatchState::Polling(run_id) => self.poll(run_id).await,
            WatchState::Finished => return None,
        };
        Some(step)
    }

    /// Drain the watch and return the last element it produces: the final
    /// status or the error that ended it. `None` if it had already finished.
    pub async fn last(mut self) -> Option<Result<RunStatus, CloudError>> {
        let mut last = None;
        while let Some(step) = self.next().await {
            last = Some(step);
        }
        last
    }

    async fn create(&mut self) -> Result<RunStatus, CloudError> {
        let status = self
            .api
            .create_run(self.job_id, &self.options.cause, &self.options.steps_override)
            .await?;
        self.started = Some(Instant::now());
        tracing::debug!(job_id = self.job_id, run_id = status.run_id, "run created");
        self.settle(status).await
    }

    async fn poll(&mut self, run_id: RunId) -> Result<RunStatus, CloudError> {
        sleep(self.options.poll_interval).await;
        self.info(&format!(
            "Waiting on run: {run_id}, sleeping {} seconds.",
            self.options.poll_interval.as_secs()
        ));
        let status = self.api.get_run(run_id).await?;
        self.settle(status).await
    }

    // Decide whether `status` is intermediate or final.
    async fn settle(&mut self, mut status: RunStatus) -> Result<RunStatus, CloudError> {
        tracing::debug!(
            run_id = status.run_id,
            status = %status.status_map(),
            "run status"
        );

        if !status.is_running() {
            return Ok(status);
        }

        if self.within_budget() {
            self.state = WatchState::Polling(status.run_id);
            return Ok(status);
        }

        self.warning(&format!("Run {} did not finish.", status.run_id));
        status.timeout();

        if self.options.terminate_timed_out_run {
            self.info("Cancelling run now.");
            self.api.cancel_run(status.run_id).await?;
        }

        Ok(status)
    }

    fn within_budget(&self) -> bool {
        self.started
            .is_some_and(|started| started.elapsed() < self.options.time_limit)
    }

    fn info(&self, message: &str) {
        if let Some(logger) = self.logger {
            logger.info(message);
        }
    }

    fn warning(&self, message: &str) {
        if let Some(logger) = self.logger {
            logger.warning(message);
        }
    }
}
