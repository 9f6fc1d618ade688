//! Command line interface built on clap.
//!
//! Subcommands map one-to-one onto the client operations, plus `trigger`
//! (create a run and wait for it) and `validate` (report on the latest run).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::cloud::{DEFAULT_CAUSE, DEFAULT_RUN_LIMIT};
use crate::run::{DEFAULT_POLL_INTERVAL_SECS, DEFAULT_TIME_LIMIT_SECS};

/// Trigger dbt Cloud jobs and wait for their runs.
#[derive(Debug, Parser)]
#[command(name = "dbt-cloud-runner", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the TOML config file (defaults to ./dbt-cloud.toml).
    #[arg(long, global = true, env = "DBT_CLOUD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Trigger a job and wait for the run to finish.
    Trigger {
        job_id: u64,

        /// Reason recorded on the run.
        #[arg(long, default_value = DEFAULT_CAUSE)]
        cause: String,

        /// dbt command replacing the job's steps; repeat for several steps.
        #[arg(long = "step")]
        steps: Vec<String>,

        /// Seconds to wait before giving up on the run.
        #[arg(long, default_value_t = DEFAULT_TIME_LIMIT_SECS)]
        time_limit: u64,

        /// Seconds between two status checks.
        #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_SECS)]
        poll_interval: u64,

        /// Leave the run going when the time limit is reached.
        #[arg(long, default_value_t = false)]
        no_cancel: bool,

        /// Times the whole trigger is retried after a failed or timed-out run.
        #[arg(long, default_value_t = 0)]
        retries: u32,
    },

    /// Report on the latest run of one or more jobs.
    Validate {
        #[arg(required = true)]
        job_ids: Vec<u64>,
    },

    /// Show a job definition.
    Job { job_id: u64 },

    /// List the most recent runs of a job.
    Runs {
        job_id: u64,

        #[arg(long, default_value_t = DEFAULT_RUN_LIMIT)]
        limit: u32,
    },

    /// Show one run.
    Run { run_id: u64 },

    /// Cancel a run.
    Cancel { run_id: u64 },
}
