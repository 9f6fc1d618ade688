//! Trigger dbt Cloud jobs and wait for their runs.
//!
//! The crate is organised around one loop: create a run, poll it until it
//! finishes or a time budget runs out, and optionally cancel it when the
//! budget is spent.
//!
//! - [`cloud`]: the HTTP client and the typed payloads it returns.
//! - [`run`]: [`RunWatch`](run::RunWatch), the trigger-and-poll loop.
//! - [`ops`]: what an orchestrator schedules on top of the two.
//!
//! ```no_run
//! use dbt_cloud_runner::cloud::DbtCloudClient;
//! use dbt_cloud_runner::config::DbtCloudConfig;
//! use dbt_cloud_runner::run::{RunWatch, TracingLogger, TriggerOptions};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = DbtCloudConfig::load(None)?;
//! let client = DbtCloudClient::new(&config)?;
//! let logger = TracingLogger;
//!
//! let mut watch = RunWatch::new(&client, 118, TriggerOptions::default(), Some(&logger))?;
//! while let Some(status) = watch.next().await {
//!     let status = status?;
//!     println!("run {} is {}", status.run_id, status.human_status());
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod cloud;
pub mod config;
pub mod error;
pub mod ops;
pub mod run;
pub mod ui;

pub use error::RunnerError;
