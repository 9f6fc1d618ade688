use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use dbt_cloud_runner::cli::{Cli, Command};
use dbt_cloud_runner::cloud::DbtCloudClient;
use dbt_cloud_runner::config::DbtCloudConfig;
use dbt_cloud_runner::ops::{self, RetryPolicy};
use dbt_cloud_runner::run::{RunLogger, TracingLogger, TriggerOptions};
use dbt_cloud_runner::ui::{RunProgress, print_json};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = DbtCloudConfig::load(cli.config.as_deref())?;
    let client = DbtCloudClient::new(&config)?;

    match cli.command {
        Command::Trigger {
            job_id,
            cause,
            steps,
            time_limit,
            poll_interval,
            no_cancel,
            retries,
        } => {
            let options = TriggerOptions {
                cause,
                steps_override: steps,
                time_limit: std::time::Duration::from_secs(time_limit),
                terminate_timed_out_run: !no_cancel,
                poll_interval: std::time::Duration::from_secs(poll_interval),
            };
            let policy = RetryPolicy {
                max_retries: retries,
                ..Default::default()
            };
            let client = &client;
            let logger: &dyn RunLogger = &TracingLogger;

            policy
                .retry(|_| {
                    let options = options.clone();
                    async move {
                        let progress = RunProgress::start(job_id);
                        let outcome = ops::trigger_and_wait(
                            client,
                            job_id,
                            options,
                            Some(logger),
                            |status| progress.update(status),
                        )
                        .await;
                        if let Err(err) = &outcome {
                            progress.abandon(&err.to_string());
                        }
                        outcome
                    }
                })
                .await?;
        }
        Command::Validate { job_ids } => {
            for job_id in job_ids {
                println!("{}", ops::validate_job(&client, job_id).await?);
            }
        }
        Command::Job { job_id } => {
            print_json(&client.get_job(job_id).await?);
        }
        Command::Runs { job_id, limit } => {
            let runs = client.get_job_runs(job_id, limit).await?;
            print_json(&runs);
            if let Some(status) = runs.last_completed_status() {
                println!("Last completed status: {status}");
            }
        }
        Command::Run { run_id } => {
            print_json(&client.get_run(run_id).await?);
        }
        Command::Cancel { run_id } => {
            print_json(&client.cancel_run(run_id).await?);
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
