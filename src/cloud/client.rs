use std::time::Duration;

use reqwest::{Client, Method};
use serde_json::{Value, json};

use super::error::CloudError;
use super::types::{Job, RunStatus, RunStatusList};
use crate::config::DbtCloudConfig;

pub type JobId = u64;
pub type RunId = u64;

/// Cause recorded on runs when the caller does not give one.
pub const DEFAULT_CAUSE: &str = "Triggered by dbt-cloud-runner";

/// Number of runs fetched by [`DbtCloudClient::get_job_runs`] by default.
pub const DEFAULT_RUN_LIMIT: u32 = 2;

/// Types that can be built from a successful API response body.
pub trait FromResponse: Sized {
    fn from_response(body: &Value) -> Result<Self, CloudError>;
}

impl FromResponse for Job {
    fn from_response(body: &Value) -> Result<Self, CloudError> {
        Ok(Job::parse(body)?)
    }
}

impl FromResponse for RunStatus {
    fn from_response(body: &Value) -> Result<Self, CloudError> {
        RunStatus::parse(body)
    }
}

impl FromResponse for RunStatusList {
    fn from_response(body: &Value) -> Result<Self, CloudError> {
        RunStatusList::parse(body)
    }
}

/// The run operations the watch loop needs.
///
/// [`DbtCloudClient`] is the real implementation; tests drive the loop with
/// scripted implementations instead.
#[allow(async_fn_in_trait)]
pub trait RunApi {
    async fn create_run(
        &self,
        job_id: JobId,
        cause: &str,
        steps_override: &[String],
    ) -> Result<RunStatus, CloudError>;

    async fn get_run(&self, run_id: RunId) -> Result<RunStatus, CloudError>;

    async fn cancel_run(&self, run_id: RunId) -> Result<RunStatus, CloudError>;
}

/// Client for the dbt Cloud v2 accounts API.
///
/// Holds only immutable settings and a pooled `reqwest` client, so it can be
/// shared by reference between concurrent watches.
#[derive(Debug, Clone)]
pub struct DbtCloudClient {
    client: Client,
    base_url: String,
    access_token: String,
    environment_id: String,
    project_id: String,
}

impl DbtCloudClient {
    /// Build a client after checking that every credential is present.
    pub fn new(config: &DbtCloudConfig) -> Result<Self, CloudError> {
        config.validate()?;
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url(),
            access_token: config.access_token.clone(),
            environment_id: config.environment_id.clone(),
            project_id: config.project_id.clone(),
        })
    }

    /// Same as [`new`](Self::new) but against a different API root (useful for testing).
    pub fn with_api_root(config: &DbtCloudConfig, api_root: &str) -> Result<Self, CloudError> {
        let config = DbtCloudConfig {
            api_root: api_root.to_string(),
            ..config.clone()
        };
        Self::new(&config)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn environment_id(&self) -> &str {
        &self.environment_id
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub async fn get_job(&self, job_id: impl Into<Option<JobId>>) -> Result<Job, CloudError> {
        let job_id = job_id.into().ok_or(CloudError::MissingJobId)?;
        self.request(Method::GET, &format!("/jobs/{job_id}"), None, &[])
            .await
    }

    /// Most recent runs of a job, newest first, with the job embedded.
    pub async fn get_job_runs(
        &self,
        job_id: impl Into<Option<JobId>>,
        limit: u32,
    ) -> Result<RunStatusList, CloudError> {
        let job_id = job_id.into().ok_or(CloudError::MissingJobId)?;
        let query = [
            ("include_related", "job".to_string()),
            ("job_definition_id", job_id.to_string()),
            ("order_by", "-id".to_string()),
            ("limit", limit.to_string()),
        ];
        self.request(Method::GET, "/runs", None, &query).await
    }

    /// Trigger a run of a job.
    ///
    /// `steps_override` is only sent when it has at least one step; an empty
    /// list means "use the job's own steps".
    pub async fn create_run(
        &self,
        job_id: impl Into<Option<JobId>>,
        cause: &str,
        steps_override: &[String],
    ) -> Result<RunStatus, CloudError> {
        let job_id = job_id.into().ok_or(CloudError::MissingJobId)?;

        let mut body = json!({ "cause": cause });
        if !steps_override.is_empty() {
            body["steps_override"] = json!(steps_override);
        }

        // The trailing slash is required, the API misroutes the request without it.
        self.request(Method::POST, &format!("/jobs/{job_id}/run/"), Some(body), &[])
            .await
    }

    pub async fn get_run(&self, run_id: impl Into<Option<RunId>>) -> Result<RunStatus, CloudError> {
        let run_id = run_id.into().ok_or(CloudError::MissingRunId)?;
        self.request(Method::GET, &format!("/runs/{run_id}"), None, &[])
            .await
    }

    pub async fn cancel_run(
        &self,
        run_id: impl Into<Option<RunId>>,
    ) -> Result<RunStatus, CloudError> {
        let run_id = run_id.into().ok_or(CloudError::MissingRunId)?;
        self.request(Method::POST, &format!("/runs/{run_id}/cancel/"), None, &[])
            .await
    }

    /// Issue one request and parse the body as `T`.
    ///
    /// Any non-2xx status is returned as [`CloudError::Api`]. Nothing is
    /// retried here.
    pub async fn request<T: FromResponse>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        query: &[(&str, String)],
    ) -> Result<T, CloudError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%method, %url, "dbt Cloud request");

        let mut builder = self
            .client
            .request(method, &url)
            .header("Authorization", format!("Token {}", self.access_token))
            .header("Content-Type", "application/json");
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            tracing::debug!(status = status.as_u16(), %url, "dbt Cloud request failed");
            return Err(CloudError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.json::<Value>().await?;
        T::from_response(&body)
    }
}

impl RunApi for DbtCloudClient {
    async fn create_run(
        &self,
        job_id: JobId,
        cause: &str,
        steps_override: &[String],
    ) -> Result<RunStatus, CloudError> {
        DbtCloudClient::create_run(self, job_id, cause, steps_override).await
    }

    async fn get_run(&self, run_id: RunId) -> Result<RunStatus, CloudError> {
        DbtCloudClient::get_run(self, run_id).await
    }

    async fn cancel_run(&self, run_id: RunId) -> Result<RunStatus, CloudError> {
        DbtCloudClient::cancel_run(self, run_id).await
    }
}
