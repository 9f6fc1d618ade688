//! Typed views of dbt Cloud API payloads.
//!
//! Every type has a hand-written `parse` over a [`serde_json::Value`] that
//! reads fields through a [`Payload`], so the nested path each field comes
//! from (`settings.threads`, `schedule.cron`, ...) is visible at the call
//! site. Types derive `Serialize` so the CLI can print them as JSON.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use super::error::{CloudError, ParseError, RunError, UnknownStatusCode};
use super::payload::Payload;
use crate::run::RunLogger;

/// Default prefix of single-object API responses.
const DATA: &[&str] = &["data"];

/// Status code assigned locally when the watch loop gives up on a run.
pub const TIMEOUT_STATUS_CODE: i64 = -1;

/// Semantic label of a raw run status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatusLabel {
    /// Queued (1), starting (2) or running (3).
    Running,
    /// Finished successfully (10).
    Success,
    /// Errored (20) or cancelled (30).
    Error,
    /// Never returned by the API; set by [`RunStatus::timeout`].
    #[serde(rename = "Manual Timeout")]
    ManualTimeout,
}

impl StatusLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusLabel::Running => "Running",
            StatusLabel::Success => "Success",
            StatusLabel::Error => "Error",
            StatusLabel::ManualTimeout => "Manual Timeout",
        }
    }
}

impl fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label and flags derived from a raw status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedState {
    pub label: StatusLabel,
    pub run_failed: bool,
    pub run_succeeded: bool,
    pub is_running: bool,
}

impl DerivedState {
    /// State of a run after [`RunStatus::timeout`].
    pub const TIMED_OUT: DerivedState = DerivedState {
        label: StatusLabel::ManualTimeout,
        run_failed: false,
        run_succeeded: false,
        is_running: false,
    };
}

/// Map a raw status code onto its label and flags.
///
/// The table is closed: a code the API is not documented to return is an
/// error, not a default.
pub fn derive_state(code: i64) -> Result<DerivedState, UnknownStatusCode> {
    let label = match code {
        TIMEOUT_STATUS_CODE => StatusLabel::ManualTimeout,
        1..=3 => StatusLabel::Running,
        10 => StatusLabel::Success,
        20 | 30 => StatusLabel::Error,
        other => return Err(UnknownStatusCode(other)),
    };

    Ok(DerivedState {
        label,
        run_failed: label == StatusLabel::Error,
        run_succeeded: label == StatusLabel::Success,
        is_running: label == StatusLabel::Running,
    })
}

/// Outcome of the HTTP call, from the top-level `status` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestStatus {
    pub code: i64,
    pub is_success: bool,
    pub user_message: Option<String>,
    pub developer_message: Option<String>,
}

impl RequestStatus {
    /// Read the `status` key at the root of an API response.
    pub fn parse(document: &Value) -> Result<Self, ParseError> {
        let status = document
            .get("status")
            .ok_or_else(|| ParseError::MissingField {
                path: "status".into(),
            })?;
        Self::from_object(status)
    }

    fn from_object(status: &Value) -> Result<Self, ParseError> {
        let p = Payload::new(status);
        Ok(Self {
            code: p.required(&["code"])?,
            is_success: p.required(&["is_success"])?,
            user_message: p.optional(&["user_message"])?,
            developer_message: p.optional(&["developer_message"])?,
        })
    }
}

/// Static configuration of a dbt Cloud job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    pub id: Option<u64>,
    pub account_id: u64,
    pub project_id: u64,
    pub environment_id: u64,
    pub name: String,
    pub dbt_version: Option<String>,
    pub execute_steps: Vec<String>,
    pub threads: Option<u64>,
    pub target_name: Option<String>,
    pub state: i64,
    pub generate_docs: bool,
    pub cron: Option<String>,
    pub schedule_date: Option<Value>,
    pub schedule_time: Option<Value>,
    pub request_status: Option<RequestStatus>,
}

impl Job {
    /// Parse a `GET /jobs/{id}` response (`{"data": {...}, "status": {...}}`).
    pub fn parse(document: &Value) -> Result<Self, ParseError> {
        Self::from_payload(Payload::with_default(document, DATA))
    }

    /// Parse a job object nested inside a run, which has no `data` wrapper.
    pub fn parse_embedded(job: &Value) -> Result<Self, ParseError> {
        Self::from_payload(Payload::new(job))
    }

    fn from_payload(p: Payload<'_>) -> Result<Self, ParseError> {
        let request_status = match p.value_raw(&["status"]) {
            Some(status) if status.is_object() => Some(RequestStatus::from_object(status)?),
            _ => None,
        };

        Ok(Self {
            id: p.optional(&["id"])?,
            account_id: p.required(&["account_id"])?,
            project_id: p.required(&["project_id"])?,
            environment_id: p.required(&["environment_id"])?,
            name: p.required(&["name"])?,
            dbt_version: p.optional(&["dbt_version"])?,
            execute_steps: p.optional(&["execute_steps"])?.unwrap_or_default(),
            threads: p.optional(&["settings", "threads"])?,
            target_name: p.optional(&["settings", "target_name"])?,
            state: p.required(&["state"])?,
            generate_docs: p.optional(&["generate_docs"])?.unwrap_or(false),
            cron: p.optional(&["schedule", "cron"])?,
            schedule_date: p.optional(&["schedule", "date"])?,
            schedule_time: p.optional(&["schedule", "time"])?,
            request_status,
        })
    }
}

/// One snapshot of a run.
///
/// The raw status code and the flags derived from it are private. Only
/// [`RunStatus::parse`] and [`RunStatus::timeout`] change them, and both set
/// code and flags together from a [`DerivedState`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunStatus {
    pub id: u64,
    pub run_id: u64,
    pub trigger_id: Option<u64>,
    pub account_id: Option<u64>,
    pub project_id: Option<u64>,
    pub environment_id: Option<u64>,
    pub job_definition_id: Option<u64>,
    status: i64,
    pub git_branch: Option<String>,
    pub git_sha: Option<String>,
    pub status_message: Option<String>,
    pub dbt_version: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub dequeued_at: Option<String>,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub last_checked_at: Option<String>,
    pub last_heartbeat_at: Option<String>,
    pub owner_thread_id: Option<String>,
    pub executed_by_thread_id: Option<String>,
    pub artifacts_saved: bool,
    pub artifact_s3_path: Option<String>,
    pub has_docs_generated: bool,
    pub job: Option<Job>,
    pub duration: Option<String>,
    pub queued_duration: Option<String>,
    pub run_duration: Option<String>,
    pub duration_humanized: Option<String>,
    pub queued_duration_humanized: Option<String>,
    pub run_duration_humanized: Option<String>,
    pub status_humanized: Option<String>,
    pub created_at_humanized: Option<String>,
    pub request_status: RequestStatus,
    status_map: StatusLabel,
    run_failed: bool,
    run_succeeded: bool,
    is_running: bool,
    run_timed_out: bool,
}

impl RunStatus {
    /// Parse a single-run response (`{"data": {...}, "status": {...}}`).
    pub fn parse(document: &Value) -> Result<Self, CloudError> {
        let p = Payload::with_default(document, DATA);

        let id: u64 = p.required(&["id"])?;
        let status: i64 = p.required(&["status"])?;
        let derived = derive_state(status)?;
        let job = match p.value(&["job"]) {
            Some(job) if !job.is_null() => Some(Job::parse_embedded(job)?),
            _ => None,
        };

        Ok(Self {
            id,
            run_id: p.optional(&["run_id"])?.unwrap_or(id),
            trigger_id: p.optional(&["trigger_id"])?,
            account_id: p.optional(&["account_id"])?,
            project_id: p.optional(&["project_id"])?,
            environment_id: p.optional(&["environment_id"])?,
            job_definition_id: p.optional(&["job_definition_id"])?,
            status,
            git_branch: p.optional(&["git_branch"])?,
            git_sha: p.optional(&["git_sha"])?,
            status_message: p.optional(&["status_message"])?,
            dbt_version: p.optional(&["dbt_version"])?,
            created_at: p.optional(&["created_at"])?,
            updated_at: p.optional(&["updated_at"])?,
            dequeued_at: p.optional(&["dequeued_at"])?,
            started_at: p.optional(&["started_at"])?,
            finished_at: p.optional(&["finished_at"])?,
            last_checked_at: p.optional(&["last_checked_at"])?,
            last_heartbeat_at: p.optional(&["last_heartbeat_at"])?,
            owner_thread_id: p.optional(&["owner_thread_id"])?,
            executed_by_thread_id: p.optional(&["executed_by_thread_id"])?,
            artifacts_saved: p.optional(&["artifacts_saved"])?.unwrap_or(false),
            artifact_s3_path: p.optional(&["artifact_s3_path"])?,
            has_docs_generated: p.optional(&["has_docs_generated"])?.unwrap_or(false),
            job,
            duration: p.optional(&["duration"])?,
            queued_duration: p.optional(&["queued_duration"])?,
            run_duration: p.optional(&["run_duration"])?,
            duration_humanized: p.optional(&["duration_humanized"])?,
            queued_duration_humanized: p.optional(&["queued_duration_humanized"])?,
            run_duration_humanized: p.optional(&["run_duration_humanized"])?,
            status_humanized: p.optional(&["status_humanized"])?,
            created_at_humanized: p.optional(&["created_at_humanized"])?,
            request_status: RequestStatus::parse(document)?,
            status_map: derived.label,
            run_failed: derived.run_failed,
            run_succeeded: derived.run_succeeded,
            is_running: derived.is_running,
            run_timed_out: false,
        })
    }

    fn apply(&mut self, derived: DerivedState) {
        self.status_map = derived.label;
        self.run_failed = derived.run_failed;
        self.run_succeeded = derived.run_succeeded;
        self.is_running = derived.is_running;
    }

    /// Raw status code as returned by the API, or `-1` after a timeout.
    pub fn status(&self) -> i64 {
        self.status
    }

    pub fn status_map(&self) -> StatusLabel {
        self.status_map
    }

    pub fn run_failed(&self) -> bool {
        self.run_failed
    }

    pub fn run_succeeded(&self) -> bool {
        self.run_succeeded
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn run_timed_out(&self) -> bool {
        self.run_timed_out
    }

    /// The API's human status, falling back to the derived label.
    pub fn human_status(&self) -> &str {
        self.status_humanized
            .as_deref()
            .unwrap_or_else(|| self.status_map.as_str())
    }

    /// Mark the run as abandoned by the local time budget. Terminal.
    pub fn timeout(&mut self) {
        if self.run_timed_out {
            return;
        }
        self.status = TIMEOUT_STATUS_CODE;
        self.apply(DerivedState::TIMED_OUT);
        self.status_humanized = Some("Timeout".to_string());
        self.run_timed_out = true;
    }

    /// Classify the snapshot without changing it.
    ///
    /// A timed-out run yields [`RunError::Timeout`]; a succeeded run is logged
    /// and accepted; a running run is accepted silently; anything else yields
    /// [`RunError::Failed`].
    pub fn check_progress(&self, logger: Option<&dyn RunLogger>) -> Result<(), RunError> {
        if self.run_timed_out {
            return Err(RunError::Timeout {
                run_id: self.run_id,
                status: self.human_status().to_string(),
            });
        }

        if self.run_succeeded {
            if let Some(logger) = logger {
                logger.info(&format!("Run succeeded: {}", self.run_id));
            }
            return Ok(());
        }

        if self.is_running {
            return Ok(());
        }

        Err(RunError::Failed {
            run_id: self.run_id,
            status: self.human_status().to_string(),
        })
    }
}

/// Runs of one job, most recent first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunStatusList {
    pub runs: Vec<RunStatus>,
}

impl RunStatusList {
    /// Parse a `GET /runs` response whose `data` is an array.
    ///
    /// Each item is parsed as if it were a single-run response carrying the
    /// list's request status.
    pub fn parse(document: &Value) -> Result<Self, CloudError> {
        let status = document
            .get("status")
            .cloned()
            .ok_or_else(|| ParseError::MissingField {
                path: "status".into(),
            })?;
        let items = document
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| ParseError::InvalidType {
                path: "data".into(),
                expected: "list",
            })?;

        let runs = items
            .iter()
            .map(|item| {
                let wrapped = serde_json::json!({ "data": item, "status": status });
                RunStatus::parse(&wrapped)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { runs })
    }

    /// Human status of the latest run that is not in progress.
    ///
    /// Only the two most recent runs are considered: if the newest is still
    /// running the one before it is reported.
    pub fn last_completed_status(&self) -> Option<&str> {
        match self.runs.as_slice() {
            [latest, previous, ..] if latest.is_running() => Some(previous.human_status()),
            [latest, ..] => Some(latest.human_status()),
            [] => None,
        }
    }

    pub fn first(&self) -> Option<&RunStatus> {
        self.runs.first()
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::Value;

    use super::RunStatus;

    pub const RUN_RUNNING: &str = include_str!("../../tests/fixtures/run_running.json");
    pub const RUN_SUCCESS: &str = include_str!("../../tests/fixtures/run_success.json");
    pub const RUN_ERROR: &str = include_str!("../../tests/fixtures/run_error.json");
    pub const JOB: &str = include_str!("../../tests/fixtures/job.json");
    pub const RUNS: &str = include_str!("../../tests/fixtures/runs.json");

    pub fn json(raw: &str) -> Value {
        serde_json::from_str(raw).unwrap()
    }

    pub fn run(raw: &str) -> RunStatus {
        RunStatus::parse(&json(raw)).unwrap()
    }

    /// A run fixture with its status code replaced.
    pub fn run_with_code(code: i64) -> Value {
        let mut doc = json(RUN_RUNNING);
        doc["data"]["status"] = code.into();
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::cloud::CloudError;
    use crate::run::logger::testing::RecordingLogger;

    #[test]
    fn running_codes_only_set_is_running() {
        for code in [1, 2, 3] {
            let state = derive_state(code).unwrap();
            assert_eq!(state.label, StatusLabel::Running);
            assert!(state.is_running);
            assert!(!state.run_failed);
            assert!(!state.run_succeeded);
        }
    }

    #[test]
    fn success_and_error_codes() {
        let success = derive_state(10).unwrap();
        assert_eq!(success.label, StatusLabel::Success);
        assert!(success.run_succeeded && !success.run_failed && !success.is_running);

        for code in [20, 30] {
            let error = derive_state(code).unwrap();
            assert_eq!(error.label, StatusLabel::Error);
            assert!(error.run_failed && !error.run_succeeded && !error.is_running);
        }
    }

    #[test]
    fn timeout_code_has_no_flags() {
        let state = derive_state(TIMEOUT_STATUS_CODE).unwrap();
        assert_eq!(state, DerivedState::TIMED_OUT);
        assert_eq!(state.label, StatusLabel::ManualTimeout);
        assert!(!state.run_failed && !state.run_succeeded && !state.is_running);
    }

    #[test]
    fn unknown_codes_are_rejected() {
        for code in [0, 4, 11, 25, 99, -2] {
            assert_eq!(derive_state(code), Err(UnknownStatusCode(code)));
        }
    }

    #[test]
    fn label_display() {
        assert_eq!(StatusLabel::ManualTimeout.to_string(), "Manual Timeout");
        assert_eq!(StatusLabel::Running.to_string(), "Running");
    }

    #[test]
    fn run_status_from_success_payload() {
        let run = run(RUN_SUCCESS);
        assert_eq!(run.id, 4021);
        assert_eq!(run.run_id, 4021);
        assert_eq!(run.status(), 10);
        assert_eq!(run.status_map(), StatusLabel::Success);
        assert!(run.run_succeeded());
        assert!(!run.run_failed());
        assert!(!run.is_running());
        assert!(!run.run_timed_out());
        assert_eq!(run.request_status.code, 200);
        assert!(run.request_status.is_success);
        assert_eq!(run.finished_at.as_deref(), Some("2024-03-02 09:21:44.512963+00:00"));
    }

    #[test]
    fn run_status_embeds_job_without_data_prefix() {
        let run = run(RUN_RUNNING);
        let job = run.job.expect("embedded job");
        assert_eq!(job.name, "Nightly marts");
        assert_eq!(job.threads, Some(4));
        assert_eq!(job.target_name.as_deref(), Some("prod"));
        assert_eq!(job.cron.as_deref(), Some("0 6 * * *"));
        assert!(job.request_status.is_none());
        assert_eq!(job.dbt_version, None);
    }

    #[test]
    fn run_status_without_job() {
        let mut doc = json(RUN_RUNNING);
        doc["data"]["job"] = Value::Null;
        let run = RunStatus::parse(&doc).unwrap();
        assert!(run.job.is_none());
    }

    #[test]
    fn run_status_unknown_code_fails_parse() {
        let err = RunStatus::parse(&run_with_code(5)).unwrap_err();
        assert!(matches!(err, CloudError::UnknownStatusCode(UnknownStatusCode(5))));
    }

    #[test]
    fn run_status_requires_request_status() {
        let mut doc = json(RUN_RUNNING);
        doc.as_object_mut().unwrap().remove("status");
        let err = RunStatus::parse(&doc).unwrap_err();
        assert!(matches!(
            err,
            CloudError::Parse(ParseError::MissingField { ref path }) if path == "status"
        ));
    }

    #[test]
    fn explicit_run_id_wins() {
        let mut doc = json(RUN_RUNNING);
        doc["data"]["run_id"] = 9.into();
        assert_eq!(RunStatus::parse(&doc).unwrap().run_id, 9);
    }

    #[test]
    fn timeout_is_terminal_and_idempotent() {
        let mut run = run(RUN_RUNNING);
        assert!(run.is_running());

        run.timeout();
        run.timeout();

        assert!(!run.is_running());
        assert!(run.run_timed_out());
        assert_eq!(run.status(), -1);
        assert_eq!(run.status_map(), StatusLabel::ManualTimeout);
        assert_eq!(run.status_humanized.as_deref(), Some("Timeout"));
        assert!(!run.run_failed());
        assert!(!run.run_succeeded());
    }

    #[test]
    fn check_progress_timed_out() {
        let mut run = run(RUN_RUNNING);
        run.timeout();
        let err = run.check_progress(None).unwrap_err();
        assert_eq!(
            err,
            RunError::Timeout {
                run_id: 4021,
                status: "Timeout".into()
            }
        );
        assert!(err.to_string().contains("4021"));
        assert!(err.to_string().contains("Timeout"));
    }

    #[test]
    fn check_progress_success_logs() {
        let logger = RecordingLogger::default();
        run(RUN_SUCCESS).check_progress(Some(&logger)).unwrap();
        assert_eq!(logger.lines(), vec![("info", "Run succeeded: 4021".to_string())]);
    }

    #[test]
    fn check_progress_running_is_silent() {
        let logger = RecordingLogger::default();
        run(RUN_RUNNING).check_progress(Some(&logger)).unwrap();
        assert!(logger.lines().is_empty());
    }

    #[test]
    fn check_progress_error_fails() {
        let err = run(RUN_ERROR).check_progress(None).unwrap_err();
        assert_eq!(
            err,
            RunError::Failed {
                run_id: 4021,
                status: "Error".into()
            }
        );
    }

    #[test]
    fn check_progress_does_not_mutate() {
        let run = run(RUN_ERROR);
        let before = run.clone();
        let _ = run.check_progress(None);
        assert_eq!(run, before);
    }

    #[test]
    fn job_from_get_job_payload() {
        let job = Job::parse(&json(JOB)).unwrap();
        assert_eq!(job.id, Some(118));
        assert_eq!(job.account_id, 1128);
        assert_eq!(job.dbt_version.as_deref(), Some("1.7.0"));
        assert_eq!(job.execute_steps.len(), 3);
        assert!(job.generate_docs);
        assert_eq!(job.schedule_date.as_ref().unwrap()["type"], "every_day");
        assert_eq!(job.request_status.unwrap().user_message.as_deref(), Some("Success!"));
    }

    #[test]
    fn job_parse_needs_data_wrapper() {
        let raw = json(JOB);
        let err = Job::parse(&raw["data"]).unwrap_err();
        assert!(matches!(err, ParseError::MissingField { .. }));
        assert!(Job::parse_embedded(&raw["data"]).is_ok());
    }

    #[test]
    fn run_list_keeps_api_order() {
        let list = RunStatusList::parse(&json(RUNS)).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.runs[0].id, 4021);
        assert_eq!(list.runs[1].id, 4019);
        assert_eq!(list.runs[1].request_status.code, 200);
    }

    #[test]
    fn last_completed_skips_running_head() {
        let list = RunStatusList::parse(&json(RUNS)).unwrap();
        assert!(list.runs[0].is_running());
        assert_eq!(list.last_completed_status(), Some("Error"));
    }

    #[test]
    fn last_completed_uses_head_when_finished() {
        let list = RunStatusList {
            runs: vec![run(RUN_SUCCESS), run(RUN_ERROR)],
        };
        assert_eq!(list.last_completed_status(), Some("Success"));
    }

    #[test]
    fn last_completed_single_running_run() {
        let list = RunStatusList {
            runs: vec![run(RUN_RUNNING)],
        };
        assert_eq!(list.last_completed_status(), Some("Running"));
    }

    #[test]
    fn last_completed_empty() {
        let list = RunStatusList { runs: vec![] };
        assert!(list.is_empty());
        assert_eq!(list.last_completed_status(), None);
    }

    #[test]
    fn run_list_rejects_object_data() {
        let err = RunStatusList::parse(&json(RUN_RUNNING)).unwrap_err();
        assert!(matches!(err, CloudError::Parse(ParseError::InvalidType { .. })));
    }
}
