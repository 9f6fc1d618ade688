//! Terminal output for the CLI: a spinner while a run is being watched and
//! colored result lines.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::cloud::{RunStatus, StatusLabel};

/// Spinner that follows one run until it reaches a final status.
pub struct RunProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl RunProgress {
    /// Start the spinner for a job that is about to be triggered.
    pub fn start(job_id: u64) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg} [{elapsed}]") {
            pb.set_style(style);
        }
        pb.set_message(format!("Triggering job {job_id}"));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Show the latest snapshot; final snapshots stop the spinner.
    pub fn update(&self, status: &RunStatus) {
        if status.is_running() {
            self.pb.set_message(format!(
                "Run {}: {}",
                status.run_id,
                status.human_status()
            ));
            return;
        }

        self.pb.finish_and_clear();
        let line = match status.status_map() {
            StatusLabel::Success => format!(
                "  {} Run {} succeeded{}",
                self.green.apply_to("✓"),
                status.run_id,
                duration_suffix(status)
            ),
            StatusLabel::ManualTimeout => format!(
                "  {} Run {} did not finish in time",
                self.yellow.apply_to("⏱"),
                status.run_id
            ),
            StatusLabel::Error | StatusLabel::Running => format!(
                "  {} Run {} ended with status {}",
                self.red.apply_to("✗"),
                status.run_id,
                status.human_status()
            ),
        };
        println!("{line}");
    }

    /// Stop the spinner after an error ended the watch early.
    pub fn abandon(&self, message: &str) {
        self.pb.finish_and_clear();
        println!("  {} {message}", self.red.apply_to("✗"));
    }
}

fn duration_suffix(status: &RunStatus) -> String {
    status
        .duration_humanized
        .as_deref()
        .map(|d| format!(" in {d}"))
        .unwrap_or_default()
}

/// Print any serializable payload as pretty JSON.
pub fn print_json<T: serde::Serialize>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}
