//! # Progress Module
//!
//! Feedback visivo per la CLI mentre il job avanza.
//!
//! ## Responsabilità:
//! - Spinner `indicatif` durante `Uploading` e `Processing`
//! - Riepilogo finale delle statistiche in formato leggibile
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:00:01] Processing holiday.jpg...
//! ✔ Efficiency (80%): 96% | Latency: 412ms | Reduced: 1876 KB
//! ```

use crate::pipeline::{JobSnapshot, JobState};
use crate::stats::JobStats;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner that follows the job state
#[derive(Clone)]
pub struct StageProgress {
    bar: ProgressBar,
}

impl Default for StageProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl StageProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update the message for a new snapshot
    pub fn update(&self, snapshot: &JobSnapshot) {
        if let Some(message) = stage_message(snapshot) {
            self.bar.set_message(message);
        }
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    /// Stop the spinner, leaving the last message visible
    pub fn abandon(&self, message: &str) {
        self.bar.abandon_with_message(message.to_string());
    }
}

/// Line shown while a job is in a given state
pub fn stage_message(snapshot: &JobSnapshot) -> Option<String> {
    let name = snapshot
        .source
        .as_ref()
        .map(|s| s.name.as_str())
        .unwrap_or("source");

    match snapshot.state {
        JobState::Idle => None,
        JobState::SourceSelected => Some(format!("Selected {}", name)),
        JobState::Uploading => Some(format!("Uploading {}...", name)),
        JobState::Processing => Some(format!("Processing {}...", name)),
        JobState::Succeeded => Some(format!("Generated assets for {}", name)),
        JobState::Failed => Some(format!(
            "Failed: {}",
            snapshot.error_reason.as_deref().unwrap_or("unknown error")
        )),
    }
}

/// One-line efficiency summary
pub fn format_summary(stats: &JobStats) -> String {
    format!(
        "Efficiency ({}%): {} | Latency: {}ms | Reduced: {} KB",
        stats.quality_used,
        stats.savings_percent,
        stats.processing_time_ms,
        stats.reduced_kb()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Job;
    use crate::stats::compute_stats;

    #[test]
    fn test_summary() {
        let stats = compute_stats(2_000_000, &[700_000], 80, 450);
        assert_eq!(
            format_summary(&stats),
            "Efficiency (80%): 65% | Latency: 450ms | Reduced: 1269 KB"
        );
    }

    #[test]
    fn test_stage_messages() {
        let mut snapshot = Job::new().peek();
        assert_eq!(stage_message(&snapshot), None);

        snapshot.state = JobState::Uploading;
        assert_eq!(stage_message(&snapshot).unwrap(), "Uploading source...");

        snapshot.state = JobState::Failed;
        snapshot.error_reason = Some("The image is too small".into());
        assert_eq!(stage_message(&snapshot).unwrap(), "Failed: The image is too small");
    }
}
