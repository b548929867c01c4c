//! Outbound view of the job, emitted on every transition.

use super::job::JobState;
use crate::derivative::DerivativeSet;
use crate::error::FailureKind;
use crate::source::SourceSummary;
use crate::stats::JobStats;
use serde::Serialize;
use std::sync::Arc;

/// Everything the presentation layer needs to render the job
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub epoch: u64,
    pub state: JobState,
    pub source: Option<SourceSummary>,
    /// Present only in `Succeeded`
    pub derivatives: Option<Arc<DerivativeSet>>,
    /// Present only in `Succeeded`
    pub stats: Option<JobStats>,
    pub error_kind: Option<FailureKind>,
    /// Human-readable, present only in `Failed`
    pub error_reason: Option<String>,
    /// Set once, on the snapshot that enters `Succeeded`
    pub reveal_results: bool,
}

impl JobSnapshot {
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
