//! # Job State Machine
//!
//! Il valore `Job` è la state machine pura del ciclo di vita: nessun I/O,
//! nessun task. Il controller lo possiede e gli passa gli eventi.
//!
//! ## Stati:
//! `Idle` → `SourceSelected` → `Uploading` → `Processing` → `Succeeded` | `Failed`
//!
//! ## Epoch:
//! Ogni selezione, start e reset incrementa l'epoch. I completamenti dei
//! collaboratori portano l'epoch del job che li ha avviati e vengono scartati
//! se non corrisponde più.

use super::snapshot::JobSnapshot;
use crate::derivative::DerivativeSet;
use crate::error::{FailureReason, PipelineError};
use crate::source::{PreviewHandle, SourceAsset, SourceSummary};
use crate::stats::JobStats;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Lifecycle state of the job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Idle,
    SourceSelected,
    Uploading,
    Processing,
    Succeeded,
    Failed,
}

impl JobState {
    /// Waiting on a collaborator
    pub fn is_in_flight(self) -> bool {
        matches!(self, JobState::Uploading | JobState::Processing)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobState::Idle => "idle",
            JobState::SourceSelected => "source selected",
            JobState::Uploading => "uploading",
            JobState::Processing => "processing",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Work handed out when a job starts
#[derive(Debug, Clone)]
pub struct JobTicket {
    pub epoch: u64,
    pub source: SourceAsset,
}

/// Results of a succeeded job; owns the preview from then on
#[derive(Debug)]
struct JobResults {
    derivatives: Arc<DerivativeSet>,
    stats: JobStats,
    _preview: Option<PreviewHandle>,
}

/// The single live job
#[derive(Debug)]
pub struct Job {
    state: JobState,
    epoch: u64,
    source: Option<SourceAsset>,
    preview: Option<PreviewHandle>,
    preview_url: Option<String>,
    results: Option<JobResults>,
    failure: Option<FailureReason>,
    reveal_pending: bool,
}

impl Default for Job {
    fn default() -> Self {
        Self::new()
    }
}

impl Job {
    pub fn new() -> Self {
        Self {
            state: JobState::Idle,
            epoch: 0,
            source: None,
            preview: None,
            preview_url: None,
            results: None,
            failure: None,
            reveal_pending: false,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn source(&self) -> Option<&SourceAsset> {
        self.source.as_ref()
    }

    pub fn derivatives(&self) -> Option<&Arc<DerivativeSet>> {
        self.results.as_ref().map(|r| &r.derivatives)
    }

    pub fn stats(&self) -> Option<&JobStats> {
        self.results.as_ref().map(|r| &r.stats)
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        self.failure.as_ref()
    }

    /// `Failed` requires a reset before a new source is taken
    pub fn accepts_selection(&self) -> bool {
        self.state != JobState::Failed
    }

    /// Replaces the source, superseding any in-flight or finished job.
    ///
    /// Returns `false` and leaves the job untouched in `Failed`.
    pub fn select_source(&mut self, asset: SourceAsset, preview: PreviewHandle) -> bool {
        if !self.accepts_selection() {
            warn!("Ignoring source {} while failed, reset first", asset.name());
            return false;
        }

        self.clear();
        self.epoch += 1;
        self.preview_url = Some(preview.url().to_string());
        self.preview = Some(preview);
        self.source = Some(asset);
        self.state = JobState::SourceSelected;
        true
    }

    /// Moves `SourceSelected` to `Uploading`; `None` means the call was a no-op
    pub fn start(&mut self) -> Option<JobTicket> {
        if self.state != JobState::SourceSelected {
            debug!("Start ignored in state {}", self.state);
            return None;
        }
        let Some(source) = self.source.clone() else {
            debug!("Start ignored: {}", PipelineError::NoSourceSelected);
            return None;
        };

        self.epoch += 1;
        self.state = JobState::Uploading;
        Some(JobTicket {
            epoch: self.epoch,
            source,
        })
    }

    /// Back to `Idle`; always succeeds
    pub fn reset(&mut self) {
        self.clear();
        self.epoch += 1;
        self.state = JobState::Idle;
    }

    /// Transfer finished for the job tagged `epoch`
    pub fn complete_upload(&mut self, epoch: u64) -> bool {
        if !self.is_current(epoch, JobState::Uploading) {
            return false;
        }
        self.state = JobState::Processing;
        true
    }

    /// Engine and stats finished for the job tagged `epoch`.
    ///
    /// An incomplete set is never surfaced; the job fails instead.
    pub fn complete_generation(&mut self, epoch: u64, mut derivatives: DerivativeSet, stats: JobStats) -> bool {
        if !self.is_current(epoch, JobState::Processing) {
            return false;
        }

        if !derivatives.is_complete() {
            let err = PipelineError::DecodeFailure(format!(
                "engine returned an incomplete derivative set: {:?}",
                derivatives.names()
            ));
            return self.fail(epoch, &err);
        }

        let preview = self.preview.take();
        if let Some(ref handle) = preview {
            derivatives.relocate_original(handle.url());
        }

        self.results = Some(JobResults {
            derivatives: Arc::new(derivatives),
            stats,
            _preview: preview,
        });
        self.state = JobState::Succeeded;
        self.reveal_pending = true;
        true
    }

    /// A collaborator failed for the job tagged `epoch`
    pub fn fail(&mut self, epoch: u64, err: &PipelineError) -> bool {
        let Ok(reason) = FailureReason::try_from(err) else {
            return false;
        };
        if epoch != self.epoch || !self.state.is_in_flight() {
            debug!("Dropping stale failure for epoch {}: {}", epoch, err);
            return false;
        }

        self.failure = Some(reason);
        self.state = JobState::Failed;
        true
    }

    /// Snapshot for subscribers; the results hint is handed out only once
    pub fn snapshot(&mut self) -> JobSnapshot {
        let reveal = self.reveal_pending && self.state == JobState::Succeeded;
        self.reveal_pending = false;
        self.build_snapshot(reveal)
    }

    /// Snapshot without consuming the results hint
    pub fn peek(&self) -> JobSnapshot {
        self.build_snapshot(false)
    }

    fn build_snapshot(&self, reveal_results: bool) -> JobSnapshot {
        JobSnapshot {
            epoch: self.epoch,
            state: self.state,
            source: self.source.as_ref().map(|asset| {
                SourceSummary::describe(asset, self.preview_url.as_deref().unwrap_or_default())
            }),
            derivatives: self.derivatives().cloned(),
            stats: self.stats().cloned(),
            error_kind: self.failure.as_ref().map(|f| f.kind),
            error_reason: self.failure.as_ref().map(|f| f.message.clone()),
            reveal_results,
        }
    }

    fn is_current(&self, epoch: u64, expected: JobState) -> bool {
        if epoch != self.epoch || self.state != expected {
            debug!(
                "Dropping stale completion for epoch {} (current epoch {}, state {})",
                epoch, self.epoch, self.state
            );
            return false;
        }
        true
    }

    fn clear(&mut self) {
        // Results first: they may own the preview of the previous source.
        self.results = None;
        self.preview = None;
        self.preview_url = None;
        self.source = None;
        self.failure = None;
        self.reveal_pending = false;
    }
}
