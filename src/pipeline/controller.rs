//! # Job Controller
//!
//! Orchestratore asincrono che possiede il `Job` e lo espone al livello di
//! presentazione.
//!
//! ## Responsabilità:
//! - Riceve gli intenti `select_source`, `start`, `reset` (ritornano subito)
//! - Avvia un task tokio per job: upload tramite `Transport`, generazione su
//!   `spawn_blocking`, calcolo statistiche
//! - Pubblica uno `JobSnapshot` per ogni transizione su un canale broadcast
//! - Annulla il task in volo su reset o nuova selezione; i risultati tardivi
//!   con epoch diverso vengono scartati dal `Job`
//!
//! Gli snapshot sono inviati mentre si tiene il lock del job, quindi l'ordine
//! osservato dai subscriber è quello delle transizioni.

use super::job::{Job, JobTicket};
use super::snapshot::JobSnapshot;
use super::transport::{RetryingTransport, SimulatedTransport, Transport};
use crate::config::Config;
use crate::derivative::{DerivativeEngine, ImageEngine};
use crate::error::PipelineError;
use crate::source::{PreviewHandle, PreviewRegistry, SourceAsset};
use crate::stats::compute_stats;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Buffered snapshots per subscriber before the slowest one lags
const SNAPSHOT_CAPACITY: usize = 64;

struct Slot {
    job: Job,
    task: Option<JoinHandle<()>>,
}

struct Shared {
    slot: Mutex<Slot>,
    events: broadcast::Sender<JobSnapshot>,
    previews: PreviewRegistry,
    transport: Arc<dyn Transport>,
    engine: Arc<dyn DerivativeEngine>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, slot: &mut Slot) {
        let snapshot = slot.job.snapshot();
        info!("Job {} is {}", snapshot.epoch, snapshot.state);
        // No subscribers is fine.
        let _ = self.events.send(snapshot);
    }

    /// Applies a completion under the lock and publishes it if it took effect
    fn apply(&self, event: impl FnOnce(&mut Job) -> bool) -> bool {
        let mut slot = self.lock();
        let changed = event(&mut slot.job);
        if changed {
            if slot.job.state().is_terminal() {
                slot.task = None;
            }
            self.publish(&mut slot);
        }
        changed
    }
}

/// Owns the live job and drives it through its lifecycle
#[derive(Clone)]
pub struct JobController {
    shared: Arc<Shared>,
}

impl JobController {
    /// Creates a controller with explicit collaborators
    pub fn new(transport: Arc<dyn Transport>, engine: Arc<dyn DerivativeEngine>) -> Self {
        Self::with_previews(transport, engine, PreviewRegistry::new())
    }

    /// Same as `new`, sharing an existing preview registry
    pub fn with_previews(
        transport: Arc<dyn Transport>,
        engine: Arc<dyn DerivativeEngine>,
        previews: PreviewRegistry,
    ) -> Self {
        let (events, _) = broadcast::channel(SNAPSHOT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot {
                    job: Job::new(),
                    task: None,
                }),
                events,
                previews,
                transport,
                engine,
            }),
        }
    }

    /// Simulated transport with retries and the in-process image engine
    pub fn from_config(config: &Config) -> Self {
        let transport = RetryingTransport::new(
            SimulatedTransport::new(config.upload_latency()),
            config.upload_retries,
            config.retry_backoff(),
            config.upload_timeout(),
        );
        let engine = ImageEngine::new(config.effective_quality());
        Self::new(Arc::new(transport), Arc::new(engine))
    }

    /// Receives every snapshot published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<JobSnapshot> {
        self.shared.events.subscribe()
    }

    /// Current state without consuming the one-time results hint
    pub fn snapshot(&self) -> JobSnapshot {
        self.shared.lock().job.peek()
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.shared.previews
    }

    /// Takes a new source, superseding any previous job.
    ///
    /// Ignored (returns `false`) while the job is `Failed`.
    pub fn select_source(&self, bytes: impl Into<Vec<u8>>, mime: &str, name: &str) -> bool {
        if !self.shared.lock().job.accepts_selection() {
            warn!("Source {} ignored: job failed, reset first", name);
            return false;
        }

        let (asset, preview) = self.prepare_source(bytes, mime, name);

        let mut slot = self.shared.lock();
        if !slot.job.accepts_selection() {
            warn!("Source {} ignored: job failed while it was prepared", name);
            return false;
        }

        if let Some(task) = slot.task.take() {
            debug!("Cancelling in-flight job {}", slot.job.epoch());
            task.abort();
        }
        info!("Selected {} ({} bytes, {})", asset.name(), asset.size(), asset.mime());

        let accepted = slot.job.select_source(asset, preview);
        if accepted {
            self.shared.publish(&mut slot);
        }
        accepted
    }

    /// Hashes the source and allocates its preview without touching the job lock
    fn prepare_source(&self, bytes: impl Into<Vec<u8>>, mime: &str, name: &str) -> (SourceAsset, PreviewHandle) {
        let asset = SourceAsset::new(bytes, mime, name);
        let preview = self.shared.previews.allocate(&asset);
        (asset, preview)
    }

    /// Starts the selected job and returns immediately.
    ///
    /// No-op without a source or while a job is in flight. Must be called
    /// from within a Tokio runtime.
    pub fn start(&self) -> bool {
        let mut slot = self.shared.lock();
        let Some(ticket) = slot.job.start() else {
            return false;
        };
        self.shared.publish(&mut slot);

        let shared = Arc::clone(&self.shared);
        slot.task = Some(tokio::spawn(run_job(shared, ticket)));
        true
    }

    /// Returns to `Idle`, cancelling in-flight work. Always succeeds.
    pub fn reset(&self) {
        let mut slot = self.shared.lock();
        if let Some(task) = slot.task.take() {
            debug!("Cancelling in-flight job {}", slot.job.epoch());
            task.abort();
        }
        slot.job.reset();
        self.shared.publish(&mut slot);
    }
}

async fn run_job(shared: Arc<Shared>, ticket: JobTicket) {
    let JobTicket { epoch, source } = ticket;
    debug!("Job {} uploading {}", epoch, source.name());

    if let Err(err) = shared.transport.upload(&source).await {
        error!("Job {} upload failed: {}", epoch, err);
        shared.apply(|job| job.fail(epoch, &err));
        return;
    }

    if !shared.apply(|job| job.complete_upload(epoch)) {
        debug!("Job {} superseded after upload", epoch);
        return;
    }

    let engine = Arc::clone(&shared.engine);
    let quality = engine.quality();
    let original_size = source.size();
    let started = Instant::now();

    let generated = tokio::task::spawn_blocking(move || engine.generate(&source)).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match generated {
        Ok(Ok(derivatives)) => {
            let stats = compute_stats(original_size, &derivatives.output_sizes(), quality, elapsed_ms);
            info!(
                "Job {} generated {} assets in {} ms, savings {}",
                epoch,
                derivatives.len(),
                elapsed_ms,
                stats.savings_percent
            );
            shared.apply(|job| job.complete_generation(epoch, derivatives, stats));
        }
        Ok(Err(err)) => {
            error!("Job {} generation failed: {}", epoch, err);
            shared.apply(|job| job.fail(epoch, &err));
        }
        Err(join_err) => {
            let err = PipelineError::DecodeFailure(format!("generation ended abnormally: {}", join_err));
            error!("Job {} {}", epoch, err);
            shared.apply(|job| job.fail(epoch, &err));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derivative::engine::test_images::{jpeg, padded_jpeg};
    use crate::derivative::DerivativeSet;
    use crate::error::{FailureKind, GenerationError};
    use crate::pipeline::JobState;
    use futures::future::{BoxFuture, FutureExt};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Condvar;
    use std::time::Duration;
    use tokio::sync::broadcast::error::TryRecvError;

    const WAIT: Duration = Duration::from_secs(30);

    fn fast_transport() -> Arc<dyn Transport> {
        Arc::new(SimulatedTransport::new(Duration::from_millis(5)))
    }

    fn controller() -> JobController {
        JobController::new(fast_transport(), Arc::new(ImageEngine::new(80)))
    }

    async fn next(rx: &mut broadcast::Receiver<JobSnapshot>) -> JobSnapshot {
        tokio::time::timeout(WAIT, rx.recv())
            .await
            .expect("timed out waiting for a snapshot")
            .expect("snapshot channel closed")
    }

    async fn until_terminal(rx: &mut broadcast::Receiver<JobSnapshot>) -> Vec<JobSnapshot> {
        let mut seen = Vec::new();
        loop {
            let snapshot = next(rx).await;
            let done = snapshot.is_terminal();
            seen.push(snapshot);
            if done {
                return seen;
            }
        }
    }

    struct FailingTransport;

    impl Transport for FailingTransport {
        fn upload<'a>(&'a self, _source: &'a SourceAsset) -> BoxFuture<'a, Result<(), PipelineError>> {
            async { Err(PipelineError::TransportFailure("network unreachable".into())) }.boxed()
        }
    }

    /// Blocks its first `generate` call until released; later calls pass through
    struct GatedEngine {
        inner: ImageEngine,
        calls: AtomicUsize,
        gate: Arc<(Mutex<bool>, Condvar)>,
    }

    impl GatedEngine {
        fn new() -> Self {
            Self {
                inner: ImageEngine::new(80),
                calls: AtomicUsize::new(0),
                gate: Arc::new((Mutex::new(false), Condvar::new())),
            }
        }

        fn release(&self) {
            let (open, cvar) = &*self.gate;
            *open.lock().unwrap() = true;
            cvar.notify_all();
        }
    }

    impl DerivativeEngine for GatedEngine {
        fn quality(&self) -> u8 {
            self.inner.quality()
        }

        fn generate(&self, source: &SourceAsset) -> Result<DerivativeSet, GenerationError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                let (open, cvar) = &*self.gate;
                let mut released = open.lock().unwrap();
                while !*released {
                    released = cvar.wait(released).unwrap();
                }
            }
            self.inner.generate(source)
        }
    }

    #[tokio::test]
    async fn test_end_to_end_two_megabyte_jpeg() {
        let controller = controller();
        let mut rx = controller.subscribe();

        let bytes = padded_jpeg(400, 300, 2_000_000);
        assert!(controller.select_source(bytes, "image/jpeg", "holiday.jpg"));
        assert_eq!(next(&mut rx).await.state, JobState::SourceSelected);

        assert!(controller.start());
        let seen = until_terminal(&mut rx).await;
        let states: Vec<JobState> = seen.iter().map(|s| s.state).collect();
        assert_eq!(states, [JobState::Uploading, JobState::Processing, JobState::Succeeded]);

        let done = seen.last().unwrap();
        assert!(done.reveal_results);
        assert!(seen[..2].iter().all(|s| s.derivatives.is_none() && s.stats.is_none()));

        let derivatives = done.derivatives.as_ref().unwrap();
        assert_eq!(derivatives.names(), ["thumbnail", "standard", "desktop", "original"]);

        let stats = done.stats.as_ref().unwrap();
        assert_eq!(stats.original_size_kb, 1953);
        assert_eq!(stats.quality_used, 80);
        assert!(stats.total_output_kb < stats.original_size_kb);

        // Preview survives success and backs the original entry.
        let original = derivatives.original().unwrap();
        assert_eq!(original.size_bytes, 2_000_000);
        assert!(controller.previews().is_live(&original.location));
        assert!(!controller.snapshot().reveal_results);

        controller.reset();
        assert_eq!(controller.previews().live_count(), 0);
    }

    #[test]
    fn test_source_prepared_outside_job_lock() {
        let controller = controller();
        let guard = controller.shared.lock();

        let (tx, rx) = std::sync::mpsc::channel();
        let worker = controller.clone();
        std::thread::spawn(move || {
            let (asset, preview) = worker.prepare_source(vec![7u8; 8 * 1024 * 1024], "image/jpeg", "big.jpg");
            let _ = tx.send((asset.size(), preview.url().to_string()));
        });

        let (size, url) = rx.recv_timeout(WAIT).expect("preparing a source waited on the job lock");
        assert_eq!(size, 8 * 1024 * 1024);
        assert!(url.starts_with("preview://"));
        drop(guard);
    }

    #[tokio::test]
    async fn test_start_without_source_emits_nothing() {
        let controller = controller();
        let mut rx = controller.subscribe();

        assert!(!controller.start());
        assert_eq!(controller.snapshot().state, JobState::Idle);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_reset_twice() {
        let controller = controller();
        controller.select_source(jpeg(300, 300), "image/jpeg", "a.jpg");
        let mut rx = controller.subscribe();

        for _ in 0..2 {
            controller.reset();
            let snapshot = next(&mut rx).await;
            assert_eq!(snapshot.state, JobState::Idle);
            assert!(snapshot.derivatives.is_none());
            assert!(snapshot.stats.is_none());
            assert!(snapshot.error_reason.is_none());
        }
        assert_eq!(controller.previews().live_count(), 0);
    }

    #[tokio::test]
    async fn test_late_result_of_superseded_job_is_dropped() {
        let engine = Arc::new(GatedEngine::new());
        let controller = JobController::new(fast_transport(), engine.clone());
        let mut rx = controller.subscribe();

        controller.select_source(jpeg(300, 200), "image/jpeg", "a.jpg");
        controller.start();
        let states: Vec<JobState> = vec![
            next(&mut rx).await.state,
            next(&mut rx).await.state,
            next(&mut rx).await.state,
        ];
        assert_eq!(states, [JobState::SourceSelected, JobState::Uploading, JobState::Processing]);

        // Job A is stuck in the engine; supersede it with B.
        controller.select_source(jpeg(500, 400), "image/jpeg", "b.jpg");
        controller.start();
        let b_selected = next(&mut rx).await;
        assert_eq!(b_selected.state, JobState::SourceSelected);
        let b_id = b_selected.source.as_ref().unwrap().id.clone();

        let b_done = until_terminal(&mut rx).await.pop().unwrap();
        assert_eq!(b_done.state, JobState::Succeeded);

        // Let A finish late.
        engine.release();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        let current = controller.snapshot();
        assert_eq!(current.state, JobState::Succeeded);
        assert_eq!(current.epoch, b_done.epoch);
        assert_eq!(current.source.unwrap().id, b_id);
        assert_eq!(controller.previews().live_count(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_then_reset() {
        let controller = JobController::new(Arc::new(FailingTransport), Arc::new(ImageEngine::default()));
        let mut rx = controller.subscribe();

        controller.select_source(jpeg(300, 300), "image/jpeg", "a.jpg");
        controller.start();
        let failed = until_terminal(&mut rx).await.pop().unwrap();

        assert_eq!(failed.state, JobState::Failed);
        assert_eq!(failed.error_kind, Some(FailureKind::TransportFailure));
        assert!(failed.error_reason.unwrap().contains("network unreachable"));
        assert!(failed.derivatives.is_none() && failed.stats.is_none());

        assert!(!controller.start());
        assert!(!controller.select_source(jpeg(300, 300), "image/jpeg", "b.jpg"));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

        controller.reset();
        assert_eq!(next(&mut rx).await.state, JobState::Idle);
        assert_eq!(controller.previews().live_count(), 0);
        assert!(controller.select_source(jpeg(300, 300), "image/jpeg", "b.jpg"));
    }

    #[tokio::test]
    async fn test_generation_errors_surface_as_failed() {
        let cases: Vec<(Vec<u8>, &str, FailureKind)> = vec![
            (b"GIF89a not really".to_vec(), "image/gif", FailureKind::UnsupportedFormat),
            (jpeg(300, 300)[..80].to_vec(), "image/jpeg", FailureKind::DecodeFailure),
            (jpeg(100, 100), "image/jpeg", FailureKind::DimensionTooSmall),
        ];

        for (bytes, mime, kind) in cases {
            let controller = controller();
            let mut rx = controller.subscribe();
            controller.select_source(bytes, mime, "input");
            controller.start();

            let failed = until_terminal(&mut rx).await.pop().unwrap();
            assert_eq!(failed.state, JobState::Failed, "{:?}", kind);
            assert_eq!(failed.error_kind, Some(kind));
            assert!(failed.derivatives.is_none());
        }
    }

    #[tokio::test]
    async fn test_reset_while_uploading_cancels() {
        let slow: Arc<dyn Transport> = Arc::new(SimulatedTransport::new(Duration::from_millis(300)));
        let controller = JobController::new(slow, Arc::new(ImageEngine::default()));
        let mut rx = controller.subscribe();

        controller.select_source(jpeg(300, 300), "image/jpeg", "a.jpg");
        controller.start();
        assert_eq!(next(&mut rx).await.state, JobState::SourceSelected);
        assert_eq!(next(&mut rx).await.state, JobState::Uploading);

        controller.reset();
        assert_eq!(next(&mut rx).await.state, JobState::Idle);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(controller.snapshot().state, JobState::Idle);
    }

    #[tokio::test]
    async fn test_start_while_in_flight_is_noop() {
        let slow: Arc<dyn Transport> = Arc::new(SimulatedTransport::new(Duration::from_millis(200)));
        let controller = JobController::new(slow, Arc::new(ImageEngine::default()));

        controller.select_source(jpeg(300, 300), "image/jpeg", "a.jpg");
        assert!(controller.start());
        let epoch = controller.snapshot().epoch;
        assert!(!controller.start());
        assert_eq!(controller.snapshot().epoch, epoch);
        assert_eq!(controller.snapshot().state, JobState::Uploading);
    }

    #[tokio::test]
    async fn test_from_config_uses_effective_quality() {
        let config = Config {
            target_savings: Some(0.5),
            upload_latency_ms: 1,
            ..Default::default()
        };
        let controller = JobController::from_config(&config);
        let mut rx = controller.subscribe();

        controller.select_source(jpeg(320, 240), "image/jpeg", "a.jpg");
        controller.start();
        let done = until_terminal(&mut rx).await.pop().unwrap();
        assert_eq!(done.stats.unwrap().quality_used, config.effective_quality());
    }
}
