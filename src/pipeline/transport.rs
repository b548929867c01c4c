//! # Transport Module
//!
//! Collaboratore che porta la sorgente al backend di generazione.
//!
//! ## Implementazioni:
//! - `SimulatedTransport`: attende una latenza fissa, nessuna rete
//! - `RetryingTransport`: wrapper con timeout per tentativo e retry policy
//!
//! La state machine non ritenta mai: un errore che esce dal trasporto è
//! definitivo e porta il job in `Failed`.

use crate::error::PipelineError;
use crate::source::SourceAsset;
use futures::future::{BoxFuture, FutureExt};
use std::time::Duration;
use tracing::{debug, warn};

/// Moves a source to wherever derivatives are generated
pub trait Transport: Send + Sync {
    fn upload<'a>(&'a self, source: &'a SourceAsset) -> BoxFuture<'a, Result<(), PipelineError>>;
}

/// Stand-in transport that only waits
#[derive(Debug, Clone)]
pub struct SimulatedTransport {
    latency: Duration,
}

impl SimulatedTransport {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::new(Duration::from_millis(600))
    }
}

impl Transport for SimulatedTransport {
    fn upload<'a>(&'a self, source: &'a SourceAsset) -> BoxFuture<'a, Result<(), PipelineError>> {
        async move {
            tokio::time::sleep(self.latency).await;
            debug!("Simulated upload of {} ({} bytes) done", source.name(), source.size());
            Ok(())
        }
        .boxed()
    }
}

/// Adds a per-attempt timeout and bounded retries to another transport.
///
/// Only `TransportFailure`s are retried; once attempts run out the last
/// failure is returned.
pub struct RetryingTransport<T> {
    inner: T,
    max_retries: u32,
    backoff: Duration,
    attempt_timeout: Duration,
}

impl<T: Transport> RetryingTransport<T> {
    pub fn new(inner: T, max_retries: u32, backoff: Duration, attempt_timeout: Duration) -> Self {
        Self {
            inner,
            max_retries,
            backoff,
            attempt_timeout,
        }
    }

    async fn attempt(&self, source: &SourceAsset) -> Result<(), PipelineError> {
        match tokio::time::timeout(self.attempt_timeout, self.inner.upload(source)).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::TransportFailure(format!(
                "upload timed out after {:?}",
                self.attempt_timeout
            ))),
        }
    }
}

impl<T: Transport> Transport for RetryingTransport<T> {
    fn upload<'a>(&'a self, source: &'a SourceAsset) -> BoxFuture<'a, Result<(), PipelineError>> {
        async move {
            let mut attempt = 0;
            loop {
                match self.attempt(source).await {
                    Ok(()) => return Ok(()),
                    Err(err @ PipelineError::TransportFailure(_)) if attempt < self.max_retries => {
                        attempt += 1;
                        warn!(
                            "Upload of {} failed ({}), retry {}/{}",
                            source.name(),
                            err,
                            attempt,
                            self.max_retries
                        );
                        tokio::time::sleep(self.backoff).await;
                    }
                    Err(err) => return Err(err),
                }
            }
        }
        .boxed()
    }
}
