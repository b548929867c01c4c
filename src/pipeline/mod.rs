//! # Pipeline Module
//!
//! Ciclo di vita del job, separato in sottomoduli:
//! - `job`: state machine pura con epoch
//! - `controller`: orchestratore asincrono, intenti e notifiche
//! - `transport`: collaboratore di upload (simulato + retry)
//! - `snapshot`: vista pubblicata ad ogni transizione

pub mod controller;
pub mod job;
pub mod snapshot;
pub mod transport;

pub use controller::JobController;
pub use job::{Job, JobState, JobTicket};
pub use snapshot::JobSnapshot;
pub use transport::{RetryingTransport, SimulatedTransport, Transport};
