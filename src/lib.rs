//! # Autoscale Pipeline Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare della pipeline
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri livelli di presentazione
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione e validazione parametri
//! - `error`: Tassonomia degli errori del job e motivi leggibili
//! - `source`: Sorgente selezionata e preview con rilascio garantito
//! - `derivative`: Tabella dei tier e motore di generazione dei derivati
//! - `stats`: Statistiche di efficienza e policy di qualità
//! - `pipeline`: State machine del job, trasporto e controller asincrono
//! - `file_manager`: Lettura della sorgente e scrittura dei derivati
//! - `progress`: Spinner e riepilogo per la CLI
//! - `json_output`: Output JSON lines per uso programmatico
//!
//! ## Utilizzo:
//! ```no_run
//! use autoscale_pipeline::{Config, JobController, JobState};
//!
//! # async fn run(bytes: Vec<u8>) {
//! let controller = JobController::from_config(&Config::default());
//! let mut rx = controller.subscribe();
//!
//! controller.select_source(bytes, "image/jpeg", "holiday.jpg");
//! controller.start();
//!
//! while let Ok(snapshot) = rx.recv().await {
//!     if snapshot.state == JobState::Succeeded {
//!         println!("{:?}", snapshot.stats);
//!         break;
//!     }
//! }
//! # }
//! ```

pub mod config;
pub mod derivative;
pub mod error;
pub mod file_manager;
pub mod json_output;
pub mod pipeline;
pub mod progress;
pub mod source;
pub mod stats;
pub mod utils;

pub use config::Config;
pub use derivative::{DerivativeAsset, DerivativeEngine, DerivativeSet, DerivativeSpec, ImageEngine, DERIVATIVE_SPECS};
pub use error::{FailureKind, FailureReason, GenerationError, PipelineError};
pub use pipeline::{Job, JobController, JobSnapshot, JobState, SimulatedTransport, RetryingTransport, Transport};
pub use source::{PreviewHandle, PreviewRegistry, SourceAsset, SourceSummary};
pub use stats::{compute_stats, quality_for_savings, JobStats};
