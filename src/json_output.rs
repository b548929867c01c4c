//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON per il livello di presentazione.
//!
//! ## Responsabilità:
//! - Emette un messaggio JSON per riga su stdout
//! - Inoltra ogni `JobSnapshot` così com'è
//! - Fornisce interfaccia standardizzata per comunicazione inter-processo
//!
//! ## Tipi di messaggi:
//! - `start`: sorgente letta, configurazione in uso
//! - `snapshot`: transizione del job
//! - `complete`: job terminato, statistiche e file scritti
//! - `error`: errore fuori dal ciclo di vita del job (I/O, config)

use crate::config::Config;
use crate::pipeline::{JobSnapshot, JobState};
use crate::stats::JobStats;
use serde::Serialize;
use std::path::PathBuf;

/// Tipo di messaggio JSON
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum JsonMessage {
    /// Sorgente accettata, job in partenza
    #[serde(rename = "start")]
    Start {
        source: PathBuf,
        size_bytes: u64,
        config: JsonConfig,
    },

    /// Transizione del job
    #[serde(rename = "snapshot")]
    Snapshot { snapshot: JobSnapshot },

    /// Job terminato
    #[serde(rename = "complete")]
    Complete {
        state: JobState,
        stats: Option<JobStats>,
        written: Vec<PathBuf>,
        duration_seconds: f64,
    },

    /// Errore generale
    #[serde(rename = "error")]
    Error {
        message: String,
        details: Option<String>,
    },
}

/// Configurazione per output JSON
#[derive(Debug, Serialize)]
pub struct JsonConfig {
    pub quality: u8,
    pub target_savings: Option<f64>,
    pub upload_latency_ms: u64,
    pub upload_retries: u32,
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn start(source: PathBuf, size_bytes: u64, config: JsonConfig) -> Self {
        Self::Start {
            source,
            size_bytes,
            config,
        }
    }

    pub fn snapshot(snapshot: JobSnapshot) -> Self {
        Self::Snapshot { snapshot }
    }

    pub fn complete(
        state: JobState,
        stats: Option<JobStats>,
        written: Vec<PathBuf>,
        duration_seconds: f64,
    ) -> Self {
        Self::Complete {
            state,
            stats,
            written,
            duration_seconds,
        }
    }

    pub fn error(message: String, details: Option<String>) -> Self {
        Self::Error { message, details }
    }
}

/// Converti Config in JsonConfig
impl From<&Config> for JsonConfig {
    fn from(config: &Config) -> Self {
        Self {
            quality: config.effective_quality(),
            target_savings: config.target_savings,
            upload_latency_ms: config.upload_latency_ms,
            upload_retries: config.upload_retries,
        }
    }
}
