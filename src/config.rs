//! # Configuration Management Module
//!
//! Questo modulo gestisce la configurazione della pipeline.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri del job
//! - Fornisce validazione dei parametri di input
//! - Supporta caricamento/salvataggio da/verso file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//!
//! ## Parametri di configurazione:
//! - `quality`: Qualità JPEG dei derivati (1-100, default: 80)
//! - `target_savings`: Risparmio richiesto (0.0-1.0); se presente sostituisce `quality`
//! - `upload_latency_ms`: Latenza del trasporto simulato (default: 600)
//! - `upload_timeout_secs`: Timeout dell'upload (default: 30)
//! - `upload_retries`: Tentativi extra del trasporto prima del fallimento (default: 0)
//! - `retry_backoff_ms`: Attesa tra un tentativo e l'altro (default: 250)
//! - `output_path`: Directory dove scrivere i derivati (default: None)
//! - `json_output`: Snapshot come JSON lines su stdout (default: false)
//!
//! ## Esempio:
//! ```rust
//! use autoscale_pipeline::Config;
//!
//! let config = Config {
//!     quality: 85,
//!     upload_retries: 2,
//!     ..Default::default()
//! };
//! config.validate().unwrap();
//! ```

use crate::stats::quality_for_savings;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// JPEG quality of the derivatives (1-100)
    pub quality: u8,
    /// Requested savings fraction; overrides `quality` when set
    pub target_savings: Option<f64>,
    /// Latency of the simulated upload
    pub upload_latency_ms: u64,
    /// Upper bound for a single upload attempt
    pub upload_timeout_secs: u64,
    /// Extra upload attempts before reporting a transport failure
    pub upload_retries: u32,
    /// Pause between upload attempts
    pub retry_backoff_ms: u64,
    /// Directory where derivatives are written (None = don't write)
    pub output_path: Option<PathBuf>,
    /// Output snapshots as JSON for programmatic use
    pub json_output: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            quality: 80,
            target_savings: None,
            upload_latency_ms: 600,
            upload_timeout_secs: 30,
            upload_retries: 0,
            retry_backoff_ms: 250,
            output_path: None,
            json_output: false,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.quality == 0 || self.quality > 100 {
            return Err(anyhow::anyhow!("Quality must be between 1 and 100"));
        }

        if let Some(target) = self.target_savings {
            if !(0.0..=1.0).contains(&target) {
                return Err(anyhow::anyhow!("Target savings must be between 0.0 and 1.0"));
            }
        }

        if self.upload_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Upload timeout must be greater than 0"));
        }

        if let Some(ref output_path) = self.output_path {
            if output_path.exists() && !output_path.is_dir() {
                return Err(anyhow::anyhow!("Output path is not a directory: {}", output_path.display()));
            }
        }

        Ok(())
    }

    /// Quality handed to the engine, derived from `target_savings` when set
    pub fn effective_quality(&self) -> u8 {
        match self.target_savings {
            Some(target) => quality_for_savings(target),
            None => self.quality,
        }
    }

    pub fn upload_latency(&self) -> Duration {
        Duration::from_millis(self.upload_latency_ms)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Default location: `~/.autoscale/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".autoscale").join("config.json"))
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}
