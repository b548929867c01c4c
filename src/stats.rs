//! # Job Statistics Module
//!
//! Questo modulo calcola le statistiche di efficienza di un job.
//!
//! ## Responsabilità:
//! - `compute_stats()`: funzione pura da dimensioni in byte a `JobStats`
//! - `quality_for_savings()`: policy monotona per scegliere la qualità JPEG
//!
//! ## Arrotondamento:
//! Tutti i valori in KB passano da `bytes_to_kb()`, quindi originale e output
//! sono arrotondati con la stessa funzione monotona. Se gli output non superano
//! l'originale, `total_output_kb <= original_size_kb` e la riduzione non è mai
//! negativa. Se gli output superano l'originale la riduzione satura a zero.
//!
//! ## Esempio:
//! ```rust
//! use autoscale_pipeline::stats::compute_stats;
//!
//! let stats = compute_stats(2_000_000, &[12_000, 90_000, 300_000], 80, 450);
//! assert_eq!(stats.savings_percent, "80%");
//! assert!(stats.total_output_kb < stats.original_size_kb);
//! ```

use crate::utils::bytes_to_kb;
use serde::{Deserialize, Serialize};

/// Lowest quality the encoder accepts
pub const MIN_QUALITY: u8 = 1;
/// Highest quality the encoder accepts
pub const MAX_QUALITY: u8 = 100;

/// Size and efficiency figures for one finished job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStats {
    pub quality_used: u8,
    /// Rounded percentage, e.g. `"65%"`
    pub savings_percent: String,
    pub processing_time_ms: u64,
    pub original_size_kb: u64,
    pub total_output_kb: u64,
}

impl JobStats {
    /// Kilobytes saved by the derivatives, never negative
    pub fn reduced_kb(&self) -> u64 {
        self.original_size_kb.saturating_sub(self.total_output_kb)
    }
}

/// Builds the statistics for a job from raw byte counts.
///
/// `output_sizes` holds the encoded derivative sizes; the unmodified
/// `original` entry is not an output and must not be included.
pub fn compute_stats(
    original_size: u64,
    output_sizes: &[u64],
    quality_used: u8,
    elapsed_ms: u64,
) -> JobStats {
    let total_output: u64 = output_sizes.iter().copied().fold(0u64, u64::saturating_add);

    let savings = if original_size > 0 {
        let ratio = 1.0 - (total_output as f64 / original_size as f64);
        (ratio * 100.0).round().clamp(0.0, 100.0) as u8
    } else {
        0
    };

    JobStats {
        quality_used: quality_used.min(MAX_QUALITY),
        savings_percent: format!("{}%", savings),
        processing_time_ms: elapsed_ms,
        original_size_kb: bytes_to_kb(original_size),
        total_output_kb: bytes_to_kb(total_output),
    }
}

/// Maps a requested savings fraction (`0.0..=1.0`) to an encoder quality.
///
/// Higher requested savings never yields a higher quality. Out-of-range
/// targets are clamped; `NaN` is treated as "no savings requested".
pub fn quality_for_savings(target_savings: f64) -> u8 {
    let target = if target_savings.is_nan() {
        0.0
    } else {
        target_savings.clamp(0.0, 1.0)
    };
    let span = f64::from(MAX_QUALITY - MIN_QUALITY);
    let quality = f64::from(MAX_QUALITY) - (target * span).round();
    (quality as u8).clamp(MIN_QUALITY, MAX_QUALITY)
}
