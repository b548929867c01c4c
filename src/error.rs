//! # Error Types Module
//!
//! Questo modulo definisce i tipi di errore della pipeline.
//!
//! ## Responsabilità:
//! - Definisce `PipelineError` per tutti gli errori dei collaboratori
//! - Definisce `FailureKind`, il codice tipizzato esposto nello stato `Failed`
//! - Produce `FailureReason`, il messaggio leggibile mostrato all'utente
//!
//! ## Categorie di errori:
//! - `NoSourceSelected`: start senza sorgente (ignorato, mai riportato)
//! - `TransportFailure`: upload fallito dopo la retry policy del trasporto
//! - `UnsupportedFormat`: mime o formato immagine non supportato
//! - `DecodeFailure`: dati immagine corrotti
//! - `DimensionTooSmall`: sorgente più piccola del tier minimo
//!
//! ## Esempio:
//! ```rust
//! use autoscale_pipeline::error::{FailureKind, FailureReason, PipelineError};
//!
//! let err = PipelineError::DimensionTooSmall { width: 64, height: 64, min_side: 150 };
//! let reason = FailureReason::try_from(&err).unwrap();
//! assert_eq!(reason.kind, FailureKind::DimensionTooSmall);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors raised by the pipeline and its collaborators
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("No source selected")]
    NoSourceSelected,

    #[error("Transport failure: {0}")]
    TransportFailure(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Decode failure: {0}")]
    DecodeFailure(String),

    #[error("Source is {width}x{height}, every side must be at least {min_side}px")]
    DimensionTooSmall { width: u32, height: u32, min_side: u32 },
}

/// Errors a derivative engine may report
pub type GenerationError = PipelineError;

impl From<image::ImageError> for PipelineError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Unsupported(e) => PipelineError::UnsupportedFormat(e.to_string()),
            other => PipelineError::DecodeFailure(other.to_string()),
        }
    }
}

/// Typed failure code carried by a `Failed` job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    TransportFailure,
    UnsupportedFormat,
    DecodeFailure,
    DimensionTooSmall,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            FailureKind::TransportFailure => "transport_failure",
            FailureKind::UnsupportedFormat => "unsupported_format",
            FailureKind::DecodeFailure => "decode_failure",
            FailureKind::DimensionTooSmall => "dimension_too_small",
        };
        f.write_str(code)
    }
}

/// Kind plus a human-readable explanation for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    pub kind: FailureKind,
    pub message: String,
}

impl PipelineError {
    /// Failure code for errors that end a job, `None` for ignored ones
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            PipelineError::NoSourceSelected => None,
            PipelineError::TransportFailure(_) => Some(FailureKind::TransportFailure),
            PipelineError::UnsupportedFormat(_) => Some(FailureKind::UnsupportedFormat),
            PipelineError::DecodeFailure(_) => Some(FailureKind::DecodeFailure),
            PipelineError::DimensionTooSmall { .. } => Some(FailureKind::DimensionTooSmall),
        }
    }
}

/// Only errors that end a job have a reason; `NoSourceSelected` is handed back.
impl TryFrom<&PipelineError> for FailureReason {
    type Error = PipelineError;

    fn try_from(err: &PipelineError) -> Result<Self, Self::Error> {
        let message = match err {
            PipelineError::NoSourceSelected => return Err(err.clone()),
            PipelineError::TransportFailure(detail) => {
                format!("The upload could not be completed ({detail}). Reset and try again.")
            }
            PipelineError::UnsupportedFormat(detail) => {
                format!("This file type is not supported ({detail}). Use a JPEG, PNG or WebP image.")
            }
            PipelineError::DecodeFailure(detail) => {
                format!("The image could not be read, it may be corrupted ({detail}).")
            }
            PipelineError::DimensionTooSmall { width, height, min_side } => format!(
                "The image is too small ({width}x{height}). Both sides must be at least {min_side} pixels."
            ),
        };
        let kind = err.failure_kind().ok_or_else(|| err.clone())?;
        Ok(Self { kind, message })
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_mapping() {
        assert_eq!(PipelineError::NoSourceSelected.failure_kind(), None);
        assert_eq!(
            PipelineError::TransportFailure("reset".into()).failure_kind(),
            Some(FailureKind::TransportFailure)
        );
        assert_eq!(
            PipelineError::DimensionTooSmall { width: 10, height: 10, min_side: 150 }.failure_kind(),
            Some(FailureKind::DimensionTooSmall)
        );
    }

    #[test]
    fn test_reason_is_distinct_from_kind() {
        let err = PipelineError::DecodeFailure("truncated stream".into());
        let reason = FailureReason::try_from(&err).unwrap();
        assert_eq!(reason.kind, FailureKind::DecodeFailure);
        assert_ne!(reason.message, reason.kind.to_string());
        assert!(reason.message.contains("truncated stream"));
    }

    #[test]
    fn test_ignored_error_has_no_reason() {
        let err = PipelineError::NoSourceSelected;
        assert_eq!(FailureReason::try_from(&err), Err(PipelineError::NoSourceSelected));

        let reason = FailureReason::try_from(&PipelineError::DimensionTooSmall {
            width: 64,
            height: 64,
            min_side: 150,
        })
        .unwrap();
        assert_eq!(reason.kind, FailureKind::DimensionTooSmall);
    }
}
