//! # Derivative Module
//!
//! Contratto di generazione dei derivati, separato in sottomoduli:
//! - `table`: tabella fissa dei tier (`thumbnail`, `standard`, `desktop`)
//! - `asset`: `DerivativeAsset` e il set ordinato consegnato dal job
//! - `engine`: trait `DerivativeEngine` e implementazione `ImageEngine`

pub mod asset;
pub mod engine;
pub mod table;

pub use asset::{DerivativeAsset, DerivativeSet};
pub use engine::{DerivativeEngine, ImageEngine, DERIVATIVE_MIME};
pub use table::{AspectRatio, DerivativeSpec, DERIVATIVE_SPECS, ORIGINAL_NAME};
