//! # Source Asset Module
//!
//! Questo modulo gestisce l'immagine sorgente di un job e la sua anteprima locale.
//!
//! ## Responsabilità:
//! - `SourceAsset`: byte della sorgente, nome, mime e identificatore (digest SHA-256)
//! - `PreviewRegistry`: emette handle di anteprima `preview://` e traccia quelli vivi
//! - `PreviewHandle`: risorsa con scope, rilasciata esattamente una volta al drop
//! - `SourceSummary`: vista senza byte pubblicata negli snapshot
//!
//! ## Ciclo di vita dell'anteprima:
//! - Creata alla selezione della sorgente
//! - Rilasciata al reset o alla sostituzione con una nuova sorgente
//! - Al successo passa ai risultati del job (l'entry `original` punta al suo URL)

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Length of the hex digest prefix used as a source identifier
const ID_LEN: usize = 16;

/// One selected input image
#[derive(Clone)]
pub struct SourceAsset {
    id: String,
    name: String,
    mime: String,
    bytes: Arc<[u8]>,
}

impl SourceAsset {
    /// Wraps raw bytes selected by the user
    pub fn new(bytes: impl Into<Vec<u8>>, mime: impl Into<String>, name: impl Into<String>) -> Self {
        let bytes: Vec<u8> = bytes.into();

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let id = hex::encode(hasher.finalize())[..ID_LEN].to_string();

        Self {
            id,
            name: name.into(),
            mime: mime.into().to_ascii_lowercase(),
            bytes: Arc::from(bytes),
        }
    }

    /// Content digest prefix; identical bytes give identical ids
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Shared handle to the bytes, no copy
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Whether the declared mime type is an image type
    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }
}

impl fmt::Debug for SourceAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceAsset")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Issues local preview handles and tracks which are still alive
#[derive(Clone, Default)]
pub struct PreviewRegistry {
    inner: Arc<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    next_id: AtomicU64,
    live: Mutex<HashMap<u64, String>>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a preview for `source`
    pub fn allocate(&self, source: &SourceAsset) -> PreviewHandle {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let url = format!("preview://{}/{}", id, source.id());

        self.inner
            .live
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, url.clone());
        debug!("Allocated preview {} for {}", url, source.name());

        PreviewHandle {
            id,
            url,
            registry: Arc::clone(&self.inner),
        }
    }

    /// Number of handles not yet released
    pub fn live_count(&self) -> usize {
        self.inner.live.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the preview behind `url` is still allocated
    pub fn is_live(&self, url: &str) -> bool {
        self.inner
            .live
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .any(|live| live == url)
    }
}

/// A locally allocated preview, released when dropped
pub struct PreviewHandle {
    id: u64,
    url: String,
    registry: Arc<RegistryInner>,
}

impl PreviewHandle {
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PreviewHandle").field(&self.url).finish()
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        let removed = self
            .registry
            .live
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.id);
        if removed.is_some() {
            debug!("Released preview {}", self.url);
        }
    }
}

/// Byte-free view of a source, as published in snapshots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub id: String,
    pub name: String,
    pub mime: String,
    pub size_bytes: u64,
    pub preview_url: String,
}

impl SourceSummary {
    pub fn describe(asset: &SourceAsset, preview_url: &str) -> Self {
        Self {
            id: asset.id().to_string(),
            name: asset.name().to_string(),
            mime: asset.mime().to_string(),
            size_bytes: asset.size(),
            preview_url: preview_url.to_string(),
        }
    }
}
