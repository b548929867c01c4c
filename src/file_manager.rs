//! # File Management Module
//!
//! Questo modulo gestisce le operazioni sui file della CLI.
//!
//! ## Responsabilità:
//! - Lettura della sorgente dal disco con nome e mime type
//! - Determinazione mime dall'estensione (case-insensitive)
//! - Scrittura atomica dei derivati nella directory di output
//!
//! ## Formati supportati:
//! - **Immagini**: JPG, JPEG, PNG, WebP
//!
//! ## Struttura output:
//! ```text
//! /output
//! ├── holiday_thumbnail.jpg   (150x150)
//! ├── holiday_standard.jpg    (800x800)
//! ├── holiday_desktop.jpg     (1920x1080)
//! └── holiday_original.jpg    (byte identici alla sorgente)
//! ```
//!
//! ## Sicurezza operazioni:
//! Ogni file viene scritto in un temporaneo nella stessa directory e poi
//! rinominato, quindi non restano mai file parziali.

use crate::derivative::DerivativeSet;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::fs;
use tracing::debug;

/// A source read from disk
#[derive(Debug)]
pub struct SourceFile {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub name: String,
}

/// Manages file operations
pub struct FileManager;

impl FileManager {
    /// Check if a file is an image
    pub fn is_image(path: &Path) -> bool {
        Self::mime_for(path).starts_with("image/")
    }

    /// Mime type from the file extension
    pub fn mime_for(path: &Path) -> &'static str {
        let ext = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase());

        match ext.as_deref() {
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("png") => "image/png",
            Some("webp") => "image/webp",
            _ => "application/octet-stream",
        }
    }

    /// File extension for a mime type
    pub fn extension_for(mime: &str) -> &'static str {
        match mime {
            "image/jpeg" => "jpg",
            "image/png" => "png",
            "image/webp" => "webp",
            _ => "bin",
        }
    }

    /// Read a source image
    pub async fn read_source(path: &Path) -> Result<SourceFile> {
        let bytes = fs::read(path)
            .await
            .with_context(|| format!("Failed to read source {}", path.display()))?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        Ok(SourceFile {
            bytes,
            mime: Self::mime_for(path).to_string(),
            name,
        })
    }

    /// Write every asset of `set` as `<stem>_<name>.<ext>` inside `output_dir`
    pub async fn write_derivatives(
        set: Arc<DerivativeSet>,
        output_dir: &Path,
        stem: &str,
    ) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(output_dir)
            .await
            .with_context(|| format!("Failed to create {}", output_dir.display()))?;

        let output_dir = output_dir.to_path_buf();
        let stem = stem.to_string();

        tokio::task::spawn_blocking(move || {
            let mut written = Vec::with_capacity(set.len());
            for asset in set.iter() {
                let file_name = format!("{}_{}.{}", stem, asset.name, Self::extension_for(&asset.mime));
                let target = output_dir.join(file_name);

                let mut temp = NamedTempFile::new_in(&output_dir)?;
                temp.write_all(asset.bytes())?;
                temp.persist(&target)
                    .with_context(|| format!("Failed to write {}", target.display()))?;

                debug!("Wrote {} ({} bytes)", target.display(), asset.size_bytes);
                written.push(target);
            }
            Ok::<_, anyhow::Error>(written)
        })
        .await?
    }
}
