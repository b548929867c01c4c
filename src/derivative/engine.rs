//! # Derivative Engine
//!
//! Genera i derivati di una sorgente con la crate `image`, tutto in memoria.
//!
//! ## Pipeline per ogni tier:
//! 1. Rilevamento formato dai magic bytes (JPEG, PNG, WebP)
//! 2. Decodifica una sola volta
//! 3. Crop centrato al rapporto del tier, poi resize esatto al target (mai stretch)
//! 4. Encoding JPEG alla qualità dell'engine
//!
//! L'entry `original` riusa i byte della sorgente senza ricodifica.
//! Stessi byte + stessa tabella = output identici byte per byte.

use super::asset::{DerivativeAsset, DerivativeSet};
use super::table::{min_source_side, DerivativeSpec, DERIVATIVE_SPECS, ORIGINAL_NAME};
use crate::error::{GenerationError, PipelineError};
use crate::source::SourceAsset;
use crate::stats::{MAX_QUALITY, MIN_QUALITY};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Mime type of every generated tier
pub const DERIVATIVE_MIME: &str = "image/jpeg";

/// Produces the full derivative set for one source
pub trait DerivativeEngine: Send + Sync {
    /// Encoder quality the engine applies, reported in the job stats
    fn quality(&self) -> u8;

    /// Builds one asset per tier plus `original`, or fails as a whole
    fn generate(&self, source: &SourceAsset) -> Result<DerivativeSet, GenerationError>;
}

/// In-process engine backed by the `image` crate
#[derive(Debug, Clone)]
pub struct ImageEngine {
    quality: u8,
    filter: FilterType,
}

impl Default for ImageEngine {
    fn default() -> Self {
        Self::new(80)
    }
}

impl ImageEngine {
    /// Creates an engine encoding at `quality`, clamped to 1-100
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(MIN_QUALITY, MAX_QUALITY),
            filter: FilterType::Lanczos3,
        }
    }

    fn decode(&self, source: &SourceAsset) -> Result<DynamicImage, GenerationError> {
        if !source.is_image() {
            return Err(PipelineError::UnsupportedFormat(format!(
                "{} is not an image type",
                source.mime()
            )));
        }

        let format = image::guess_format(source.bytes()).map_err(|_| {
            PipelineError::UnsupportedFormat(format!("unrecognized image data in {}", source.name()))
        })?;

        match format {
            ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP => {}
            other => {
                return Err(PipelineError::UnsupportedFormat(format!("{:?}", other)));
            }
        }

        let img = image::load_from_memory_with_format(source.bytes(), format)?;

        let (width, height) = img.dimensions();
        let min_side = min_source_side();
        if width < min_side || height < min_side {
            return Err(PipelineError::DimensionTooSmall { width, height, min_side });
        }

        Ok(img)
    }

    fn render(&self, img: &DynamicImage, spec: &DerivativeSpec) -> Result<Vec<u8>, GenerationError> {
        // Crop in source space first so no intermediate grows past the source or the target.
        let (x, y, width, height) = fill_crop(img.width(), img.height(), spec.width, spec.height);
        let resized = img
            .crop_imm(x, y, width, height)
            .resize_exact(spec.width, spec.height, self.filter);
        let rgb = resized.to_rgb8();

        let mut buffer = Cursor::new(Vec::new());
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut buffer, self.quality);
            encoder.encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)?;
        }

        Ok(buffer.into_inner())
    }
}

impl DerivativeEngine for ImageEngine {
    fn quality(&self) -> u8 {
        self.quality
    }

    fn generate(&self, source: &SourceAsset) -> Result<DerivativeSet, GenerationError> {
        let img = self.decode(source)?;
        let (src_width, src_height) = img.dimensions();
        debug!(
            "Decoded {} ({}x{}, {} bytes)",
            source.name(),
            src_width,
            src_height,
            source.size()
        );

        let mut set = DerivativeSet::new();
        for spec in DERIVATIVE_SPECS.iter() {
            let started = Instant::now();
            let encoded = self.render(&img, spec)?;
            debug!(
                "Rendered {} {} ({} bytes) in {:?}",
                spec.name,
                spec.dimensions(),
                encoded.len(),
                started.elapsed()
            );

            set.insert(DerivativeAsset::new(
                spec.name,
                DERIVATIVE_MIME,
                location(source, spec.name),
                spec.width,
                spec.height,
                Arc::from(encoded),
            ));
        }

        set.insert(DerivativeAsset::new(
            ORIGINAL_NAME,
            source.mime(),
            location(source, ORIGINAL_NAME),
            src_width,
            src_height,
            source.shared_bytes(),
        ));

        Ok(set)
    }
}

/// Largest centered rectangle of the source with the target's aspect ratio
fn fill_crop(src_width: u32, src_height: u32, dst_width: u32, dst_height: u32) -> (u32, u32, u32, u32) {
    let (sw, sh) = (u64::from(src_width), u64::from(src_height));
    let (dw, dh) = (u64::from(dst_width.max(1)), u64::from(dst_height.max(1)));

    let (width, height) = if sw * dh > sh * dw {
        ((sh * dw + dh / 2) / dh, sh)
    } else {
        (sw, (sw * dh + dw / 2) / dw)
    };
    let width = width.clamp(1, sw.max(1)) as u32;
    let height = height.clamp(1, sh.max(1)) as u32;

    let x = (src_width - width.min(src_width)) / 2;
    let y = (src_height - height.min(src_height)) / 2;
    (x, y, width, height)
}

fn location(source: &SourceAsset, name: &str) -> String {
    format!("derivative://{}/{}", source.id(), name)
}

#[cfg(test)]
pub(crate) mod test_images {
    use image::codecs::jpeg::JpegEncoder;
    use image::{ColorType, RgbImage};

    /// Smooth gradient, compresses well
    pub fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([
                (x * 255 / width.max(1)) as u8,
                (y * 255 / height.max(1)) as u8,
                128,
            ])
        })
    }

    pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = gradient(width, height);
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, 90)
            .encode(img.as_raw(), width, height, ColorType::Rgb8)
            .unwrap();
        out
    }

    /// A valid JPEG padded with comment segments to exactly `total` bytes
    pub fn padded_jpeg(width: u32, height: u32, total: usize) -> Vec<u8> {
        let body = jpeg(width, height);
        assert!(body.len() + 4 <= total, "base image already exceeds target size");

        let mut padding = Vec::new();
        let mut remaining = total - body.len();
        while remaining > 0 {
            // COM segment: marker (2) + length (2) + payload; length counts itself.
            let mut segment_len = remaining.min(65_537);
            if remaining - segment_len != 0 && remaining - segment_len < 4 {
                segment_len -= 4;
            }
            let length_field = (segment_len - 2) as u16;
            padding.extend_from_slice(&[0xFF, 0xFE]);
            padding.extend_from_slice(&length_field.to_be_bytes());
            padding.extend(std::iter::repeat(b'#').take(segment_len - 4));
            remaining -= segment_len;
        }

        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(&body[..2]);
        out.extend_from_slice(&padding);
        out.extend_from_slice(&body[2..]);
        assert_eq!(out.len(), total);
        out
    }
}
