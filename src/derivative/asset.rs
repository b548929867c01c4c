//! Generated assets and the ordered set a job delivers.

use super::table::{AspectRatio, DerivativeSpec, DERIVATIVE_SPECS, ORIGINAL_NAME};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// One generated output, addressable by `location`
#[derive(Clone, Serialize)]
pub struct DerivativeAsset {
    pub name: String,
    pub mime: String,
    pub location: String,
    pub width: u32,
    pub height: u32,
    pub ratio: AspectRatio,
    pub size_bytes: u64,
    #[serde(skip)]
    bytes: Arc<[u8]>,
}

impl DerivativeAsset {
    pub fn new(
        name: impl Into<String>,
        mime: impl Into<String>,
        location: impl Into<String>,
        width: u32,
        height: u32,
        bytes: Arc<[u8]>,
    ) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            location: location.into(),
            width,
            height,
            ratio: AspectRatio::of(width, height),
            size_bytes: bytes.len() as u64,
            bytes,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_original(&self) -> bool {
        self.name == ORIGINAL_NAME
    }
}

impl fmt::Debug for DerivativeAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivativeAsset")
            .field("name", &self.name)
            .field("location", &self.location)
            .field("dimensions", &format_args!("{}x{}", self.width, self.height))
            .field("ratio", &format_args!("{}", self.ratio))
            .field("size_bytes", &self.size_bytes)
            .finish()
    }
}

/// Ordered name -> asset mapping: table tiers first, `original` last
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct DerivativeSet {
    entries: Vec<DerivativeAsset>,
}

impl DerivativeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry, replacing any earlier one with the same name
    pub fn insert(&mut self, asset: DerivativeAsset) {
        self.entries.retain(|existing| existing.name != asset.name);
        self.entries.push(asset);
    }

    pub fn get(&self, name: &str) -> Option<&DerivativeAsset> {
        self.entries.iter().find(|asset| asset.name == name)
    }

    pub fn original(&self) -> Option<&DerivativeAsset> {
        self.get(ORIGINAL_NAME)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DerivativeAsset> {
        self.entries.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|asset| asset.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encoded sizes of the generated tiers; `original` is not an output
    pub fn output_sizes(&self) -> Vec<u64> {
        self.entries
            .iter()
            .filter(|asset| !asset.is_original())
            .map(|asset| asset.size_bytes)
            .collect()
    }

    /// True when every tier and `original` are present, each exactly once,
    /// and every tier has its target dimensions
    pub fn is_complete(&self) -> bool {
        if self.entries.len() != DERIVATIVE_SPECS.len() + 1 || self.original().is_none() {
            return false;
        }
        DERIVATIVE_SPECS.iter().all(|spec| {
            self.get(spec.name)
                .map(|asset| matches_spec(asset, spec))
                .unwrap_or(false)
        })
    }

    /// Points the `original` entry at a new location, e.g. the job's preview
    pub fn relocate_original(&mut self, location: &str) {
        if let Some(original) = self.entries.iter_mut().find(|asset| asset.is_original()) {
            original.location = location.to_string();
        }
    }
}

fn matches_spec(asset: &DerivativeAsset, spec: &DerivativeSpec) -> bool {
    asset.width == spec.width && asset.height == spec.height && asset.ratio == spec.ratio
}
