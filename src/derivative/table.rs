//! Fixed table of derivative tiers.

use crate::utils::gcd;
use serde::{Serialize, Serializer};
use std::fmt;

/// Name of the entry that carries the unmodified source
pub const ORIGINAL_NAME: &str = "original";

/// Reduced `width:height` ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    /// Ratio of a `width x height` rectangle, reduced by their gcd
    pub const fn of(width: u32, height: u32) -> Self {
        let divisor = gcd(width, height);
        if divisor == 0 {
            return Self { width: 0, height: 0 };
        }
        Self {
            width: width / divisor,
            height: height / divisor,
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl Serialize for AspectRatio {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One derivative tier: a name and exact target dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivativeSpec {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
    pub ratio: AspectRatio,
}

impl DerivativeSpec {
    const fn new(name: &'static str, width: u32, height: u32) -> Self {
        Self {
            name,
            width,
            height,
            ratio: AspectRatio::of(width, height),
        }
    }

    /// Formatted as `150x150`
    pub fn dimensions(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Looks up a tier by name
    pub fn find(name: &str) -> Option<&'static DerivativeSpec> {
        DERIVATIVE_SPECS.iter().find(|spec| spec.name == name)
    }
}

/// Every tier produced for a source, in output order
pub static DERIVATIVE_SPECS: [DerivativeSpec; 3] = [
    DerivativeSpec::new("thumbnail", 150, 150),
    DerivativeSpec::new("standard", 800, 800),
    DerivativeSpec::new("desktop", 1920, 1080),
];

/// Smallest side across all tiers; sources below it are rejected
pub fn min_source_side() -> u32 {
    DERIVATIVE_SPECS
        .iter()
        .map(|spec| spec.width.min(spec.height))
        .min()
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_entries() {
        let names: Vec<&str> = DERIVATIVE_SPECS.iter().map(|s| s.name).collect();
        assert_eq!(names, ["thumbnail", "standard", "desktop"]);

        let thumb = DerivativeSpec::find("thumbnail").unwrap();
        assert_eq!(thumb.dimensions(), "150x150");
        assert_eq!(thumb.ratio.to_string(), "1:1");

        let standard = DerivativeSpec::find("standard").unwrap();
        assert_eq!(standard.dimensions(), "800x800");
        assert_eq!(standard.ratio.to_string(), "1:1");

        let desktop = DerivativeSpec::find("desktop").unwrap();
        assert_eq!(desktop.dimensions(), "1920x1080");
        assert_eq!(desktop.ratio.to_string(), "16:9");

        assert!(DerivativeSpec::find(ORIGINAL_NAME).is_none());
    }

    #[test]
    fn test_min_source_side() {
        assert_eq!(min_source_side(), 150);
    }

    #[test]
    fn test_ratio_serializes_as_string() {
        let json = serde_json::to_string(&AspectRatio::of(3000, 2000)).unwrap();
        assert_eq!(json, "\"3:2\"");
        assert_eq!(AspectRatio::of(0, 0).to_string(), "0:0");
    }
}
