//! # Utility Functions Module
//!
//! Small helpers shared by the stats, derivative and CLI layers.

/// Bytes in one kilobyte, as used by every KB figure the pipeline reports.
pub const BYTES_PER_KB: u64 = 1024;

/// Converts a byte count to whole kilobytes, rounding half up.
///
/// Every KB value goes through this one function, so for `a <= b` the result
/// for `a` is never larger than the result for `b`.
///
/// # Example
/// ```rust
/// use autoscale_pipeline::utils::bytes_to_kb;
///
/// assert_eq!(bytes_to_kb(511), 0);
/// assert_eq!(bytes_to_kb(512), 1);
/// assert_eq!(bytes_to_kb(2_000_000), 1953);
/// ```
pub fn bytes_to_kb(bytes: u64) -> u64 {
    bytes.saturating_add(BYTES_PER_KB / 2) / BYTES_PER_KB
}

/// Greatest common divisor, used to reduce `width:height` ratios.
pub const fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Get human-readable size
pub fn format_size(size: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = size as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", size as u64, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_to_kb_rounds_half_up() {
        assert_eq!(bytes_to_kb(0), 0);
        assert_eq!(bytes_to_kb(511), 0);
        assert_eq!(bytes_to_kb(512), 1);
        assert_eq!(bytes_to_kb(1023), 1);
        assert_eq!(bytes_to_kb(1535), 1);
        assert_eq!(bytes_to_kb(1536), 2);
        assert_eq!(bytes_to_kb(u64::MAX), u64::MAX / 1024);
    }

    #[test]
    fn test_gcd() {
        assert_eq!(gcd(1920, 1080), 120);
        assert_eq!(gcd(150, 150), 150);
        assert_eq!(gcd(7, 0), 7);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
    }
}
