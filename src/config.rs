//! Validation of numeric run options.
//!
//! Options arrive as strings from the command line and are cast here, before
//! any input table is opened, so that a malformed value fails the run early.

use crate::error::{Result, ScanError};
use crate::genome::WindowAnchor;

pub const DEFAULT_PVALUE_QUANTILE: f64 = 0.05;
pub const DEFAULT_MIN_DEPTH: u32 = 10;
pub const DEFAULT_MAX_DEPTH_QUANTILE: f64 = 0.9;
pub const DEFAULT_MIN_FREQUENCY: f64 = 0.1;
pub const DEFAULT_MAX_FREQUENCY: f64 = 0.99;
pub const DEFAULT_MIN_QUALITY: f64 = 10.0;
pub const DEFAULT_FILTER_WINDOW_SIZE: u64 = 1_000_000;

/// Parse a finite float.
pub fn parse_f64(name: &'static str, raw: &str) -> Result<f64> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| ScanError::config(name, raw, "not a number"))?;
    if !value.is_finite() {
        return Err(ScanError::config(name, raw, "must be finite"));
    }
    Ok(value)
}

/// Parse a window size. Float notation such as `1e6` is accepted and
/// truncated toward zero; the result must be a positive integer.
pub fn parse_window_size(raw: &str) -> Result<u64> {
    let value = parse_f64("window size", raw)?;
    let truncated = value.trunc();
    if truncated < 1.0 {
        return Err(ScanError::config("window size", raw, "must be a positive integer"));
    }
    Ok(truncated as u64)
}

/// Parse a quantile level in [0, 1].
pub fn parse_quantile(name: &'static str, raw: &str) -> Result<f64> {
    let value = parse_f64(name, raw)?;
    if !(0.0..=1.0).contains(&value) {
        return Err(ScanError::config(name, raw, "must lie in [0, 1]"));
    }
    Ok(value)
}

/// Parse a non-negative integer count.
pub fn parse_count(name: &'static str, raw: &str) -> Result<u32> {
    raw.trim()
        .parse()
        .map_err(|_| ScanError::config(name, raw, "not a non-negative integer"))
}

/// Options of the windowed aggregation stage.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateConfig {
    pub window_size: u64,
    /// Quantile level of the per-window p-value summary
    pub pvalue_quantile: f64,
    pub anchor: WindowAnchor,
}

impl AggregateConfig {
    pub fn from_raw(window_size: &str, pvalue_quantile: &str) -> Result<Self> {
        Ok(Self {
            window_size: parse_window_size(window_size)?,
            pvalue_quantile: parse_quantile("p-value quantile", pvalue_quantile)?,
            anchor: WindowAnchor::Midpoint,
        })
    }
}

/// Raw (unvalidated) options of the filter stage.
#[derive(Debug, Clone)]
pub struct RawFilterOptions {
    pub min_depth: String,
    pub max_depth_quantile: String,
    pub min_frequency: String,
    pub max_frequency: String,
    pub min_quality: String,
    pub window_size: String,
}

/// Thresholds of the variant filter stage.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterConfig {
    /// Floor that at least one sample's depth must reach
    pub min_depth: u32,
    /// Per-sample depth quantile above which a sample is too deep
    pub max_depth_quantile: f64,
    pub min_frequency: f64,
    pub max_frequency: f64,
    pub min_quality: f64,
    /// Window size of the filter-effect density table
    pub window_size: u64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_depth: DEFAULT_MIN_DEPTH,
            max_depth_quantile: DEFAULT_MAX_DEPTH_QUANTILE,
            min_frequency: DEFAULT_MIN_FREQUENCY,
            max_frequency: DEFAULT_MAX_FREQUENCY,
            min_quality: DEFAULT_MIN_QUALITY,
            window_size: DEFAULT_FILTER_WINDOW_SIZE,
        }
    }
}

impl FilterConfig {
    pub fn from_raw(raw: &RawFilterOptions) -> Result<Self> {
        let min_frequency = parse_quantile("minimum frequency", &raw.min_frequency)?;
        let max_frequency = parse_quantile("maximum frequency", &raw.max_frequency)?;
        if min_frequency > max_frequency {
            return Err(ScanError::config(
                "frequency band",
                format!("{}..{}", raw.min_frequency, raw.max_frequency),
                "minimum frequency exceeds maximum frequency",
            ));
        }
        Ok(Self {
            min_depth: parse_count("minimum depth", &raw.min_depth)?,
            max_depth_quantile: parse_quantile("maximum depth quantile", &raw.max_depth_quantile)?,
            min_frequency,
            max_frequency,
            min_quality: parse_f64("minimum quality", &raw.min_quality)?,
            window_size: parse_window_size(&raw.window_size)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_defaults() -> RawFilterOptions {
        RawFilterOptions {
            min_depth: "10".into(),
            max_depth_quantile: "0.9".into(),
            min_frequency: "0.1".into(),
            max_frequency: "0.99".into(),
            min_quality: "10".into(),
            window_size: "1e6".into(),
        }
    }

    #[test]
    fn test_window_size_accepts_float_notation() {
        assert_eq!(parse_window_size("1e6").unwrap(), 1_000_000);
        assert_eq!(parse_window_size("2500").unwrap(), 2500);
        assert_eq!(parse_window_size("1000.7").unwrap(), 1000);
    }

    #[test]
    fn test_window_size_rejects_garbage() {
        assert!(matches!(
            parse_window_size("ten"),
            Err(ScanError::InvalidConfig { .. })
        ));
        assert!(parse_window_size("0").is_err());
        assert!(parse_window_size("-5").is_err());
        assert!(parse_window_size("inf").is_err());
    }

    #[test]
    fn test_quantile_bounds() {
        assert_eq!(parse_quantile("q", "0.05").unwrap(), 0.05);
        assert!(parse_quantile("q", "1.5").is_err());
        assert!(parse_quantile("q", "abc").is_err());
    }

    #[test]
    fn test_filter_config_from_raw() {
        let cfg = FilterConfig::from_raw(&raw_defaults()).unwrap();
        assert_eq!(cfg, FilterConfig::default());
    }

    #[test]
    fn test_filter_config_rejects_inverted_band() {
        let mut raw = raw_defaults();
        raw.min_frequency = "0.8".into();
        raw.max_frequency = "0.2".into();
        assert!(FilterConfig::from_raw(&raw).is_err());
    }

    #[test]
    fn test_aggregate_config_defaults_to_midpoint() {
        let cfg = AggregateConfig::from_raw("1000", "0.05").unwrap();
        assert_eq!(cfg.window_size, 1000);
        assert_eq!(cfg.anchor, WindowAnchor::Midpoint);
    }
}
