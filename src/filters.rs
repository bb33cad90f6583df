//! Depth, frequency and quality masks over the per-sample count matrices.
//!
//! Each criterion yields one boolean per variant (`true` = passes). The final
//! mask is their conjunction. Row-wise rules:
//!
//! * too low depth: passes if **any** sample's depth reaches the floor
//! * too high depth: fails if **any** sample's depth is strictly above that
//!   sample's own depth quantile (thresholds are computed per column)
//! * too rare: passes if **every** sample's AO / (RO + AO) lies in the
//!   inclusive frequency band; a zero or null depth fails
//! * low quality: passes if QUAL >= the minimum; a null QUAL fails

use crate::allele_counts::AlleleCounts;
use crate::config::FilterConfig;
use crate::error::{Result, ScanError};
use crate::genome::CoordinateMapper;
use crate::statistics;
use crate::types::{CountMatrix, VariantSite};
use std::collections::BTreeMap;

pub fn mask_too_low_depth(depth: &CountMatrix, min_depth: u32) -> Vec<bool> {
    depth
        .rows
        .iter()
        .map(|row| row.iter().any(|d| d.map_or(false, |d| d >= min_depth)))
        .collect()
}

/// Per-sample depth quantile, computed independently for every column.
pub fn depth_thresholds(depth: &CountMatrix, q: f64) -> Vec<Option<f64>> {
    (0..depth.n_samples())
        .map(|j| statistics::quantile(statistics::as_f64(depth.column(j)), q))
        .collect()
}

pub fn mask_too_high_depth(depth: &CountMatrix, q: f64) -> Vec<bool> {
    let thresholds = depth_thresholds(depth, q);
    depth
        .rows
        .iter()
        .map(|row| {
            !row.iter().zip(&thresholds).any(|(d, t)| match (d, t) {
                (Some(d), Some(t)) => f64::from(*d) > *t,
                _ => false,
            })
        })
        .collect()
}

pub fn mask_too_rare(
    alternate: &CountMatrix,
    depth: &CountMatrix,
    min_frequency: f64,
    max_frequency: f64,
) -> Vec<bool> {
    alternate
        .rows
        .iter()
        .zip(&depth.rows)
        .map(|(ao_row, depth_row)| {
            ao_row.iter().zip(depth_row).all(|(ao, d)| {
                let ro = match (ao, d) {
                    (Some(ao), Some(d)) => d.checked_sub(*ao),
                    _ => None,
                };
                statistics::allele_frequency(ro, *ao)
                    .map_or(false, |f| f >= min_frequency && f <= max_frequency)
            })
        })
        .collect()
}

pub fn mask_low_quality(quality: &[Option<f64>], min_quality: f64) -> Vec<bool> {
    quality
        .iter()
        .map(|q| q.map_or(false, |q| q >= min_quality))
        .collect()
}

/// How many variants each criterion removed. Criteria overlap, so the
/// per-criterion counts need not sum to `total - kept`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterReport {
    pub total: usize,
    pub too_low_depth: usize,
    pub too_high_depth: usize,
    pub too_rare: usize,
    pub low_quality: usize,
    pub kept: usize,
}

impl FilterReport {
    pub fn log(&self) {
        log::info!("{} SNPs show too low depth", self.too_low_depth);
        log::info!("{} SNPs show too high depth", self.too_high_depth);
        log::info!("{} SNPs are too rare", self.too_rare);
        log::info!("{} SNPs have low quality", self.low_quality);
        log::info!("Kept {} SNPs out of {}", self.kept, self.total);
    }
}

/// Combined mask plus its diagnostic counts.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    pub mask: Vec<bool>,
    pub report: FilterReport,
}

fn n_failing(mask: &[bool]) -> usize {
    mask.iter().filter(|&&pass| !pass).count()
}

/// Evaluate all four criteria and combine them by logical AND.
pub fn compute_filter_mask(
    counts: &AlleleCounts,
    quality: &[Option<f64>],
    config: &FilterConfig,
) -> Result<FilterOutcome> {
    let n = counts.reference.n_rows();
    if counts.alternate.n_rows() != n {
        return Err(ScanError::RowCountMismatch {
            left: "RO rows",
            left_rows: n,
            right: "AO rows",
            right_rows: counts.alternate.n_rows(),
        });
    }
    if quality.len() != n {
        return Err(ScanError::RowCountMismatch {
            left: "count rows",
            left_rows: n,
            right: "quality values",
            right_rows: quality.len(),
        });
    }

    let depth = counts.depth()?;
    let not_too_low = mask_too_low_depth(&depth, config.min_depth);
    let not_too_high = mask_too_high_depth(&depth, config.max_depth_quantile);
    let not_too_rare = mask_too_rare(
        &counts.alternate,
        &depth,
        config.min_frequency,
        config.max_frequency,
    );
    let not_low_quality = mask_low_quality(quality, config.min_quality);

    let mask: Vec<bool> = (0..n)
        .map(|i| not_too_low[i] && not_too_high[i] && not_too_rare[i] && not_low_quality[i])
        .collect();

    let report = FilterReport {
        total: n,
        too_low_depth: n_failing(&not_too_low),
        too_high_depth: n_failing(&not_too_high),
        too_rare: n_failing(&not_too_rare),
        low_quality: n_failing(&not_low_quality),
        kept: mask.iter().filter(|&&pass| pass).count(),
    };
    report.log();

    Ok(FilterOutcome { mask, report })
}

/// SNP count of one window before and after filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowDensity {
    pub window: u64,
    pub n: usize,
    pub n_filtered: usize,
}

/// Count variants per genome-wide window, all of them and those kept by `mask`.
///
/// Variants whose contig cannot be mapped are left out. Windows come out in
/// ascending order.
pub fn density_by_window<'a, I>(sites: I, mask: &[bool], mapper: &CoordinateMapper) -> Vec<WindowDensity>
where
    I: IntoIterator<Item = &'a VariantSite>,
{
    let mut counts: BTreeMap<u64, (usize, usize)> = BTreeMap::new();
    for (site, &keep) in sites.into_iter().zip(mask) {
        if let (_, Some(window)) = mapper.map(&site.chrom, site.pos) {
            let entry = counts.entry(window).or_insert((0, 0));
            entry.0 += 1;
            if keep {
                entry.1 += 1;
            }
        }
    }
    counts
        .into_iter()
        .map(|(window, (n, n_filtered))| WindowDensity { window, n, n_filtered })
        .collect()
}
