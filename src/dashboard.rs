//! Read-side data layer for browsing the two report tables.
//!
//! A [`DashboardContext`] is built once from the per-variant and per-window
//! reports and handed by reference to whatever renders them. Either table may
//! be absent; queries against a missing table return empty results.

use crate::csv_reader::load_report_csv;
use crate::statistics;
use crate::types::ReportRow;
use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;

/// Number of entries in the p-value quantile table (q = 0.00, 0.01, ... 1.00).
pub const PVALUE_QUANTILE_STEPS: usize = 101;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Variants,
    Windows,
}

/// One loaded report table plus the values precomputed from it.
#[derive(Debug, Clone)]
pub struct ReportTable {
    rows: Vec<ReportRow>,
    chromosomes: Vec<(String, u64)>,
    pvalue_quantiles: Vec<Option<f64>>,
}

impl ReportTable {
    pub fn new(rows: Vec<ReportRow>) -> Self {
        let chromosomes = sorted_chromosomes(&rows);
        let pvalues: Vec<Option<f64>> = rows.iter().map(|r| r.pvalue).collect();
        let pvalue_quantiles = (0..PVALUE_QUANTILE_STEPS)
            .map(|i| statistics::quantile(pvalues.iter().copied(), i as f64 / 100.0))
            .collect();
        Self {
            rows,
            chromosomes,
            pvalue_quantiles,
        }
    }

    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    /// Chromosomes with their largest position, largest first.
    pub fn sorted_chromosomes(&self) -> &[(String, u64)] {
        &self.chromosomes
    }

    pub fn chromosomes(&self) -> Vec<&str> {
        self.chromosomes.iter().map(|(c, _)| c.as_str()).collect()
    }

    pub fn quality_range(&self) -> Option<(f64, f64)> {
        min_max(self.rows.iter().filter_map(|r| r.quality))
    }

    pub fn depth_range(&self) -> Option<(f64, f64)> {
        min_max(self.rows.iter().filter_map(|r| r.total_depth))
    }

    pub fn pvalue_quantiles(&self) -> &[Option<f64>] {
        &self.pvalue_quantiles
    }

    /// P-value at quantile `q`, looked up in the table at the nearest percent.
    pub fn pvalue_at(&self, q: f64) -> Option<f64> {
        let idx = (q.clamp(0.0, 1.0) * 100.0).round() as usize;
        self.pvalue_quantiles.get(idx).copied().flatten()
    }

    /// Rows matching `query`, in table order.
    pub fn manhattan(&self, query: &ManhattanQuery) -> Vec<&ReportRow> {
        let chromosomes: Vec<&str> = match &query.chromosomes {
            ChromosomeSelection::Top(n) => self.chromosomes().into_iter().take(*n).collect(),
            ChromosomeSelection::Single(name) => vec![name.as_str()],
        };
        let pvalue_bounds = match query.pvalue_quantiles {
            Some((lo, hi)) => match (self.pvalue_at(lo), self.pvalue_at(hi)) {
                (Some(lo), Some(hi)) => Some((lo, hi)),
                _ => return Vec::new(),
            },
            None => None,
        };

        self.rows
            .iter()
            .filter(|r| chromosomes.contains(&r.chromosome.as_str()))
            .filter(|r| within_inclusive(r.quality, query.quality))
            .filter(|r| within_inclusive(r.total_depth, query.depth))
            .filter(|r| match pvalue_bounds {
                Some((lo, hi)) => r.pvalue.map_or(false, |p| p >= lo && p <= hi),
                None => true,
            })
            .collect()
    }
}

/// Which chromosomes a Manhattan query covers.
#[derive(Debug, Clone, PartialEq)]
pub enum ChromosomeSelection {
    /// The `n` largest chromosomes
    Top(usize),
    Single(String),
}

/// Filters applied before drawing a Manhattan plot.
///
/// `quality` and `depth` are slider-style integer ranges: a row matches when
/// its value lies in `[lo, hi + 1]`. Rows with a null value never match.
/// `pvalue_quantiles` bounds the p-value between two quantiles of the table.
#[derive(Debug, Clone, PartialEq)]
pub struct ManhattanQuery {
    pub quality: (f64, f64),
    pub depth: (f64, f64),
    pub pvalue_quantiles: Option<(f64, f64)>,
    pub chromosomes: ChromosomeSelection,
}

impl ManhattanQuery {
    /// A query spanning the full quality and depth ranges of `table`.
    pub fn full_range(table: &ReportTable, chromosomes: ChromosomeSelection) -> Self {
        Self {
            quality: table.quality_range().unwrap_or((0.0, 0.0)),
            depth: table.depth_range().unwrap_or((0.0, 0.0)),
            pvalue_quantiles: None,
            chromosomes,
        }
    }
}

fn within_inclusive(value: Option<f64>, (lo, hi): (f64, f64)) -> bool {
    value.map_or(false, |v| v >= lo && v <= hi + 1.0)
}

fn min_max(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// Chromosomes ordered by descending max position; ties broken by name.
fn sorted_chromosomes<'a>(rows: impl IntoIterator<Item = &'a ReportRow>) -> Vec<(String, u64)> {
    let mut max_pos: HashMap<&str, u64> = HashMap::new();
    for r in rows {
        let entry = max_pos.entry(r.chromosome.as_str()).or_insert(0);
        *entry = (*entry).max(r.position);
    }
    let mut out: Vec<(String, u64)> = max_pos
        .into_iter()
        .map(|(c, m)| (c.to_string(), m))
        .collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out
}

/// The loaded report tables.
#[derive(Debug, Clone, Default)]
pub struct DashboardContext {
    variants: Option<ReportTable>,
    windows: Option<ReportTable>,
}

impl DashboardContext {
    pub fn new(variants: Option<Vec<ReportRow>>, windows: Option<Vec<ReportRow>>) -> Self {
        Self {
            variants: variants.map(ReportTable::new),
            windows: windows.map(ReportTable::new),
        }
    }

    /// Load whichever of the two report files exist.
    pub fn load(variants: Option<&Path>, windows: Option<&Path>) -> Result<Self> {
        let read = |path: Option<&Path>| -> Result<Option<Vec<ReportRow>>> {
            match path {
                Some(p) if p.is_file() => Ok(Some(load_report_csv(p)?)),
                Some(p) => {
                    log::warn!("Report {} not found, skipping", p.display());
                    Ok(None)
                }
                None => Ok(None),
            }
        };
        Ok(Self::new(read(variants)?, read(windows)?))
    }

    pub fn table(&self, kind: TableKind) -> Option<&ReportTable> {
        match kind {
            TableKind::Variants => self.variants.as_ref(),
            TableKind::Windows => self.windows.as_ref(),
        }
    }

    pub fn chromosomes(&self, kind: TableKind) -> Vec<&str> {
        self.table(kind).map_or_else(Vec::new, |t| t.chromosomes())
    }

    pub fn manhattan(&self, kind: TableKind, query: &ManhattanQuery) -> Vec<&ReportRow> {
        self.table(kind).map_or_else(Vec::new, |t| t.manhattan(query))
    }
}

/// A point on the genome-wide Manhattan axis.
#[derive(Debug, Clone, PartialEq)]
pub struct ManhattanPoint {
    pub chromosome: String,
    pub x: u64,
    /// `-log10(p)`; null for a missing or non-positive p-value
    pub score: Option<f64>,
}

/// Cumulative x coordinates for a set of report rows.
///
/// Chromosomes are laid end to end, largest first, each sized by its largest
/// position. One tick sits at the middle of every chromosome's points.
#[derive(Debug, Clone, PartialEq)]
pub struct ManhattanLayout {
    /// Chromosome and the summed size of all chromosomes placed before it
    pub offsets: Vec<(String, u64)>,
    pub ticks: Vec<(String, u64)>,
    /// Sorted by `x`
    pub points: Vec<ManhattanPoint>,
}

impl ManhattanLayout {
    pub fn new(rows: &[&ReportRow]) -> Self {
        let sizes = sorted_chromosomes(rows.iter().copied());

        let mut offsets = Vec::with_capacity(sizes.len());
        let mut running = 0u64;
        for (chrom, size) in &sizes {
            offsets.push((chrom.clone(), running));
            running += size;
        }
        let offset_of: HashMap<&str, u64> = offsets.iter().map(|(c, o)| (c.as_str(), *o)).collect();

        let mut points: Vec<ManhattanPoint> = rows
            .iter()
            .map(|r| ManhattanPoint {
                chromosome: r.chromosome.clone(),
                x: offset_of[r.chromosome.as_str()] + r.position,
                score: r.pvalue.filter(|p| *p > 0.0).map(|p| -p.log10()),
            })
            .collect();
        points.sort_by_key(|p| p.x);

        let ticks = offsets
            .iter()
            .filter_map(|(chrom, _)| {
                let xs = points.iter().filter(|p| &p.chromosome == chrom).map(|p| p.x);
                let (lo, hi) = xs.fold(None, |acc: Option<(u64, u64)>, x| match acc {
                    None => Some((x, x)),
                    Some((lo, hi)) => Some((lo.min(x), hi.max(x))),
                })?;
                Some((chrom.clone(), (lo + hi) / 2))
            })
            .collect();

        Self {
            offsets,
            ticks,
            points,
        }
    }

    pub fn genome_length(&self) -> u64 {
        self.points.last().map_or(0, |p| p.x)
    }

    pub fn max_score(&self) -> Option<f64> {
        self.points
            .iter()
            .filter_map(|p| p.score)
            .fold(None, |acc: Option<f64>, s| Some(acc.map_or(s, |a| a.max(s))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn row(chrom: &str, pos: u64, pvalue: Option<f64>, quality: Option<f64>, depth: Option<f64>) -> ReportRow {
        ReportRow {
            chromosome: chrom.to_string(),
            position: pos,
            pvalue,
            quality,
            total_depth: depth,
            allele_counts: String::new(),
        }
    }

    fn table() -> ReportTable {
        ReportTable::new(vec![
            row("small", 10, Some(0.5), Some(20.0), Some(30.0)),
            row("big", 100, Some(0.01), Some(50.0), Some(10.0)),
            row("big", 400, Some(0.2), Some(5.0), Some(60.0)),
            row("mid", 250, None, None, Some(25.0)),
        ])
    }

    #[test]
    fn test_chromosomes_by_descending_max_position() {
        let t = table();
        assert_eq!(t.chromosomes(), vec!["big", "mid", "small"]);
        assert_eq!(t.sorted_chromosomes()[0], ("big".to_string(), 400));
    }

    #[test]
    fn test_ranges_skip_nulls() {
        let t = table();
        assert_eq!(t.quality_range(), Some((5.0, 50.0)));
        assert_eq!(t.depth_range(), Some((10.0, 60.0)));
        assert_eq!(ReportTable::new(Vec::new()).quality_range(), None);
    }

    #[test]
    fn test_pvalue_quantile_table() {
        let t = table();
        assert_eq!(t.pvalue_quantiles().len(), PVALUE_QUANTILE_STEPS);
        assert_relative_eq!(t.pvalue_at(0.0).unwrap(), 0.01);
        assert_relative_eq!(t.pvalue_at(0.5).unwrap(), 0.2);
        assert_relative_eq!(t.pvalue_at(1.0).unwrap(), 0.5);
    }

    #[test]
    fn test_manhattan_query_bounds_are_inclusive_plus_one() {
        let t = table();
        let query = ManhattanQuery {
            quality: (5.0, 19.0),
            depth: (0.0, 100.0),
            pvalue_quantiles: None,
            chromosomes: ChromosomeSelection::Top(3),
        };
        let hits: Vec<u64> = t.manhattan(&query).iter().map(|r| r.position).collect();
        // quality 20 is within [5, 19 + 1]; the null-quality row never matches
        assert_eq!(hits, vec![10, 400]);
    }

    #[test]
    fn test_manhattan_top_n_and_single() {
        let t = table();
        let mut query = ManhattanQuery::full_range(&t, ChromosomeSelection::Top(1));
        assert!(t.manhattan(&query).iter().all(|r| r.chromosome == "big"));
        query.chromosomes = ChromosomeSelection::Single("small".into());
        assert_eq!(t.manhattan(&query).len(), 1);
    }

    #[test]
    fn test_manhattan_pvalue_quantile_range() {
        let t = table();
        let mut query = ManhattanQuery::full_range(&t, ChromosomeSelection::Top(3));
        query.pvalue_quantiles = Some((0.0, 0.5));
        let hits: Vec<u64> = t.manhattan(&query).iter().map(|r| r.position).collect();
        assert_eq!(hits, vec![100, 400]);
    }

    #[test]
    fn test_missing_table_is_empty() {
        let ctx = DashboardContext::new(Some(table().rows().to_vec()), None);
        assert_eq!(ctx.chromosomes(TableKind::Windows), Vec::<&str>::new());
        assert_eq!(ctx.chromosomes(TableKind::Variants).len(), 3);
    }

    #[test]
    fn test_layout_offsets_and_ticks() {
        let t = table();
        let rows: Vec<&ReportRow> = t.rows().iter().collect();
        let layout = ManhattanLayout::new(&rows);
        assert_eq!(
            layout.offsets,
            vec![("big".to_string(), 0), ("mid".to_string(), 400), ("small".to_string(), 650)]
        );
        let xs: Vec<u64> = layout.points.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![100, 400, 650, 660]);
        assert_eq!(layout.ticks[0], ("big".to_string(), 250));
        assert_relative_eq!(layout.max_score().unwrap(), 2.0, epsilon = 1e-12);
        assert_eq!(layout.points[2].score, None);
    }
}
