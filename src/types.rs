use crate::error::{Result, ScanError};
use std::fmt;

/// Sex of a pooled sample within a population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sex {
    Female,
    Male,
}

impl Sex {
    pub const ALL: [Sex; 2] = [Sex::Female, Sex::Male];

    pub fn code(&self) -> &'static str {
        match self {
            Sex::Female => "F",
            Sex::Male => "M",
        }
    }
}

/// Which observation count a column holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CountKind {
    /// Reference observation count (FORMAT `RO`)
    Reference,
    /// Alternate observation count (FORMAT `AO`)
    Alternate,
}

impl CountKind {
    pub const ALL: [CountKind; 2] = [CountKind::Reference, CountKind::Alternate];

    pub fn tag(&self) -> &'static str {
        match self {
            CountKind::Reference => "RO",
            CountKind::Alternate => "AO",
        }
    }
}

impl fmt::Display for CountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Site-level fields of one variant row, as read from the variant table.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantSite {
    pub chrom: String,
    /// 1-based position on `chrom`
    pub pos: u64,
    /// QUAL column; `.` is null
    pub quality: Option<f64>,
    /// `DP=` tag of the INFO column
    pub total_depth: Option<u64>,
}

/// One variant after the horizontal join of sites, p-values and per-sample counts.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedVariant {
    pub site: VariantSite,
    pub pvalue: Option<f64>,
    /// Genome-wide coordinate; null when the contig is not in the reference index
    pub genome_position: Option<u64>,
    /// Window id; null when the coordinate could not be mapped
    pub window: Option<u64>,
    /// Counts laid out by `PopulationSchema::column_index`
    pub counts: Vec<Option<u32>>,
}

/// A row of either public report table (per-variant or per-window).
///
/// For the per-window table `position` is the window id and the numeric
/// columns hold window aggregates.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub chromosome: String,
    pub position: u64,
    pub pvalue: Option<f64>,
    pub quality: Option<f64>,
    pub total_depth: Option<f64>,
    pub allele_counts: String,
}

/// Row-major per-sample count matrix (one row per variant, one column per sample).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CountMatrix {
    pub samples: Vec<String>,
    pub rows: Vec<Vec<Option<u32>>>,
}

impl CountMatrix {
    pub fn new(samples: Vec<String>) -> Self {
        Self {
            samples,
            rows: Vec::new(),
        }
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn sample_index(&self, name: &str) -> Option<usize> {
        self.samples.iter().position(|s| s == name)
    }

    /// Values of one sample across all rows.
    pub fn column(&self, idx: usize) -> impl Iterator<Item = Option<u32>> + '_ {
        self.rows.iter().map(move |row| row[idx])
    }

    /// Elementwise `self + other` (read depth from RO and AO); null if either side is null.
    ///
    /// A sum that does not fit a `u32` is an error.
    pub fn elementwise_sum(&self, other: &CountMatrix) -> Result<CountMatrix> {
        let rows = self
            .rows
            .iter()
            .zip(&other.rows)
            .enumerate()
            .map(|(i, (a, b))| {
                a.iter()
                    .zip(b)
                    .zip(&self.samples)
                    .map(|((x, y), sample)| match (x, y) {
                        (Some(x), Some(y)) => x.checked_add(*y).map(Some).ok_or_else(|| ScanError::CountOverflow {
                            row: i + 1,
                            sample: sample.clone(),
                        }),
                        _ => Ok(None),
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(CountMatrix {
            samples: self.samples.clone(),
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elementwise_sum_propagates_null() {
        let ro = CountMatrix {
            samples: vec!["A".into(), "B".into()],
            rows: vec![vec![Some(3), None], vec![Some(0), Some(2)]],
        };
        let ao = CountMatrix {
            samples: vec!["A".into(), "B".into()],
            rows: vec![vec![Some(1), Some(5)], vec![Some(0), Some(8)]],
        };
        let depth = ro.elementwise_sum(&ao).unwrap();
        assert_eq!(depth.rows, vec![vec![Some(4), None], vec![Some(0), Some(10)]]);
        assert_eq!(depth.column(1).collect::<Vec<_>>(), vec![None, Some(10)]);
    }

    #[test]
    fn test_elementwise_sum_overflow_is_error() {
        let ro = CountMatrix {
            samples: vec!["A".into()],
            rows: vec![vec![Some(3_000_000_000)]],
        };
        let ao = ro.clone();
        assert!(matches!(
            ro.elementwise_sum(&ao),
            Err(ScanError::CountOverflow { row: 1, .. })
        ));
    }
}
