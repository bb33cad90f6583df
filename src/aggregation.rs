//! Windowed aggregation of joined per-variant records.
//!
//! Variants are partitioned by contig and each partition is summarized on its
//! own, so no step needs more than one contig's rows at a time. Partitions
//! share nothing and are processed in parallel; the partial tables are then
//! stacked in partition order.

use std::collections::BTreeMap;

use indicatif::ProgressBar;
use rayon::prelude::*;

use crate::allele_counts::AlleleCounts;
use crate::error::{Result, ScanError};
use crate::genome::CoordinateMapper;
use crate::output;
use crate::statistics;
use crate::types::{CountKind, CountMatrix, JoinedVariant, ReportRow, Sex, VariantSite};

/// Explicit column contract between populations and per-sample count columns.
///
/// Every population contributes one sample per sex, named `{population}_{F|M}`,
/// and each sample an RO and an AO column. Columns are laid out as
/// `population * 4 + sex * 2 + kind`.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationSchema {
    populations: Vec<String>,
}

impl PopulationSchema {
    /// Duplicate names keep their first position.
    pub fn new<I, S>(populations: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for p in populations {
            let p = p.into();
            if !unique.contains(&p) {
                unique.push(p);
            }
        }
        if unique.is_empty() {
            return Err(ScanError::missing_column("design table", "population"));
        }
        Ok(Self { populations: unique })
    }

    pub fn populations(&self) -> &[String] {
        &self.populations
    }

    pub fn n_columns(&self) -> usize {
        self.populations.len() * 4
    }

    pub fn column_index(&self, population: usize, sex: Sex, kind: CountKind) -> usize {
        let sex_offset = match sex {
            Sex::Female => 0,
            Sex::Male => 2,
        };
        let kind_offset = match kind {
            CountKind::Reference => 0,
            CountKind::Alternate => 1,
        };
        population * 4 + sex_offset + kind_offset
    }

    pub fn sample_name(&self, population: usize, sex: Sex) -> String {
        format!("{}_{}", self.populations[population], sex.code())
    }

    /// Name of a column in the joined table, e.g. `P1_F_RO`.
    pub fn column_name(&self, population: usize, sex: Sex, kind: CountKind) -> String {
        format!("{}_{}", self.sample_name(population, sex), kind.tag())
    }

    /// Pick the schema's columns out of the RO/AO matrices, one row per variant.
    pub fn select_counts(&self, counts: &AlleleCounts) -> Result<Vec<Vec<Option<u32>>>> {
        let mut sources: Vec<(&CountMatrix, usize)> = vec![(&counts.reference, 0); self.n_columns()];
        for p in 0..self.populations.len() {
            for sex in Sex::ALL {
                let sample = self.sample_name(p, sex);
                for kind in CountKind::ALL {
                    let matrix = counts.get(kind);
                    let idx = matrix
                        .sample_index(&sample)
                        .ok_or_else(|| ScanError::missing_column(format!("{} table", kind), &sample))?;
                    sources[self.column_index(p, sex, kind)] = (matrix, idx);
                }
            }
        }

        let n = counts.reference.n_rows();
        Ok((0..n)
            .map(|row| sources.iter().map(|(m, j)| m.rows[row][*j]).collect())
            .collect())
    }
}

/// Horizontally join sites, p-values and counts, and map each variant to its window.
///
/// All inputs must be positionally aligned; any length mismatch is fatal.
pub fn join_variants(
    sites: Vec<VariantSite>,
    pvalues: Vec<Option<f64>>,
    counts: &AlleleCounts,
    schema: &PopulationSchema,
    mapper: &CoordinateMapper,
) -> Result<Vec<JoinedVariant>> {
    if sites.len() != pvalues.len() {
        return Err(ScanError::RowCountMismatch {
            left: "variants",
            left_rows: sites.len(),
            right: "pvalues",
            right_rows: pvalues.len(),
        });
    }
    for (label, matrix) in [("RO rows", &counts.reference), ("AO rows", &counts.alternate)] {
        if matrix.n_rows() != sites.len() {
            return Err(ScanError::RowCountMismatch {
                left: "variants",
                left_rows: sites.len(),
                right: label,
                right_rows: matrix.n_rows(),
            });
        }
    }

    let selected = schema.select_counts(counts)?;
    let joined: Vec<JoinedVariant> = sites
        .into_iter()
        .zip(pvalues)
        .zip(selected)
        .map(|((site, pvalue), counts)| {
            let (genome_position, window) = mapper.map(&site.chrom, site.pos);
            JoinedVariant {
                site,
                pvalue,
                genome_position,
                window,
                counts,
            }
        })
        .collect();

    let unmapped = joined.iter().filter(|v| v.window.is_none()).count();
    if unmapped > 0 {
        log::warn!(
            "{} variants lie on contigs absent from the reference index and will not be aggregated",
            unmapped
        );
    }
    Ok(joined)
}

/// Rows of one contig, in input order.
#[derive(Debug, Clone)]
pub struct ContigPartition<'a> {
    pub contig: &'a str,
    pub rows: Vec<&'a JoinedVariant>,
}

/// Split variants by contig. Partitions come out in order of first appearance
/// and keep input order within each contig, so the stacked variant table is
/// grouped by contig rather than in input order.
pub fn partition_by_contig(variants: &[JoinedVariant]) -> Vec<ContigPartition<'_>> {
    let mut order: Vec<&str> = Vec::new();
    let mut rows: std::collections::HashMap<&str, Vec<&JoinedVariant>> =
        std::collections::HashMap::new();

    for v in variants {
        let contig = v.site.chrom.as_str();
        rows.entry(contig)
            .or_insert_with(|| {
                order.push(contig);
                Vec::new()
            })
            .push(v);
    }

    order
        .into_iter()
        .map(|contig| ContigPartition {
            contig,
            rows: rows.remove(contig).unwrap_or_default(),
        })
        .collect()
}

/// Statistics of one (contig, window) group.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSummary {
    pub chrom: String,
    pub window: u64,
    pub n_variants: usize,
    /// Q-quantile of the member p-values
    pub pvalue: Option<f64>,
    pub quality: Option<f64>,
    pub total_depth: Option<f64>,
    /// Per-column mean, indexed like `JoinedVariant::counts`
    pub means: Vec<Option<f64>>,
    /// Per-column sample standard deviation; null for singleton windows
    pub stds: Vec<Option<f64>>,
}

/// Outputs of one contig partition.
#[derive(Debug, Clone, Default)]
pub struct PartitionTables {
    pub variants: Vec<ReportRow>,
    pub windows: Vec<WindowSummary>,
}

/// Both reassembled report tables.
#[derive(Debug, Clone, Default)]
pub struct AggregatedTables {
    pub variants: Vec<ReportRow>,
    pub windows: Vec<ReportRow>,
    pub summaries: Vec<WindowSummary>,
}

/// Per-window summarizer with a fixed p-value quantile level.
#[derive(Debug, Clone, Copy)]
pub struct WindowAggregator {
    pvalue_quantile: f64,
}

impl Default for WindowAggregator {
    fn default() -> Self {
        Self {
            pvalue_quantile: crate::config::DEFAULT_PVALUE_QUANTILE,
        }
    }
}

impl WindowAggregator {
    pub fn new(pvalue_quantile: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&pvalue_quantile) {
            return Err(ScanError::config(
                "p-value quantile",
                pvalue_quantile.to_string(),
                "must lie in [0, 1]",
            ));
        }
        Ok(Self { pvalue_quantile })
    }

    pub fn pvalue_quantile(&self) -> f64 {
        self.pvalue_quantile
    }

    fn summarize_window(&self, chrom: &str, window: u64, rows: &[&JoinedVariant], n_columns: usize) -> WindowSummary {
        let column = |c: usize| rows.iter().map(move |v| v.counts[c].map(f64::from));

        WindowSummary {
            chrom: chrom.to_string(),
            window,
            n_variants: rows.len(),
            pvalue: statistics::quantile(rows.iter().map(|v| v.pvalue), self.pvalue_quantile),
            quality: statistics::mean(rows.iter().map(|v| v.site.quality)),
            total_depth: statistics::mean(rows.iter().map(|v| v.site.total_depth.map(|d| d as f64))),
            means: (0..n_columns).map(|c| statistics::mean(column(c))).collect(),
            stds: (0..n_columns).map(|c| statistics::sample_std(column(c))).collect(),
        }
    }

    /// Format every row of a partition and summarize its windows.
    pub fn summarize_partition(&self, partition: &ContigPartition, schema: &PopulationSchema) -> PartitionTables {
        let variants = partition
            .rows
            .iter()
            .map(|v| output::variant_report_row(schema, v))
            .collect();

        let mut groups: BTreeMap<u64, Vec<&JoinedVariant>> = BTreeMap::new();
        for &v in &partition.rows {
            if let Some(window) = v.window {
                groups.entry(window).or_default().push(v);
            }
        }

        let windows = groups
            .iter()
            .map(|(&window, rows)| self.summarize_window(partition.contig, window, rows, schema.n_columns()))
            .collect();

        PartitionTables { variants, windows }
    }

    /// Partition, summarize and reassemble.
    ///
    /// The variant table keeps exactly one row per input variant; the window
    /// table has one row per (contig, window) pair with at least one mapped
    /// variant.
    pub fn aggregate(
        &self,
        variants: &[JoinedVariant],
        schema: &PopulationSchema,
        progress: Option<&ProgressBar>,
    ) -> Result<AggregatedTables> {
        let partitions = partition_by_contig(variants);
        log::info!(
            "Computing quantile {} of pvalue for each pair of contig & window over {} contigs",
            self.pvalue_quantile,
            partitions.len()
        );
        if let Some(pb) = progress {
            pb.set_length(partitions.len() as u64);
        }

        let partials: Vec<PartitionTables> = partitions
            .par_iter()
            .map(|p| {
                let tables = self.summarize_partition(p, schema);
                if let Some(pb) = progress {
                    pb.inc(1);
                }
                tables
            })
            .collect();

        let mut tables = AggregatedTables::default();
        for partial in partials {
            tables.variants.extend(partial.variants);
            tables.summaries.extend(partial.windows);
        }
        tables.windows = tables
            .summaries
            .iter()
            .map(|s| output::window_report_row(schema, s))
            .collect();

        if tables.variants.len() != variants.len() {
            return Err(ScanError::RowCountMismatch {
                left: "formatted variants",
                left_rows: tables.variants.len(),
                right: "input variants",
                right_rows: variants.len(),
            });
        }
        log::info!(
            "Aggregated {} variants into {} windows",
            tables.variants.len(),
            tables.windows.len()
        );
        Ok(tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::{ContigIndex, WindowAnchor, WindowAssigner};
    use approx::assert_relative_eq;
    use std::collections::HashSet;

    fn schema() -> PopulationSchema {
        PopulationSchema::new(["P1"]).unwrap()
    }

    fn site(chrom: &str, pos: u64, quality: f64, depth: u64) -> VariantSite {
        VariantSite {
            chrom: chrom.to_string(),
            pos,
            quality: Some(quality),
            total_depth: Some(depth),
        }
    }

    /// Counts for samples P1_F and P1_M plus an unrelated extra sample.
    fn counts(rows: &[[u32; 4]]) -> AlleleCounts {
        let samples = vec!["X".to_string(), "P1_F".to_string(), "P1_M".to_string()];
        AlleleCounts {
            reference: CountMatrix {
                samples: samples.clone(),
                rows: rows.iter().map(|r| vec![Some(99), Some(r[0]), Some(r[2])]).collect(),
            },
            alternate: CountMatrix {
                samples,
                rows: rows.iter().map(|r| vec![Some(99), Some(r[1]), Some(r[3])]).collect(),
            },
        }
    }

    fn midpoint_mapper() -> CoordinateMapper<'static> {
        CoordinateMapper::relative(WindowAssigner::new(1000, WindowAnchor::Midpoint).unwrap())
    }

    fn sample_dataset() -> Vec<JoinedVariant> {
        let sites = vec![
            site("chr1", 100, 10.0, 20),
            site("chr1", 900, 20.0, 40),
            site("chr1", 1500, 30.0, 60),
            site("chr2", 10, 40.0, 80),
            site("chr1", 1999, 50.0, 100),
        ];
        let pvalues = vec![Some(0.5), Some(0.01), None, Some(0.2), Some(0.3)];
        let c = counts(&[[10, 2, 8, 4], [12, 4, 6, 6], [5, 5, 5, 5], [1, 1, 1, 1], [7, 3, 9, 1]]);
        join_variants(sites, pvalues, &c, &schema(), &midpoint_mapper()).unwrap()
    }

    #[test]
    fn test_schema_layout() {
        let s = PopulationSchema::new(["A", "B", "A"]).unwrap();
        assert_eq!(s.populations(), &["A".to_string(), "B".to_string()]);
        assert_eq!(s.n_columns(), 8);
        assert_eq!(s.column_index(1, Sex::Male, CountKind::Alternate), 7);
        assert_eq!(s.column_name(0, Sex::Female, CountKind::Reference), "A_F_RO");
    }

    #[test]
    fn test_empty_schema_rejected() {
        assert!(PopulationSchema::new(Vec::<String>::new()).is_err());
    }

    #[test]
    fn test_select_counts_missing_sample_is_fatal() {
        let s = PopulationSchema::new(["P2"]).unwrap();
        let err = s.select_counts(&counts(&[[1, 1, 1, 1]])).unwrap_err();
        assert!(matches!(err, ScanError::MissingColumn { .. }));
    }

    #[test]
    fn test_join_rejects_pvalue_mismatch() {
        let sites = vec![site("chr1", 1, 1.0, 1), site("chr1", 2, 1.0, 1)];
        let c = counts(&[[1, 1, 1, 1], [1, 1, 1, 1]]);
        let err = join_variants(sites, vec![Some(0.1)], &c, &schema(), &midpoint_mapper()).unwrap_err();
        assert!(matches!(
            err,
            ScanError::RowCountMismatch { left_rows: 2, right_rows: 1, .. }
        ));
    }

    #[test]
    fn test_join_lays_out_counts_by_schema() {
        let joined = sample_dataset();
        assert_eq!(joined[0].counts, vec![Some(10), Some(2), Some(8), Some(4)]);
        assert_eq!(joined[0].window, Some(500));
        assert_eq!(joined[2].window, Some(1500));
    }

    #[test]
    fn test_partition_order_is_first_appearance() {
        let joined = sample_dataset();
        let parts = partition_by_contig(&joined);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].contig, "chr1");
        assert_eq!(parts[0].rows.len(), 4);
        assert_eq!(parts[1].contig, "chr2");
        assert_eq!(parts[0].rows[3].site.pos, 1999);
    }

    #[test]
    fn test_variant_table_is_grouped_by_contig() {
        let joined = sample_dataset();
        let tables = WindowAggregator::default().aggregate(&joined, &schema(), None).unwrap();
        let order: Vec<(&str, u64)> = tables
            .variants
            .iter()
            .map(|r| (r.chromosome.as_str(), r.position))
            .collect();
        assert_eq!(
            order,
            vec![("chr1", 100), ("chr1", 900), ("chr1", 1500), ("chr1", 1999), ("chr2", 10)]
        );
    }

    #[test]
    fn test_row_count_invariants() {
        let joined = sample_dataset();
        let tables = WindowAggregator::default().aggregate(&joined, &schema(), None).unwrap();
        assert_eq!(tables.variants.len(), joined.len());

        let distinct: HashSet<(String, u64)> = joined
            .iter()
            .filter_map(|v| v.window.map(|w| (v.site.chrom.clone(), w)))
            .collect();
        assert_eq!(tables.windows.len(), distinct.len());
        assert_eq!(tables.windows.len(), 3);
    }

    #[test]
    fn test_window_statistics() {
        let joined = sample_dataset();
        let tables = WindowAggregator::new(0.05).unwrap().aggregate(&joined, &schema(), None).unwrap();

        let w500 = tables.summaries.iter().find(|s| s.chrom == "chr1" && s.window == 500).unwrap();
        assert_eq!(w500.n_variants, 2);
        assert_eq!(w500.pvalue, Some(0.01));
        assert_relative_eq!(w500.quality.unwrap(), 15.0);
        assert_relative_eq!(w500.total_depth.unwrap(), 30.0);
        assert_relative_eq!(w500.means[0].unwrap(), 11.0);
        assert_relative_eq!(w500.stds[0].unwrap(), 2.0_f64.sqrt(), epsilon = 1e-12);

        // Window 1500 on chr1 holds a null p-value and a real one.
        let w1500 = tables.summaries.iter().find(|s| s.chrom == "chr1" && s.window == 1500).unwrap();
        assert_eq!(w1500.pvalue, Some(0.3));

        let row = tables.windows.iter().find(|r| r.chromosome == "chr1" && r.position == 500).unwrap();
        assert_eq!(row.pvalue, Some(0.01));
    }

    #[test]
    fn test_singleton_window_std_is_null() {
        let joined = sample_dataset();
        let tables = WindowAggregator::default().aggregate(&joined, &schema(), None).unwrap();
        let chr2 = tables.summaries.iter().find(|s| s.chrom == "chr2").unwrap();
        assert_eq!(chr2.n_variants, 1);
        assert!(chr2.stds.iter().all(|s| s.is_none()));
        assert!(chr2.means.iter().all(|m| m.is_some()));
    }

    #[test]
    fn test_unknown_contig_kept_in_variants_not_windows() {
        let index = ContigIndex::new(vec![("chr1".to_string(), 5000)]).unwrap();
        let mapper = CoordinateMapper::absolute(&index, WindowAssigner::new(1000, WindowAnchor::Start).unwrap());
        let sites = vec![site("chr1", 1500, 10.0, 10), site("chrUn", 5, 10.0, 10)];
        let c = counts(&[[1, 1, 1, 1], [2, 2, 2, 2]]);
        let joined = join_variants(sites, vec![Some(0.1), Some(0.2)], &c, &schema(), &mapper).unwrap();

        assert_eq!(joined[1].genome_position, None);
        assert_eq!(joined[1].window, None);

        let tables = WindowAggregator::default().aggregate(&joined, &schema(), None).unwrap();
        assert_eq!(tables.variants.len(), 2);
        assert_eq!(tables.variants[1].chromosome, "chrUn");
        assert_eq!(tables.windows.len(), 1);
        assert_eq!(tables.windows[0].position, 1000);
    }

    #[test]
    fn test_empty_input_gives_empty_tables() {
        let tables = WindowAggregator::default().aggregate(&[], &schema(), None).unwrap();
        assert!(tables.variants.is_empty());
        assert!(tables.windows.is_empty());
    }
}
