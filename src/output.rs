use crate::aggregation::{PopulationSchema, WindowSummary};
use crate::filters::WindowDensity;
use crate::types::{CountKind, CountMatrix, JoinedVariant, ReportRow, Sex};
use crate::vcf_parser::VcfTable;
use anyhow::{Context, Result};
use csv::Writer;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Public schema shared by the per-variant and per-window tables.
pub const REPORT_COLUMNS: [&str; 6] = [
    "chromosome",
    "position",
    "pvalue",
    "quality",
    "total_depth",
    "allele_counts",
];

/// Joins the per-population parts of the `allele_counts` display column.
pub const ALLELE_COUNT_SEPARATOR: &str = "<br>";

const NULL_TOKEN: &str = "NA";

/// Round half away from zero to two decimals, rendered with exactly two.
fn fmt_stat(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}", (v * 100.0).round() / 100.0),
        None => NULL_TOKEN.to_string(),
    }
}

fn fmt_count(value: Option<u32>) -> String {
    value.map_or_else(|| NULL_TOKEN.to_string(), |v| v.to_string())
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(String::new, |v| v.to_string())
}

/// `P_F: 10 / 2<br>P_M: 8 / 4`
pub fn population_variant_counts(schema: &PopulationSchema, population: usize, counts: &[Option<u32>]) -> String {
    let name = &schema.populations()[population];
    let part = |sex: Sex| {
        format!(
            "{}_{}: {} / {}",
            name,
            sex.code(),
            fmt_count(counts[schema.column_index(population, sex, CountKind::Reference)]),
            fmt_count(counts[schema.column_index(population, sex, CountKind::Alternate)]),
        )
    };
    format!("{}{}{}", part(Sex::Female), ALLELE_COUNT_SEPARATOR, part(Sex::Male))
}

/// `P_F: 12.35 (±1.20) / 3.00 (±0.50) <br>P_M: ...`
pub fn population_window_counts(
    schema: &PopulationSchema,
    population: usize,
    means: &[Option<f64>],
    stds: &[Option<f64>],
) -> String {
    let name = &schema.populations()[population];
    let stat = |sex: Sex, kind: CountKind| {
        let c = schema.column_index(population, sex, kind);
        format!("{} (±{})", fmt_stat(means[c]), fmt_stat(stds[c]))
    };
    format!(
        "{}_F: {} / {} {}{}_M: {} / {}",
        name,
        stat(Sex::Female, CountKind::Reference),
        stat(Sex::Female, CountKind::Alternate),
        ALLELE_COUNT_SEPARATOR,
        name,
        stat(Sex::Male, CountKind::Reference),
        stat(Sex::Male, CountKind::Alternate),
    )
}

pub fn variant_allele_counts(schema: &PopulationSchema, counts: &[Option<u32>]) -> String {
    (0..schema.populations().len())
        .map(|p| population_variant_counts(schema, p, counts))
        .collect::<Vec<_>>()
        .join(ALLELE_COUNT_SEPARATOR)
}

pub fn window_allele_counts(schema: &PopulationSchema, means: &[Option<f64>], stds: &[Option<f64>]) -> String {
    (0..schema.populations().len())
        .map(|p| population_window_counts(schema, p, means, stds))
        .collect::<Vec<_>>()
        .join(ALLELE_COUNT_SEPARATOR)
}

/// Per-variant reporting row; `position` is the contig-relative position.
pub fn variant_report_row(schema: &PopulationSchema, variant: &JoinedVariant) -> ReportRow {
    ReportRow {
        chromosome: variant.site.chrom.clone(),
        position: variant.site.pos,
        pvalue: variant.pvalue,
        quality: variant.site.quality,
        total_depth: variant.site.total_depth.map(|d| d as f64),
        allele_counts: variant_allele_counts(schema, &variant.counts),
    }
}

/// Per-window reporting row; `position` is the window id.
pub fn window_report_row(schema: &PopulationSchema, summary: &WindowSummary) -> ReportRow {
    ReportRow {
        chromosome: summary.chrom.clone(),
        position: summary.window,
        pvalue: summary.pvalue,
        quality: summary.quality,
        total_depth: summary.total_depth,
        allele_counts: window_allele_counts(schema, &summary.means, &summary.stds),
    }
}

/// Write a report table (null cells are empty).
pub fn write_report(rows: &[ReportRow], path: &Path) -> Result<()> {
    let mut wtr = Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    wtr.write_record(REPORT_COLUMNS)?;
    for row in rows {
        wtr.write_record(&[
            row.chromosome.clone(),
            row.position.to_string(),
            fmt_opt(row.pvalue),
            fmt_opt(row.quality),
            fmt_opt(row.total_depth),
            row.allele_counts.clone(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Write a count matrix: sample names as header, empty cell for null.
pub fn write_count_matrix(matrix: &CountMatrix, path: &Path) -> Result<()> {
    let mut wtr = Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    wtr.write_record(&matrix.samples)?;
    for row in &matrix.rows {
        wtr.write_record(row.iter().map(|v| v.map_or_else(String::new, |v| v.to_string())))?;
    }

    wtr.flush()?;
    Ok(())
}

/// Write the header of `table` followed by the data lines whose mask is true.
pub fn write_filtered_vcf(table: &VcfTable, mask: &[bool], path: &Path) -> Result<()> {
    if mask.len() != table.len() {
        anyhow::bail!(
            "Filter mask has {} entries for {} variants",
            mask.len(),
            table.len()
        );
    }
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);

    for line in &table.header_lines {
        writeln!(out, "{}", line)?;
    }
    for (record, _) in table.records.iter().zip(mask).filter(|&(_, &keep)| keep) {
        writeln!(out, "{}", record.raw)?;
    }

    out.flush()?;
    Ok(())
}

/// Write the before/after SNP counts per window.
pub fn write_density_table(rows: &[WindowDensity], path: &Path) -> Result<()> {
    let mut wtr = Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    wtr.write_record(["window", "N", "N_filtered"])?;
    for row in rows {
        wtr.write_record(&[
            row.window.to_string(),
            row.n.to_string(),
            row.n_filtered.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
