use crate::error::ScanError;
use crate::genome::ContigIndex;
use crate::types::{CountMatrix, ReportRow};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct DesignRow {
    population: String,
}

fn parse_optional<T: std::str::FromStr>(field: &str) -> Option<T> {
    match field.trim() {
        "" | "NA" | "." => None,
        s => s.parse().ok(),
    }
}

/// Read a count table written by `write_count_matrix` (header = sample
/// names, empty / `NA` / `.` cells are null).
pub fn read_count_table(path: &Path) -> Result<CountMatrix> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open count table: {}", path.display()))?;

    let samples: Vec<String> = rdr.headers()?.iter().map(String::from).collect();
    let mut matrix = CountMatrix::new(samples);
    for (i, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("Failed to parse CSV row {}", i + 1))?;
        let row = record
            .iter()
            .map(|field| match field.trim() {
                "" | "NA" | "." => Ok(None),
                s => s
                    .parse::<u32>()
                    .map(Some)
                    .map_err(|_| ScanError::parse(i + 2, format!("count '{}' is not an integer", s))),
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        matrix.rows.push(row);
    }
    log::info!(
        "Loaded {} x {} counts from {}",
        matrix.n_rows(),
        matrix.n_samples(),
        path.display()
    );
    Ok(matrix)
}

/// Populations named in a design table, in order of first appearance.
pub fn read_design_populations(path: &Path) -> Result<Vec<String>> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open design file: {}", path.display()))?;

    if !rdr.headers()?.iter().any(|h| h == "population") {
        return Err(ScanError::missing_column(path.display().to_string(), "population").into());
    }

    let mut populations: Vec<String> = Vec::new();
    for (i, row) in rdr.deserialize::<DesignRow>().enumerate() {
        let row = row.with_context(|| format!("Failed to parse design row {}", i + 1))?;
        if !populations.contains(&row.population) {
            populations.push(row.population);
        }
    }
    Ok(populations)
}

/// Read a FASTA index: tab-separated, no header, contig name and length in
/// the first two columns. Remaining columns are ignored.
pub fn read_fai(path: &Path) -> Result<ContigIndex> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open reference index: {}", path.display()))?;

    let mut contigs = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("Failed to parse index row {}", i + 1))?;
        let ctx = || format!("Index row {}: expected contig name and length", i + 1);
        let name = record.get(0).with_context(ctx)?.to_string();
        let length: u64 = record.get(1).with_context(ctx)?.parse().with_context(ctx)?;
        contigs.push((name, length));
    }
    Ok(ContigIndex::new(contigs)?)
}

/// Read a report table (per-variant or per-window) back from CSV.
pub fn load_report_csv(path: &Path) -> Result<Vec<ReportRow>> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;

    let headers = rdr.headers()?.clone();
    let column = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| ScanError::missing_column(path.display().to_string(), name).into())
    };
    let chrom_idx = column("chromosome")?;
    let pos_idx = column("position")?;
    let pvalue_idx = column("pvalue")?;
    let quality_idx = column("quality")?;
    let depth_idx = column("total_depth")?;
    let counts_idx = column("allele_counts")?;

    let mut rows = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("Failed to parse CSV row {}", i + 1))?;
        let ctx = || format!("row {}", i + 1);
        rows.push(ReportRow {
            chromosome: record.get(chrom_idx).with_context(ctx)?.to_string(),
            position: record.get(pos_idx).with_context(ctx)?.trim().parse().with_context(ctx)?,
            pvalue: record.get(pvalue_idx).and_then(parse_optional),
            quality: record.get(quality_idx).and_then(parse_optional),
            total_depth: record.get(depth_idx).and_then(parse_optional),
            allele_counts: record.get(counts_idx).unwrap_or_default().to_string(),
        });
    }
    log::info!("Loaded {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{write_count_matrix, write_report};
    use std::fs;

    #[test]
    fn test_count_table_round_trip_keeps_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("RO_counts.csv");
        let matrix = CountMatrix {
            samples: vec!["P_F".into(), "P_M".into()],
            rows: vec![vec![Some(3), None], vec![Some(0), Some(12)]],
        };
        write_count_matrix(&matrix, &path).unwrap();
        assert_eq!(read_count_table(&path).unwrap(), matrix);
    }

    #[test]
    fn test_count_table_na_is_null() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("AO_counts.csv");
        fs::write(&path, "A,B\nNA,4\n.,\n").unwrap();
        let m = read_count_table(&path).unwrap();
        assert_eq!(m.rows, vec![vec![None, Some(4)], vec![None, None]]);
    }

    #[test]
    fn test_design_populations_unique_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("design.csv");
        fs::write(&path, "sample,population,sex\nA1,LU,F\nA2,LU,M\nB1,ST,F\nB2,ST,M\n").unwrap();
        assert_eq!(read_design_populations(&path).unwrap(), vec!["LU", "ST"]);
    }

    #[test]
    fn test_design_without_population_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("design.csv");
        fs::write(&path, "sample,sex\nA1,F\n").unwrap();
        assert!(read_design_populations(&path).is_err());
    }

    #[test]
    fn test_read_fai_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genome.fa.fai");
        fs::write(&path, "A\t100\t3\t60\t61\nB\t200\t110\t60\t61\n").unwrap();
        let index = read_fai(&path).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.absolute_position("B", 1), Some(101));
    }

    #[test]
    fn test_report_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        let rows = vec![
            ReportRow {
                chromosome: "chr1".into(),
                position: 1500,
                pvalue: Some(0.001),
                quality: None,
                total_depth: Some(22.5),
                allele_counts: "P_F: 1 / 2<br>P_M: 3 / 4".into(),
            },
        ];
        write_report(&rows, &path).unwrap();
        assert_eq!(load_report_csv(&path).unwrap(), rows);
    }
}
