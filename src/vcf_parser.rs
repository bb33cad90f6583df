use crate::error::ScanError;
use crate::types::VariantSite;
use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Fixed VCF columns before the per-sample genotype columns.
const CHROM_COL: usize = 0;
const POS_COL: usize = 1;
const QUAL_COL: usize = 5;
const INFO_COL: usize = 7;
const FORMAT_COL: usize = 8;
const FIRST_SAMPLE_COL: usize = 9;

/// One data line of a VCF.
#[derive(Debug, Clone)]
pub struct VcfRecord {
    /// 1-based line number in the input, for error messages
    pub line: usize,
    /// The line as read, without its terminator
    pub raw: String,
    pub site: VariantSite,
    /// FORMAT descriptor, absent in sites-only files
    pub format: Option<String>,
    /// Genotype strings, one per sample, in header order
    pub genotypes: Vec<String>,
}

/// A VCF held as header lines plus parsed records.
#[derive(Debug, Clone, Default)]
pub struct VcfTable {
    /// Every `##` meta line followed by the `#CHROM` line, verbatim
    pub header_lines: Vec<String>,
    pub samples: Vec<String>,
    pub records: Vec<VcfRecord>,
}

impl VcfTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn sites(&self) -> impl Iterator<Item = &VariantSite> {
        self.records.iter().map(|r| &r.site)
    }
}

/// Open a plain or gzip-compressed text file.
pub fn open_text(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    if path.extension().and_then(|ext| ext.to_str()) == Some("gz") {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Extract the integer `DP=` tag of an INFO string.
pub fn parse_info_depth(info: &str) -> Option<u64> {
    info.split(';')
        .find_map(|entry| entry.strip_prefix("DP="))
        .and_then(|v| v.parse().ok())
}

fn parse_quality(raw: &str, line: usize) -> Result<Option<f64>, ScanError> {
    if raw == "." {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .map_err(|_| ScanError::parse(line, format!("invalid QUAL '{}'", raw)))
}

fn parse_record(raw: String, line: usize, n_samples: usize) -> Result<VcfRecord, ScanError> {
    let fields: Vec<&str> = raw.split('\t').collect();
    if fields.len() <= INFO_COL {
        return Err(ScanError::parse(
            line,
            format!("expected at least {} columns, found {}", INFO_COL + 1, fields.len()),
        ));
    }
    let found_samples = fields.len().saturating_sub(FIRST_SAMPLE_COL);
    if found_samples != n_samples {
        return Err(ScanError::parse(
            line,
            format!("expected {} sample columns, found {}", n_samples, found_samples),
        ));
    }

    let pos = fields[POS_COL]
        .parse::<u64>()
        .map_err(|_| ScanError::parse(line, format!("invalid POS '{}'", fields[POS_COL])))?;
    let site = VariantSite {
        chrom: fields[CHROM_COL].to_string(),
        pos,
        quality: parse_quality(fields[QUAL_COL], line)?,
        total_depth: parse_info_depth(fields[INFO_COL]),
    };
    let format = fields.get(FORMAT_COL).map(|s| s.to_string());
    let genotypes = fields
        .iter()
        .skip(FIRST_SAMPLE_COL)
        .map(|s| s.to_string())
        .collect();

    Ok(VcfRecord {
        line,
        raw,
        site,
        format,
        genotypes,
    })
}

/// Parse a VCF from any buffered reader.
pub fn parse_vcf_reader<R: BufRead>(reader: R) -> Result<VcfTable> {
    let mut table = VcfTable::default();
    let mut seen_column_header = false;

    for (i, line) in reader.lines().enumerate() {
        let line_no = i + 1;
        let line = line.with_context(|| format!("Failed to read VCF line {}", line_no))?;
        let line = line.trim_end_matches('\r').to_string();

        if line.starts_with("##") {
            table.header_lines.push(line);
            continue;
        }
        if line.starts_with('#') {
            table.samples = line
                .split('\t')
                .skip(FIRST_SAMPLE_COL)
                .map(|s| s.to_string())
                .collect();
            table.header_lines.push(line);
            seen_column_header = true;
            continue;
        }
        if line.is_empty() {
            continue;
        }
        if !seen_column_header {
            return Err(ScanError::parse(line_no, "data line before the #CHROM header").into());
        }
        let record = parse_record(line, line_no, table.samples.len())?;
        table.records.push(record);
    }

    if !seen_column_header {
        anyhow::bail!("VCF has no #CHROM header line");
    }
    Ok(table)
}

/// Parse a VCF file (plain or `.gz`).
pub fn parse_vcf(path: &Path) -> Result<VcfTable> {
    let reader = open_text(path)?;
    let table = parse_vcf_reader(reader)
        .with_context(|| format!("Failed to parse VCF {}", path.display()))?;
    log::info!(
        "Parsed {} variants and {} samples from {}",
        table.len(),
        table.samples.len(),
        path.display()
    );
    Ok(table)
}

/// Parse a p-value stream: one value per line, `NA` is null.
pub fn parse_pvalues_reader<R: std::io::Read>(reader: R) -> Result<Vec<Option<f64>>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(reader);

    let mut pvalues = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("Failed to read p-value row {}", i + 1))?;
        let raw = record.get(0).unwrap_or("").trim();
        let value = match raw {
            "NA" | "" => None,
            other => Some(
                other
                    .parse::<f64>()
                    .map_err(|_| ScanError::parse(i + 1, format!("invalid p-value '{}'", other)))?,
            ),
        };
        pvalues.push(value);
    }
    Ok(pvalues)
}

pub fn parse_pvalues(path: &Path) -> Result<Vec<Option<f64>>> {
    let reader = open_text(path)?;
    parse_pvalues_reader(reader).with_context(|| format!("Failed to parse p-values {}", path.display()))
}
