//! Per-sample reference/alternate observation counts from genotype strings.

use crate::error::{Result, ScanError};
use crate::types::{CountKind, CountMatrix};
use crate::vcf_parser::{VcfRecord, VcfTable};

const FORMAT_DELIMITER: char = ':';
const MISSING_VALUE: &str = ".";

/// RO and AO matrices of one VCF, aligned row for row with its records.
#[derive(Debug, Clone, PartialEq)]
pub struct AlleleCounts {
    pub reference: CountMatrix,
    pub alternate: CountMatrix,
}

impl AlleleCounts {
    pub fn get(&self, kind: CountKind) -> &CountMatrix {
        match kind {
            CountKind::Reference => &self.reference,
            CountKind::Alternate => &self.alternate,
        }
    }

    /// Per-sample read depth (RO + AO).
    pub fn depth(&self) -> Result<CountMatrix> {
        self.reference.elementwise_sum(&self.alternate)
    }
}

/// Collapse sample names such as `LU26_M_LU26_M` (a name repeated by the
/// variant caller) to `LU26_M`.
pub fn clean_duplicated_sample_name(name: &str) -> String {
    let parts: Vec<&str> = name.split('_').collect();
    if parts.len() == 4 && parts[..2] == parts[2..] {
        return parts[..2].join("_");
    }
    name.to_string()
}

/// The single FORMAT descriptor shared by every record, or `None` for an
/// empty table. More than one distinct descriptor is fatal.
pub fn uniform_format(records: &[VcfRecord]) -> Result<Option<&str>> {
    let mut formats: Vec<&str> = Vec::new();
    for record in records {
        let format = record.format.as_deref().ok_or_else(|| ScanError::MissingFormatField {
            field: "FORMAT".to_string(),
            format: format!("(none at line {})", record.line),
        })?;
        if !formats.contains(&format) {
            formats.push(format);
        }
    }
    match formats.len() {
        0 => Ok(None),
        1 => Ok(Some(formats[0])),
        _ => Err(ScanError::MultipleFormats {
            formats: formats.into_iter().map(String::from).collect(),
        }),
    }
}

/// Zero-based index of `field` in a colon-delimited FORMAT descriptor.
pub fn field_index(format: &str, field: &str) -> Result<usize> {
    format
        .split(FORMAT_DELIMITER)
        .position(|f| f == field)
        .ok_or_else(|| ScanError::MissingFormatField {
            field: field.to_string(),
            format: format.to_string(),
        })
}

fn parse_count_token(genotype: &str, idx: usize, line: usize, sample: &str) -> Result<Option<u32>> {
    match genotype.split(FORMAT_DELIMITER).nth(idx) {
        None => Ok(None),
        Some(MISSING_VALUE) | Some("") => Ok(None),
        Some(token) => token.parse::<u32>().map(Some).map_err(|_| {
            ScanError::parse(
                line,
                format!("sample '{}': count '{}' is not an integer", sample, token),
            )
        }),
    }
}

fn extract_matrix(table: &VcfTable, samples: &[String], idx: usize) -> Result<CountMatrix> {
    let mut matrix = CountMatrix::new(samples.to_vec());
    matrix.rows.reserve(table.len());
    for record in &table.records {
        let row = record
            .genotypes
            .iter()
            .zip(samples)
            .map(|(gt, sample)| parse_count_token(gt, idx, record.line, sample))
            .collect::<Result<Vec<_>>>()?;
        matrix.rows.push(row);
    }
    Ok(matrix)
}

/// Extract the counts named by `kind` (`RO` or `AO`) for every sample.
pub fn extract_counts(table: &VcfTable, kind: CountKind) -> Result<CountMatrix> {
    let samples: Vec<String> = table
        .samples
        .iter()
        .map(|s| clean_duplicated_sample_name(s))
        .collect();
    match uniform_format(&table.records)? {
        None => Ok(CountMatrix::new(samples)),
        Some(format) => {
            let idx = field_index(format, kind.tag())?;
            extract_matrix(table, &samples, idx)
        }
    }
}

/// Extract both RO and AO, resolving the FORMAT descriptor once.
pub fn extract_allele_counts(table: &VcfTable) -> Result<AlleleCounts> {
    let samples: Vec<String> = table
        .samples
        .iter()
        .map(|s| clean_duplicated_sample_name(s))
        .collect();

    let counts = match uniform_format(&table.records)? {
        None => AlleleCounts {
            reference: CountMatrix::new(samples.clone()),
            alternate: CountMatrix::new(samples),
        },
        Some(format) => {
            let ro_idx = field_index(format, CountKind::Reference.tag())?;
            let ao_idx = field_index(format, CountKind::Alternate.tag())?;
            AlleleCounts {
                reference: extract_matrix(table, &samples, ro_idx)?,
                alternate: extract_matrix(table, &samples, ao_idx)?,
            }
        }
    };

    log::info!(
        "Extracted RO/AO counts for {} samples over {} variants",
        counts.reference.n_samples(),
        counts.reference.n_rows()
    );
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcf_parser::parse_vcf_reader;

    const HEADER: &str = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tP1_F_P1_F\tP1_M\n";

    fn table(body: &str) -> VcfTable {
        parse_vcf_reader(format!("{}{}", HEADER, body).as_bytes()).unwrap()
    }

    #[test]
    fn test_extracts_ro_and_ao() {
        let t = table(
            "chr1\t1\t.\tA\tT\t50\t.\tDP=20\tGT:RO:AO\t0/1:4:6\t0/1:7:3\n\
             chr1\t2\t.\tA\tT\t50\t.\tDP=20\tGT:RO:AO\t./.:.:.\t0/0:9:0\n",
        );
        let counts = extract_allele_counts(&t).unwrap();
        assert_eq!(counts.reference.samples, vec!["P1_F", "P1_M"]);
        assert_eq!(counts.reference.rows, vec![vec![Some(4), Some(7)], vec![None, Some(9)]]);
        assert_eq!(counts.alternate.rows, vec![vec![Some(6), Some(3)], vec![None, Some(0)]]);
        assert_eq!(counts.depth().unwrap().rows[0], vec![Some(10), Some(10)]);
    }

    #[test]
    fn test_multiple_formats_fail_fast() {
        let t = table(
            "chr1\t1\t.\tA\tT\t50\t.\tDP=20\tGT:RO:AO\t0/1:4:6\t0/1:7:3\n\
             chr1\t2\t.\tA\tT\t50\t.\tDP=20\tGT:AO:RO\t0/1:4:6\t0/1:7:3\n",
        );
        let err = extract_counts(&t, CountKind::Reference).unwrap_err();
        match err {
            ScanError::MultipleFormats { formats } => {
                assert_eq!(formats, vec!["GT:RO:AO", "GT:AO:RO"]);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_missing_field_in_format() {
        let t = table("chr1\t1\t.\tA\tT\t50\t.\tDP=20\tGT:DP\t0/1:4\t0/1:7\n");
        assert!(matches!(
            extract_counts(&t, CountKind::Alternate),
            Err(ScanError::MissingFormatField { .. })
        ));
    }

    #[test]
    fn test_truncated_genotype_is_null() {
        let t = table("chr1\t1\t.\tA\tT\t50\t.\tDP=20\tGT:RO:AO\t./.\t0/1:7:3\n");
        let ao = extract_counts(&t, CountKind::Alternate).unwrap();
        assert_eq!(ao.rows[0], vec![None, Some(3)]);
    }

    #[test]
    fn test_non_integer_count_is_error() {
        let t = table("chr1\t1\t.\tA\tT\t50\t.\tDP=20\tGT:RO:AO\t0/1:x:3\t0/1:7:3\n");
        assert!(matches!(
            extract_counts(&t, CountKind::Reference),
            Err(ScanError::Parse { line: 2, .. })
        ));
    }

    #[test]
    fn test_empty_table_yields_empty_matrix() {
        let t = table("");
        let counts = extract_allele_counts(&t).unwrap();
        assert_eq!(counts.reference.n_rows(), 0);
        assert_eq!(counts.reference.n_samples(), 2);
    }

    #[test]
    fn test_clean_duplicated_sample_name() {
        assert_eq!(clean_duplicated_sample_name("LU26_M_LU26_M"), "LU26_M");
        assert_eq!(clean_duplicated_sample_name("LU26_M"), "LU26_M");
        assert_eq!(clean_duplicated_sample_name("LU26_M_ST24_M"), "LU26_M_ST24_M");
    }

    #[test]
    fn test_depth_overflow_is_reported() {
        let t = table("chr1\t1\t.\tA\tT\t50\t.\tDP=20\tGT:RO:AO\t0/1:3000000000:3000000000\t0/1:7:3\n");
        let counts = extract_allele_counts(&t).unwrap();
        match counts.depth() {
            Err(ScanError::CountOverflow { row, sample }) => {
                assert_eq!(row, 1);
                assert_eq!(sample, "P1_F");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
