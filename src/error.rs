use thiserror::Error;

/// Fatal conditions of a scan run. Any of these aborts the run; no partial
/// output is considered valid.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Two inputs that must be positionally aligned have different lengths
    #[error("Number of {left} ({left_rows}) and number of {right} ({right_rows}) do not match")]
    RowCountMismatch {
        left: &'static str,
        left_rows: usize,
        right: &'static str,
        right_rows: usize,
    },

    #[error("More than one FORMAT found: {formats:?}")]
    MultipleFormats { formats: Vec<String> },

    #[error("Field '{field}' not found in FORMAT '{format}'")]
    MissingFormatField { field: String, format: String },

    #[error("Invalid value '{value}' for {name}: {reason}")]
    InvalidConfig {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Column '{column}' missing from {table}")]
    MissingColumn { table: String, column: String },

    /// RO + AO of one sample does not fit the depth type
    #[error("Read depth overflows at variant {row}, sample '{sample}'")]
    CountOverflow { row: usize, sample: String },

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
}

pub type Result<T> = std::result::Result<T, ScanError>;

impl ScanError {
    pub fn config(name: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            name,
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    pub fn missing_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::MissingColumn {
            table: table.into(),
            column: column.into(),
        }
    }
}
