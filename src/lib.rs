pub mod aggregation;
pub mod allele_counts;
pub mod config;
pub mod csv_reader;
pub mod dashboard;
pub mod error;
pub mod filters;
pub mod genome;
pub mod output;
pub mod statistics;
pub mod types;
pub mod vcf_parser;

#[cfg(feature = "plotting")]
pub mod plotting;
