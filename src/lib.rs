//! BenchPulse - run network benchmarks and export structured results
//!
//! BenchPulse runs a benchmark tool, decodes its human-readable output into
//! typed statistics and exports the results as JSON documents.
//!
//! # Architecture
//!
//! - **Benchmarks**: uperf, driven by an XML workload profile with `$VAR` substitution
//! - **Output decoding**: section-aware parser for uperf's console transcript
//! - **Exporters**: JSON to stdout, Elasticsearch bulk indexing, or both
//! - **Replay**: previously captured transcripts go through the same parse/export path

pub mod benchmark;
pub mod config;
pub mod output;
pub mod util;

// Re-export commonly used types
pub use benchmark::uperf::{parse_stdout, ResultDocument};
pub use config::RunConfig;

/// Result type used throughout BenchPulse
pub type Result<T> = anyhow::Result<T>;
