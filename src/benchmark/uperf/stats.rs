//! Statistics records decoded from uperf stdout
//!
//! Every record carries the [`SectionKind`] assigned by the dispatcher when it
//! was parsed. `Display` renders each record back in the layout uperf prints,
//! so a formatted record parses back into an equivalent one.

use crate::util::units::{format_bit_rate, format_byte_size, format_seconds};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Section of uperf output a record was parsed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SectionKind {
    GroupDetails,
    StrandDetails,
    Transaction,
    FlowopAverage,
    TransactionAverage,
    Netstat,
    Run,
    RunDiff,
}

impl SectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::GroupDetails => "group-details",
            SectionKind::StrandDetails => "strand-details",
            SectionKind::Transaction => "transaction",
            SectionKind::FlowopAverage => "flowop-average",
            SectionKind::TransactionAverage => "transaction-average",
            SectionKind::Netstat => "netstat",
            SectionKind::Run => "run",
            SectionKind::RunDiff => "run-diff",
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoding a details line was printed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailsFormat {
    /// Totals and rates pre-computed by uperf for its summary tables
    Computed,
    /// Unaggregated `key:value` samples printed when uperf runs with `-R`
    Raw,
}

/// Measurements of a details line, in exactly one of the two encodings
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum DetailsValues {
    Computed {
        total_bytes: i64,
        total_seconds: f64,
        bytes_per_second: i64,
        ops_per_second: i64,
    },
    Raw {
        timestamp_ms: f64,
        bytes: i64,
        ops: i64,
    },
}

/// One named measurement interval (a transaction, group, strand or total)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailsStat {
    pub name: String,
    pub section: SectionKind,
    #[serde(flatten)]
    pub values: DetailsValues,
}

impl DetailsStat {
    pub fn format(&self) -> DetailsFormat {
        match self.values {
            DetailsValues::Computed { .. } => DetailsFormat::Computed,
            DetailsValues::Raw { .. } => DetailsFormat::Raw,
        }
    }
}

/// Latency averages for one flowop or transaction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AveragesStat {
    pub name: String,
    pub section: SectionKind,
    pub count: i64,
    pub avg_seconds: f64,
    pub cpu_seconds: f64,
    pub max_seconds: f64,
    pub min_seconds: f64,
}

/// Per-interface packet and byte rates
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetstatStat {
    pub name: String,
    pub section: SectionKind,
    pub out_pkts_per_second: i64,
    pub in_pkts_per_second: i64,
    pub out_bytes_per_second: i64,
    pub in_bytes_per_second: i64,
}

/// Run totals reported by one host
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunStat {
    pub hostname: String,
    pub section: SectionKind,
    pub time_seconds: f64,
    pub data_bytes: i64,
    pub throughput_bytes_per_second: i64,
    pub operations: i64,
    pub errors: f64,
}

/// Percentage difference between the hosts' run totals, as computed by uperf
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunStatDiff {
    pub section: SectionKind,
    pub time_delta_percentage: f64,
    pub data_delta_percentage: f64,
    pub throughput_delta_percentage: f64,
    pub operations_delta_percentage: f64,
    pub errors_delta_percentage: f64,
}

/// Any record the dispatcher can produce
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatRecord {
    Details(DetailsStat),
    Averages(AveragesStat),
    Netstat(NetstatStat),
    Run(RunStat),
    RunDiff(RunStatDiff),
}

impl StatRecord {
    /// Section tag assigned at parse time
    pub fn section(&self) -> SectionKind {
        match self {
            StatRecord::Details(stat) => stat.section,
            StatRecord::Averages(stat) => stat.section,
            StatRecord::Netstat(stat) => stat.section,
            StatRecord::Run(stat) => stat.section,
            StatRecord::RunDiff(stat) => stat.section,
        }
    }

    /// Name (or hostname) of the record, if it has one
    pub fn name(&self) -> Option<&str> {
        match self {
            StatRecord::Details(stat) => Some(&stat.name),
            StatRecord::Averages(stat) => Some(&stat.name),
            StatRecord::Netstat(stat) => Some(&stat.name),
            StatRecord::Run(stat) => Some(&stat.hostname),
            StatRecord::RunDiff(_) => None,
        }
    }
}

impl From<DetailsStat> for StatRecord {
    fn from(stat: DetailsStat) -> Self {
        StatRecord::Details(stat)
    }
}

impl From<AveragesStat> for StatRecord {
    fn from(stat: AveragesStat) -> Self {
        StatRecord::Averages(stat)
    }
}

impl From<NetstatStat> for StatRecord {
    fn from(stat: NetstatStat) -> Self {
        StatRecord::Netstat(stat)
    }
}

impl From<RunStat> for StatRecord {
    fn from(stat: RunStat) -> Self {
        StatRecord::Run(stat)
    }
}

impl From<RunStatDiff> for StatRecord {
    fn from(stat: RunStatDiff) -> Self {
        StatRecord::RunDiff(stat)
    }
}

// Display trait implementations

impl fmt::Display for DetailsStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.values {
            DetailsValues::Computed {
                total_bytes,
                total_seconds,
                bytes_per_second,
                ops_per_second,
            } => write!(
                f,
                "{:<8} {:>10} / {:>6.2}(s) = {:>12} {:>11}op/s",
                self.name,
                format_byte_size(*total_bytes),
                total_seconds,
                format_bit_rate(*bytes_per_second),
                ops_per_second
            ),
            DetailsValues::Raw { timestamp_ms, bytes, ops } => write!(
                f,
                "timestamp_ms:{:.4} name:{} nr_bytes:{} nr_ops:{}",
                timestamp_ms, self.name, bytes, ops
            ),
        }
    }
}

impl fmt::Display for AveragesStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<16} {:>8} {:>11} {:>11} {:>11} {:>11}",
            self.name,
            self.count,
            format_seconds(self.avg_seconds),
            format_seconds(self.cpu_seconds),
            format_seconds(self.max_seconds),
            format_seconds(self.min_seconds)
        )
    }
}

impl fmt::Display for NetstatStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<8} {:>10} {:>11} {:>12} {:>12}",
            self.name,
            self.out_pkts_per_second,
            self.in_pkts_per_second,
            format_bit_rate(self.out_bytes_per_second),
            format_bit_rate(self.in_bytes_per_second)
        )
    }
}

impl fmt::Display for RunStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<16} {:>8.2}s {:>10} {:>12} {:>12} {:>11.2}",
            self.hostname,
            self.time_seconds,
            format_byte_size(self.data_bytes),
            format_bit_rate(self.throughput_bytes_per_second),
            self.operations,
            self.errors
        )
    }
}

impl fmt::Display for RunStatDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Difference(%) {:>9.2}% {:>9.2}% {:>11.2}% {:>11.2}% {:>10.2}%",
            self.time_delta_percentage,
            self.data_delta_percentage,
            self.throughput_delta_percentage,
            self.operations_delta_percentage,
            self.errors_delta_percentage
        )
    }
}

impl fmt::Display for StatRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatRecord::Details(stat) => fmt::Display::fmt(stat, f),
            StatRecord::Averages(stat) => fmt::Display::fmt(stat, f),
            StatRecord::Netstat(stat) => fmt::Display::fmt(stat, f),
            StatRecord::Run(stat) => fmt::Display::fmt(stat, f),
            StatRecord::RunDiff(stat) => fmt::Display::fmt(stat, f),
        }
    }
}
