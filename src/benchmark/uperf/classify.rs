//! Line classifiers
//!
//! Each classifier turns one line of uperf output into one typed record, or
//! explains why the line does not have the record's shape. Field counts are
//! checked as "at least N" because uperf sometimes glues unrelated debug text
//! onto the end of a statistics line; tokens past position N are ignored.

use super::error::{LineShape, StdoutError, ValueError};
use super::stats::{
    AveragesStat, DetailsStat, DetailsValues, NetstatStat, RunStat, RunStatDiff, SectionKind,
};
use crate::util::units::{self, UnitError};

/// Tag that starts every raw-format details line
pub const RAW_DETAILS_PREFIX: &str = "timestamp_ms";

/// Tag that starts the percentage-difference row of the run statistics
pub const RUN_DIFF_PREFIX: &str = "Difference(%)";

const COMPUTED_DETAILS: &str = "computed details";
const RAW_DETAILS: &str = "raw details";
const AVERAGES: &str = "averages";
const NETSTAT: &str = "netstat";
const RUN: &str = "run statistics";
const RUN_DIFF: &str = "run difference";

/// Split `line` on whitespace, requiring at least `expected` fields
pub fn require_min_fields<'a>(
    line: &'a str,
    expected: usize,
    record: &'static str,
) -> Result<Vec<&'a str>, StdoutError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < expected {
        return Err(StdoutError::MalformedLine {
            record,
            shape: LineShape::TooFewFields {
                expected,
                actual: fields.len(),
            },
            line: line.to_string(),
        });
    }
    Ok(fields)
}

/// Require `line` to start with `prefix`
pub fn require_prefix(line: &str, prefix: &'static str, record: &'static str) -> Result<(), StdoutError> {
    if !line.starts_with(prefix) {
        return Err(StdoutError::MalformedLine {
            record,
            shape: LineShape::MissingPrefix { expected: prefix },
            line: line.to_string(),
        });
    }
    Ok(())
}

/// Fields of one line, with helpers that attach the line to any error
struct Fields<'a> {
    record: &'static str,
    line: &'a str,
    fields: Vec<&'a str>,
}

impl<'a> Fields<'a> {
    fn split(line: &'a str, expected: usize, record: &'static str) -> Result<Self, StdoutError> {
        let fields = require_min_fields(line, expected, record)?;
        Ok(Self { record, line, fields })
    }

    fn text(&self, index: usize) -> &'a str {
        self.fields[index]
    }

    fn value_error(&self, token: &str, field: &'static str, source: ValueError) -> StdoutError {
        StdoutError::UnitParse {
            record: self.record,
            field,
            token: token.to_string(),
            line: self.line.to_string(),
            source,
        }
    }

    fn unit<T>(
        &self,
        index: usize,
        field: &'static str,
        parse: impl Fn(&str) -> Result<T, UnitError>,
    ) -> Result<T, StdoutError> {
        let token = self.fields[index];
        parse(token).map_err(|e| self.value_error(token, field, e.into()))
    }

    fn integer_token(&self, token: &str, field: &'static str) -> Result<i64, StdoutError> {
        token
            .parse::<i64>()
            .map_err(|_| self.value_error(token, field, ValueError::Integer))
    }

    fn integer(&self, index: usize, field: &'static str) -> Result<i64, StdoutError> {
        self.integer_token(self.fields[index], field)
    }

    fn float_token(&self, token: &str, field: &'static str) -> Result<f64, StdoutError> {
        token
            .parse::<f64>()
            .map_err(|_| self.value_error(token, field, ValueError::Float))
    }

    fn float(&self, index: usize, field: &'static str) -> Result<f64, StdoutError> {
        self.float_token(self.fields[index], field)
    }

    /// Value of a `key:value` field, checking the key
    fn key_value(&self, index: usize, key: &'static str) -> Result<&'a str, StdoutError> {
        let token = self.fields[index];
        let mut parts = token.split(':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(k), Some(value), None) if k == key => Ok(value),
            _ => Err(StdoutError::MalformedLine {
                record: self.record,
                shape: LineShape::BadKeyValue {
                    index,
                    expected_key: key,
                    token: token.to_string(),
                },
                line: self.line.to_string(),
            }),
        }
    }
}

/// True when `line` is a raw-format details sample
pub fn is_raw_details(line: &str) -> bool {
    line.starts_with(RAW_DETAILS_PREFIX)
}

/// True when `line` is the percentage-difference row of the run statistics
pub fn is_run_diff(line: &str) -> bool {
    line.starts_with(RUN_DIFF_PREFIX)
}

/// Parse a details line in whichever encoding it was printed
pub fn parse_details_stat(line: &str, section: SectionKind) -> Result<DetailsStat, StdoutError> {
    if is_raw_details(line) {
        parse_details_stat_raw(line, section)
    } else {
        parse_details_stat_computed(line, section)
    }
}

/// Parse a computed details line
///
/// ```text
/// Txn2      66.11GB /  32.33(s) =    17.56Gb/s      267977op/s
/// ```
pub fn parse_details_stat_computed(line: &str, section: SectionKind) -> Result<DetailsStat, StdoutError> {
    let fields = Fields::split(line, 7, COMPUTED_DETAILS)?;

    let total_bytes = fields.unit(1, "total_bytes", units::parse_byte_size)?;
    let total_seconds = fields.unit(3, "total_seconds", units::parse_duration)?;
    let bytes_per_second = fields.unit(5, "bytes_per_second", units::parse_rate)?;

    let ops = fields.text(6);
    let ops_per_second =
        fields.integer_token(ops.strip_suffix("op/s").unwrap_or(ops), "ops_per_second")?;

    Ok(DetailsStat {
        name: fields.text(0).to_string(),
        section,
        values: DetailsValues::Computed {
            total_bytes,
            total_seconds,
            bytes_per_second,
            ops_per_second,
        },
    })
}

/// Parse a raw details sample
///
/// ```text
/// timestamp_ms:1644254626628.9016 name:Group0 nr_bytes:7995523072 nr_ops:9760162
/// ```
pub fn parse_details_stat_raw(line: &str, section: SectionKind) -> Result<DetailsStat, StdoutError> {
    require_prefix(line, RAW_DETAILS_PREFIX, RAW_DETAILS)?;
    let fields = Fields::split(line, 4, RAW_DETAILS)?;

    let timestamp_ms = fields.float_token(fields.key_value(0, "timestamp_ms")?, "timestamp_ms")?;
    let name = fields.key_value(1, "name")?;
    let bytes = fields.integer_token(fields.key_value(2, "nr_bytes")?, "bytes")?;
    let ops = fields.integer_token(fields.key_value(3, "nr_ops")?, "ops")?;

    Ok(DetailsStat {
        name: name.to_string(),
        section,
        values: DetailsValues::Raw {
            timestamp_ms,
            bytes,
            ops,
        },
    })
}

/// Parse a flowop or transaction averages row
///
/// ```text
/// connect                1    106.60us      0.00ns    106.60us    106.60us
/// ```
pub fn parse_averages_stat(line: &str, section: SectionKind) -> Result<AveragesStat, StdoutError> {
    let fields = Fields::split(line, 6, AVERAGES)?;

    Ok(AveragesStat {
        name: fields.text(0).to_string(),
        section,
        count: fields.integer(1, "count")?,
        avg_seconds: fields.unit(2, "avg_seconds", units::parse_duration)?,
        cpu_seconds: fields.unit(3, "cpu_seconds", units::parse_duration)?,
        max_seconds: fields.unit(4, "max_seconds", units::parse_duration)?,
        min_seconds: fields.unit(5, "min_seconds", units::parse_duration)?,
    })
}

/// Parse a netstat row
///
/// ```text
/// lo         267977      267977    17.62Gb/s    17.62Gb/s
/// ```
pub fn parse_netstat_stat(line: &str, section: SectionKind) -> Result<NetstatStat, StdoutError> {
    let fields = Fields::split(line, 5, NETSTAT)?;

    Ok(NetstatStat {
        name: fields.text(0).to_string(),
        section,
        out_pkts_per_second: fields.integer(1, "out_pkts_per_second")?,
        in_pkts_per_second: fields.integer(2, "in_pkts_per_second")?,
        out_bytes_per_second: fields.unit(3, "out_bytes_per_second", units::parse_rate)?,
        in_bytes_per_second: fields.unit(4, "in_bytes_per_second", units::parse_rate)?,
    })
}

/// Parse a per-host run statistics row
///
/// ```text
/// master            32.33s    66.11GB    17.56Gb/s      8664523        0.00
/// ```
pub fn parse_run_stat(line: &str, section: SectionKind) -> Result<RunStat, StdoutError> {
    let fields = Fields::split(line, 6, RUN)?;

    Ok(RunStat {
        hostname: fields.text(0).to_string(),
        section,
        time_seconds: fields.unit(1, "time_seconds", units::parse_duration)?,
        data_bytes: fields.unit(2, "data_bytes", units::parse_byte_size)?,
        throughput_bytes_per_second: fields.unit(3, "throughput_bytes_per_second", units::parse_rate)?,
        operations: fields.integer(4, "operations")?,
        errors: fields.float(5, "errors")?,
    })
}

/// Parse the percentage-difference row of the run statistics
///
/// ```text
/// Difference(%)     -0.00%     11.41%       11.41%       11.41%       0.00%
/// ```
pub fn parse_run_stat_diff(line: &str, section: SectionKind) -> Result<RunStatDiff, StdoutError> {
    require_prefix(line, RUN_DIFF_PREFIX, RUN_DIFF)?;

    let stripped = line.replace('%', "");
    let fields = Fields::split(&stripped, 6, RUN_DIFF)?;

    Ok(RunStatDiff {
        section,
        time_delta_percentage: fields.float(1, "time_delta_percentage")?,
        data_delta_percentage: fields.float(2, "data_delta_percentage")?,
        throughput_delta_percentage: fields.float(3, "throughput_delta_percentage")?,
        operations_delta_percentage: fields.float(4, "operations_delta_percentage")?,
        errors_delta_percentage: fields.float(5, "errors_delta_percentage")?,
    })
}
