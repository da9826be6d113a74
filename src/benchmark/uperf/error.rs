//! Error types for uperf output and workload parsing

use crate::util::units::UnitError;
use std::fmt;
use thiserror::Error;

/// How a statistics line failed to match the expected shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineShape {
    /// Fewer whitespace-separated fields than the record needs
    TooFewFields { expected: usize, actual: usize },
    /// The line does not start with the required tag
    MissingPrefix { expected: &'static str },
    /// A field is not a `key:value` pair with the expected key
    BadKeyValue { index: usize, expected_key: &'static str, token: String },
}

impl fmt::Display for LineShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineShape::TooFewFields { expected, actual } => {
                write!(f, "expected at least {} fields, found {}", expected, actual)
            }
            LineShape::MissingPrefix { expected } => {
                write!(f, "expected line to start with {:?}", expected)
            }
            LineShape::BadKeyValue { index, expected_key, token } => {
                write!(f, "field {} should be {}:<value>, found {:?}", index, expected_key, token)
            }
        }
    }
}

/// Why a numeric token could not be read
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error(transparent)]
    Unit(#[from] UnitError),
    #[error("expected an integer")]
    Integer,
    #[error("expected a decimal number")]
    Float,
}

/// Failure while decoding benchmark stdout into statistics records
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StdoutError {
    #[error("malformed {record} line, {shape}: {line:?}")]
    MalformedLine {
        record: &'static str,
        shape: LineShape,
        line: String,
    },
    #[error("unable to parse {field} of {record} from {token:?} ({source}), line: {line:?}")]
    UnitParse {
        record: &'static str,
        field: &'static str,
        token: String,
        line: String,
        #[source]
        source: ValueError,
    },
}

/// Failure while loading a workload profile
#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error("unable to find value for environment variable {name}")]
    UndefinedVariable { name: String },
    #[error("workload is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
    #[error("unable to decode workload XML: {0}")]
    Xml(#[from] quick_xml::DeError),
    #[error("invalid {attribute} attribute {value:?}: {reason}")]
    InvalidAttribute {
        attribute: &'static str,
        value: String,
        reason: String,
    },
}

/// A flowop option token that is not a single `key=value` pair
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unable to parse option, expected 'key=value': {token}")]
pub struct OptionFormatError {
    pub token: String,
}
