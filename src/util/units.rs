//! Unit normalization for benchmark console output
//!
//! Converts the human-readable sizes, throughputs and durations printed by
//! benchmark tools into canonical numbers: bytes, bytes per second and seconds.
//!
//! Byte quantities use binary prefixes (`66.11GB` is 66.11 * 2^30 bytes).
//! Bit quantities, written with a lowercase `b`, use decimal prefixes and are
//! converted to bytes (`17.56Gb/s` is 17.56 * 10^9 / 8 bytes per second).

use thiserror::Error;

/// Failure to normalize a unit-bearing token
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitError {
    #[error("empty value")]
    Empty,
    #[error("invalid magnitude in {token:?}")]
    InvalidMagnitude { token: String },
    #[error("unknown unit suffix {suffix:?} in {token:?}")]
    UnknownSuffix { token: String, suffix: String },
    #[error("missing unit in duration {token:?}")]
    MissingUnit { token: String },
    #[error("value {token:?} does not fit in 64 bits")]
    OutOfRange { token: String },
}

const KIB: f64 = 1024.0;
const KILO: f64 = 1000.0;

/// Parse a duration such as `1.00(s)`, `32.33s`, `701.00ns` or `1m30s` into seconds
///
/// Parentheses are stripped before parsing. A bare `0` is accepted without a unit.
pub fn parse_duration(text: &str) -> Result<f64, UnitError> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| *c != '(' && *c != ')')
        .collect();

    if cleaned.is_empty() {
        return Err(UnitError::Empty);
    }

    let (sign, mut rest) = match cleaned.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };

    if rest == "0" {
        return Ok(0.0);
    }
    if rest.is_empty() {
        return Err(UnitError::InvalidMagnitude { token: cleaned.clone() });
    }

    let mut total = 0.0;
    while !rest.is_empty() {
        let (magnitude, after) = split_magnitude(rest, &cleaned)?;

        let unit_len = after
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(after.len());
        let (unit, next) = after.split_at(unit_len);
        if unit.is_empty() {
            return Err(UnitError::MissingUnit { token: cleaned.clone() });
        }

        let scale = duration_scale(unit).ok_or_else(|| UnitError::UnknownSuffix {
            token: cleaned.clone(),
            suffix: unit.to_string(),
        })?;

        total += magnitude * scale;
        rest = next;
    }

    Ok(sign * total)
}

/// Parse a byte size such as `66.11GB`, `512`, `4KiB` or `17.32b` into bytes
///
/// The result is rounded to the nearest byte.
pub fn parse_byte_size(text: &str) -> Result<i64, UnitError> {
    let token = text.trim();
    if token.is_empty() {
        return Err(UnitError::Empty);
    }

    let (magnitude, suffix) = split_magnitude(token, token)?;
    let suffix = suffix.trim_start();

    let multiplier = size_multiplier(suffix).ok_or_else(|| UnitError::UnknownSuffix {
        token: token.to_string(),
        suffix: suffix.to_string(),
    })?;

    let bytes = (magnitude * multiplier).round();
    if !bytes.is_finite() || bytes >= i64::MAX as f64 {
        return Err(UnitError::OutOfRange { token: token.to_string() });
    }

    Ok(bytes as i64)
}

/// Parse a rate such as `17.56Gb/s` into bytes per second
pub fn parse_rate(text: &str) -> Result<i64, UnitError> {
    let token = text.trim();
    parse_byte_size(token.strip_suffix("/s").unwrap_or(token))
}

/// Format a byte count with binary prefixes, e.g. `66.11GB`
///
/// The output parses back through [`parse_byte_size`].
pub fn format_byte_size(bytes: i64) -> String {
    let value = bytes as f64;
    let units = [("PB", 5), ("TB", 4), ("GB", 3), ("MB", 2), ("KB", 1)];

    for (suffix, exponent) in units {
        let scale = KIB.powi(exponent);
        if value.abs() >= scale {
            return format!("{:.2}{}", value / scale, suffix);
        }
    }

    format!("{}B", bytes)
}

/// Format a byte rate as a decimal bit rate, e.g. `17.56Gb/s`
///
/// The output parses back through [`parse_rate`].
pub fn format_bit_rate(bytes_per_second: i64) -> String {
    let bits = bytes_per_second as f64 * 8.0;
    let units = [("Tb/s", 4), ("Gb/s", 3), ("Mb/s", 2), ("Kb/s", 1)];

    for (suffix, exponent) in units {
        let scale = KILO.powi(exponent);
        if bits.abs() >= scale {
            return format!("{:.2}{}", bits / scale, suffix);
        }
    }

    format!("{:.2}b/s", bits)
}

/// Format a duration in seconds the way benchmark tables print it, e.g. `34.61us`
pub fn format_seconds(seconds: f64) -> String {
    let abs = seconds.abs();

    if abs == 0.0 {
        "0.00ns".to_string()
    } else if abs < 1e-6 {
        format!("{:.2}ns", seconds * 1e9)
    } else if abs < 1e-3 {
        format!("{:.2}us", seconds * 1e6)
    } else if abs < 1.0 {
        format!("{:.2}ms", seconds * 1e3)
    } else {
        format!("{:.2}s", seconds)
    }
}

/// Split a leading decimal magnitude off `text`, returning it with the remainder
fn split_magnitude<'a>(text: &'a str, token: &str) -> Result<(f64, &'a str), UnitError> {
    let len = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    let (number, rest) = text.split_at(len);

    let magnitude = number
        .parse::<f64>()
        .map_err(|_| UnitError::InvalidMagnitude { token: token.to_string() })?;

    Ok((magnitude, rest))
}

fn duration_scale(unit: &str) -> Option<f64> {
    match unit {
        "ns" => Some(1e-9),
        "us" | "µs" | "μs" => Some(1e-6),
        "ms" => Some(1e-3),
        "s" => Some(1.0),
        "m" => Some(60.0),
        "h" => Some(3600.0),
        _ => None,
    }
}

fn size_multiplier(suffix: &str) -> Option<f64> {
    match suffix {
        "" | "B" => return Some(1.0),
        "b" => return Some(0.125),
        _ => {}
    }

    let mut chars = suffix.chars();
    let exponent = match chars.next()?.to_ascii_lowercase() {
        'k' => 1,
        'm' => 2,
        'g' => 3,
        't' => 4,
        'p' => 5,
        _ => return None,
    };

    match chars.as_str() {
        "" | "B" | "iB" => Some(KIB.powi(exponent)),
        "b" => Some(KILO.powi(exponent) / 8.0),
        _ => None,
    }
}
