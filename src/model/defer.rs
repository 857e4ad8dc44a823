//! Threshold for deferring element values until they are accessed.
use std::fmt;
use std::str::FromStr;

use serde_json::Value;
use snafu::OptionExt;

use crate::error::{InvalidDeferSizeSnafu, ReadError, WrongTypeSnafu};

const UNITS: [(&str, u64); 3] = [("kb", 1_000), ("mb", 1_000_000), ("gb", 1_000_000_000)];

/// Elements whose stored value is longer than this many bytes
/// are not kept in memory after reading.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum DeferSize {
    /// Read every value into memory.
    #[default]
    Never,
    /// Defer values strictly longer than the given number of bytes.
    Above(u64),
}

impl DeferSize {
    pub fn bytes(bytes: u64) -> Self {
        DeferSize::Above(bytes)
    }

    /// Fractional sizes are floored,
    /// which keeps `len > size` equivalent for whole byte lengths.
    pub fn from_f64(size: f64) -> Self {
        if size.is_nan() || size == f64::INFINITY {
            DeferSize::Never
        } else if size <= 0. {
            DeferSize::Above(0)
        } else {
            // `as` saturates at u64::MAX
            DeferSize::Above(size.floor() as u64)
        }
    }

    /// Parse a size such as `"2048"`, `"0.001 KB"` or `"2 MB"`.
    /// Without a unit the size must be a whole number of bytes.
    pub fn parse(expr: &str) -> Result<Self, ReadError> {
        let expr = expr.trim();
        if let Ok(bytes) = expr.parse::<u64>() {
            return Ok(DeferSize::Above(bytes));
        }

        let split = expr
            .find(|c: char| c.is_ascii_alphabetic())
            .unwrap_or(expr.len());
        let (number, unit) = expr.split_at(split);
        let unit = unit.trim().to_ascii_lowercase();
        let factor = UNITS
            .iter()
            .find(|(name, _)| *name == unit)
            .map(|(_, factor)| *factor);
        let number = number.trim();
        let number = number
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.')
            .then(|| number.parse::<f64>().ok())
            .flatten();

        match (number, factor) {
            (Some(number), Some(factor)) if number.is_finite() => {
                Ok(DeferSize::from_f64(number * factor as f64))
            }
            _ => InvalidDeferSizeSnafu { value: expr }.fail(),
        }
    }

    /// Interpret a loosely typed option value:
    /// numbers, strings with a unit and `null` are accepted.
    pub fn from_json(value: &Value) -> Result<Self, ReadError> {
        match value {
            Value::Null => Ok(DeferSize::Never),
            Value::Number(number) => match number.as_u64() {
                Some(bytes) => Ok(DeferSize::Above(bytes)),
                None => number.as_f64().map(DeferSize::from_f64).context(
                    InvalidDeferSizeSnafu {
                        value: number.to_string(),
                    },
                ),
            },
            Value::String(expr) => DeferSize::parse(expr),
            other => WrongTypeSnafu {
                argument: "defer_size",
                expected: "a number, a string or null",
                found: json_type_name(other),
            }
            .fail(),
        }
    }

    pub fn should_defer(&self, length: u64) -> bool {
        match self {
            DeferSize::Never => false,
            DeferSize::Above(size) => length > *size,
        }
    }
}

impl From<u64> for DeferSize {
    fn from(bytes: u64) -> Self {
        DeferSize::Above(bytes)
    }
}

impl FromStr for DeferSize {
    type Err = ReadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeferSize::parse(s)
    }
}

impl fmt::Display for DeferSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeferSize::Never => f.write_str("never"),
            DeferSize::Above(bytes) => write!(f, "{bytes} B"),
        }
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
