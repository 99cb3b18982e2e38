//! Byte sizes written the way people write them in config files ("15MB")

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty size")]
    Empty,

    #[error("invalid size number: {0}")]
    InvalidNumber(String),

    #[error("unknown size unit: {0}")]
    UnknownUnit(String),

    #[error("size overflows u64: {0}")]
    Overflow(String),
}

const KIB: u64 = 1024;

/// Binary multiples, largest first
const UNITS: [(&str, u64); 4] = [
    ("GB", KIB * KIB * KIB),
    ("MB", KIB * KIB),
    ("KB", KIB),
    ("B", 1),
];

/// A byte count; parses `"512"`, `"800KB"`, `"1.5MB"`, `"2GiB"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "RawSize", into = "String")]
pub struct ByteSize(pub u64);

impl ByteSize {
    pub const fn kib(n: u64) -> Self {
        ByteSize(n * KIB)
    }

    pub const fn mib(n: u64) -> Self {
        ByteSize(n * KIB * KIB)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

fn multiplier(unit: &str) -> Option<u64> {
    let unit = unit.trim().to_ascii_uppercase();
    let unit = unit.strip_suffix("IB").map_or(unit.as_str(), |u| u);
    match unit {
        "" | "B" => Some(1),
        "K" | "KB" => Some(KIB),
        "M" | "MB" => Some(KIB * KIB),
        "G" | "GB" => Some(KIB * KIB * KIB),
        _ => None,
    }
}

impl FromStr for ByteSize {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseError::Empty);
        }

        let split = s
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(s.len());
        let (number, unit) = s.split_at(split);

        let scale = multiplier(unit).ok_or_else(|| ParseError::UnknownUnit(unit.to_string()))?;

        if let Ok(whole) = number.parse::<u64>() {
            return whole
                .checked_mul(scale)
                .map(ByteSize)
                .ok_or_else(|| ParseError::Overflow(s.to_string()));
        }

        let fractional: f64 = number
            .parse()
            .map_err(|_| ParseError::InvalidNumber(number.to_string()))?;
        let bytes = (fractional * scale as f64).round();
        if !bytes.is_finite() || bytes < 0.0 || bytes > u64::MAX as f64 {
            return Err(ParseError::Overflow(s.to_string()));
        }
        Ok(ByteSize(bytes as u64))
    }
}

impl fmt::Display for ByteSize {
    /// Largest unit that divides exactly, else one decimal place
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (unit, scale) in UNITS {
            if self.0 >= scale && scale > 1 {
                if self.0 % scale == 0 {
                    return write!(f, "{}{unit}", self.0 / scale);
                }
                return write!(f, "{:.1}{unit}", self.0 as f64 / scale as f64);
            }
        }
        write!(f, "{}B", self.0)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSize {
    Bytes(u64),
    Text(String),
}

impl TryFrom<RawSize> for ByteSize {
    type Error = ParseError;

    fn try_from(raw: RawSize) -> Result<Self, Self::Error> {
        match raw {
            RawSize::Bytes(n) => Ok(ByteSize(n)),
            RawSize::Text(s) => s.parse(),
        }
    }
}

impl From<ByteSize> for String {
    fn from(size: ByteSize) -> Self {
        size.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!("512".parse::<ByteSize>().unwrap(), ByteSize(512));
        assert_eq!("800kb".parse::<ByteSize>().unwrap(), ByteSize::kib(800));
        assert_eq!("15MB".parse::<ByteSize>().unwrap(), ByteSize::mib(15));
        assert_eq!("15 MiB".parse::<ByteSize>().unwrap(), ByteSize::mib(15));
        assert_eq!("2G".parse::<ByteSize>().unwrap().as_u64(), 2 * 1024 * 1024 * 1024);
    }

    #[test]
    fn test_parse_fraction() {
        assert_eq!("1.5MB".parse::<ByteSize>().unwrap(), ByteSize::kib(1536));
        assert_eq!("0.5KB".parse::<ByteSize>().unwrap(), ByteSize(512));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<ByteSize>(), Err(ParseError::Empty));
        assert!(matches!("5XB".parse::<ByteSize>(), Err(ParseError::UnknownUnit(_))));
        assert!(matches!("1.2.3MB".parse::<ByteSize>(), Err(ParseError::InvalidNumber(_))));
        assert!(matches!(
            "99999999999999GB".parse::<ByteSize>(),
            Err(ParseError::Overflow(_))
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(ByteSize(0).to_string(), "0B");
        assert_eq!(ByteSize(900).to_string(), "900B");
        assert_eq!(ByteSize::mib(15).to_string(), "15MB");
        assert_eq!(ByteSize::kib(1536).to_string(), "1.5MB");
    }

    #[test]
    fn test_deserialize_string_or_integer() {
        #[derive(Deserialize)]
        struct Limits {
            a: ByteSize,
            b: ByteSize,
        }
        let parsed: Limits = serde_json::from_str(r#"{"a": "15MB", "b": 2048}"#).unwrap();
        assert_eq!(parsed.a, ByteSize::mib(15));
        assert_eq!(parsed.b, ByteSize::kib(2));

        assert!(serde_json::from_str::<Limits>(r#"{"a": "lots", "b": 1}"#).is_err());
    }
}
