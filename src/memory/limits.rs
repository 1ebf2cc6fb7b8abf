// Copyright 2024-2026 GG-CORE Contributors
// Licensed under the Apache License, Version 2.0

//! Reservation limits.
//!
//! A limit caps a pool's `reserved_total`. It is given either as a byte
//! count or as a fraction of the device's total memory, and is resolved to
//! bytes when applied.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use super::error::PoolError;

/// Limit as configured, before resolution against a device.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "RawLimit")]
pub enum LimitSpec {
    Bytes(usize),
    /// Fraction of total device memory, in `[0, 1]`.
    Fraction(f64),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLimit {
    Bytes(usize),
    Text(String),
}

impl TryFrom<RawLimit> for LimitSpec {
    type Error = PoolError;

    fn try_from(raw: RawLimit) -> Result<Self, Self::Error> {
        match raw {
            RawLimit::Bytes(bytes) => Ok(LimitSpec::Bytes(bytes)),
            RawLimit::Text(text) => text.parse(),
        }
    }
}

impl LimitSpec {
    /// Resolve to a byte count. Fractions need the device capacity.
    pub fn resolve(self, total_memory: Option<usize>) -> Result<usize, PoolError> {
        match self {
            LimitSpec::Bytes(bytes) => Ok(bytes),
            LimitSpec::Fraction(fraction) => {
                if !(0.0..=1.0).contains(&fraction) {
                    return Err(PoolError::InvalidLimit(format!(
                        "fraction {fraction} outside [0, 1]"
                    )));
                }
                let total = total_memory.ok_or_else(|| {
                    PoolError::InvalidLimit("device does not report total memory".to_string())
                })?;
                Ok((total as f64 * fraction) as usize)
            }
        }
    }
}

impl FromStr for LimitSpec {
    type Err = PoolError;

    /// Accepts `"1073741824"`, `"512MiB"`, `"2GiB"`, `"64KiB"`, `"1024B"` or `"50%"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || PoolError::InvalidLimit(format!("cannot parse limit {s:?}"));

        if let Some(pct) = s.strip_suffix('%') {
            let pct: f64 = pct.trim().parse().map_err(|_| invalid())?;
            if !(0.0..=100.0).contains(&pct) {
                return Err(PoolError::InvalidLimit(format!("percentage {pct} outside [0, 100]")));
            }
            return Ok(LimitSpec::Fraction(pct / 100.0));
        }

        const UNITS: &[(&str, usize)] = &[
            ("GiB", 1 << 30),
            ("MiB", 1 << 20),
            ("KiB", 1 << 10),
            ("B", 1),
        ];
        for &(suffix, scale) in UNITS {
            if let Some(num) = s.strip_suffix(suffix) {
                let n: usize = num.trim().parse().map_err(|_| invalid())?;
                return n.checked_mul(scale).map(LimitSpec::Bytes).ok_or_else(invalid);
            }
        }
        s.parse::<usize>().map(LimitSpec::Bytes).map_err(|_| invalid())
    }
}

impl fmt::Display for LimitSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitSpec::Bytes(bytes) => write!(f, "{bytes}"),
            LimitSpec::Fraction(fraction) => write!(f, "{}%", fraction * 100.0),
        }
    }
}

/// True if growing `reserved` by `grow` bytes stays within `limit`.
pub(crate) fn fits(reserved: usize, grow: usize, limit: Option<usize>) -> bool {
    match limit {
        None => true,
        Some(limit) => reserved.checked_add(grow).map_or(false, |total| total <= limit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_bytes_and_units() {
        assert_eq!("4096".parse::<LimitSpec>().unwrap(), LimitSpec::Bytes(4096));
        assert_eq!("512MiB".parse::<LimitSpec>().unwrap(), LimitSpec::Bytes(512 << 20));
        assert_eq!("2 GiB".parse::<LimitSpec>().unwrap(), LimitSpec::Bytes(2 << 30));
        assert_eq!("64KiB".parse::<LimitSpec>().unwrap(), LimitSpec::Bytes(64 << 10));
        assert_eq!("100B".parse::<LimitSpec>().unwrap(), LimitSpec::Bytes(100));
    }

    #[test]
    fn parses_percentage() {
        assert_eq!("50%".parse::<LimitSpec>().unwrap(), LimitSpec::Fraction(0.5));
        assert!("150%".parse::<LimitSpec>().is_err());
    }

    #[test]
    fn rejects_garbage() {
        assert!("lots".parse::<LimitSpec>().is_err());
        assert!("-1".parse::<LimitSpec>().is_err());
        assert!("MiB".parse::<LimitSpec>().is_err());
    }

    #[test]
    fn fraction_needs_device_capacity() {
        let spec = LimitSpec::Fraction(0.25);
        assert_eq!(spec.resolve(Some(4096)).unwrap(), 1024);
        assert!(matches!(spec.resolve(None), Err(PoolError::InvalidLimit(_))));
        assert!(LimitSpec::Fraction(1.5).resolve(Some(10)).is_err());
    }

    #[test]
    fn growth_fits_limit() {
        assert!(fits(100, 1000, None));
        assert!(fits(512, 512, Some(1024)));
        assert!(!fits(512, 513, Some(1024)));
        assert!(!fits(usize::MAX, 1, Some(usize::MAX)));
    }

    #[test]
    fn deserializes_from_number_or_string() {
        #[derive(Deserialize)]
        struct Wrapper {
            limit: LimitSpec,
        }
        let w: Wrapper = toml::from_str("limit = 2048").unwrap();
        assert_eq!(w.limit, LimitSpec::Bytes(2048));
        let w: Wrapper = toml::from_str("limit = \"75%\"").unwrap();
        assert_eq!(w.limit, LimitSpec::Fraction(0.75));
    }
}
