//! Duration strings in the notation used by Kubernetes APIs (`300ms`, `1.5s`, `1m30s`)
//!
//! Knative and Contour both exchange durations as strings in this format.
//! Values are parsed into `std::time::Duration` on read and rendered back in
//! canonical form (`1m30s`, `1h0m0s`, `1.5s`) when carried into children.

use std::fmt::Write;
use std::time::Duration;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Parse a duration string such as `30s`, `1.5s`, `1h2m3s`, or `250ms`.
///
/// A bare `0` is accepted. Negative durations are rejected.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.is_empty() {
        return Err("empty duration".to_string());
    }
    if s.starts_with('-') {
        return Err(format!("negative duration '{}' is not allowed", input));
    }
    let mut rest = s.strip_prefix('+').unwrap_or(s);
    let mut total: u128 = 0;

    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("missing unit in duration '{}'", input))?;
        if number_len == 0 {
            return Err(format!("invalid duration '{}'", input));
        }
        let (number, tail) = rest.split_at(number_len);
        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);

        let scale: u128 = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => 1_000,
            "ms" => 1_000_000,
            "s" => NANOS_PER_SEC,
            "m" => 60 * NANOS_PER_SEC,
            "h" => 3600 * NANOS_PER_SEC,
            other => return Err(format!("unknown unit '{}' in duration '{}'", other, input)),
        };

        let (whole, frac) = number.split_once('.').unwrap_or((number, ""));
        if whole.is_empty() && frac.is_empty() {
            return Err(format!("invalid duration '{}'", input));
        }
        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| format!("invalid number in duration '{}'", input))?
        };
        let mut value = whole
            .checked_mul(scale)
            .ok_or_else(|| format!("duration '{}' overflows", input))?;
        if !frac.is_empty() {
            if !frac.chars().all(|c| c.is_ascii_digit()) {
                return Err(format!("invalid number in duration '{}'", input));
            }
            // Digits beyond nanosecond precision cannot contribute.
            let digits: String = frac.chars().take(18).collect();
            let numerator: u128 = digits
                .parse()
                .map_err(|_| format!("invalid number in duration '{}'", input))?;
            let denominator = 10u128.pow(digits.len() as u32);
            value += numerator * scale / denominator;
        }
        total = total
            .checked_add(value)
            .ok_or_else(|| format!("duration '{}' overflows", input))?;
        rest = tail;
    }

    let secs = u64::try_from(total / NANOS_PER_SEC)
        .map_err(|_| format!("duration '{}' overflows", input))?;
    Ok(Duration::new(secs, (total % NANOS_PER_SEC) as u32))
}

/// Render a duration in canonical form (`0s`, `250ms`, `1.5s`, `1m30s`, `2h0m0s`)
pub fn format_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }
    if nanos < NANOS_PER_SEC {
        let (unit, divisor) = if nanos < 1_000 {
            ("ns", 1)
        } else if nanos < 1_000_000 {
            ("µs", 1_000)
        } else {
            ("ms", 1_000_000)
        };
        return format!("{}{}", fractional(nanos, divisor), unit);
    }

    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = u128::from(total_secs % 60) * NANOS_PER_SEC + u128::from(d.subsec_nanos());

    let mut out = String::new();
    if hours > 0 {
        let _ = write!(out, "{}h", hours);
    }
    if hours > 0 || minutes > 0 {
        let _ = write!(out, "{}m", minutes);
    }
    let _ = write!(out, "{}s", fractional(seconds, NANOS_PER_SEC));
    out
}

/// `value / divisor` as a decimal with trailing zeros trimmed
fn fractional(value: u128, divisor: u128) -> String {
    let whole = value / divisor;
    let frac = value % divisor;
    if frac == 0 {
        return whole.to_string();
    }
    let width = divisor.to_string().len() - 1;
    let digits = format!("{:0width$}", frac, width = width);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}

/// Serde adapter for `Option<Duration>` fields carried as duration strings
pub mod option {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize an optional duration as its canonical string
    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&super::format_duration(*d)),
            None => s.serialize_none(),
        }
    }

    /// Deserialize an optional duration string
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|raw| super::parse_duration(&raw).map_err(serde::de::Error::custom))
            .transpose()
    }
}
