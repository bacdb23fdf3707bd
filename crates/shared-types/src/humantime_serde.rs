//! Human-readable `Duration` (de)serialization for configuration structs.
//!
//! Accepts `"250ms"`, `"5s"`, `"2m"` or a bare number of seconds. Use with
//! `#[serde(with = "shared_types::humantime_serde")]`.

use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

/// Suffix and its length in milliseconds. `ms` comes first so it is not
/// read as minutes or seconds.
const UNITS: [(&str, u64); 3] = [("ms", 1), ("s", 1_000), ("m", 60_000)];

pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_duration(*duration))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let text = String::deserialize(deserializer)?;
    parse_duration(&text).map_err(serde::de::Error::custom)
}

/// Whole seconds are written as `"<n>s"`, anything finer as `"<n>ms"`.
pub fn format_duration(duration: Duration) -> String {
    match duration.subsec_millis() {
        0 => format!("{}s", duration.as_secs()),
        _ => format!("{}ms", duration.as_millis()),
    }
}

pub fn parse_duration(text: &str) -> Result<Duration, String> {
    let text = text.trim();
    let (digits, unit_ms) = UNITS
        .iter()
        .find_map(|(suffix, ms)| text.strip_suffix(suffix).map(|rest| (rest.trim(), *ms)))
        .unwrap_or((text, 1_000));

    let amount: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration {:?}", text))?;
    amount
        .checked_mul(unit_ms)
        .map(Duration::from_millis)
        .ok_or_else(|| format!("duration {:?} is too large", text))
}
