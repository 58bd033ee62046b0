//! Human-readable durations: `"250ms"`, `"30s"`, `"2m"`, `"12h"`, or bare seconds.
//!
//! Usable as `#[serde(with = "tollgate_config::duration")]`.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

/// Serialize as whole seconds with an `s` suffix.
pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format!("{}s", duration.as_secs()))
}

/// Deserialize from a duration string.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse(&s).map_err(serde::de::Error::custom)
}

/// Parse a duration string.
pub fn parse(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let invalid = || format!("invalid duration '{s}'");
    let number = |n: &str| n.trim().parse::<u64>().map_err(|_| invalid());
    let scaled = |n: &str, unit: u64| number(n)?.checked_mul(unit).ok_or_else(invalid);

    if let Some(n) = s.strip_suffix("ms") {
        Ok(Duration::from_millis(number(n)?))
    } else if let Some(n) = s.strip_suffix('s') {
        Ok(Duration::from_secs(number(n)?))
    } else if let Some(n) = s.strip_suffix('m') {
        Ok(Duration::from_secs(scaled(n, 60)?))
    } else if let Some(n) = s.strip_suffix('h') {
        Ok(Duration::from_secs(scaled(n, 3600)?))
    } else {
        Ok(Duration::from_secs(number(s)?))
    }
}
