//! Parsing of command-line instants and durations.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeZone};

const LOCAL_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"];

/// Accepts RFC 3339 (`2026-03-20T15:00:00+01:00`), local wall-clock time
/// (`2026-03-20T15:00`, `2026-03-20 15:00`) or a bare date, meaning local
/// midnight.
pub fn parse_instant(input: &str) -> Result<DateTime<FixedOffset>> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt);
    }

    let naive = LOCAL_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(input, "%Y-%m-%d")
                .ok()
                .map(|date| date.and_time(chrono::NaiveTime::MIN))
        })
        .ok_or_else(|| anyhow::anyhow!("Could not parse date/time: \"{}\"", input))?;

    let local = Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| anyhow::anyhow!("\"{}\" does not exist in the local timezone", input))?;

    Ok(local.fixed_offset())
}

/// `"1h"`, `"45m"`, `"1h 30m"`
pub fn parse_duration(input: &str) -> Result<Duration> {
    let std_dur = humantime::parse_duration(input)
        .map_err(|e| anyhow::anyhow!("{}", e))
        .with_context(|| format!("Could not parse duration: \"{}\"", input))?;
    Duration::from_std(std_dur).context("Duration too large")
}
