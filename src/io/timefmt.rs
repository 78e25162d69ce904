//! All date/time and numeric value formatting for the output artifacts
//! lives here. The writers never call into chrono directly; when the
//! underlying library changes its formatting behavior, this is the one
//! place that absorbs it.

use crate::error::{BuildError, BuildResult};
use chrono::NaiveDateTime;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// Full date-time with zero-padded hour and minute. A midnight hour is
// written as "00:00:00", never omitted.
pub fn format_datetime(t: &NaiveDateTime) -> String {
    t.format(DATETIME_FORMAT).to_string()
}

pub fn parse_datetime(raw: &str) -> BuildResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), DATETIME_FORMAT).map_err(|e| {
        BuildError::serialization(format!("cannot parse timestamp '{raw}': {e}"))
    })
}

// Time axis unit string of the forcing file.
pub fn reference_units(reference: &NaiveDateTime) -> String {
    format!("minutes since {}", format_datetime(reference))
}

// Offset of a timestamp on the forcing time axis. Minute resolution is the
// finest the target format carries, seconds stay fractional.
pub fn minutes_since(reference: &NaiveDateTime, t: &NaiveDateTime) -> f64 {
    let delta = t.signed_duration_since(*reference);
    delta.num_seconds() as f64 / 60.0
}

// Fixed-precision float for the INI-style writers.
pub fn fmt_f64(value: f64, decimals: usize) -> String {
    format!("{value:.decimals$}")
}

pub fn fmt_list(values: &[f64], decimals: usize) -> String {
    values
        .iter()
        .map(|v| fmt_f64(*v, decimals))
        .collect::<Vec<_>>()
        .join(" ")
}
