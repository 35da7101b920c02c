//! Time coordinate decoding and rendering.
//!
//! Time coordinates are stored as numbers with a `units` attribute of the form
//! `<unit> since <reference>`, for example `hours since 2023-01-01 00:00:00`.

use crate::error::FlowmapError;

use std::str::FromStr;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

const REFERENCE_DATE: &[FormatItem<'_>] =
    format_description!("[year]-[month padding:none]-[day padding:none]");

const REFERENCE_CLOCKS: [&[FormatItem<'_>]; 3] = [
    format_description!("[hour padding:none]:[minute]:[second].[subsecond]"),
    format_description!("[hour padding:none]:[minute]:[second]"),
    format_description!("[hour padding:none]:[minute]"),
];

const REFERENCE_OFFSETS: [&[FormatItem<'_>]; 3] = [
    format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
    format_description!("[offset_hour sign:mandatory][offset_minute]"),
    format_description!("[offset_hour sign:mandatory]"),
];

const TIMESTAMP: &[FormatItem<'_>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

/// Decoded `<unit> since <reference>` time units.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeUnits {
    /// Original attribute text, for error reporting
    source: String,
    /// Length of one unit in seconds
    unit_seconds: f64,
    /// Reference instant
    epoch: OffsetDateTime,
}

impl TimeUnits {
    /// Reference instant.
    pub fn epoch(&self) -> OffsetDateTime {
        self.epoch
    }

    /// Convert a stored offset into an instant.
    pub fn decode(&self, value: f64) -> Result<OffsetDateTime, FlowmapError> {
        Duration::checked_seconds_f64(value * self.unit_seconds)
            .and_then(|offset| self.epoch.checked_add(offset))
            .ok_or_else(|| FlowmapError::InvalidTimeUnits {
                units: format!("{} (value {value})", self.source),
            })
    }

    /// Convert every stored offset.
    pub fn decode_all(&self, values: &[f64]) -> Result<Vec<OffsetDateTime>, FlowmapError> {
        values.iter().map(|value| self.decode(*value)).collect()
    }
}

impl FromStr for TimeUnits {
    type Err = FlowmapError;

    fn from_str(units: &str) -> Result<Self, Self::Err> {
        let invalid = || FlowmapError::InvalidTimeUnits {
            units: units.to_string(),
        };
        let mut tokens = units.split_whitespace();
        let unit_seconds = match tokens.next().ok_or_else(invalid)?.to_lowercase().as_str() {
            "seconds" | "second" | "secs" | "sec" | "s" => 1.0,
            "minutes" | "minute" | "mins" | "min" => 60.0,
            "hours" | "hour" | "hrs" | "hr" | "h" => 3600.0,
            "days" | "day" | "d" => 86400.0,
            _ => return Err(invalid()),
        };
        if !tokens
            .next()
            .is_some_and(|token| token.eq_ignore_ascii_case("since"))
        {
            return Err(invalid());
        }

        // The reference is a date, optionally followed by a clock (joined by `T` or a space)
        // and a zone, either attached to the clock or as a separate token.
        let reference = tokens.next().ok_or_else(invalid)?;
        let (date, clock) = match reference.split_once(['T', 't']) {
            Some((date, clock)) => (date, Some(clock)),
            None => (reference, tokens.next()),
        };
        let (clock, mut zone) = match clock {
            Some(clock) => match clock.find(['Z', 'z', '+', '-']) {
                Some(index) => (Some(&clock[..index]), Some(&clock[index..])),
                None => (Some(clock), None),
            },
            None => (None, None),
        };
        if let Some(token) = tokens.next() {
            if zone.is_some() {
                return Err(invalid());
            }
            zone = Some(token);
        }
        if tokens.next().is_some() {
            return Err(invalid());
        }

        let date = Date::parse(date, REFERENCE_DATE).map_err(|_| invalid())?;
        let clock = match clock {
            Some(clock) => parse_clock(clock).ok_or_else(invalid)?,
            None => Time::MIDNIGHT,
        };
        let offset = match zone {
            Some(zone) => parse_zone(zone).ok_or_else(invalid)?,
            None => UtcOffset::UTC,
        };

        Ok(TimeUnits {
            source: units.to_string(),
            unit_seconds,
            epoch: PrimitiveDateTime::new(date, clock)
                .assume_offset(offset)
                .to_offset(UtcOffset::UTC),
        })
    }
}

fn parse_clock(text: &str) -> Option<Time> {
    REFERENCE_CLOCKS
        .iter()
        .find_map(|format| Time::parse(text, format).ok())
}

/// Parse a zone designator (`UTC`, `GMT`, `Z`) or a numeric offset such as `+05:30`.
fn parse_zone(text: &str) -> Option<UtcOffset> {
    if ["utc", "gmt", "z"]
        .iter()
        .any(|name| text.eq_ignore_ascii_case(name))
    {
        return Some(UtcOffset::UTC);
    }
    REFERENCE_OFFSETS
        .iter()
        .find_map(|format| UtcOffset::parse(text, format).ok())
}

/// Render an instant as `YYYY-MM-DDTHH:MM:SS` in UTC.
pub fn format_timestamp(instant: &OffsetDateTime) -> Result<String, FlowmapError> {
    Ok(instant.to_offset(UtcOffset::UTC).format(TIMESTAMP)?)
}
