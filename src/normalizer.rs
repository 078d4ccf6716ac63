//! Ping normalizer: validates raw samples and converts them to canonical units.

use crate::config::IngestConfig;
use crate::geo::normalize_bearing;
use crate::sample::{RawSample, RawTimestamp, Sample};
use crate::{Error, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

/// Converts raw upstream samples into [`Sample`]s
#[derive(Debug, Clone)]
pub struct Normalizer {
    velocity_factor: f64,
    default_identity: Option<String>,
}

impl Normalizer {
    /// Create a normalizer from the ingest configuration
    #[must_use]
    pub fn new(config: &IngestConfig) -> Self {
        Self {
            velocity_factor: config.velocity_unit.to_mps_factor(),
            default_identity: config.default_identity.clone(),
        }
    }

    /// Validate and canonicalize a raw sample.
    ///
    /// `received_at` stands in for a missing timestamp. Pure: no state is
    /// touched and the same input always yields the same output.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming the first offending field.
    pub fn normalize(&self, raw: &RawSample, received_at: DateTime<Utc>) -> Result<Sample> {
        let identity = self.identity(raw)?;

        let latitude = check_range("latitude", raw.lat, -90.0, 90.0)?;
        let longitude = check_range("longitude", raw.lon, -180.0, 180.0)?;

        let velocity = raw
            .velocity
            .ok_or_else(|| Error::validation("velocity", "is required"))?;
        if !velocity.is_finite() || velocity < 0.0 {
            return Err(Error::validation(
                "velocity",
                format!("must be a non-negative number, got {velocity}"),
            ));
        }
        let speed = velocity * self.velocity_factor;

        let bearing = raw
            .bearing
            .map(|b| check_range("bearing", b, 0.0, 360.0).map(normalize_bearing))
            .transpose()?;

        let accuracy = raw
            .accuracy
            .map(|a| {
                if a.is_finite() && a >= 0.0 {
                    Ok(a)
                } else {
                    Err(Error::validation("accuracy", format!("must be non-negative, got {a}")))
                }
            })
            .transpose()?;

        let battery = raw
            .battery
            .map(|b| check_range("battery", b, 0.0, 100.0).map(to_percent))
            .transpose()?;

        let timestamp = match &raw.timestamp {
            Some(ts) => parse_timestamp(ts)?,
            None => received_at,
        };

        Ok(Sample {
            identity,
            timestamp,
            latitude,
            longitude,
            speed,
            bearing,
            accuracy,
            battery,
        })
    }

    fn identity(&self, raw: &RawSample) -> Result<String> {
        match raw.tracker_id.as_deref().map(str::trim) {
            Some("") => Err(Error::validation("identity", "must not be empty")),
            Some(id) => Ok(id.to_string()),
            None => self
                .default_identity
                .clone()
                .ok_or_else(|| Error::validation("identity", "is required")),
        }
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<f64> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(Error::validation(
            field,
            format!("must be within [{min}, {max}], got {value}"),
        ))
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // range checked by caller
fn to_percent(value: f64) -> u8 {
    value.round() as u8
}

/// Parse any supported raw timestamp encoding into UTC
pub fn parse_timestamp(raw: &RawTimestamp) -> Result<DateTime<Utc>> {
    match raw {
        RawTimestamp::UnixSeconds(secs) => from_unix(*secs, 0),
        RawTimestamp::UnixFractional(value) => {
            if !value.is_finite() {
                return Err(Error::validation("timestamp", format!("is not finite: {value}")));
            }
            let secs = value.floor();
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let nanos = ((value - secs) * 1e9).round().min(999_999_999.0) as u32;
            if secs < i64::MIN as f64 || secs > i64::MAX as f64 {
                return Err(Error::validation("timestamp", format!("out of range: {value}")));
            }
            #[allow(clippy::cast_possible_truncation)]
            let secs = secs as i64;
            from_unix(secs, nanos)
        }
        RawTimestamp::Text(text) => parse_text_timestamp(text.trim()),
    }
}

fn from_unix(secs: i64, nanos: u32) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(secs, nanos)
        .single()
        .ok_or_else(|| Error::validation("timestamp", format!("out of range: {secs}")))
}

fn parse_text_timestamp(text: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Ok(parsed.with_timezone(&Utc));
    }
    // Naive ISO 8601 is taken as UTC
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    if let Ok(secs) = text.parse::<i64>() {
        return from_unix(secs, 0);
    }
    Err(Error::validation("timestamp", format!("unrecognized format: {text}")))
}
