//! Inbound ping descriptions and the canonical accepted sample.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One accepted, normalized observation for a tracked identity.
///
/// All units are canonical: meters, meters per second, degrees in `[0, 360)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Tracked identity key
    pub identity: String,
    /// Observation instant
    pub timestamp: DateTime<Utc>,
    /// Latitude in degrees (WGS84)
    pub latitude: f64,
    /// Longitude in degrees (WGS84)
    pub longitude: f64,
    /// Ground speed in m/s
    pub speed: f64,
    /// Course over ground, `None` when the source did not report one
    pub bearing: Option<f64>,
    /// Horizontal accuracy radius in meters
    pub accuracy: Option<f64>,
    /// Battery level in percent
    pub battery: Option<u8>,
}

/// Timestamp encodings accepted from upstream sources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    /// Unix epoch seconds
    UnixSeconds(i64),
    /// Unix epoch seconds with a fractional part
    UnixFractional(f64),
    /// RFC 3339 / ISO 8601 text
    Text(String),
}

/// A ping as delivered by the transport layer, before validation.
///
/// Field names accept both the tracker webhook spelling (`tid`, `vel`,
/// `cog`, `acc`, `tst`, `batt`) and descriptive names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    /// Identity or tracker id
    #[serde(default, alias = "tid", alias = "user", alias = "identity")]
    pub tracker_id: Option<String>,
    /// Latitude in degrees
    #[serde(alias = "latitude")]
    pub lat: f64,
    /// Longitude in degrees
    #[serde(alias = "longitude")]
    pub lon: f64,
    /// Velocity in the configured upstream unit
    #[serde(default, alias = "vel", alias = "speed")]
    pub velocity: Option<f64>,
    /// Course over ground in degrees
    #[serde(default, alias = "cog", alias = "course")]
    pub bearing: Option<f64>,
    /// Accuracy in meters
    #[serde(default, alias = "acc")]
    pub accuracy: Option<f64>,
    /// Observation time
    #[serde(default, alias = "tst")]
    pub timestamp: Option<RawTimestamp>,
    /// Battery percentage
    #[serde(default, alias = "batt")]
    pub battery: Option<f64>,
}

impl RawSample {
    /// Decode one JSON ping object
    pub fn from_json(line: &str) -> crate::Result<Self> {
        serde_json::from_str(line).map_err(|e| crate::Error::Parse(e.to_string()))
    }

    /// Minimal raw sample at a position, for callers that fill the rest by hand
    #[must_use]
    pub fn at(tracker_id: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            tracker_id: Some(tracker_id.into()),
            lat,
            lon,
            ..Self::default()
        }
    }

    /// Set velocity (upstream unit)
    #[must_use]
    pub fn with_velocity(mut self, velocity: f64) -> Self {
        self.velocity = Some(velocity);
        self
    }

    /// Set bearing in degrees
    #[must_use]
    pub fn with_bearing(mut self, bearing: f64) -> Self {
        self.bearing = Some(bearing);
        self
    }

    /// Set timestamp as Unix seconds
    #[must_use]
    pub fn with_unix_time(mut self, secs: i64) -> Self {
        self.timestamp = Some(RawTimestamp::UnixSeconds(secs));
        self
    }

    /// Set accuracy in meters
    #[must_use]
    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }
}
