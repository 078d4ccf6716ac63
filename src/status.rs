//! Published risk snapshots and the read-only status view over them.

use crate::classifier::{Activity, RiskLevel};
use crate::config::StatusConfig;
use crate::features::FeatureVector;
use crate::store::TrackStore;
use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Freshness of an identity's last ping
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackStatus {
    /// Last ping is within the staleness threshold
    Active,
    /// Last ping is older than the staleness threshold
    Stale,
    /// Last ping is older than the disconnect threshold
    Disconnected,
}

impl TrackStatus {
    /// Whether the stale flag is set
    #[must_use]
    pub fn is_stale(self) -> bool {
        !matches!(self, Self::Active)
    }
}

/// Latest classification for one identity.
///
/// Replaced wholesale on every accepted ping, never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSnapshot {
    /// Tracked identity
    pub identity: String,
    /// Bounded risk score
    pub risk_score: f64,
    /// Discrete level of the score
    pub risk_level: RiskLevel,
    /// Movement description
    pub activity: Activity,
    /// Timestamp of the newest accepted sample
    pub last_ping_timestamp: DateTime<Utc>,
    /// Features that produced the score
    pub features: FeatureVector,
    /// Samples in the window when the snapshot was computed
    pub window_len: usize,
    /// Freshness at the time it was read
    pub status: TrackStatus,
    /// Seconds between the last ping and the time it was read
    pub age_secs: f64,
}

/// Answers status queries without mutating or recomputing anything
#[derive(Debug, Clone)]
pub struct StatusReader {
    staleness: Duration,
    disconnected: Duration,
}

impl StatusReader {
    /// Create a reader from configuration
    #[must_use]
    pub fn new(config: &StatusConfig) -> Self {
        Self {
            staleness: config.staleness(),
            disconnected: config.disconnected(),
        }
    }

    /// Freshness of a ping observed at `last_ping` as seen at `now`
    #[must_use]
    pub fn status_at(&self, last_ping: DateTime<Utc>, now: DateTime<Utc>) -> TrackStatus {
        let age = now - last_ping;
        if age > self.disconnected {
            TrackStatus::Disconnected
        } else if age > self.staleness {
            TrackStatus::Stale
        } else {
            TrackStatus::Active
        }
    }

    /// Copy of `snapshot` with freshness filled in for `now`
    #[must_use]
    pub fn assess(&self, snapshot: &RiskSnapshot, now: DateTime<Utc>) -> RiskSnapshot {
        let age = (now - snapshot.last_ping_timestamp).max(Duration::zero());
        #[allow(clippy::cast_precision_loss)]
        let age_secs = age.num_milliseconds() as f64 / 1000.0;

        RiskSnapshot {
            status: self.status_at(snapshot.last_ping_timestamp, now),
            age_secs,
            ..snapshot.clone()
        }
    }

    /// Most recent snapshot for `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no sample was ever accepted for it.
    pub fn read(&self, store: &TrackStore, identity: &str, now: DateTime<Utc>) -> Result<RiskSnapshot> {
        store
            .published(identity)
            .map(|snapshot| self.assess(&snapshot, now))
            .ok_or_else(|| Error::NotFound(identity.to_string()))
    }
}
