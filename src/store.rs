//! Per-identity window store.
//!
//! Identities live in a sharded map of independently locked tracks: the
//! ingestion pipeline for one identity runs under that track's mutex only, so
//! distinct identities never contend on a shared lock. Published snapshots sit
//! behind a separate `RwLock` that is held just long enough to swap an `Arc`.

use crate::config::WindowConfig;
use crate::sample::Sample;
use crate::status::RiskSnapshot;
use crate::window::{horizon_start, Window};
use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use log::{debug, error};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// State cell for one identity
#[derive(Debug)]
struct Track {
    state: Mutex<TrackState>,
    published: RwLock<Option<Arc<RiskSnapshot>>>,
}

#[derive(Debug)]
struct TrackState {
    window: Window,
    /// Set once the track has been removed from the map; late writers retry
    retired: bool,
}

impl Track {
    fn new(retention: Duration, max_samples: usize) -> Self {
        Self {
            state: Mutex::new(TrackState {
                window: Window::new(retention, max_samples),
                retired: false,
            }),
            published: RwLock::new(None),
        }
    }
}

/// Owner of every identity's window and latest snapshot
#[derive(Debug)]
pub struct TrackStore {
    tracks: DashMap<String, Arc<Track>>,
    retention: Duration,
    max_samples: usize,
}

impl TrackStore {
    /// Create an empty store
    ///
    /// # Panics
    ///
    /// Panics if `max_samples` is zero
    #[must_use]
    pub fn new(config: &WindowConfig) -> Self {
        assert!(config.max_samples > 0, "Max samples must be greater than 0");
        Self {
            tracks: DashMap::new(),
            retention: config.retention(),
            max_samples: config.max_samples,
        }
    }

    fn track(&self, identity: &str) -> Arc<Track> {
        if let Some(track) = self.tracks.get(identity) {
            return Arc::clone(track.value());
        }
        let entry = self
            .tracks
            .entry(identity.to_string())
            .or_insert_with(|| Arc::new(Track::new(self.retention, self.max_samples)));
        Arc::clone(entry.value())
    }

    fn lookup(&self, identity: &str) -> Option<Arc<Track>> {
        self.tracks.get(identity).map(|track| Arc::clone(track.value()))
    }

    /// Insert under the identity's lock, then run `then` on the updated window
    /// before the lock is released.
    fn apply<R, F>(&self, sample: Sample, then: F) -> Result<R>
    where
        F: FnOnce(&Track, &Window) -> Result<R>,
    {
        let track = self.track(&sample.identity);
        self.apply_with(track, sample, then)
    }

    /// [`Self::apply`] starting from an already looked-up track
    fn apply_with<R, F>(&self, mut track: Arc<Track>, sample: Sample, then: F) -> Result<R>
    where
        F: FnOnce(&Track, &Window) -> Result<R>,
    {
        let identity = sample.identity.clone();
        loop {
            let mut state = track.state.lock();
            if state.retired {
                // Reaped between lookup and lock; the map now holds a fresh track
                drop(state);
                track = self.track(&identity);
                continue;
            }

            if let Err(err) = state.window.insert(sample) {
                debug!("Rejected sample for {identity}: {err}");
                return Err(err);
            }

            let outcome = state.window.verify(&identity).and_then(|()| then(&track, &state.window));
            if let Err(Error::InvariantViolation { detail, .. }) = &outcome {
                error!("Discarding state for {identity}: {detail}");
                state.retired = true;
                drop(state);
                self.tracks.remove_if(&identity, |_, current| Arc::ptr_eq(current, &track));
            }
            return outcome;
        }
    }

    /// Insert a sample into its identity's window, creating the window on
    /// first use. Returns the window length after eviction.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfOrder`] if the sample is not strictly newer than the
    /// identity's newest; the window is left unchanged.
    pub fn insert(&self, sample: Sample) -> Result<usize> {
        self.apply(sample, |_, window| Ok(window.len()))
    }

    /// Insert a sample, derive a snapshot from the updated window and publish
    /// it atomically, all under the identity's lock.
    ///
    /// # Errors
    ///
    /// Propagates insertion errors and anything `derive` returns. An
    /// [`Error::InvariantViolation`] retires the identity.
    pub fn ingest<F>(&self, sample: Sample, derive: F) -> Result<Arc<RiskSnapshot>>
    where
        F: FnOnce(&Window) -> Result<RiskSnapshot>,
    {
        self.apply(sample, |track, window| {
            let snapshot = Arc::new(derive(window)?);
            *track.published.write() = Some(Arc::clone(&snapshot));
            Ok(snapshot)
        })
    }

    /// Copy of the identity's samples, oldest first; empty if unknown
    #[must_use]
    pub fn snapshot(&self, identity: &str) -> Vec<Sample> {
        self.lookup(identity)
            .map(|track| {
                let state = track.state.lock();
                if state.retired {
                    Vec::new()
                } else {
                    state.window.to_vec()
                }
            })
            .unwrap_or_default()
    }

    /// Latest published snapshot; never waits on an in-flight ingestion
    #[must_use]
    pub fn published(&self, identity: &str) -> Option<Arc<RiskSnapshot>> {
        let track = self.lookup(identity)?;
        let current = track.published.read().clone();
        current
    }

    /// Forget identities whose newest sample is older than `max_idle` at `now`.
    ///
    /// Tracks that are mid-ingestion are skipped. Returns how many were removed.
    pub fn reap_idle(&self, now: DateTime<Utc>, max_idle: Duration) -> usize {
        let cutoff = horizon_start(now, max_idle);
        let mut reaped = 0;

        self.tracks.retain(|identity, track| {
            let Some(mut state) = track.state.try_lock() else {
                return true;
            };
            let idle = state.window.newest_timestamp().map_or(true, |newest| newest < cutoff);
            if idle {
                debug!("Reaping idle identity {identity}");
                state.retired = true;
                reaped += 1;
            }
            !idle
        });

        reaped
    }

    /// Known identities, sorted
    #[must_use]
    pub fn identities(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tracks.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Number of tracked identities
    #[must_use]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Whether no identity is tracked
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{Activity, RiskLevel};
    use crate::features::FeatureVector;
    use crate::status::TrackStatus;
    use chrono::TimeZone;

    fn store() -> TrackStore {
        TrackStore::new(&WindowConfig {
            retention_secs: 60,
            max_samples: 4,
        })
    }

    fn at(identity: &str, secs: i64) -> Sample {
        Sample {
            identity: identity.to_string(),
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            latitude: 0.0,
            longitude: 0.0,
            speed: 1.0,
            bearing: None,
            accuracy: None,
            battery: None,
        }
    }

    fn snapshot_of(window: &Window) -> RiskSnapshot {
        let newest = window.newest().unwrap();
        RiskSnapshot {
            identity: newest.identity.clone(),
            risk_score: window.len() as f64,
            risk_level: RiskLevel {
                rank: 0,
                label: "LOW".to_string(),
            },
            activity: Activity::Steady,
            last_ping_timestamp: newest.timestamp,
            features: FeatureVector::default(),
            window_len: window.len(),
            status: TrackStatus::Active,
            age_secs: 0.0,
        }
    }

    #[test]
    fn test_lazy_creation_and_snapshot() {
        let store = store();
        assert!(store.snapshot("pepper").is_empty());
        assert!(store.is_empty());

        assert_eq!(store.insert(at("pepper", 0)).unwrap(), 1);
        assert_eq!(store.insert(at("pepper", 5)).unwrap(), 2);
        assert_eq!(store.snapshot("pepper").len(), 2);
        assert_eq!(store.identities(), vec!["pepper".to_string()]);
    }

    #[test]
    fn test_out_of_order_leaves_window_unchanged() {
        let store = store();
        store.insert(at("pepper", 10)).unwrap();
        let before = store.snapshot("pepper");

        assert!(matches!(store.insert(at("pepper", 10)), Err(Error::OutOfOrder { .. })));
        assert!(matches!(store.insert(at("pepper", 9)), Err(Error::OutOfOrder { .. })));
        assert_eq!(store.snapshot("pepper"), before);
    }

    #[test]
    fn test_identities_are_independent() {
        let store = store();
        store.insert(at("pepper", 100)).unwrap();
        // Older timestamp is fine for a different identity
        store.insert(at("rex", 1)).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_ingest_publishes_snapshot() {
        let store = store();
        assert!(store.published("pepper").is_none());

        let first = store.ingest(at("pepper", 0), |w| Ok(snapshot_of(w))).unwrap();
        assert_eq!(first.window_len, 1);

        store.ingest(at("pepper", 1), |w| Ok(snapshot_of(w))).unwrap();
        let latest = store.published("pepper").unwrap();
        assert_eq!(latest.window_len, 2);
        // Earlier handle still sees its own immutable copy
        assert_eq!(first.window_len, 1);
    }

    #[test]
    fn test_failed_derive_keeps_previous_snapshot() {
        let store = store();
        store.ingest(at("pepper", 0), |w| Ok(snapshot_of(w))).unwrap();

        let result = store.ingest(at("pepper", 1), |_| Err(Error::Parse("boom".to_string())));
        assert!(result.is_err());
        assert_eq!(store.published("pepper").unwrap().window_len, 1);
    }

    #[test]
    fn test_invariant_violation_retires_identity() {
        let store = store();
        store.ingest(at("pepper", 0), |w| Ok(snapshot_of(w))).unwrap();

        let result = store.ingest(at("pepper", 1), |_| {
            Err(Error::InvariantViolation {
                identity: "pepper".to_string(),
                detail: "test".to_string(),
            })
        });
        assert!(matches!(result, Err(Error::InvariantViolation { .. })));
        assert!(store.published("pepper").is_none());
        assert!(store.snapshot("pepper").is_empty());

        // Next sample starts from scratch, even an older one
        assert_eq!(store.insert(at("pepper", 0)).unwrap(), 1);
    }

    #[test]
    fn test_retired_track_handle_retries_on_fresh_track() {
        let store = store();
        store.insert(at("pepper", 0)).unwrap();

        // Hold a handle across a reap, as a racing ingest would
        let stale = store.track("pepper");
        let now = Utc.timestamp_opt(500, 0).unwrap();
        assert_eq!(store.reap_idle(now, Duration::seconds(100)), 1);
        assert!(stale.state.lock().retired);
        assert!(store.is_empty());

        assert_eq!(store.apply_with(Arc::clone(&stale), at("pepper", 5), |_, w| Ok(w.len())).unwrap(), 1);
        assert_eq!(store.len(), 1);
        let fresh = store.lookup("pepper").unwrap();
        assert!(!Arc::ptr_eq(&stale, &fresh));
        assert_eq!(fresh.state.lock().window.len(), 1);
        assert_eq!(stale.state.lock().window.len(), 1);
    }

    #[test]
    fn test_reap_idle() {
        let store = store();
        store.insert(at("old", 0)).unwrap();
        store.insert(at("fresh", 1_000)).unwrap();

        let now = Utc.timestamp_opt(1_010, 0).unwrap();
        assert_eq!(store.reap_idle(now, Duration::seconds(100)), 1);
        assert_eq!(store.identities(), vec!["fresh".to_string()]);

        // A reaped identity is treated as first-ever
        assert_eq!(store.insert(at("old", 0)).unwrap(), 1);
    }
}
