//! Time-bounded, strictly ordered sample window for one identity.

use crate::sample::Sample;
use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

/// Start of a `horizon` ending at `at`, clamped to the earliest representable instant
pub(crate) fn horizon_start(at: DateTime<Utc>, horizon: Duration) -> DateTime<Utc> {
    at.checked_sub_signed(horizon).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Ordered recent history of one identity
#[derive(Debug, Clone)]
pub struct Window {
    retention: Duration,
    max_samples: usize,
    samples: VecDeque<Sample>,
}

impl Window {
    /// Create an empty window
    ///
    /// # Panics
    ///
    /// Panics if `max_samples` is zero or `retention` is negative
    #[must_use]
    pub fn new(retention: Duration, max_samples: usize) -> Self {
        assert!(max_samples > 0, "Max samples must be greater than 0");
        assert!(retention >= Duration::zero(), "Retention must be non-negative");
        Self {
            retention,
            max_samples,
            samples: VecDeque::with_capacity(max_samples.min(64)),
        }
    }

    /// Append a sample and evict what fell out of bounds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfOrder`] and leaves the window untouched when the
    /// sample is not strictly newer than the current newest.
    pub fn insert(&mut self, sample: Sample) -> Result<()> {
        if let Some(newest) = self.samples.back() {
            if sample.timestamp <= newest.timestamp {
                return Err(Error::OutOfOrder {
                    identity: sample.identity,
                    timestamp: sample.timestamp,
                    newest: newest.timestamp,
                });
            }
        }

        self.samples.push_back(sample);
        self.evict();
        Ok(())
    }

    fn evict(&mut self) {
        let Some(newest) = self.samples.back().map(|s| s.timestamp) else {
            return;
        };
        let cutoff = horizon_start(newest, self.retention);

        // The newest sample is never older than the cutoff, so it always survives
        while self.samples.len() > 1 && self.samples.front().is_some_and(|s| s.timestamp < cutoff) {
            self.samples.pop_front();
        }
        while self.samples.len() > self.max_samples {
            self.samples.pop_front();
        }
    }

    /// Most recent sample
    #[must_use]
    pub fn newest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    /// Timestamp of the most recent sample
    #[must_use]
    pub fn newest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.samples.back().map(|s| s.timestamp)
    }

    /// Number of samples held
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the window holds no samples
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples oldest first
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Sample> + ExactSizeIterator {
        self.samples.iter()
    }

    /// Owned copy of the samples, oldest first
    #[must_use]
    pub fn to_vec(&self) -> Vec<Sample> {
        self.samples.iter().cloned().collect()
    }

    /// Check the structural invariants of a window that has accepted samples.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvariantViolation`] describing the first broken rule.
    pub fn verify(&self, identity: &str) -> Result<()> {
        let violation = |detail: String| Error::InvariantViolation {
            identity: identity.to_string(),
            detail,
        };

        let newest = self
            .newest_timestamp()
            .ok_or_else(|| violation("window is empty after an accepted insert".to_string()))?;
        if self.samples.len() > self.max_samples {
            return Err(violation(format!(
                "window holds {} samples, bound is {}",
                self.samples.len(),
                self.max_samples
            )));
        }
        if self.samples.iter().zip(self.samples.iter().skip(1)).any(|(a, b)| a.timestamp >= b.timestamp) {
            return Err(violation("timestamps are not strictly increasing".to_string()));
        }
        if self.samples.front().is_some_and(|s| newest - s.timestamp > self.retention) {
            return Err(violation("sample older than retention survived eviction".to_string()));
        }
        Ok(())
    }
}
