//! The ingestion and status engine.
//!
//! `ingest` runs normalize → home-zone filter → window insert → feature
//! extraction → classification → snapshot publication; `status` only reads
//! what the last accepted ingestion published.

use crate::classifier::RiskClassifier;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::features::FeatureExtractor;
use crate::home_zone::{HomeZoneFilter, ZoneDecision};
use crate::normalizer::Normalizer;
use crate::sample::{RawSample, Sample};
use crate::status::{RiskSnapshot, StatusReader, TrackStatus};
use crate::store::TrackStore;
use crate::{Error, Result};
use chrono::Duration;
use log::{debug, warn};
use std::sync::Arc;

/// Result of an accepted ingestion
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// Sample entered the window and a new snapshot was published
    Scored(Arc<RiskSnapshot>),
    /// Sample fell inside a home zone and was discarded without side effects
    Filtered {
        /// Identity the sample was addressed to
        identity: String,
    },
}

impl IngestOutcome {
    /// Published snapshot, if the sample was scored
    #[must_use]
    pub fn snapshot(&self) -> Option<&RiskSnapshot> {
        match self {
            Self::Scored(snapshot) => Some(snapshot),
            Self::Filtered { .. } => None,
        }
    }

    /// Whether the sample was dropped by the home-zone filter
    #[must_use]
    pub fn is_filtered(&self) -> bool {
        matches!(self, Self::Filtered { .. })
    }
}

/// Streaming risk engine shared across concurrent callers
pub struct RiskEngine {
    config: Config,
    normalizer: Normalizer,
    home_zones: HomeZoneFilter,
    store: TrackStore,
    extractor: FeatureExtractor,
    classifier: RiskClassifier,
    status_reader: StatusReader,
    max_idle: Duration,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for RiskEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskEngine")
            .field("identities", &self.store.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RiskEngine {
    /// Create an engine on the system clock
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` does not validate
    pub fn new(config: Config) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create an engine on a caller-supplied clock
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` does not validate
    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            normalizer: Normalizer::new(&config.ingest),
            home_zones: HomeZoneFilter::new(&config.home_zone),
            store: TrackStore::new(&config.window),
            extractor: FeatureExtractor::new(&config.features),
            classifier: RiskClassifier::new(&config.classifier)?,
            status_reader: StatusReader::new(&config.status),
            max_idle: config.status.max_idle(),
            clock,
            config,
        })
    }

    /// Ingest one raw sample.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] for malformed fields, before any state change
    /// - [`Error::OutOfOrder`] for duplicate or replayed timestamps
    /// - [`Error::InvariantViolation`] if the identity's state had to be discarded
    pub fn ingest(&self, raw: &RawSample) -> Result<IngestOutcome> {
        let sample = self.normalizer.normalize(raw, self.clock.now()).map_err(|err| {
            warn!("Rejected raw sample: {err}");
            err
        })?;
        self.ingest_sample(sample)
    }

    /// Ingest an already normalized sample; the home-zone check still applies
    ///
    /// # Errors
    ///
    /// Same as [`RiskEngine::ingest`], minus validation
    pub fn ingest_sample(&self, sample: Sample) -> Result<IngestOutcome> {
        if self.home_zones.check(&sample) == ZoneDecision::Drop {
            return Ok(IngestOutcome::Filtered {
                identity: sample.identity,
            });
        }

        let identity = sample.identity.clone();
        let snapshot = self.store.ingest(sample, |window| {
            let empty = || Error::InvariantViolation {
                identity: identity.clone(),
                detail: "no samples to score after insert".to_string(),
            };
            let newest = window.newest().ok_or_else(empty)?;
            let features = self.extractor.extract(window).ok_or_else(empty)?;
            let assessment = self.classifier.classify(&features);

            let published = RiskSnapshot {
                identity: identity.clone(),
                risk_score: assessment.score,
                risk_level: assessment.level,
                activity: assessment.activity,
                last_ping_timestamp: newest.timestamp,
                features,
                window_len: window.len(),
                status: TrackStatus::Active,
                age_secs: 0.0,
            };
            Ok(self.status_reader.assess(&published, self.clock.now()))
        })?;

        debug!(
            "Scored {}: {:.1} ({})",
            snapshot.identity, snapshot.risk_score, snapshot.risk_level
        );
        Ok(IngestOutcome::Scored(snapshot))
    }

    /// Latest snapshot for `identity` with freshness evaluated now
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the identity has no accepted history
    pub fn status(&self, identity: &str) -> Result<RiskSnapshot> {
        self.status_reader.read(&self.store, identity, self.clock.now())
    }

    /// Copy of the identity's current window, oldest first
    #[must_use]
    pub fn window(&self, identity: &str) -> Vec<Sample> {
        self.store.snapshot(identity)
    }

    /// Forget identities idle longer than the configured maximum
    pub fn reap_idle(&self) -> usize {
        let reaped = self.store.reap_idle(self.clock.now(), self.max_idle);
        if reaped > 0 {
            debug!("Reaped {reaped} idle identities");
        }
        reaped
    }

    /// Tracked identities, sorted
    #[must_use]
    pub fn identities(&self) -> Vec<String> {
        self.store.identities()
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }
}
