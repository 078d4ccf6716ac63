//! Risk classifier: weighted feature score mapped onto ordered levels.

use crate::config::{ClassifierConfig, FeatureScales, LevelThreshold, RiskWeights};
use crate::constants::{
    JITTER_ACTIVE_THRESHOLD, JITTER_CALM_THRESHOLD, STOP_LONG_DURATION_SECS, VOLATILITY_ERRATIC_THRESHOLD,
};
use crate::features::FeatureVector;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discrete risk category; ordered by rank
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RiskLevel {
    /// Position in the configured level list, 0 is calmest
    pub rank: usize,
    /// Configured label
    pub label: String,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Human-readable movement description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    /// Steady directional travel
    Steady,
    /// Normal wandering
    Active,
    /// Lots of direction changes
    Playing,
    /// Abrupt speed bursts and stops
    Erratic,
    /// Briefly stopped
    Paused,
    /// Stopped for a long time
    Resting,
}

impl Activity {
    /// Derive the activity from features
    #[must_use]
    pub fn from_features(features: &FeatureVector) -> Self {
        if features.is_stopped {
            return if features.stop_duration_secs > STOP_LONG_DURATION_SECS {
                Self::Resting
            } else {
                Self::Paused
            };
        }
        if features.volatility > VOLATILITY_ERRATIC_THRESHOLD {
            return Self::Erratic;
        }
        if features.jitter < JITTER_CALM_THRESHOLD {
            Self::Steady
        } else if features.jitter < JITTER_ACTIVE_THRESHOLD {
            Self::Active
        } else {
            Self::Playing
        }
    }

    /// Short label for dashboards
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Steady => "Calm walk",
            Self::Active => "Active",
            Self::Playing => "Playing",
            Self::Erratic => "Exploring actively",
            Self::Paused => "Paused",
            Self::Resting => "Resting",
        }
    }
}

/// Score, level and activity for one feature vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    /// Bounded risk score
    pub score: f64,
    /// Level the score falls into
    pub level: RiskLevel,
    /// Movement description
    pub activity: Activity,
}

/// Maps feature vectors to risk scores and levels
#[derive(Debug, Clone)]
pub struct RiskClassifier {
    weights: RiskWeights,
    scales: FeatureScales,
    spike_ratio: f64,
    spike_multiplier: f64,
    max_score: f64,
    levels: Vec<LevelThreshold>,
}

impl RiskClassifier {
    /// Create a classifier from validated configuration
    ///
    /// # Errors
    ///
    /// Returns a configuration error if weights, scales or levels are invalid
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            weights: config.weights,
            scales: config.scales,
            spike_ratio: config.spike_ratio,
            spike_multiplier: config.spike_multiplier,
            max_score: config.max_score,
            levels: config.levels.clone(),
        })
    }

    /// Weighted combination of the normalized features, clamped to `[0, max_score]`
    #[must_use]
    pub fn score(&self, features: &FeatureVector) -> f64 {
        let mut score = component(features.jitter, self.scales.jitter, self.weights.jitter)
            + component(features.volatility, self.scales.volatility, self.weights.volatility)
            + component(features.stop_duration_secs, self.scales.stop_secs, self.weights.stop);

        // Short-horizon volatility well above the baseline is a spike
        if features.volatility_ratio.is_some_and(|r| r > self.spike_ratio) {
            score *= self.spike_multiplier;
        }

        score.clamp(0.0, self.max_score)
    }

    /// Level for a score: the highest level whose lower bound the score reaches
    #[must_use]
    pub fn level_for(&self, score: f64) -> RiskLevel {
        let rank = self
            .levels
            .iter()
            .rposition(|level| score >= level.lower_bound)
            .unwrap_or(0);
        RiskLevel {
            rank,
            label: self.levels[rank].label.clone(),
        }
    }

    /// Score, level and activity in one pass
    #[must_use]
    pub fn classify(&self, features: &FeatureVector) -> Assessment {
        let score = self.score(features);
        Assessment {
            score,
            level: self.level_for(score),
            activity: Activity::from_features(features),
        }
    }
}

fn component(value: f64, scale: f64, weight: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    weight * (value / scale).clamp(0.0, 1.0)
}
