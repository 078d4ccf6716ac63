//! Configuration management for the risk engine

use crate::constants::{
    DEFAULT_DISCONNECTED_SECS, DEFAULT_HOME_ZONE_RADIUS_M, DEFAULT_JITTER_SCALE, DEFAULT_JITTER_WEIGHT,
    DEFAULT_LONG_WINDOW_SECS, DEFAULT_MAX_IDLE_SECS, DEFAULT_MAX_SAMPLES, DEFAULT_RETENTION_SECS,
    DEFAULT_SPIKE_MULTIPLIER, DEFAULT_SPIKE_RATIO, DEFAULT_STALENESS_SECS, DEFAULT_STOP_SCALE_SECS,
    DEFAULT_STOP_SPEED_THRESHOLD, DEFAULT_STOP_WEIGHT, DEFAULT_SUB_WINDOW_SECS, DEFAULT_VOLATILITY_SCALE,
    DEFAULT_VOLATILITY_WEIGHT, KMH_TO_MPS, MAX_DURATION_SECS, MAX_RISK_SCORE,
};
use crate::{Error, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Privacy exclusion zones
    pub home_zone: HomeZoneConfig,

    /// Window retention bounds
    pub window: WindowConfig,

    /// Feature extraction horizons
    pub features: FeatureConfig,

    /// Risk scoring weights and level thresholds
    pub classifier: ClassifierConfig,

    /// Freshness and idle reclamation
    pub status: StatusConfig,

    /// Raw sample interpretation
    pub ingest: IngestConfig,
}

/// Home-zone privacy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HomeZoneConfig {
    /// Reference latitude; no global zone when unset
    pub latitude: Option<f64>,

    /// Reference longitude; no global zone when unset
    pub longitude: Option<f64>,

    /// Exclusion radius in meters
    pub radius_meters: f64,

    /// Per-identity zones that replace the global one
    pub overrides: BTreeMap<String, ZoneOverride>,
}

/// Home zone for a single identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneOverride {
    /// Reference latitude
    pub latitude: f64,

    /// Reference longitude
    pub longitude: f64,

    /// Radius in meters, falls back to the global radius
    #[serde(default)]
    pub radius_meters: Option<f64>,
}

/// Window bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Samples older than this relative to the newest are evicted
    pub retention_secs: u64,

    /// Absolute bound on samples per identity
    pub max_samples: usize,
}

/// Feature extraction configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Sub-window for jitter and volatility
    pub sub_window_secs: u64,

    /// Baseline window for the long-horizon features
    pub long_window_secs: u64,

    /// Speed below which the subject counts as stopped (m/s)
    pub stop_speed_threshold: f64,
}

/// Weights of each normalized feature in the risk score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskWeights {
    /// Weight of directional jitter
    pub jitter: f64,

    /// Weight of speed volatility
    pub volatility: f64,

    /// Weight of stop duration
    pub stop: f64,
}

/// Feature values at which each weighted component saturates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureScales {
    /// Normalized jitter at full weight
    pub jitter: f64,

    /// Speed standard deviation (m/s) at full weight
    pub volatility: f64,

    /// Stop duration (seconds) at full weight
    pub stop_secs: f64,
}

/// Lower bound of one risk level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelThreshold {
    /// Level label reported to consumers
    pub label: String,

    /// Inclusive lower bound on the score
    pub lower_bound: f64,
}

/// Risk classifier configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Feature weights
    pub weights: RiskWeights,

    /// Saturation points
    pub scales: FeatureScales,

    /// Volatility ratio above which the spike multiplier applies
    pub spike_ratio: f64,

    /// Multiplier applied on a volatility spike
    pub spike_multiplier: f64,

    /// Upper clamp for the score
    pub max_score: f64,

    /// Levels in ascending order
    pub levels: Vec<LevelThreshold>,
}

/// Freshness configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Age after which a snapshot is flagged stale
    pub staleness_secs: u64,

    /// Age after which a snapshot is flagged disconnected
    pub disconnected_secs: u64,

    /// Age after which the whole identity may be reclaimed
    pub max_idle_secs: u64,
}

/// Unit of the upstream velocity field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeedUnit {
    /// Kilometers per hour
    #[serde(rename = "kmh")]
    KilometersPerHour,
    /// Meters per second
    #[serde(rename = "mps")]
    MetersPerSecond,
}

impl SpeedUnit {
    /// Factor converting this unit to m/s
    #[must_use]
    pub fn to_mps_factor(self) -> f64 {
        match self {
            Self::KilometersPerHour => KMH_TO_MPS,
            Self::MetersPerSecond => 1.0,
        }
    }

    fn parse(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "kmh" | "km/h" | "kph" => Ok(Self::KilometersPerHour),
            "mps" | "m/s" => Ok(Self::MetersPerSecond),
            other => Err(Error::ConfigError(format!("Unknown velocity unit: {other}"))),
        }
    }
}

/// Raw sample interpretation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Unit of the raw velocity field
    pub velocity_unit: SpeedUnit,

    /// Identity used when a raw sample carries none
    pub default_identity: Option<String>,
}

impl Default for HomeZoneConfig {
    fn default() -> Self {
        Self {
            latitude: None,
            longitude: None,
            radius_meters: DEFAULT_HOME_ZONE_RADIUS_M,
            overrides: BTreeMap::new(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            retention_secs: DEFAULT_RETENTION_SECS,
            max_samples: DEFAULT_MAX_SAMPLES,
        }
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            sub_window_secs: DEFAULT_SUB_WINDOW_SECS,
            long_window_secs: DEFAULT_LONG_WINDOW_SECS,
            stop_speed_threshold: DEFAULT_STOP_SPEED_THRESHOLD,
        }
    }
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            jitter: DEFAULT_JITTER_WEIGHT,
            volatility: DEFAULT_VOLATILITY_WEIGHT,
            stop: DEFAULT_STOP_WEIGHT,
        }
    }
}

impl Default for FeatureScales {
    fn default() -> Self {
        Self {
            jitter: DEFAULT_JITTER_SCALE,
            volatility: DEFAULT_VOLATILITY_SCALE,
            stop_secs: DEFAULT_STOP_SCALE_SECS,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            weights: RiskWeights::default(),
            scales: FeatureScales::default(),
            spike_ratio: DEFAULT_SPIKE_RATIO,
            spike_multiplier: DEFAULT_SPIKE_MULTIPLIER,
            max_score: MAX_RISK_SCORE,
            levels: default_levels(),
        }
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            staleness_secs: DEFAULT_STALENESS_SECS,
            disconnected_secs: DEFAULT_DISCONNECTED_SECS,
            max_idle_secs: DEFAULT_MAX_IDLE_SECS,
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            velocity_unit: SpeedUnit::KilometersPerHour,
            default_identity: None,
        }
    }
}

fn default_levels() -> Vec<LevelThreshold> {
    [("LOW", 0.0), ("MEDIUM", 25.0), ("HIGH", 50.0), ("CRITICAL", 75.0)]
        .into_iter()
        .map(|(label, lower_bound)| LevelThreshold {
            label: label.to_string(),
            lower_bound,
        })
        .collect()
}

fn secs(value: u64) -> Duration {
    let capped = i64::try_from(value).unwrap_or(i64::MAX).min(i64::MAX / 1000);
    Duration::seconds(capped)
}

impl WindowConfig {
    /// Retention as a duration
    #[must_use]
    pub fn retention(&self) -> Duration {
        secs(self.retention_secs)
    }
}

impl FeatureConfig {
    /// Sub-window as a duration
    #[must_use]
    pub fn sub_window(&self) -> Duration {
        secs(self.sub_window_secs)
    }

    /// Long window as a duration
    #[must_use]
    pub fn long_window(&self) -> Duration {
        secs(self.long_window_secs)
    }
}

impl StatusConfig {
    /// Staleness threshold as a duration
    #[must_use]
    pub fn staleness(&self) -> Duration {
        secs(self.staleness_secs)
    }

    /// Disconnect threshold as a duration
    #[must_use]
    pub fn disconnected(&self) -> Duration {
        secs(self.disconnected_secs)
    }

    /// Idle reclamation threshold as a duration
    #[must_use]
    pub fn max_idle(&self) -> Duration {
        secs(self.max_idle_secs)
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        let config: Self = serde_yaml::from_str(&content)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)?;

        Ok(())
    }

    /// Defaults overlaid with process environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay values from an environment-style lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("HOME_ZONE_LAT") {
            self.home_zone.latitude = Some(parse_env("HOME_ZONE_LAT", &v)?);
        }
        if let Some(v) = lookup("HOME_ZONE_LON") {
            self.home_zone.longitude = Some(parse_env("HOME_ZONE_LON", &v)?);
        }
        if let Some(v) = lookup("HOME_ZONE_RADIUS_METERS") {
            self.home_zone.radius_meters = parse_env("HOME_ZONE_RADIUS_METERS", &v)?;
        }
        if let Some(v) = lookup("WINDOW_RETENTION_SECS") {
            self.window.retention_secs = parse_env("WINDOW_RETENTION_SECS", &v)?;
        }
        if let Some(v) = lookup("WINDOW_MAX_SAMPLES") {
            self.window.max_samples = parse_env("WINDOW_MAX_SAMPLES", &v)?;
        }
        if let Some(v) = lookup("SUB_WINDOW_SECS") {
            self.features.sub_window_secs = parse_env("SUB_WINDOW_SECS", &v)?;
        }
        if let Some(v) = lookup("LONG_WINDOW_SECS") {
            self.features.long_window_secs = parse_env("LONG_WINDOW_SECS", &v)?;
        }
        if let Some(v) = lookup("STALENESS_THRESHOLD_SECS") {
            self.status.staleness_secs = parse_env("STALENESS_THRESHOLD_SECS", &v)?;
        }
        match lookup("DISCONNECTED_THRESHOLD_SECS") {
            Some(v) => {
                self.status.disconnected_secs = parse_env("DISCONNECTED_THRESHOLD_SECS", &v)?;
            }
            // A lone staleness override drags the disconnect threshold along with it
            None => {
                self.status.disconnected_secs =
                    self.status.disconnected_secs.max(self.status.staleness_secs);
            }
        }
        if let Some(v) = lookup("MAX_IDLE_SECS") {
            self.status.max_idle_secs = parse_env("MAX_IDLE_SECS", &v)?;
        }
        if let Some(v) = lookup("RISK_WEIGHTS") {
            self.classifier.weights = parse_weights(&v, self.classifier.weights)?;
        }
        if let Some(v) = lookup("RISK_THRESHOLDS") {
            self.classifier.levels = parse_levels(&v)?;
        }
        if let Some(v) = lookup("DEFAULT_IDENTITY") {
            let v = v.trim();
            self.ingest.default_identity = (!v.is_empty()).then(|| v.to_string());
        }
        if let Some(v) = lookup("VELOCITY_UNIT") {
            self.ingest.velocity_unit = SpeedUnit::parse(v.trim())?;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let zone = &self.home_zone;
        if !zone.radius_meters.is_finite() || zone.radius_meters < 0.0 {
            return Err(Error::ConfigError(format!(
                "Home zone radius must be a non-negative number, got {}",
                zone.radius_meters
            )));
        }
        match (zone.latitude, zone.longitude) {
            (Some(lat), Some(lon)) => validate_point("home zone", lat, lon)?,
            (None, None) => {}
            _ => {
                return Err(Error::ConfigError(
                    "Home zone latitude and longitude must be set together".to_string(),
                ))
            }
        }
        for (identity, point) in &zone.overrides {
            validate_point(identity, point.latitude, point.longitude)?;
            if let Some(radius) = point.radius_meters {
                if !radius.is_finite() || radius < 0.0 {
                    return Err(Error::ConfigError(format!(
                        "Home zone radius for {identity} must be non-negative, got {radius}"
                    )));
                }
            }
        }

        // Window and feature horizons
        if self.window.retention_secs == 0 {
            return Err(Error::ConfigError("Window retention must be greater than 0".to_string()));
        }
        if self.window.max_samples == 0 {
            return Err(Error::ConfigError("Window max samples must be greater than 0".to_string()));
        }
        if self.features.sub_window_secs == 0 {
            return Err(Error::ConfigError("Sub-window must be greater than 0".to_string()));
        }
        if self.features.sub_window_secs > self.features.long_window_secs {
            return Err(Error::ConfigError(
                "Sub-window must not exceed the long window".to_string(),
            ));
        }
        if self.features.long_window_secs > self.window.retention_secs {
            return Err(Error::ConfigError(
                "Long window must not exceed the window retention".to_string(),
            ));
        }
        if !self.features.stop_speed_threshold.is_finite() || self.features.stop_speed_threshold < 0.0 {
            return Err(Error::ConfigError(
                "Stop speed threshold must be a non-negative number".to_string(),
            ));
        }

        self.classifier.validate()?;

        // Freshness
        if self.status.staleness_secs == 0 {
            return Err(Error::ConfigError("Staleness threshold must be greater than 0".to_string()));
        }
        if self.status.disconnected_secs < self.status.staleness_secs {
            return Err(Error::ConfigError(
                "Disconnect threshold must not be shorter than the staleness threshold".to_string(),
            ));
        }
        if self.status.max_idle_secs == 0 {
            return Err(Error::ConfigError("Max idle duration must be greater than 0".to_string()));
        }

        let durations = [
            ("Window retention", self.window.retention_secs),
            ("Sub-window", self.features.sub_window_secs),
            ("Long window", self.features.long_window_secs),
            ("Staleness threshold", self.status.staleness_secs),
            ("Disconnect threshold", self.status.disconnected_secs),
            ("Max idle duration", self.status.max_idle_secs),
        ];
        for (name, value) in durations {
            if value > MAX_DURATION_SECS {
                return Err(Error::ConfigError(format!(
                    "{name} must not exceed {MAX_DURATION_SECS} seconds, got {value}"
                )));
            }
        }

        if let Some(identity) = &self.ingest.default_identity {
            if identity.trim().is_empty() {
                return Err(Error::ConfigError("Default identity must not be blank".to_string()));
            }
        }

        Ok(())
    }
}

impl ClassifierConfig {
    /// Validate weights, scales and level ordering
    pub fn validate(&self) -> Result<()> {
        let weights = [
            ("jitter", self.weights.jitter),
            ("volatility", self.weights.volatility),
            ("stop", self.weights.stop),
        ];
        for (name, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(Error::ConfigError(format!(
                    "Weight for {name} must be a non-negative number, got {weight}"
                )));
            }
        }

        let scales = [
            ("jitter", self.scales.jitter),
            ("volatility", self.scales.volatility),
            ("stop", self.scales.stop_secs),
        ];
        for (name, scale) in scales {
            if !scale.is_finite() || scale <= 0.0 {
                return Err(Error::ConfigError(format!(
                    "Scale for {name} must be positive, got {scale}"
                )));
            }
        }

        if !self.spike_ratio.is_finite() || self.spike_ratio <= 0.0 {
            return Err(Error::ConfigError("Spike ratio must be positive".to_string()));
        }
        if !self.spike_multiplier.is_finite() || self.spike_multiplier < 1.0 {
            return Err(Error::ConfigError("Spike multiplier must be at least 1.0".to_string()));
        }
        if !self.max_score.is_finite() || self.max_score <= 0.0 {
            return Err(Error::ConfigError("Max score must be positive".to_string()));
        }

        let Some(first) = self.levels.first() else {
            return Err(Error::ConfigError("At least one risk level is required".to_string()));
        };
        if first.lower_bound > 0.0 {
            return Err(Error::ConfigError(format!(
                "Lowest risk level must start at or below 0, got {}",
                first.lower_bound
            )));
        }
        let mut labels = HashSet::new();
        for level in &self.levels {
            if level.label.trim().is_empty() {
                return Err(Error::ConfigError("Risk level labels must not be blank".to_string()));
            }
            if !labels.insert(level.label.as_str()) {
                return Err(Error::ConfigError(format!("Duplicate risk level: {}", level.label)));
            }
            if !level.lower_bound.is_finite() {
                return Err(Error::ConfigError(format!(
                    "Risk level {} has a non-finite bound",
                    level.label
                )));
            }
        }
        if self.levels.windows(2).any(|pair| pair[1].lower_bound <= pair[0].lower_bound) {
            return Err(Error::ConfigError(
                "Risk level thresholds must be strictly ascending".to_string(),
            ));
        }

        Ok(())
    }
}

fn validate_point(name: &str, lat: f64, lon: f64) -> Result<()> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(Error::ConfigError(format!("Latitude for {name} out of range: {lat}")));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(Error::ConfigError(format!("Longitude for {name} out of range: {lon}")));
    }
    Ok(())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::ConfigError(format!("Invalid value for {key}: {value}")))
}

/// Parse `jitter=40,volatility=40,stop=20`; unnamed weights keep their current value
fn parse_weights(value: &str, mut weights: RiskWeights) -> Result<RiskWeights> {
    for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (name, raw) = part
            .split_once('=')
            .ok_or_else(|| Error::ConfigError(format!("Expected name=value in RISK_WEIGHTS, got {part}")))?;
        let weight: f64 = parse_env("RISK_WEIGHTS", raw)?;
        match name.trim() {
            "jitter" => weights.jitter = weight,
            "volatility" => weights.volatility = weight,
            "stop" => weights.stop = weight,
            other => return Err(Error::ConfigError(format!("Unknown risk weight: {other}"))),
        }
    }
    Ok(weights)
}

/// Parse `LOW:0,MEDIUM:25,HIGH:50,CRITICAL:75`
fn parse_levels(value: &str) -> Result<Vec<LevelThreshold>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|part| {
            let (label, raw) = part.split_once(':').ok_or_else(|| {
                Error::ConfigError(format!("Expected LABEL:bound in RISK_THRESHOLDS, got {part}"))
            })?;
            Ok(LevelThreshold {
                label: label.trim().to_string(),
                lower_bound: parse_env("RISK_THRESHOLDS", raw)?,
            })
        })
        .collect()
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Ping risk engine configuration

# Privacy exclusion zone; pings inside it are dropped before anything else
home_zone:
  latitude: 32.0853
  longitude: 34.7818
  radius_meters: 50.0
  overrides: {}

# Per-identity window bounds
window:
  retention_secs: 300
  max_samples: 512

# Feature horizons
features:
  sub_window_secs: 30
  long_window_secs: 300
  stop_speed_threshold: 0.5

# Risk scoring
classifier:
  weights:
    jitter: 40.0
    volatility: 40.0
    stop: 20.0
  scales:
    jitter: 0.5
    volatility: 2.0
    stop_secs: 180.0
  spike_ratio: 1.5
  spike_multiplier: 1.2
  max_score: 100.0
  levels:
    - label: LOW
      lower_bound: 0.0
    - label: MEDIUM
      lower_bound: 25.0
    - label: HIGH
      lower_bound: 50.0
    - label: CRITICAL
      lower_bound: 75.0

# Freshness
status:
  staleness_secs: 120
  disconnected_secs: 600
  max_idle_secs: 3600

# Raw sample interpretation
ingest:
  velocity_unit: kmh
  default_identity: pepper
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_example_config_parses() {
        let config: Config = serde_yaml::from_str(EXAMPLE_CONFIG).unwrap();
        config.validate().unwrap();
        assert_eq!(config.home_zone.latitude, Some(32.0853));
        assert_eq!(config.classifier.levels.len(), 4);
        assert_eq!(config.ingest.default_identity.as_deref(), Some("pepper"));
        assert_eq!(config.ingest.velocity_unit, SpeedUnit::KilometersPerHour);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: Config = serde_yaml::from_str("window:\n  retention_secs: 600\n").unwrap();
        assert_eq!(config.window.retention_secs, 600);
        assert_eq!(config.window.max_samples, DEFAULT_MAX_SAMPLES);
        assert_eq!(config.features.sub_window_secs, DEFAULT_SUB_WINDOW_SECS);
    }

    #[test]
    fn test_env_overlay() {
        let vars: HashMap<&str, &str> = [
            ("HOME_ZONE_LAT", "10.5"),
            ("HOME_ZONE_LON", "-20.25"),
            ("HOME_ZONE_RADIUS_METERS", "75"),
            ("SUB_WINDOW_SECS", "20"),
            ("RISK_WEIGHTS", "jitter=10, stop=5"),
            ("RISK_THRESHOLDS", "CALM:0,TENSE:30,REACTIVE:60"),
            ("VELOCITY_UNIT", "mps"),
            ("DEFAULT_IDENTITY", "pepper"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env(|key| vars.get(key).map(|v| (*v).to_string()))
            .unwrap();
        config.validate().unwrap();

        assert_eq!(config.home_zone.latitude, Some(10.5));
        assert_eq!(config.home_zone.longitude, Some(-20.25));
        assert_eq!(config.home_zone.radius_meters, 75.0);
        assert_eq!(config.features.sub_window_secs, 20);
        assert_eq!(config.classifier.weights.jitter, 10.0);
        assert_eq!(config.classifier.weights.volatility, DEFAULT_VOLATILITY_WEIGHT);
        assert_eq!(config.classifier.weights.stop, 5.0);
        assert_eq!(config.classifier.levels[2].label, "REACTIVE");
        assert_eq!(config.ingest.velocity_unit, SpeedUnit::MetersPerSecond);
        assert_eq!(config.ingest.default_identity.as_deref(), Some("pepper"));
    }

    #[test]
    fn test_env_overlay_rejects_garbage() {
        let mut config = Config::default();
        let result = config.apply_env(|key| (key == "HOME_ZONE_RADIUS_METERS").then(|| "wide".to_string()));
        assert!(matches!(result, Err(Error::ConfigError(msg)) if msg.contains("HOME_ZONE_RADIUS_METERS")));

        let mut config = Config::default();
        let result = config.apply_env(|key| (key == "RISK_WEIGHTS").then(|| "speed=3".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_unordered_levels() {
        let mut config = Config::default();
        config.classifier.levels.swap(1, 2);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_levels_starting_above_zero() {
        let mut config = Config::default();
        config.classifier.levels[0].lower_bound = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_half_configured_home() {
        let mut config = Config::default();
        config.home_zone.latitude = Some(1.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_horizons() {
        let mut config = Config::default();
        config.features.sub_window_secs = 600;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.window.retention_secs = 60;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_staleness_override_alone_raises_disconnect_threshold() {
        let mut config = Config::default();
        config
            .apply_env(|key| (key == "STALENESS_THRESHOLD_SECS").then(|| "900".to_string()))
            .unwrap();
        config.validate().unwrap();
        assert_eq!(config.status.staleness_secs, 900);
        assert_eq!(config.status.disconnected_secs, 900);

        // A shorter staleness keeps the default disconnect threshold
        let mut config = Config::default();
        config
            .apply_env(|key| (key == "STALENESS_THRESHOLD_SECS").then(|| "60".to_string()))
            .unwrap();
        assert_eq!(config.status.disconnected_secs, DEFAULT_DISCONNECTED_SECS);
    }

    #[test]
    fn test_env_disconnect_threshold() {
        let vars: HashMap<&str, &str> = [
            ("STALENESS_THRESHOLD_SECS", "900"),
            ("DISCONNECTED_THRESHOLD_SECS", "1800"),
        ]
        .into_iter()
        .collect();
        let mut config = Config::default();
        config
            .apply_env(|key| vars.get(key).map(|v| (*v).to_string()))
            .unwrap();
        config.validate().unwrap();
        assert_eq!(config.status.disconnected_secs, 1800);

        // An explicit threshold below staleness is still rejected
        let mut config = Config::default();
        config
            .apply_env(|key| (key == "DISCONNECTED_THRESHOLD_SECS").then(|| "30".to_string()))
            .unwrap();
        assert!(matches!(config.validate(), Err(Error::ConfigError(msg)) if msg.contains("Disconnect")));
    }

    #[test]
    fn test_validate_rejects_unbounded_durations() {
        let mut config = Config::default();
        config.status.max_idle_secs = 100_000_000_000_000;
        assert!(matches!(config.validate(), Err(Error::ConfigError(msg)) if msg.contains("Max idle")));

        let mut config = Config::default();
        config.window.retention_secs = MAX_DURATION_SECS + 1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.status.disconnected_secs = u64::MAX;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.window.retention_secs = MAX_DURATION_SECS;
        config.status.max_idle_secs = MAX_DURATION_SECS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_negative_weight() {
        let mut config = Config::default();
        config.classifier.weights.volatility = -1.0;
        assert!(config.validate().is_err());
    }
}
