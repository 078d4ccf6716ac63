//! Constants used throughout the engine

/// Mean Earth radius used by the haversine formula (meters)
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// km/h to m/s conversion factor
pub const KMH_TO_MPS: f64 = 1.0 / 3.6;

/// Default home-zone privacy radius (meters)
pub const DEFAULT_HOME_ZONE_RADIUS_M: f64 = 50.0;

/// Default window retention (seconds)
pub const DEFAULT_RETENTION_SECS: u64 = 300;

/// Default absolute bound on samples kept per identity
pub const DEFAULT_MAX_SAMPLES: usize = 512;

/// Short sub-window for jitter and volatility (seconds)
pub const DEFAULT_SUB_WINDOW_SECS: u64 = 30;

/// Long baseline window (seconds)
pub const DEFAULT_LONG_WINDOW_SECS: u64 = 300;

/// Speed below which a sample counts as stopped (m/s)
pub const DEFAULT_STOP_SPEED_THRESHOLD: f64 = 0.5;

/// Status becomes stale after this many seconds without a ping
pub const DEFAULT_STALENESS_SECS: u64 = 120;

/// Status becomes disconnected after this many seconds without a ping
pub const DEFAULT_DISCONNECTED_SECS: u64 = 600;

/// Idle identities are reclaimed after this many seconds
pub const DEFAULT_MAX_IDLE_SECS: u64 = 3600;

/// Longest accepted configured duration, roughly a century (seconds)
pub const MAX_DURATION_SECS: u64 = 3_155_760_000;

/// Largest possible bearing difference (degrees)
pub const MAX_BEARING_DIFFERENCE: f64 = 180.0;

/// Default classifier weights
pub const DEFAULT_JITTER_WEIGHT: f64 = 40.0;
pub const DEFAULT_VOLATILITY_WEIGHT: f64 = 40.0;
pub const DEFAULT_STOP_WEIGHT: f64 = 20.0;

/// Feature values at which each weighted component saturates
pub const DEFAULT_JITTER_SCALE: f64 = 0.5;
pub const DEFAULT_VOLATILITY_SCALE: f64 = 2.0;
pub const DEFAULT_STOP_SCALE_SECS: f64 = 180.0;

/// Spike boost applied when short-window volatility outpaces the baseline
pub const DEFAULT_SPIKE_RATIO: f64 = 1.5;
pub const DEFAULT_SPIKE_MULTIPLIER: f64 = 1.2;

/// Upper clamp for the risk score
pub const MAX_RISK_SCORE: f64 = 100.0;

/// Activity thresholds on the normalized jitter value
pub const JITTER_CALM_THRESHOLD: f64 = 0.15;
pub const JITTER_ACTIVE_THRESHOLD: f64 = 0.35;

/// Volatility (m/s) above which movement is labelled erratic
pub const VOLATILITY_ERRATIC_THRESHOLD: f64 = 1.5;

/// A stop longer than this is reported as resting (seconds)
pub const STOP_LONG_DURATION_SECS: f64 = 60.0;

