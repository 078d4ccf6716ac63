//! Motion-instability features computed over a window.
//!
//! Every feature is recomputed from scratch from the window contents, so the
//! result depends only on the sample sequence and never on wall-clock time.

/// Summary statistics helpers
pub mod stats;

use crate::config::FeatureConfig;
use crate::geo::mean_bearing_change;
use crate::sample::Sample;
use crate::window::{horizon_start, Window};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use stats::Statistics;

/// Derived statistics for the newest state of a window
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Mean consecutive bearing change in the sub-window, scaled to `[0, 1]`
    pub jitter: f64,
    /// Speed standard deviation in the sub-window (m/s)
    pub volatility: f64,
    /// Jitter over the long window
    pub jitter_long: f64,
    /// Volatility over the long window
    pub volatility_long: f64,
    /// `jitter / jitter_long`, undefined when the baseline is zero
    pub jitter_ratio: Option<f64>,
    /// `volatility / volatility_long`, undefined when the baseline is zero
    pub volatility_ratio: Option<f64>,
    /// Samples in the sub-window
    pub sub_window_count: usize,
    /// Samples in the long window
    pub long_window_count: usize,
    /// Mean speed in the sub-window (m/s)
    pub mean_speed: f64,
    /// Newest speed is below the stop threshold
    pub is_stopped: bool,
    /// Length of the stopped run ending at the newest sample (seconds)
    pub stop_duration_secs: f64,
}

/// Computes [`FeatureVector`]s from window contents
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    sub_window: Duration,
    long_window: Duration,
    stop_speed_threshold: f64,
}

/// Jitter and volatility over one horizon
struct HorizonStats {
    count: usize,
    jitter: f64,
    volatility: f64,
    mean_speed: f64,
}

impl FeatureExtractor {
    /// Create an extractor from configuration
    #[must_use]
    pub fn new(config: &FeatureConfig) -> Self {
        Self {
            sub_window: config.sub_window(),
            long_window: config.long_window(),
            stop_speed_threshold: config.stop_speed_threshold,
        }
    }

    /// Features for the current window; `None` if the window is empty
    #[must_use]
    pub fn extract(&self, window: &Window) -> Option<FeatureVector> {
        let samples: Vec<&Sample> = window.iter().collect();
        self.compute(&samples)
    }

    /// Features for an ordered (oldest first) slice of samples
    #[must_use]
    pub fn extract_from(&self, samples: &[Sample]) -> Option<FeatureVector> {
        let samples: Vec<&Sample> = samples.iter().collect();
        self.compute(&samples)
    }

    fn compute(&self, samples: &[&Sample]) -> Option<FeatureVector> {
        let newest = *samples.last()?;

        let long = within(samples, newest.timestamp, self.long_window);
        let short = within(samples, newest.timestamp, self.sub_window);

        let short_stats = horizon_stats(short);
        let long_stats = horizon_stats(long);

        let is_stopped = newest.speed < self.stop_speed_threshold;
        let stop_duration_secs = if is_stopped {
            self.stop_duration(long, newest.timestamp)
        } else {
            0.0
        };

        Some(FeatureVector {
            jitter: short_stats.jitter,
            volatility: short_stats.volatility,
            jitter_long: long_stats.jitter,
            volatility_long: long_stats.volatility,
            jitter_ratio: ratio(short_stats.jitter, long_stats.jitter),
            volatility_ratio: ratio(short_stats.volatility, long_stats.volatility),
            sub_window_count: short_stats.count,
            long_window_count: long_stats.count,
            mean_speed: short_stats.mean_speed,
            is_stopped,
            stop_duration_secs,
        })
    }

    /// Walk back from the newest sample while the subject stays stopped
    fn stop_duration(&self, samples: &[&Sample], newest: DateTime<Utc>) -> f64 {
        let start = samples
            .iter()
            .rev()
            .take_while(|s| s.speed < self.stop_speed_threshold)
            .last()
            .map_or(newest, |s| s.timestamp);

        seconds_between(start, newest)
    }
}

/// Suffix of `samples` no older than `horizon` before `newest`
fn within<'a, 'b>(samples: &'a [&'b Sample], newest: DateTime<Utc>, horizon: Duration) -> &'a [&'b Sample] {
    let cutoff = horizon_start(newest, horizon);
    let start = samples.partition_point(|s| s.timestamp < cutoff);
    &samples[start..]
}

fn horizon_stats(samples: &[&Sample]) -> HorizonStats {
    let speeds: Vec<f64> = samples.iter().map(|s| s.speed).collect();
    let speed_stats = Statistics::of(&speeds);

    // Fewer than two samples carry no motion signal
    if samples.len() < 2 {
        return HorizonStats {
            count: samples.len(),
            jitter: 0.0,
            volatility: 0.0,
            mean_speed: speed_stats.map_or(0.0, |s| s.mean),
        };
    }

    let bearings: Vec<f64> = samples.iter().filter_map(|s| s.bearing).collect();

    HorizonStats {
        count: samples.len(),
        jitter: mean_bearing_change(&bearings).unwrap_or(0.0),
        volatility: speed_stats.map_or(0.0, |s| s.std_dev),
        mean_speed: speed_stats.map_or(0.0, |s| s.mean),
    }
}

fn ratio(short: f64, long: f64) -> Option<f64> {
    (long > 0.0).then(|| short / long)
}

#[allow(clippy::cast_precision_loss)] // millisecond precision is plenty
fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn extractor() -> FeatureExtractor {
        FeatureExtractor::new(&FeatureConfig::default())
    }

    fn ping(secs: i64, speed: f64, bearing: Option<f64>) -> Sample {
        Sample {
            identity: "pepper".to_string(),
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            latitude: 0.0,
            longitude: 0.0,
            speed,
            bearing,
            accuracy: None,
            battery: None,
        }
    }

    #[test]
    fn test_empty_is_none() {
        assert!(extractor().extract_from(&[]).is_none());
    }

    #[test]
    fn test_single_sample_has_no_motion_signal() {
        let features = extractor().extract_from(&[ping(0, 5.0, Some(90.0))]).unwrap();
        assert_eq!(features.jitter, 0.0);
        assert_eq!(features.volatility, 0.0);
        assert_eq!(features.sub_window_count, 1);
        assert_eq!(features.jitter_ratio, None);
        assert_eq!(features.volatility_ratio, None);
        assert!(!features.is_stopped);
    }

    #[test]
    fn test_steady_walk() {
        let samples = [
            ping(0, 0.5, Some(10.0)),
            ping(5, 0.5, Some(12.0)),
            ping(10, 0.5, Some(11.0)),
        ];
        let features = extractor().extract_from(&samples).unwrap();
        assert!((features.jitter - 1.5 / 180.0).abs() < 1e-12);
        assert_eq!(features.volatility, 0.0);
        assert_eq!(features.mean_speed, 0.5);
        assert!(!features.is_stopped);
    }

    #[test]
    fn test_lunging_walk() {
        let samples = [
            ping(0, 0.2, Some(0.0)),
            ping(1, 3.0, Some(170.0)),
            ping(2, 0.1, Some(20.0)),
            ping(3, 2.8, Some(190.0)),
        ];
        let features = extractor().extract_from(&samples).unwrap();
        assert!((features.jitter - (490.0 / 3.0) / 180.0).abs() < 1e-9);
        assert!((features.volatility - 1.590_335).abs() < 1e-5);
        // Same samples in both horizons
        assert_eq!(features.volatility_ratio, Some(1.0));
    }

    #[test]
    fn test_sub_window_excludes_older_samples() {
        let samples = [
            ping(0, 9.0, Some(0.0)),
            ping(10, 0.1, Some(180.0)),
            ping(50, 1.0, Some(90.0)),
            ping(60, 1.0, Some(90.0)),
        ];
        let features = extractor().extract_from(&samples).unwrap();
        assert_eq!(features.sub_window_count, 2);
        assert_eq!(features.long_window_count, 4);
        assert_eq!(features.jitter, 0.0);
        assert_eq!(features.volatility, 0.0);
        assert!(features.jitter_long > 0.0);
        assert!(features.volatility_long > 0.0);
        assert_eq!(features.volatility_ratio, Some(0.0));
    }

    #[test]
    fn test_missing_bearings_are_skipped() {
        let samples = [
            ping(0, 1.0, Some(0.0)),
            ping(1, 1.0, None),
            ping(2, 1.0, Some(90.0)),
        ];
        let features = extractor().extract_from(&samples).unwrap();
        assert!((features.jitter - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_stop_duration() {
        let samples = [
            ping(0, 2.0, None),
            ping(10, 0.1, None),
            ping(20, 0.0, None),
            ping(40, 0.2, None),
        ];
        let features = extractor().extract_from(&samples).unwrap();
        assert!(features.is_stopped);
        assert_eq!(features.stop_duration_secs, 30.0);
    }

    #[test]
    fn test_moving_has_no_stop_duration() {
        let samples = [ping(0, 0.1, None), ping(10, 1.0, None)];
        let features = extractor().extract_from(&samples).unwrap();
        assert!(!features.is_stopped);
        assert_eq!(features.stop_duration_secs, 0.0);
    }

    #[test]
    fn test_window_and_slice_agree() {
        let mut window = Window::new(Duration::seconds(300), 100);
        let samples: Vec<Sample> = (0..20)
            .map(|i| ping(i * 3, f64::from(i as i32 % 4), Some(f64::from(i as i32 * 37 % 360))))
            .collect();
        for s in &samples {
            window.insert(s.clone()).unwrap();
        }
        assert_eq!(extractor().extract(&window), extractor().extract_from(&samples));
    }
}
