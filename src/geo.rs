//! Great-circle distance and bearing arithmetic.

use crate::constants::{EARTH_RADIUS_M, MAX_BEARING_DIFFERENCE};

/// Distance in meters between two WGS84 points using the haversine formula
#[must_use]
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    // Rounding can push `a` a hair past 1 for antipodal points
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Smallest angle between two bearings, in `[0, 180]`
#[must_use]
pub fn bearing_difference(a: f64, b: f64) -> f64 {
    let diff = (a - b).abs() % 360.0;
    diff.min(360.0 - diff)
}

/// Fold any finite angle into `[0, 360)`
#[must_use]
pub fn normalize_bearing(bearing: f64) -> f64 {
    let wrapped = bearing.rem_euclid(360.0);
    // rem_euclid can return exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Mean of consecutive bearing differences scaled into `[0, 1]`.
///
/// Returns `None` with fewer than two bearings.
#[must_use]
pub fn mean_bearing_change(bearings: &[f64]) -> Option<f64> {
    if bearings.len() < 2 {
        return None;
    }

    let total: f64 = bearings
        .windows(2)
        .map(|pair| bearing_difference(pair[0], pair[1]))
        .sum();
    let mean = total / (bearings.len() - 1) as f64;

    Some(mean / MAX_BEARING_DIFFERENCE)
}
