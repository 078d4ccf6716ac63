//! Home-zone privacy filter.
//!
//! Samples within the configured radius of a home point are dropped before
//! they can reach any window. Coordinates are never logged here.

use crate::config::HomeZoneConfig;
use crate::geo::haversine_distance;
use crate::sample::Sample;
use log::info;
use std::collections::HashMap;

/// A circular exclusion area
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HomeZone {
    /// Center latitude
    pub latitude: f64,
    /// Center longitude
    pub longitude: f64,
    /// Radius in meters
    pub radius_meters: f64,
}

impl HomeZone {
    /// Whether a point lies inside the zone (boundary inclusive)
    #[must_use]
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        haversine_distance(latitude, longitude, self.latitude, self.longitude) <= self.radius_meters
    }
}

/// Outcome of the privacy check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneDecision {
    /// Sample may enter the window
    Keep,
    /// Sample is inside a home zone and must be discarded
    Drop,
}

/// Applies the global zone and any per-identity overrides
#[derive(Debug, Clone, Default)]
pub struct HomeZoneFilter {
    global: Option<HomeZone>,
    overrides: HashMap<String, HomeZone>,
}

impl HomeZoneFilter {
    /// Build the filter from configuration
    #[must_use]
    pub fn new(config: &HomeZoneConfig) -> Self {
        let global = match (config.latitude, config.longitude) {
            (Some(latitude), Some(longitude)) => Some(HomeZone {
                latitude,
                longitude,
                radius_meters: config.radius_meters,
            }),
            _ => None,
        };

        let overrides = config
            .overrides
            .iter()
            .map(|(identity, zone)| {
                (
                    identity.clone(),
                    HomeZone {
                        latitude: zone.latitude,
                        longitude: zone.longitude,
                        radius_meters: zone.radius_meters.unwrap_or(config.radius_meters),
                    },
                )
            })
            .collect();

        Self { global, overrides }
    }

    /// Zone that applies to an identity, if any
    #[must_use]
    pub fn zone_for(&self, identity: &str) -> Option<&HomeZone> {
        self.overrides.get(identity).or(self.global.as_ref())
    }

    /// Decide whether a sample may be kept
    #[must_use]
    pub fn check(&self, sample: &Sample) -> ZoneDecision {
        match self.zone_for(&sample.identity) {
            Some(zone) if zone.contains(sample.latitude, sample.longitude) => {
                info!("Home zone filtered: ping for {} dropped", sample.identity);
                ZoneDecision::Drop
            }
            _ => ZoneDecision::Keep,
        }
    }
}
