//! Streaming behavioral-risk engine for geolocation pings.
//!
//! This library turns a stream of noisy, possibly duplicated location samples
//! into a continuously updated, explainable risk assessment per tracked
//! identity:
//! - Raw pings are validated and converted to canonical units
//! - Pings inside a configured home zone are dropped for privacy
//! - Accepted samples are kept in a time-bounded window per identity
//! - Motion-instability features (jitter, volatility, stops) are recomputed
//!   over the window on every accepted sample
//! - A weighted score is mapped onto ordered risk levels
//!
//! # Examples
//!
//! ## Ingesting Pings
//!
//! ```no_run
//! use pepsafe_engine::{config::Config, engine::RiskEngine, sample::RawSample};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = RiskEngine::new(Config::from_env()?)?;
//!
//! // Velocity in km/h and course over ground, as tracker apps send them
//! let ping = RawSample::at("pepper", 32.0901, 34.7752)
//!     .with_velocity(4.5)
//!     .with_bearing(270.0)
//!     .with_unix_time(1_700_000_000);
//!
//! if let Some(snapshot) = engine.ingest(&ping)?.snapshot() {
//!     println!("{}: {:.1} ({})", snapshot.identity, snapshot.risk_score, snapshot.risk_level);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Querying Status
//!
//! ```no_run
//! use pepsafe_engine::{config::Config, engine::RiskEngine, Error};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = RiskEngine::new(Config::default())?;
//!
//! match engine.status("pepper") {
//!     Ok(snapshot) if snapshot.status.is_stale() => println!("stale: {}", snapshot.risk_level),
//!     Ok(snapshot) => println!("live: {}", snapshot.risk_level),
//!     Err(Error::NotFound(id)) => println!("no data for {id}"),
//!     Err(e) => return Err(e.into()),
//! }
//! # Ok(())
//! # }
//! ```

/// Ping normalization into canonical units
pub mod normalizer;

/// Home-zone privacy filter
pub mod home_zone;

/// Per-identity sample window
pub mod window;

/// Concurrent store of windows and published snapshots
pub mod store;

/// Motion-instability feature extraction
pub mod features;

/// Risk scoring and level mapping
pub mod classifier;

/// Risk snapshots and freshness
pub mod status;

/// Ingestion pipeline and status queries
pub mod engine;

/// Raw and canonical sample types
pub mod sample;

/// Great-circle and bearing math
pub mod geo;

/// Injectable time source
pub mod clock;

/// Error types and result handling
pub mod error;

/// Constants used throughout the engine
pub mod constants;

/// Configuration management
pub mod config;

pub use error::{Error, Result};
