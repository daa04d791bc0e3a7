//! Geolens - IP geolocation over MaxMind DB style databases
//!
//! Geolens reads binary IP-to-attribute databases (country, autonomous system,
//! city and registrant data) and keeps a set of them loaded, refreshed and
//! queryable from any number of threads.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use geolens::{Config, GeoManager, HttpFetcher};
//! use std::sync::Arc;
//!
//! let config = Config::from_file("geolens.json")?;
//! let manager = GeoManager::new(config, Arc::new(HttpFetcher::default()));
//! manager.load_databases()?;
//!
//! let result = manager.lookup("81.2.69.160");
//! if result.found {
//!     println!("{:?} {:?}", result.country_code, result.city);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │  GeoManager                          │
//! │  ArcSwap<DatabaseSet> snapshot       │
//! ├──────────────────────────────────────┤
//! │  Extractors (country/asn/city/whois) │
//! │  configurable RecordSchema           │
//! ├──────────────────────────────────────┤
//! │  Reader: search tree + data section  │
//! │  mmap or owned bytes                 │
//! └──────────────────────────────────────┘
//! ```
//!
//! The decoder layer ([`Reader`], [`DataValue`]) knows nothing about
//! geography and can be used on its own for any database in the format.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Configuration and database kinds
pub mod config;
/// Static ISO 3166 country table
pub mod countries;
/// Data section decoding
pub mod data_section;
/// Error types
pub mod error;
/// Typed record extractors
pub mod extract;
/// Database download collaborator
pub mod fetch;
/// Database manager
pub mod manager;
/// Binary database reader
pub mod mmdb;
/// Field-path schemas for extractors
pub mod schema;
/// Storage directory and atomic file replacement
pub mod storage;
/// Background update thread
pub mod updater;

#[cfg(test)]
#[path = "../tests/common/mod.rs"]
pub(crate) mod fixtures;

pub use crate::config::{Config, ConfigError, DatabaseKind, Source, UpdateCadence};
pub use crate::data_section::DataValue;
pub use crate::error::{DecodeError, GeoError};
pub use crate::extract::{AsnRecord, CityRecord, CountryRecord, RecordExtractor, WhoisRecord};
pub use crate::fetch::{FetchError, Fetcher, HttpFetcher};
pub use crate::manager::{GeoManager, GeoResult, SlotState};
pub use crate::mmdb::{IpVersion, LookupResult, Metadata, Reader, RecordSize};
pub use crate::schema::RecordSchema;
pub use crate::updater::{spawn_updater, UpdaterHandle};
