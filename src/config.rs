//! Configuration
//!
//! [`Config`] is supplied once when a [`GeoManager`](crate::GeoManager) is
//! built and never changes afterwards. It deserializes from JSON with every
//! field optional:
//!
//! ```json
//! {
//!   "directory": "/var/lib/geolens",
//!   "update_cadence": "weekly",
//!   "city_enabled": true,
//!   "deny_countries": ["KP"],
//!   "sources": {
//!     "country": { "url": "https://example.net/country.mmdb.gz" },
//!     "city": { "url": "https://example.net/city.mmdb", "checksum_url": "https://example.net/city.mmdb.sha256" }
//!   }
//! }
//! ```

use crate::schema::{RecordSchema, SchemaOverride};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default fetch timeout (database files can be large)
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 300;

/// Default cap on downloaded (and decompressed) bytes
pub const DEFAULT_MAX_DOWNLOAD_BYTES: u64 = 512 * 1024 * 1024;

/// Default lookup cache capacity
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// The databases a manager can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    /// Country database, the minimum viable dataset
    Country,
    /// Autonomous system database
    Asn,
    /// City database
    City,
    /// Registrant (WHOIS) database
    Whois,
}

impl DatabaseKind {
    /// Every kind, in load order
    pub const ALL: [DatabaseKind; 4] = [
        DatabaseKind::Country,
        DatabaseKind::Asn,
        DatabaseKind::City,
        DatabaseKind::Whois,
    ];

    /// Lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            DatabaseKind::Country => "country",
            DatabaseKind::Asn => "asn",
            DatabaseKind::City => "city",
            DatabaseKind::Whois => "whois",
        }
    }

    /// File name under the storage directory
    pub fn file_name(self) -> &'static str {
        match self {
            DatabaseKind::Country => "country.mmdb",
            DatabaseKind::Asn => "asn.mmdb",
            DatabaseKind::City => "city.mmdb",
            DatabaseKind::Whois => "whois.mmdb",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "country" => Ok(DatabaseKind::Country),
            "asn" => Ok(DatabaseKind::Asn),
            "city" => Ok(DatabaseKind::City),
            "whois" => Ok(DatabaseKind::Whois),
            other => Err(format!(
                "unknown database '{}' (expected country, asn, city or whois)",
                other
            )),
        }
    }
}

/// How often the background updater refreshes databases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UpdateCadence {
    /// Never refresh automatically
    #[default]
    Never,
    /// Every 24 hours
    Daily,
    /// Every 7 days
    Weekly,
    /// Every 30 days
    Monthly,
}

impl UpdateCadence {
    /// Refresh interval, `None` for [`UpdateCadence::Never`]
    pub fn interval(self) -> Option<Duration> {
        const DAY: u64 = 24 * 60 * 60;
        match self {
            UpdateCadence::Never => None,
            UpdateCadence::Daily => Some(Duration::from_secs(DAY)),
            UpdateCadence::Weekly => Some(Duration::from_secs(7 * DAY)),
            UpdateCadence::Monthly => Some(Duration::from_secs(30 * DAY)),
        }
    }
}

/// Where to download one database from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Database URL; gzip payloads are decompressed transparently
    pub url: String,
    /// Optional URL of a SHA-256 checksum file for the payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum_url: Option<String>,
}

impl Source {
    /// Source without a checksum
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            checksum_url: None,
        }
    }
}

/// Download sources per database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Sources {
    /// Country database source
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<Source>,
    /// ASN database source
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asn: Option<Source>,
    /// City database source
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<Source>,
    /// WHOIS database source
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whois: Option<Source>,
}

impl Sources {
    /// Source for a database, if configured
    pub fn get(&self, kind: DatabaseKind) -> Option<&Source> {
        match kind {
            DatabaseKind::Country => self.country.as_ref(),
            DatabaseKind::Asn => self.asn.as_ref(),
            DatabaseKind::City => self.city.as_ref(),
            DatabaseKind::Whois => self.whois.as_ref(),
        }
    }

    /// Set the source for a database
    pub fn set(&mut self, kind: DatabaseKind, source: Source) {
        let slot = match kind {
            DatabaseKind::Country => &mut self.country,
            DatabaseKind::Asn => &mut self.asn,
            DatabaseKind::City => &mut self.city,
            DatabaseKind::Whois => &mut self.whois,
        };
        *slot = Some(source);
    }
}

/// Schema overrides per database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Schemas {
    /// Country schema override
    pub country: SchemaOverride,
    /// ASN schema override
    pub asn: SchemaOverride,
    /// City schema override
    pub city: SchemaOverride,
    /// WHOIS schema override
    pub whois: SchemaOverride,
}

impl Schemas {
    /// Override for a database
    pub fn get(&self, kind: DatabaseKind) -> &SchemaOverride {
        match kind {
            DatabaseKind::Country => &self.country,
            DatabaseKind::Asn => &self.asn,
            DatabaseKind::City => &self.city,
            DatabaseKind::Whois => &self.whois,
        }
    }
}

/// Errors loading a configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        /// Config path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
    /// File is not valid JSON for [`Config`]
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        /// Config path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },
}

/// Manager configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Master switch; `false` disables every database
    pub enabled: bool,
    /// Storage directory for database files
    pub directory: PathBuf,
    /// Background refresh cadence
    pub update_cadence: UpdateCadence,
    /// Country codes blocked by [`GeoManager::is_blocked_by_config`](crate::GeoManager::is_blocked_by_config)
    pub deny_countries: Vec<String>,
    /// Country codes allowed by [`GeoManager::is_allowed_by_config`](crate::GeoManager::is_allowed_by_config)
    pub allowed_countries: Vec<String>,
    /// Load the country database
    pub country_enabled: bool,
    /// Load the ASN database
    pub asn_enabled: bool,
    /// Load the city database
    pub city_enabled: bool,
    /// Load the WHOIS database
    pub whois_enabled: bool,
    /// Download sources
    pub sources: Sources,
    /// Fetch timeout in seconds
    pub fetch_timeout_secs: u64,
    /// Cap on downloaded and decompressed bytes
    pub max_download_bytes: u64,
    /// Lookup cache entries, 0 disables the cache
    pub cache_capacity: usize,
    /// Schema overrides
    pub schemas: Schemas,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: PathBuf::from("geodb"),
            update_cadence: UpdateCadence::Never,
            deny_countries: Vec::new(),
            allowed_countries: Vec::new(),
            country_enabled: true,
            asn_enabled: true,
            city_enabled: false,
            whois_enabled: false,
            sources: Sources::default(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            max_download_bytes: DEFAULT_MAX_DOWNLOAD_BYTES,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            schemas: Schemas::default(),
        }
    }
}

impl Config {
    /// Default configuration storing databases under `directory`
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Self::default()
        }
    }

    /// Load a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Whether a database should be loaded
    pub fn is_enabled(&self, kind: DatabaseKind) -> bool {
        self.enabled
            && match kind {
                DatabaseKind::Country => self.country_enabled,
                DatabaseKind::Asn => self.asn_enabled,
                DatabaseKind::City => self.city_enabled,
                DatabaseKind::Whois => self.whois_enabled,
            }
    }

    /// Enabled databases in load order
    pub fn enabled_kinds(&self) -> Vec<DatabaseKind> {
        DatabaseKind::ALL
            .into_iter()
            .filter(|kind| self.is_enabled(*kind))
            .collect()
    }

    /// Canonical file path of a database
    pub fn database_path(&self, kind: DatabaseKind) -> PathBuf {
        self.directory.join(kind.file_name())
    }

    /// Effective schema for a database
    pub fn schema_for(&self, kind: DatabaseKind) -> RecordSchema {
        RecordSchema::for_kind(kind).merged(self.schemas.get(kind))
    }

    /// Fetch timeout as a duration
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}
