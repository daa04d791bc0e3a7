//! Database manager
//!
//! [`GeoManager`] owns up to four decoded databases (country, ASN, city,
//! WHOIS), loads and refreshes them, and answers lookups that merge every
//! loaded database into one [`GeoResult`].
//!
//! # Concurrency
//!
//! The loaded handles live in an immutable `DatabaseSet` behind an
//! [`ArcSwap`]. A lookup takes one atomic snapshot of the set and decodes
//! against it without any lock. Loads and updates are serialized by a writer
//! mutex; they fetch and decode a replacement first and only then publish a
//! new set, so readers never wait on I/O and never see a half-updated
//! manager. A superseded handle is dropped when the last lookup holding it
//! finishes.
//!
//! # Failure model
//!
//! Each database fails independently. A database that cannot be fetched or
//! decoded keeps its previous handle (if any) and records the error in its
//! [`SlotState`]; the others keep serving.

use crate::config::{Config, DatabaseKind};
use crate::error::GeoError;
use crate::extract::{self, AsnRecord, CityRecord, CountryRecord, RecordExtractor, WhoisRecord};
use crate::fetch::{self, FetchError, Fetcher};
use crate::mmdb::{Metadata, Reader};
use crate::schema::RecordSchema;
use crate::storage;
use arc_swap::ArcSwap;
use lru::LruCache;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Lifecycle state of one database slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "error", rename_all = "lowercase")]
pub enum SlotState {
    /// Never loaded, disabled, or closed
    Unloaded,
    /// A load or update is in progress
    Loading,
    /// A decoder is installed
    Loaded,
    /// The last attempt failed and no decoder is installed
    Failed(String),
}

/// Merged answer for one IP
///
/// Fields other than `ip` and `found` are absent when their database is
/// disabled, not loaded, or does not cover the address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GeoResult {
    /// The queried address (as given when it could not be parsed)
    pub ip: String,
    /// ISO 3166-1 alpha-2 country code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    /// English country name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_name: Option<String>,
    /// Continent code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continent: Option<String>,
    /// City name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// Region / first subdivision
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Postal code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    /// Latitude in degrees
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    /// Longitude in degrees
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// IANA time zone
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// Autonomous system number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asn: Option<u32>,
    /// Autonomous system organization
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asn_org: Option<String>,
    /// Registrant organization
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registrant_org: Option<String>,
    /// Registrant network
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registrant_net: Option<String>,
    /// True iff the country lookup succeeded
    pub found: bool,
}

impl GeoResult {
    /// Empty result for `ip`
    pub fn not_found(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            ..Self::default()
        }
    }

    fn apply_country(&mut self, record: CountryRecord) {
        self.country_code = Some(record.code);
        self.country_name = record.name;
        self.continent = record.continent;
        self.found = true;
    }

    fn apply_asn(&mut self, record: AsnRecord) {
        self.asn = Some(record.number);
        self.asn_org = record.organization;
    }

    fn apply_city(&mut self, record: CityRecord) {
        self.city = record.city;
        self.region = record.region;
        self.postal_code = record.postal_code;
        self.latitude = record.latitude;
        self.longitude = record.longitude;
        self.timezone = record.timezone;
    }

    fn apply_whois(&mut self, record: WhoisRecord) {
        self.registrant_org = record.organization;
        self.registrant_net = record.network;
    }
}

/// One installed decoder
#[derive(Debug)]
struct DatabaseHandle {
    reader: Reader,
    path: PathBuf,
}

/// Immutable snapshot of the installed decoders, one slot per kind
#[derive(Debug, Default, Clone)]
struct DatabaseSet {
    slots: [Option<Arc<DatabaseHandle>>; 4],
}

impl DatabaseSet {
    fn get(&self, kind: DatabaseKind) -> Option<&Arc<DatabaseHandle>> {
        self.slots[kind.index()].as_ref()
    }

    fn with(&self, kind: DatabaseKind, handle: Option<Arc<DatabaseHandle>>) -> Self {
        let mut next = self.clone();
        next.slots[kind.index()] = handle;
        next
    }

    fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}

type LookupCache = LruCache<IpAddr, (u64, GeoResult)>;

/// Loads, refreshes and queries a set of geolocation databases
///
/// `GeoManager` is `Send + Sync`; share it behind an `Arc` and call
/// [`lookup`](Self::lookup) from any number of threads.
pub struct GeoManager {
    config: Config,
    schemas: Vec<RecordSchema>,
    fetcher: Arc<dyn Fetcher>,

    /// Current decoder set, swapped wholesale
    databases: ArcSwap<DatabaseSet>,
    /// Per-kind lifecycle state
    states: Mutex<[SlotState; 4]>,
    /// Serializes load/update/close
    writer: Mutex<()>,

    loaded: AtomicBool,
    last_update: Mutex<Option<SystemTime>>,

    /// Incremented on every swap; cached results carry the generation they came from
    generation: AtomicU64,
    cache: Option<Mutex<LookupCache>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl GeoManager {
    /// Create a manager; nothing is loaded until [`load_databases`](Self::load_databases)
    pub fn new(config: Config, fetcher: Arc<dyn Fetcher>) -> Self {
        let schemas = DatabaseKind::ALL
            .iter()
            .map(|kind| config.schema_for(*kind))
            .collect();
        let cache = NonZeroUsize::new(config.cache_capacity)
            .map(|capacity| Mutex::new(LruCache::new(capacity)));

        Self {
            config,
            schemas,
            fetcher,
            databases: ArcSwap::from_pointee(DatabaseSet::default()),
            states: Mutex::new(std::array::from_fn(|_| SlotState::Unloaded)),
            writer: Mutex::new(()),
            loaded: AtomicBool::new(false),
            last_update: Mutex::new(None),
            generation: AtomicU64::new(0),
            cache,
        }
    }

    /// The configuration this manager was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Load every enabled database
    ///
    /// A database whose file already exists is opened from disk; otherwise it
    /// is downloaded, validated and atomically written first. Failures of
    /// individual databases are logged and recorded in [`status`](Self::status).
    /// An error is returned only when the country database could not be
    /// loaded, or the storage directory is unusable; it then carries every
    /// database that failed.
    pub fn load_databases(&self) -> Result<(), GeoError> {
        let _writer = lock(&self.writer);

        let kinds = self.config.enabled_kinds();
        if kinds.is_empty() {
            info!("geolocation disabled, no databases to load");
            return Ok(());
        }
        self.prepare_storage(&kinds)?;

        let mut errors = Vec::new();
        let mut country_failed = false;
        for kind in kinds {
            self.set_state(kind, SlotState::Loading);
            match self.load_one(kind, false) {
                Ok(handle) => {
                    self.install(kind, handle);
                    self.set_state(kind, SlotState::Loaded);
                }
                Err(e) => {
                    warn!(database = %kind, error = %e, "failed to load database");
                    self.set_state(kind, SlotState::Failed(e.to_string()));
                    country_failed |= kind == DatabaseKind::Country;
                    errors.push(e);
                }
            }
        }

        self.refresh_loaded();
        if country_failed {
            Err(GeoError::aggregate(errors))
        } else {
            Ok(())
        }
    }

    /// Re-download and hot-swap every enabled database
    ///
    /// Each database is replaced only when its new file decodes; otherwise
    /// the previous decoder stays installed. `last_update` is set whatever
    /// the outcome. Returns the combined error of every database that failed.
    pub fn update_databases(&self) -> Result<(), GeoError> {
        let _writer = lock(&self.writer);

        let kinds = self.config.enabled_kinds();
        let result = self.update_locked(&kinds);
        *lock(&self.last_update) = Some(SystemTime::now());
        self.refresh_loaded();
        result
    }

    fn update_locked(&self, kinds: &[DatabaseKind]) -> Result<(), GeoError> {
        if kinds.is_empty() {
            return Ok(());
        }
        self.prepare_storage(kinds)?;

        let mut errors = Vec::new();
        for &kind in kinds {
            self.set_state(kind, SlotState::Loading);
            match self.load_one(kind, true) {
                Ok(handle) => {
                    self.install(kind, handle);
                    self.set_state(kind, SlotState::Loaded);
                }
                Err(e) => {
                    let kept = self.databases.load().get(kind).is_some();
                    warn!(database = %kind, error = %e, kept_previous = kept, "failed to update database");
                    self.set_state(
                        kind,
                        if kept {
                            SlotState::Loaded
                        } else {
                            SlotState::Failed(e.to_string())
                        },
                    );
                    errors.push(e);
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(GeoError::aggregate(errors))
        }
    }

    /// Release every decoder and mark the manager unloaded
    ///
    /// Lookups already in flight finish against the handles they hold.
    pub fn close(&self) {
        let _writer = lock(&self.writer);
        self.databases.store(Arc::new(DatabaseSet::default()));
        self.bump_generation();
        *lock(&self.states) = std::array::from_fn(|_| SlotState::Unloaded);
        self.loaded.store(false, Ordering::Release);
        info!("closed all databases");
    }

    /// Whether the country database is installed
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// Time of the last [`update_databases`](Self::update_databases) call
    pub fn last_update(&self) -> Option<SystemTime> {
        *lock(&self.last_update)
    }

    /// Lifecycle state of one database
    pub fn status(&self, kind: DatabaseKind) -> SlotState {
        lock(&self.states)[kind.index()].clone()
    }

    /// Metadata of an installed database
    pub fn metadata(&self, kind: DatabaseKind) -> Option<Metadata> {
        self.databases
            .load()
            .get(kind)
            .map(|handle| handle.reader.metadata().clone())
    }

    /// Swap counter, incremented whenever the installed set changes
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Look up an address given as text
    ///
    /// Unparseable input yields `found: false`, never an error.
    pub fn lookup(&self, ip: &str) -> GeoResult {
        match ip.trim().parse::<IpAddr>() {
            Ok(addr) => self.lookup_ip(addr),
            Err(_) => {
                debug!(input = ip, "not an IP address");
                GeoResult::not_found(ip)
            }
        }
    }

    /// Look up an address in every loaded database and merge the fields
    pub fn lookup_ip(&self, ip: IpAddr) -> GeoResult {
        let generation = self.generation();
        if let Some(cache) = &self.cache {
            if let Some((cached_generation, result)) = lock(cache).get(&ip) {
                if *cached_generation == generation {
                    return result.clone();
                }
            }
        }

        let set = self.databases.load();
        let mut result = GeoResult::not_found(ip.to_string());
        if set.is_empty() {
            return result;
        }

        if let Some(record) = self.query::<CountryRecord>(&set, ip) {
            result.apply_country(record);
        }
        if let Some(record) = self.query::<AsnRecord>(&set, ip) {
            result.apply_asn(record);
        }
        if let Some(record) = self.query::<CityRecord>(&set, ip) {
            result.apply_city(record);
        }
        if let Some(record) = self.query::<WhoisRecord>(&set, ip) {
            result.apply_whois(record);
        }

        if let Some(cache) = &self.cache {
            lock(cache).put(ip, (generation, result.clone()));
        }
        result
    }

    /// Look up many addresses in parallel
    pub fn lookup_batch<S>(&self, ips: &[S]) -> Vec<GeoResult>
    where
        S: AsRef<str> + Sync,
    {
        ips.par_iter().map(|ip| self.lookup(ip.as_ref())).collect()
    }

    /// True iff the resolved country matches an entry of `denied` (case-insensitive)
    ///
    /// Unresolved addresses are never blocked.
    pub fn is_blocked<S: AsRef<str>>(&self, ip: &str, denied: &[S]) -> bool {
        match self.lookup(ip).country_code {
            Some(code) => contains_code(denied, &code),
            None => false,
        }
    }

    /// True when `allowed` is empty, the country is unresolved, or it matches an entry
    pub fn is_allowed<S: AsRef<str>>(&self, ip: &str, allowed: &[S]) -> bool {
        if allowed.is_empty() {
            return true;
        }
        match self.lookup(ip).country_code {
            Some(code) => contains_code(allowed, &code),
            None => true,
        }
    }

    /// [`is_blocked`](Self::is_blocked) against the configured deny list
    pub fn is_blocked_by_config(&self, ip: &str) -> bool {
        self.is_blocked(ip, &self.config.deny_countries)
    }

    /// [`is_allowed`](Self::is_allowed) against the configured allow list
    pub fn is_allowed_by_config(&self, ip: &str) -> bool {
        self.is_allowed(ip, &self.config.allowed_countries)
    }

    fn query<T: RecordExtractor>(&self, set: &DatabaseSet, ip: IpAddr) -> Option<T> {
        let kind = T::KIND;
        let handle = set.get(kind)?;
        match extract::extract::<T>(&handle.reader, ip, &self.schemas[kind.index()]) {
            Ok(record) => record,
            Err(e) => {
                debug!(database = %kind, %ip, error = %e, "lookup failed");
                None
            }
        }
    }

    fn prepare_storage(&self, kinds: &[DatabaseKind]) -> Result<(), GeoError> {
        if let Err(e) = storage::ensure_directory(&self.config.directory) {
            warn!(directory = %self.config.directory.display(), error = %e, "storage unavailable");
            for &kind in kinds {
                if self.databases.load().get(kind).is_none() {
                    self.set_state(kind, SlotState::Failed(e.to_string()));
                }
            }
            return Err(e);
        }
        Ok(())
    }

    /// Produce a validated handle for `kind` without touching the installed set
    fn load_one(&self, kind: DatabaseKind, force_fetch: bool) -> Result<DatabaseHandle, GeoError> {
        let path = self.config.database_path(kind);
        let schema = &self.schemas[kind.index()];
        let decode_error = |source| GeoError::Decode { kind, source };

        if !force_fetch && path.is_file() {
            let reader = Reader::open(&path).map_err(decode_error)?;
            schema.check(reader.metadata()).map_err(decode_error)?;
            return Ok(DatabaseHandle { reader, path });
        }

        let bytes = self.download(kind)?;
        let reader = Reader::from_bytes(bytes).map_err(decode_error)?;
        schema.check(reader.metadata()).map_err(decode_error)?;
        storage::write_atomic(&path, reader.as_bytes())?;
        Ok(DatabaseHandle { reader, path })
    }

    fn download(&self, kind: DatabaseKind) -> Result<Vec<u8>, GeoError> {
        let source = self
            .config
            .sources
            .get(kind)
            .ok_or(GeoError::NotConfigured(kind))?;
        let timeout = self.config.fetch_timeout();
        let limit = self.config.max_download_bytes;
        let fetch_error = |source| GeoError::FetchFailed { kind, source };

        let payload = self
            .fetcher
            .fetch(&source.url, timeout)
            .map_err(fetch_error)?;

        if let Some(checksum_url) = &source.checksum_url {
            let checksum = self
                .fetcher
                .fetch(checksum_url, timeout)
                .map_err(fetch_error)?;
            fetch::verify_checksum(&payload, &String::from_utf8_lossy(&checksum))
                .map_err(fetch_error)?;
        }

        let bytes = fetch::decode_payload(payload, limit).map_err(fetch_error)?;
        debug!(database = %kind, url = %source.url, bytes = bytes.len(), "downloaded database");
        Ok(bytes)
    }

    fn install(&self, kind: DatabaseKind, handle: DatabaseHandle) {
        let metadata = handle.reader.metadata();
        info!(
            database = %kind,
            path = %handle.path.display(),
            database_type = %metadata.database_type,
            node_count = metadata.node_count,
            "installed database"
        );

        let next = self.databases.load().with(kind, Some(Arc::new(handle)));
        self.databases.store(Arc::new(next));
        self.bump_generation();
        self.refresh_loaded();
    }

    fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        if let Some(cache) = &self.cache {
            lock(cache).clear();
        }
    }

    fn set_state(&self, kind: DatabaseKind, state: SlotState) {
        lock(&self.states)[kind.index()] = state;
    }

    fn refresh_loaded(&self) {
        let country = self.databases.load().get(DatabaseKind::Country).is_some();
        self.loaded.store(country, Ordering::Release);
    }
}

fn contains_code<S: AsRef<str>>(list: &[S], code: &str) -> bool {
    list.iter()
        .any(|entry| entry.as_ref().trim().eq_ignore_ascii_case(code))
}

impl std::fmt::Debug for GeoManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoManager")
            .field("directory", &self.config.directory)
            .field("loaded", &self.is_loaded())
            .field("generation", &self.generation())
            .finish()
    }
}

/// A fetcher that always fails, for managers that only read files already on disk
pub fn offline_fetcher() -> Arc<dyn Fetcher> {
    Arc::new(|url: &str, _timeout: std::time::Duration| -> Result<Vec<u8>, FetchError> {
        Err(FetchError::Transport(format!("offline: refusing to fetch {}", url)))
    })
}
