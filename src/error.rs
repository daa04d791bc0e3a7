//! Error types for the geolens library
//!
//! Two layers of errors exist:
//!
//! - [`DecodeError`]: raised by the binary decoder. Every variant means the
//!   database file cannot be trusted.
//! - [`GeoError`]: raised by the database manager. Wraps decode errors with the
//!   database they came from and adds environment failures (storage, fetch).
//!
//! A lookup miss is never an error. It surfaces as `Ok(None)` from the decoder
//! and as `found: false` from the manager.

use crate::config::DatabaseKind;
use crate::fetch::FetchError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for decoder operations
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Errors produced while decoding a database blob
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Metadata marker absent or metadata map unusable
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// Binary format major version is not supported
    #[error("unsupported binary format version {major}.{minor}")]
    UnsupportedVersion {
        /// `binary_format_major_version` from the metadata
        major: u64,
        /// `binary_format_minor_version` from the metadata
        minor: u64,
    },

    /// A declared region or value extends beyond the buffer
    #[error("truncated buffer: need {needed} bytes, have {available}")]
    TruncatedBuffer {
        /// Bytes required to satisfy the read
        needed: usize,
        /// Bytes actually available
        available: usize,
    },

    /// Search tree walk did not terminate or hit an invalid record
    #[error("corrupt search tree: {0}")]
    CorruptTree(String),

    /// Pointer chain exceeded the maximum chase depth
    #[error("pointer chain exceeds {depth} hops")]
    PointerCycle {
        /// Maximum number of hops allowed
        depth: usize,
    },

    /// String payload is not valid UTF-8
    #[error("invalid UTF-8 string at data offset {offset}")]
    InvalidString {
        /// Offset of the offending value
        offset: usize,
    },

    /// Structurally invalid value (unknown type, bad width, non-string map key)
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Decoded record does not have the shape the extractor expects
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Failed to open or map the database file
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors produced by the database manager
#[derive(Error, Debug)]
pub enum GeoError {
    /// A database file failed to decode
    #[error("{kind} database: {source}")]
    Decode {
        /// Which database failed
        kind: DatabaseKind,
        /// Underlying decoder error
        #[source]
        source: DecodeError,
    },

    /// The storage directory cannot be created or written
    #[error("storage unavailable at {}: {source}", path.display())]
    StorageUnavailable {
        /// Directory or file path involved
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Downloading a database failed
    #[error("{kind} database: fetch failed: {source}")]
    FetchFailed {
        /// Which database failed
        kind: DatabaseKind,
        /// Underlying fetch error
        #[source]
        source: FetchError,
    },

    /// Database is enabled but has no download source and no file on disk
    #[error("{0} database: no file on disk and no source configured")]
    NotConfigured(DatabaseKind),

    /// Several databases failed; messages are joined with "; "
    #[error("{}", join_messages(.0))]
    Aggregate(Vec<GeoError>),
}

impl GeoError {
    /// Database kind this error belongs to, if any
    pub fn kind(&self) -> Option<DatabaseKind> {
        match self {
            GeoError::Decode { kind, .. } | GeoError::FetchFailed { kind, .. } => Some(*kind),
            GeoError::NotConfigured(kind) => Some(*kind),
            GeoError::StorageUnavailable { .. } | GeoError::Aggregate(_) => None,
        }
    }

    /// Collapse a list of per-database errors into one error
    pub(crate) fn aggregate(mut errors: Vec<GeoError>) -> GeoError {
        if errors.len() == 1 {
            errors.remove(0)
        } else {
            GeoError::Aggregate(errors)
        }
    }
}

fn join_messages(errors: &[GeoError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
