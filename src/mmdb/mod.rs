//! MaxMind DB (MMDB) Reader
//!
//! This module provides functionality for reading MaxMind DB style files,
//! which are used for GeoIP lookups and other IP-based data lookups.
//!
//! ## Architecture
//!
//! - **types**: MMDB-specific types and constants
//! - **format**: Metadata marker search and header parsing
//! - **tree**: Search tree traversal for IP lookups
//! - **reader**: Owns the bytes (mapped or in memory) and ties the pieces together
//!
//! Data decoding is done by `crate::data_section::DataDecoder`.

pub mod format;
pub mod reader;
pub mod tree;
pub mod types;

pub use format::{find_metadata_marker, Metadata};
pub use reader::{LookupResult, Reader};
pub use types::{IpVersion, RecordSize, METADATA_MARKER};
