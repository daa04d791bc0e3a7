//! MMDB Binary Format Parsing
//!
//! Locates the metadata map at the end of the file and extracts the fields
//! needed to walk the tree and find the data section.
//!
//! Layout:
//! ```text
//! [search tree: node_count * node_bytes][16 zero bytes][data section][marker][metadata map]
//! ```

use super::types::{
    IpVersion, RecordSize, DATA_SECTION_SEPARATOR, METADATA_MARKER, SUPPORTED_MAJOR_VERSION,
};
use crate::data_section::{DataDecoder, DataValue};
use crate::error::{DecodeError, Result};
use std::collections::BTreeMap;
use std::collections::HashMap;

/// The marker must appear within this many bytes of the end of the file
const METADATA_SEARCH_WINDOW: usize = 128 * 1024;

/// Parsed database metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    /// Number of nodes in the search tree
    pub node_count: u32,
    /// Record size in bits (16, 24, 28, or 32)
    pub record_size: RecordSize,
    /// IP version (4 or 6)
    pub ip_version: IpVersion,
    /// Vendor/database type, e.g. "GeoLite2-Country"
    pub database_type: String,
    /// Binary format major version
    pub binary_format_major_version: u64,
    /// Binary format minor version
    pub binary_format_minor_version: u64,
    /// Build time in seconds since the Unix epoch (0 when absent)
    pub build_epoch: u64,
    /// Locales the database has names for
    pub languages: Vec<String>,
    /// Descriptions keyed by language code
    pub description: BTreeMap<String, String>,
}

/// Region boundaries derived from the metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// Size of the search tree in bytes
    pub tree_size: usize,
    /// First byte of the data section
    pub data_start: usize,
    /// One past the last byte of the data section (start of the marker)
    pub data_end: usize,
}

impl Metadata {
    /// Parse the metadata of a database blob and compute its layout
    ///
    /// Fails with `MalformedHeader` if the marker or a required field is
    /// missing, `UnsupportedVersion` for a foreign major version, and
    /// `TruncatedBuffer` if the declared tree does not fit before the marker.
    pub fn parse(data: &[u8]) -> Result<(Self, Layout)> {
        let marker_offset = find_metadata_marker(data)?;
        let metadata_bytes = &data[marker_offset + METADATA_MARKER.len()..];

        let value = DataDecoder::new(metadata_bytes)
            .decode(0)
            .map_err(|e| DecodeError::MalformedHeader(format!("failed to decode metadata: {}", e)))?;

        let map = match value {
            DataValue::Map(map) => map,
            other => {
                return Err(DecodeError::MalformedHeader(format!(
                    "metadata is a {}, expected map",
                    other.type_name()
                )))
            }
        };

        let major = extract_uint(&map, "binary_format_major_version")?;
        let minor = extract_uint(&map, "binary_format_minor_version").unwrap_or(0);
        if major != SUPPORTED_MAJOR_VERSION {
            return Err(DecodeError::UnsupportedVersion { major, minor });
        }

        let node_count = extract_uint(&map, "node_count")?;
        let node_count = u32::try_from(node_count).map_err(|_| {
            DecodeError::MalformedHeader(format!("node_count {} out of range", node_count))
        })?;
        let record_size = RecordSize::from_bits(extract_uint(&map, "record_size")?)?;
        let ip_version = match extract_uint(&map, "ip_version")? {
            4 => IpVersion::V4,
            6 => IpVersion::V6,
            other => {
                return Err(DecodeError::MalformedHeader(format!(
                    "invalid IP version: {}",
                    other
                )))
            }
        };
        let database_type = match map.get("database_type") {
            Some(DataValue::String(s)) => s.clone(),
            Some(_) => {
                return Err(DecodeError::MalformedHeader(
                    "field 'database_type' is not a string".to_string(),
                ))
            }
            None => {
                return Err(DecodeError::MalformedHeader(
                    "required field 'database_type' not found".to_string(),
                ))
            }
        };

        let languages = match map.get("languages") {
            Some(DataValue::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };
        let description = match map.get("description") {
            Some(DataValue::Map(m)) => m
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect(),
            _ => BTreeMap::new(),
        };
        let build_epoch = map.get("build_epoch").and_then(DataValue::as_u64).unwrap_or(0);

        let tree_size = (node_count as usize)
            .checked_mul(record_size.node_bytes())
            .ok_or_else(|| DecodeError::MalformedHeader("tree size overflows".to_string()))?;
        let data_start = tree_size + DATA_SECTION_SEPARATOR;
        if data_start > marker_offset {
            return Err(DecodeError::TruncatedBuffer {
                needed: data_start,
                available: marker_offset,
            });
        }

        let metadata = Metadata {
            node_count,
            record_size,
            ip_version,
            database_type,
            binary_format_major_version: major,
            binary_format_minor_version: minor,
            build_epoch,
            languages,
            description,
        };
        let layout = Layout {
            tree_size,
            data_start,
            data_end: marker_offset,
        };
        Ok((metadata, layout))
    }
}

/// Find the metadata marker (zero allocation)
///
/// The marker appears somewhere in the last 128KB of the file and the
/// metadata comes AFTER it. If the marker occurs more than once, the LAST
/// occurrence wins.
pub fn find_metadata_marker(data: &[u8]) -> Result<usize> {
    let search_start = data.len().saturating_sub(METADATA_SEARCH_WINDOW);
    memchr::memmem::rfind(&data[search_start..], METADATA_MARKER)
        .map(|pos| search_start + pos)
        .ok_or_else(|| DecodeError::MalformedHeader("metadata marker not found".to_string()))
}

fn extract_uint(map: &HashMap<String, DataValue>, key: &str) -> Result<u64> {
    match map.get(key) {
        Some(value) => value.as_u64().ok_or_else(|| {
            DecodeError::MalformedHeader(format!("field '{}' is not an unsigned integer", key))
        }),
        None => Err(DecodeError::MalformedHeader(format!(
            "required field '{}' not found",
            key
        ))),
    }
}
