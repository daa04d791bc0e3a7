//! Database reader
//!
//! A [`Reader`] owns one database blob, either memory-mapped from disk or held
//! in memory, and answers two questions about it:
//!
//! - [`Reader::lookup_pointer`]: which data offset (if any) covers an IP?
//! - [`Reader::read_value`]: what value is stored at a data offset?
//!
//! The blob is immutable after [`Reader::open`] / [`Reader::from_bytes`]
//! returns, so a `Reader` is `Send + Sync` and lookups need no locking.

use super::format::{Layout, Metadata};
use super::tree::{Ipv4Start, SearchTree};
use crate::data_section::{DataDecoder, DataValue};
use crate::error::Result;
use memmap2::Mmap;
use std::fmt;
use std::fs::File;
use std::net::IpAddr;
use std::path::Path;

/// Storage for database data - either owned or memory-mapped
enum DatabaseStorage {
    Owned(Vec<u8>),
    Mmap(Mmap),
}

impl DatabaseStorage {
    fn as_slice(&self) -> &[u8] {
        match self {
            DatabaseStorage::Owned(v) => v.as_slice(),
            DatabaseStorage::Mmap(m) => &m[..],
        }
    }
}

/// Result of a tree lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupResult {
    /// Offset into the data section
    pub data_offset: usize,
    /// Network prefix length (netmask); IPv4 queries report IPv4 prefixes
    pub prefix_len: u8,
}

/// A decoded, queryable database
pub struct Reader {
    data: DatabaseStorage,
    metadata: Metadata,
    layout: Layout,
    ipv4_start: Ipv4Start,
}

impl fmt::Debug for Reader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reader")
            .field("database_type", &self.metadata.database_type)
            .field("node_count", &self.metadata.node_count)
            .field("size", &self.data.as_slice().len())
            .finish()
    }
}

impl Reader {
    /// Open a database file using memory mapping
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;

        // SAFETY: database files are replaced by atomic rename, never written
        // in place, so the mapped inode does not change underneath us.
        let mmap = unsafe { Mmap::map(&file) }?;

        Self::from_storage(DatabaseStorage::Mmap(mmap))
    }

    /// Create a reader from raw bytes
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_storage(DatabaseStorage::Owned(data))
    }

    fn from_storage(storage: DatabaseStorage) -> Result<Self> {
        let data = storage.as_slice();
        let (metadata, layout) = Metadata::parse(data)?;

        let ipv4_start = SearchTree::new(
            &data[..layout.tree_size],
            metadata.node_count,
            metadata.record_size,
            metadata.ip_version,
            layout.data_end - layout.data_start,
        )
        .ipv4_start()?;

        Ok(Self {
            data: storage,
            metadata,
            layout,
            ipv4_start,
        })
    }

    /// Parsed metadata
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// The raw database bytes
    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_slice()
    }

    fn tree(&self) -> SearchTree<'_> {
        SearchTree::new(
            &self.data.as_slice()[..self.layout.tree_size],
            self.metadata.node_count,
            self.metadata.record_size,
            self.metadata.ip_version,
            self.layout.data_end - self.layout.data_start,
        )
    }

    fn data_section(&self) -> &[u8] {
        &self.data.as_slice()[self.layout.data_start..self.layout.data_end]
    }

    /// Walk the search tree for `ip`
    ///
    /// Returns `Ok(None)` when the address is not covered by this database.
    pub fn lookup_pointer(&self, ip: IpAddr) -> Result<Option<LookupResult>> {
        let hit = self.tree().lookup(ip, self.ipv4_start)?;
        Ok(hit.map(|hit| LookupResult {
            data_offset: hit.data_offset,
            prefix_len: hit.prefix_len,
        }))
    }

    /// Decode the value at a data section offset
    pub fn read_value(&self, offset: usize) -> Result<DataValue> {
        DataDecoder::new(self.data_section()).decode(offset)
    }

    /// Look up `ip` and decode its record
    pub fn lookup(&self, ip: IpAddr) -> Result<Option<(DataValue, u8)>> {
        match self.lookup_pointer(ip)? {
            Some(hit) => Ok(Some((self.read_value(hit.data_offset)?, hit.prefix_len))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;
    use crate::fixtures::{MmdbWriter, Value};
    use std::io::Write;

    fn country(code: &str) -> Value {
        Value::map(vec![("country_iso_code", Value::str(code))])
    }

    fn two_halves(ip_version: u16, record_size: u16) -> Vec<u8> {
        let mut writer = MmdbWriter::new(ip_version, record_size);
        writer.insert("0.0.0.0/1", &country("A1"));
        writer.insert("128.0.0.0/1", &country("A2"));
        writer.build()
    }

    fn code_of(reader: &Reader, ip: &str) -> Option<String> {
        reader
            .lookup(ip.parse().unwrap())
            .unwrap()
            .and_then(|(v, _)| v.get("country_iso_code").and_then(|c| c.as_str()).map(String::from))
    }

    #[test]
    fn test_two_halves_all_record_sizes() {
        for record_size in [16, 24, 28, 32] {
            let reader = Reader::from_bytes(two_halves(4, record_size)).unwrap();
            assert_eq!(code_of(&reader, "10.0.0.1").as_deref(), Some("A1"));
            assert_eq!(code_of(&reader, "200.0.0.1").as_deref(), Some("A2"));
            let hit = reader.lookup_pointer("10.0.0.1".parse().unwrap()).unwrap().unwrap();
            assert_eq!(hit.prefix_len, 1);
        }
    }

    #[test]
    fn test_ipv4_in_ipv6_tree() {
        let mut writer = MmdbWriter::new(6, 28);
        writer.insert("1.1.1.0/24", &country("AU"));
        writer.insert("2001:db8::/32", &country("ZZ"));
        let reader = Reader::from_bytes(writer.build()).unwrap();

        let hit = reader.lookup_pointer("1.1.1.1".parse().unwrap()).unwrap().unwrap();
        assert_eq!(hit.prefix_len, 24);
        assert_eq!(code_of(&reader, "1.1.1.1").as_deref(), Some("AU"));
        assert_eq!(code_of(&reader, "::1.1.1.1").as_deref(), Some("AU"));
        assert_eq!(code_of(&reader, "2001:db8::1").as_deref(), Some("ZZ"));
        assert_eq!(code_of(&reader, "1.1.2.1"), None);
        assert_eq!(code_of(&reader, "2001:db9::1"), None);
    }

    #[test]
    fn test_miss_is_none_not_error() {
        let mut writer = MmdbWriter::new(4, 24);
        writer.insert("10.0.0.0/8", &country("A1"));
        let reader = Reader::from_bytes(writer.build()).unwrap();
        assert_eq!(reader.lookup_pointer("11.0.0.1".parse().unwrap()).unwrap(), None);
        assert_eq!(reader.lookup_pointer("2001:db8::1".parse().unwrap()).unwrap(), None);
    }

    #[test]
    fn test_read_value_idempotent() {
        let reader = Reader::from_bytes(two_halves(6, 24)).unwrap();
        let hit = reader.lookup_pointer("200.1.2.3".parse().unwrap()).unwrap().unwrap();
        assert_eq!(
            reader.read_value(hit.data_offset).unwrap(),
            reader.read_value(hit.data_offset).unwrap()
        );
    }

    #[test]
    fn test_open_mmap_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("country.mmdb");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(&two_halves(4, 24))
            .unwrap();

        let reader = Reader::open(&path).unwrap();
        assert_eq!(code_of(&reader, "1.2.3.4").as_deref(), Some("A1"));
        assert_eq!(reader.metadata().database_type, "Test-Country");
    }

    #[test]
    fn test_open_missing_file() {
        assert!(matches!(
            Reader::open("/nonexistent/geolens/country.mmdb"),
            Err(DecodeError::Io(_))
        ));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(Reader::from_bytes(vec![]).is_err());
        assert!(Reader::from_bytes(vec![0xAB; 4096]).is_err());
    }
}
