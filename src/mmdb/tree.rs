//! MMDB Search Tree Traversal
//!
//! Implements binary search tree traversal for IP address lookups.
//! The tree uses a compact binary representation where each node contains
//! two records (left and right) that point to either:
//! - Another node (continue traversal)
//! - A data section offset (found)
//! - A "not found" marker (record == node_count)
//!
//! A walk visits at most `node_count` nodes and consumes at most one address
//! bit per step. Running out of bits while still inside the tree, or visiting
//! more nodes than exist, means the tree is corrupt.

use super::types::{IpVersion, RecordSize, DATA_SECTION_SEPARATOR};
use crate::error::{DecodeError, Result};
use std::net::{IpAddr, Ipv4Addr};

/// A resolved tree walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeHit {
    /// Offset into the data section
    pub data_offset: usize,
    /// Network prefix length of the matched record
    pub prefix_len: u8,
}

/// Where IPv4 lookups begin
///
/// IPv4 trees start at the root. IPv6 trees store IPv4 addresses under
/// `::/96`, so the walk first consumes 96 zero bits; that prefix may already
/// resolve to data or to "not found".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ipv4Start {
    /// Continue walking IPv4 bits from this node
    Node(u32),
    /// The ::/96 walk already resolved (prefix reported as 0)
    Resolved(Option<usize>),
}

/// Decoded record value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Record {
    Node(u32),
    Empty,
    Data(usize),
}

/// Search tree for IP address lookups
pub struct SearchTree<'a> {
    /// The tree region of the database
    tree: &'a [u8],
    node_count: u32,
    record_size: RecordSize,
    ip_version: IpVersion,
    /// Length of the data section, for bounds-checking data records
    data_len: usize,
}

impl<'a> SearchTree<'a> {
    /// Create a new search tree over the tree region
    pub fn new(
        tree: &'a [u8],
        node_count: u32,
        record_size: RecordSize,
        ip_version: IpVersion,
        data_len: usize,
    ) -> Self {
        Self {
            tree,
            node_count,
            record_size,
            ip_version,
            data_len,
        }
    }

    /// Compute where IPv4 lookups start
    pub fn ipv4_start(&self) -> Result<Ipv4Start> {
        if self.ip_version == IpVersion::V4 {
            return Ok(Ipv4Start::Node(0));
        }
        if self.node_count == 0 {
            return Ok(Ipv4Start::Resolved(None));
        }

        let mut node = 0u32;
        for _ in 0..96 {
            match self.classify(self.read_record(node, 0)?)? {
                Record::Node(next) => node = next,
                Record::Empty => return Ok(Ipv4Start::Resolved(None)),
                Record::Data(offset) => return Ok(Ipv4Start::Resolved(Some(offset))),
            }
        }
        Ok(Ipv4Start::Node(node))
    }

    /// Look up an IP address
    pub fn lookup(&self, ip: IpAddr, ipv4_start: Ipv4Start) -> Result<Option<TreeHit>> {
        match ip {
            IpAddr::V4(addr) => self.lookup_v4(addr, ipv4_start),
            IpAddr::V6(addr) => match self.ip_version {
                IpVersion::V6 => self.walk(0, u128::from(addr), 128),
                // IPv4-only trees can still answer for IPv4-mapped addresses
                IpVersion::V4 => match addr.to_ipv4_mapped() {
                    Some(v4) => self.lookup_v4(v4, ipv4_start),
                    None => Ok(None),
                },
            },
        }
    }

    fn lookup_v4(&self, addr: Ipv4Addr, ipv4_start: Ipv4Start) -> Result<Option<TreeHit>> {
        match ipv4_start {
            Ipv4Start::Node(node) => self.walk(node, u128::from(u32::from(addr)), 32),
            Ipv4Start::Resolved(None) => Ok(None),
            Ipv4Start::Resolved(Some(data_offset)) => Ok(Some(TreeHit {
                data_offset,
                prefix_len: 0,
            })),
        }
    }

    /// Walk `bit_count` right-aligned bits of `bits`, most significant first
    fn walk(&self, start: u32, bits: u128, bit_count: u8) -> Result<Option<TreeHit>> {
        if self.node_count == 0 {
            return Ok(None);
        }

        let mut node = start;
        let mut steps = 0u64;
        for i in 0..bit_count {
            steps += 1;
            if steps > u64::from(self.node_count) {
                return Err(DecodeError::CorruptTree(format!(
                    "walk visited more than {} nodes",
                    self.node_count
                )));
            }

            let bit = ((bits >> (bit_count - 1 - i)) & 1) as u8;
            match self.classify(self.read_record(node, bit)?)? {
                Record::Node(next) => node = next,
                Record::Empty => return Ok(None),
                Record::Data(data_offset) => {
                    return Ok(Some(TreeHit {
                        data_offset,
                        prefix_len: i + 1,
                    }))
                }
            }
        }

        Err(DecodeError::CorruptTree(format!(
            "address bits exhausted at node {}",
            node
        )))
    }

    fn classify(&self, record: u32) -> Result<Record> {
        if record < self.node_count {
            return Ok(Record::Node(record));
        }
        if record == self.node_count {
            return Ok(Record::Empty);
        }
        // Data records: subtract node count, then the 16-byte separator
        let offset = (record - self.node_count)
            .checked_sub(DATA_SECTION_SEPARATOR as u32)
            .ok_or_else(|| {
                DecodeError::CorruptTree(format!(
                    "record {} points into the data section separator",
                    record
                ))
            })? as usize;
        if offset >= self.data_len {
            return Err(DecodeError::CorruptTree(format!(
                "record {} points past the data section ({} bytes)",
                record, self.data_len
            )));
        }
        Ok(Record::Data(offset))
    }

    /// Read a record from a node
    ///
    /// Each node contains two records. `side` determines which:
    /// - 0 = left record (for IP bit 0)
    /// - 1 = right record (for IP bit 1)
    fn read_record(&self, node: u32, side: u8) -> Result<u32> {
        if node >= self.node_count {
            return Err(DecodeError::CorruptTree(format!(
                "node index {} exceeds node count {}",
                node, self.node_count
            )));
        }

        let node_bytes = self.record_size.node_bytes();
        let start = node as usize * node_bytes;
        let bytes = self
            .tree
            .get(start..start + node_bytes)
            .ok_or(DecodeError::TruncatedBuffer {
                needed: start + node_bytes,
                available: self.tree.len(),
            })?;

        let be = |b: &[u8]| b.iter().fold(0u32, |acc, &x| (acc << 8) | u32::from(x));
        let record = match (self.record_size, side) {
            (RecordSize::Bits16, 0) => be(&bytes[0..2]),
            (RecordSize::Bits16, _) => be(&bytes[2..4]),
            (RecordSize::Bits24, 0) => be(&bytes[0..3]),
            (RecordSize::Bits24, _) => be(&bytes[3..6]),
            // Layout: [left 24 bits][middle byte][right 24 bits]; the middle
            // byte's high nibble extends the left record, low nibble the right
            (RecordSize::Bits28, 0) => (u32::from(bytes[3] >> 4) << 24) | be(&bytes[0..3]),
            (RecordSize::Bits28, _) => (u32::from(bytes[3] & 0x0F) << 24) | be(&bytes[4..7]),
            (RecordSize::Bits32, 0) => be(&bytes[0..4]),
            (RecordSize::Bits32, _) => be(&bytes[4..8]),
        };
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(data: &[u8], node_count: u32, record_size: RecordSize) -> SearchTree<'_> {
        SearchTree::new(data, node_count, record_size, IpVersion::V4, 1000)
    }

    #[test]
    fn test_read_24bit_record() {
        let data = [0x00, 0x00, 0x01, 0x00, 0x00, 0x02];
        let t = tree(&data, 10, RecordSize::Bits24);
        assert_eq!(t.read_record(0, 0).unwrap(), 1);
        assert_eq!(t.read_record(0, 1).unwrap(), 2);
    }

    #[test]
    fn test_read_28bit_record() {
        // Left: 0x1000001, Right: 0x2000002
        let data = [0x00, 0x00, 0x01, 0x12, 0x00, 0x00, 0x02];
        let t = tree(&data, 10, RecordSize::Bits28);
        assert_eq!(t.read_record(0, 0).unwrap(), 0x1000001);
        assert_eq!(t.read_record(0, 1).unwrap(), 0x2000002);
    }

    #[test]
    fn test_read_32bit_and_16bit_records() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x0A, 0x0B, 0x0C, 0x0D];
        let t = tree(&data, 10, RecordSize::Bits32);
        assert_eq!(t.read_record(0, 0).unwrap(), 0x01020304);
        assert_eq!(t.read_record(0, 1).unwrap(), 0x0A0B0C0D);

        let t = tree(&data, 10, RecordSize::Bits16);
        assert_eq!(t.read_record(0, 1).unwrap(), 0x0304);
        assert_eq!(t.read_record(1, 0).unwrap(), 0x0A0B);
    }

    #[test]
    fn test_node_beyond_tree_region() {
        let data = [0u8; 6];
        let t = tree(&data, 10, RecordSize::Bits24);
        assert!(matches!(
            t.read_record(3, 0),
            Err(DecodeError::TruncatedBuffer { .. })
        ));
        assert!(matches!(
            t.read_record(10, 0),
            Err(DecodeError::CorruptTree(_))
        ));
    }

    #[test]
    fn test_classify_records() {
        let t = tree(&[], 100, RecordSize::Bits24);
        assert_eq!(t.classify(5).unwrap(), Record::Node(5));
        assert_eq!(t.classify(100).unwrap(), Record::Empty);
        // 116 - 100 - 16 = 0
        assert_eq!(t.classify(116).unwrap(), Record::Data(0));
        // 200 - 100 - 16 = 84
        assert_eq!(t.classify(200).unwrap(), Record::Data(84));
        // inside the separator
        assert!(t.classify(105).is_err());
        // past the data section
        assert!(t.classify(100 + 16 + 1000).is_err());
    }

    #[test]
    fn test_self_referential_node_is_corrupt() {
        // One node whose both records point back at itself
        let data = [0u8; 6];
        let t = tree(&data, 1, RecordSize::Bits24);
        let result = t.lookup(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), Ipv4Start::Node(0));
        assert!(matches!(result, Err(DecodeError::CorruptTree(_))));
    }

    #[test]
    fn test_two_node_cycle_is_corrupt() {
        // node 0 -> node 1 -> node 0 ...
        let data = [0, 0, 1, 0, 0, 1, 0, 0, 0, 0, 0, 0];
        let t = tree(&data, 2, RecordSize::Bits24);
        let result = t.lookup(IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)), Ipv4Start::Node(0));
        assert!(matches!(result, Err(DecodeError::CorruptTree(_))));
    }

    #[test]
    fn test_ipv4_start_resolved_early() {
        // IPv6 tree with one node: left (bit 0) is empty, so ::/1 has no data
        let data = [0x00, 0x00, 0x01, 0x00, 0x00, 0x01];
        let t = SearchTree::new(&data, 1, RecordSize::Bits24, IpVersion::V6, 10);
        assert_eq!(t.ipv4_start().unwrap(), Ipv4Start::Resolved(None));
    }

    #[test]
    fn test_ipv6_address_in_ipv4_tree() {
        // node 0: left data (1 + 16 + 0), right empty
        let data = [0x00, 0x00, 0x11, 0x00, 0x00, 0x01];
        let t = tree(&data, 1, RecordSize::Bits24);
        let mapped: IpAddr = "::ffff:10.0.0.1".parse().unwrap();
        assert_eq!(
            t.lookup(mapped, Ipv4Start::Node(0)).unwrap(),
            Some(TreeHit {
                data_offset: 0,
                prefix_len: 1
            })
        );
        let native: IpAddr = "2001:db8::1".parse().unwrap();
        assert_eq!(t.lookup(native, Ipv4Start::Node(0)).unwrap(), None);
    }
}
