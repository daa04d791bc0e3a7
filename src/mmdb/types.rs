//! MMDB-specific Type Definitions

use crate::error::{DecodeError, Result};

/// MMDB metadata marker: "\xAB\xCD\xEFMaxMind.com"
pub const METADATA_MARKER: &[u8] = b"\xAB\xCD\xEFMaxMind.com";

/// Number of zero bytes separating the search tree from the data section
pub const DATA_SECTION_SEPARATOR: usize = 16;

/// The only binary format major version this decoder understands
pub const SUPPORTED_MAJOR_VERSION: u64 = 2;

/// IP version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpVersion {
    /// IPv4 only
    V4,
    /// IPv6 (may include IPv4 addresses under ::/96)
    V6,
}

impl IpVersion {
    /// Number of address bits walked for a native address of this version
    pub fn bit_count(self) -> u8 {
        match self {
            IpVersion::V4 => 32,
            IpVersion::V6 => 128,
        }
    }
}

/// Record size in bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSize {
    /// 16-bit records (2 bytes per record, 4 bytes per node)
    Bits16 = 16,
    /// 24-bit records (3 bytes per record, 6 bytes per node)
    Bits24 = 24,
    /// 28-bit records (3.5 bytes per record, 7 bytes per node)
    Bits28 = 28,
    /// 32-bit records (4 bytes per record, 8 bytes per node)
    Bits32 = 32,
}

impl RecordSize {
    /// Get the size of a node (2 records) in bytes
    pub fn node_bytes(self) -> usize {
        match self {
            RecordSize::Bits16 => 4,
            RecordSize::Bits24 => 6,
            RecordSize::Bits28 => 7,
            RecordSize::Bits32 => 8,
        }
    }

    /// Create from bit size
    pub fn from_bits(bits: u64) -> Result<Self> {
        match bits {
            16 => Ok(RecordSize::Bits16),
            24 => Ok(RecordSize::Bits24),
            28 => Ok(RecordSize::Bits28),
            32 => Ok(RecordSize::Bits32),
            _ => Err(DecodeError::MalformedHeader(format!(
                "invalid record size: {} bits",
                bits
            ))),
        }
    }

    /// Bit width as stored in metadata
    pub fn bits(self) -> u16 {
        self as u16
    }
}
