//! Data section decoding
//!
//! Decodes the self-describing values stored in the data section of a
//! MaxMind DB style database. Values are reachable only by offset; nothing
//! here ever enumerates the section sequentially.
//!
//! # Format
//!
//! Every value starts with a control byte: the top 3 bits select the type and
//! the low 5 bits encode the payload size. Type 0 means "extended": the real
//! type is `7 + next byte`. Sizes 29, 30 and 31 read 1, 2 or 3 extra bytes that
//! are added to a base of 29, 285 and 65821.
//!
//! Pointers (type 1) redirect to another offset. The decoder follows them
//! transparently, so [`DataValue`] has no pointer variant. Chains are bounded
//! by [`MAX_POINTER_DEPTH`] and container nesting by [`MAX_NESTING_DEPTH`], so
//! hostile input yields an error instead of a hang or stack overflow.
//!
//! Pointers may legitimately share a value between many parents, so a small
//! section can describe an exponentially large tree. Every decode therefore
//! also spends from a work budget proportional to the section length (one
//! unit per value plus one per string or byte-array payload byte).
//!
//! See: https://maxmind.github.io/MaxMind-DB/

use crate::error::{DecodeError, Result};
use std::collections::HashMap;

/// Maximum number of pointer hops along one decode path
pub const MAX_POINTER_DEPTH: usize = 16;

/// Maximum nesting of maps and arrays
pub const MAX_NESTING_DEPTH: usize = 128;

/// Work budget floor for small sections
pub const MIN_DECODE_BUDGET: usize = 64 * 1024;

const TYPE_EXTENDED: u8 = 0;
const TYPE_POINTER: u8 = 1;
const TYPE_STRING: u8 = 2;
const TYPE_DOUBLE: u8 = 3;
const TYPE_BYTES: u8 = 4;
const TYPE_UINT16: u8 = 5;
const TYPE_UINT32: u8 = 6;
const TYPE_MAP: u8 = 7;
const TYPE_INT32: u8 = 8;
const TYPE_UINT64: u8 = 9;
const TYPE_UINT128: u8 = 10;
const TYPE_ARRAY: u8 = 11;
const TYPE_CONTAINER: u8 = 12;
const TYPE_END_MARKER: u8 = 13;
const TYPE_BOOL: u8 = 14;
const TYPE_FLOAT: u8 = 15;

/// A decoded data section value
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    /// UTF-8 string
    String(String),
    /// IEEE 754 double precision float
    Double(f64),
    /// Raw byte array
    Bytes(Vec<u8>),
    /// Unsigned 16-bit integer
    Uint16(u16),
    /// Unsigned 32-bit integer
    Uint32(u32),
    /// Key-value map (string keys only)
    Map(HashMap<String, DataValue>),
    /// Signed 32-bit integer
    Int32(i32),
    /// Unsigned 64-bit integer
    Uint64(u64),
    /// Unsigned 128-bit integer
    Uint128(u128),
    /// Array of values
    Array(Vec<DataValue>),
    /// Boolean value
    Bool(bool),
    /// IEEE 754 single precision float
    Float(f32),
}

impl DataValue {
    /// Borrow the string payload
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Any unsigned integer (or non-negative signed integer) widened to u64
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            DataValue::Uint16(n) => Some(u64::from(*n)),
            DataValue::Uint32(n) => Some(u64::from(*n)),
            DataValue::Uint64(n) => Some(*n),
            DataValue::Uint128(n) => u64::try_from(*n).ok(),
            DataValue::Int32(n) => u64::try_from(*n).ok(),
            _ => None,
        }
    }

    /// Any floating point value widened to f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DataValue::Double(d) => Some(*d),
            DataValue::Float(f) => Some(f64::from(*f)),
            _ => None,
        }
    }

    /// Borrow the map payload
    pub fn as_map(&self) -> Option<&HashMap<String, DataValue>> {
        match self {
            DataValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Look up a key when this value is a map
    pub fn get(&self, key: &str) -> Option<&DataValue> {
        self.as_map()?.get(key)
    }

    /// Follow a sequence of path segments
    ///
    /// Map segments are keys; when the current value is an array the
    /// segment must parse as an index.
    pub fn get_path<'a, I, S>(&'a self, segments: I) -> Option<&'a DataValue>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut current = self;
        for segment in segments {
            let segment = segment.as_ref();
            current = match current {
                DataValue::Map(m) => m.get(segment)?,
                DataValue::Array(a) => a.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Short type name used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            DataValue::String(_) => "string",
            DataValue::Double(_) => "double",
            DataValue::Bytes(_) => "bytes",
            DataValue::Uint16(_) => "uint16",
            DataValue::Uint32(_) => "uint32",
            DataValue::Map(_) => "map",
            DataValue::Int32(_) => "int32",
            DataValue::Uint64(_) => "uint64",
            DataValue::Uint128(_) => "uint128",
            DataValue::Array(_) => "array",
            DataValue::Bool(_) => "bool",
            DataValue::Float(_) => "float",
        }
    }
}

/// Recursion budget threaded through a decode
#[derive(Debug, Clone, Copy, Default)]
struct Depth {
    pointers: usize,
    nesting: usize,
}

/// Data section decoder
///
/// Decodes values from an encoded data section buffer. Pointer targets are
/// interpreted relative to the start of `buffer`.
pub struct DataDecoder<'a> {
    buffer: &'a [u8],
}

impl<'a> DataDecoder<'a> {
    /// Create a decoder over a data section
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer }
    }

    /// Decode the value at `offset`, following pointers
    pub fn decode(&self, offset: usize) -> Result<DataValue> {
        let mut cursor = offset;
        let mut budget = self.buffer.len().max(MIN_DECODE_BUDGET);
        self.decode_at(&mut cursor, Depth::default(), &mut budget)
    }

    fn decode_at(&self, cursor: &mut usize, depth: Depth, budget: &mut usize) -> Result<DataValue> {
        let start = *cursor;
        spend(budget, 1, start)?;
        let ctrl = self.read_byte(cursor)?;
        let mut type_id = ctrl >> 5;

        if type_id == TYPE_POINTER {
            let target = self.decode_pointer(cursor, ctrl)?;
            return self.follow_pointer(target, depth, budget);
        }

        if type_id == TYPE_EXTENDED {
            let ext = self.read_byte(cursor)?;
            type_id = ext.checked_add(7).ok_or_else(|| {
                DecodeError::InvalidData(format!("extended type byte {} at offset {}", ext, start))
            })?;
            if type_id < TYPE_INT32 {
                return Err(DecodeError::InvalidData(format!(
                    "extended type {} at offset {} is not an extended type",
                    type_id, start
                )));
            }
        }

        let size = self.decode_size(cursor, ctrl & 0x1F)?;

        match type_id {
            TYPE_STRING => {
                let bytes = self.take(cursor, size)?;
                spend(budget, size, start)?;
                let s = std::str::from_utf8(bytes)
                    .map_err(|_| DecodeError::InvalidString { offset: start })?;
                Ok(DataValue::String(s.to_string()))
            }
            TYPE_DOUBLE => {
                let bytes = self.take_exact::<8>(cursor, size, "double")?;
                Ok(DataValue::Double(f64::from_be_bytes(bytes)))
            }
            TYPE_BYTES => {
                let bytes = self.take(cursor, size)?;
                spend(budget, size, start)?;
                Ok(DataValue::Bytes(bytes.to_vec()))
            }
            TYPE_UINT16 => Ok(DataValue::Uint16(self.read_uint(cursor, size, 2)? as u16)),
            TYPE_UINT32 => Ok(DataValue::Uint32(self.read_uint(cursor, size, 4)? as u32)),
            TYPE_MAP => self.decode_map(cursor, size, depth, budget),
            TYPE_INT32 => Ok(DataValue::Int32(self.read_uint(cursor, size, 4)? as u32 as i32)),
            TYPE_UINT64 => Ok(DataValue::Uint64(self.read_uint(cursor, size, 8)? as u64)),
            TYPE_UINT128 => Ok(DataValue::Uint128(self.read_uint(cursor, size, 16)?)),
            TYPE_ARRAY => self.decode_array(cursor, size, depth, budget),
            TYPE_BOOL => match size {
                0 => Ok(DataValue::Bool(false)),
                1 => Ok(DataValue::Bool(true)),
                _ => Err(DecodeError::InvalidData(format!(
                    "boolean at offset {} has size {}",
                    start, size
                ))),
            },
            TYPE_FLOAT => {
                let bytes = self.take_exact::<4>(cursor, size, "float")?;
                Ok(DataValue::Float(f32::from_be_bytes(bytes)))
            }
            TYPE_CONTAINER | TYPE_END_MARKER => Err(DecodeError::InvalidData(format!(
                "type {} at offset {} is not a value type",
                type_id, start
            ))),
            _ => Err(DecodeError::InvalidData(format!(
                "unknown type {} at offset {}",
                type_id, start
            ))),
        }
    }

    fn follow_pointer(&self, target: usize, depth: Depth, budget: &mut usize) -> Result<DataValue> {
        if depth.pointers >= MAX_POINTER_DEPTH {
            return Err(DecodeError::PointerCycle {
                depth: MAX_POINTER_DEPTH,
            });
        }
        let mut target_cursor = target;
        self.decode_at(
            &mut target_cursor,
            Depth {
                pointers: depth.pointers + 1,
                ..depth
            },
            budget,
        )
    }

    /// Pointer layout: `001SSVVV`. SS selects how many bytes follow; VVV are
    /// the high bits of the offset for sizes 0-2 and ignored for size 3.
    fn decode_pointer(&self, cursor: &mut usize, ctrl: u8) -> Result<usize> {
        let size = (ctrl >> 3) & 0x3;
        let high = u32::from(ctrl & 0x7);
        let offset = match size {
            0 => {
                let b = self.take(cursor, 1)?;
                (high << 8) | u32::from(b[0])
            }
            1 => {
                let b = self.take(cursor, 2)?;
                ((high << 16) | (u32::from(b[0]) << 8) | u32::from(b[1])) + 2048
            }
            2 => {
                let b = self.take(cursor, 3)?;
                ((high << 24) | (u32::from(b[0]) << 16) | (u32::from(b[1]) << 8) | u32::from(b[2]))
                    + 526_336
            }
            _ => {
                let b = self.take(cursor, 4)?;
                u32::from_be_bytes([b[0], b[1], b[2], b[3]])
            }
        };
        Ok(offset as usize)
    }

    fn decode_map(
        &self,
        cursor: &mut usize,
        count: usize,
        depth: Depth,
        budget: &mut usize,
    ) -> Result<DataValue> {
        let depth = self.nest(depth, *cursor)?;
        // Each entry needs at least two bytes; never trust the count for allocation
        let mut map = HashMap::with_capacity(count.min(self.remaining(*cursor) / 2));

        for _ in 0..count {
            let key_offset = *cursor;
            let key = match self.decode_at(cursor, depth, budget)? {
                DataValue::String(s) => s,
                other => {
                    return Err(DecodeError::InvalidData(format!(
                        "map key at offset {} is a {}, expected string",
                        key_offset,
                        other.type_name()
                    )))
                }
            };
            let value = self.decode_at(cursor, depth, budget)?;
            map.insert(key, value);
        }

        Ok(DataValue::Map(map))
    }

    fn decode_array(
        &self,
        cursor: &mut usize,
        count: usize,
        depth: Depth,
        budget: &mut usize,
    ) -> Result<DataValue> {
        let depth = self.nest(depth, *cursor)?;
        let mut array = Vec::with_capacity(count.min(self.remaining(*cursor)));

        for _ in 0..count {
            array.push(self.decode_at(cursor, depth, budget)?);
        }

        Ok(DataValue::Array(array))
    }

    fn nest(&self, depth: Depth, offset: usize) -> Result<Depth> {
        if depth.nesting >= MAX_NESTING_DEPTH {
            return Err(DecodeError::InvalidData(format!(
                "containers nested deeper than {} at offset {}",
                MAX_NESTING_DEPTH, offset
            )));
        }
        Ok(Depth {
            nesting: depth.nesting + 1,
            ..depth
        })
    }

    fn decode_size(&self, cursor: &mut usize, size_bits: u8) -> Result<usize> {
        match size_bits {
            0..=28 => Ok(size_bits as usize),
            29 => {
                let b = self.take(cursor, 1)?;
                Ok(29 + b[0] as usize)
            }
            30 => {
                let b = self.take(cursor, 2)?;
                Ok(285 + u16::from_be_bytes([b[0], b[1]]) as usize)
            }
            _ => {
                let b = self.take(cursor, 3)?;
                Ok(65_821 + ((b[0] as usize) << 16 | (b[1] as usize) << 8 | b[2] as usize))
            }
        }
    }

    /// Big-endian unsigned integer of `size` bytes, at most `max` bytes wide
    fn read_uint(&self, cursor: &mut usize, size: usize, max: usize) -> Result<u128> {
        if size > max {
            return Err(DecodeError::InvalidData(format!(
                "integer of {} bytes exceeds {} byte width at offset {}",
                size, max, *cursor
            )));
        }
        let bytes = self.take(cursor, size)?;
        Ok(bytes.iter().fold(0u128, |acc, &b| (acc << 8) | u128::from(b)))
    }

    fn take_exact<const N: usize>(
        &self,
        cursor: &mut usize,
        size: usize,
        what: &str,
    ) -> Result<[u8; N]> {
        if size != N {
            return Err(DecodeError::InvalidData(format!(
                "{} at offset {} has size {}, expected {}",
                what, *cursor, size, N
            )));
        }
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(cursor, N)?);
        Ok(out)
    }

    fn read_byte(&self, cursor: &mut usize) -> Result<u8> {
        Ok(self.take(cursor, 1)?[0])
    }

    fn take(&self, cursor: &mut usize, len: usize) -> Result<&'a [u8]> {
        let end = cursor
            .checked_add(len)
            .filter(|&end| end <= self.buffer.len())
            .ok_or(DecodeError::TruncatedBuffer {
                needed: cursor.saturating_add(len),
                available: self.buffer.len(),
            })?;
        let bytes = &self.buffer[*cursor..end];
        *cursor = end;
        Ok(bytes)
    }

    fn remaining(&self, cursor: usize) -> usize {
        self.buffer.len().saturating_sub(cursor)
    }
}

fn spend(budget: &mut usize, cost: usize, offset: usize) -> Result<()> {
    match budget.checked_sub(cost) {
        Some(left) => {
            *budget = left;
            Ok(())
        }
        None => Err(DecodeError::InvalidData(format!(
            "decode work budget exhausted at offset {}",
            offset
        ))),
    }
}
