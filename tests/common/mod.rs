//! Synthetic database writer shared by unit tests, integration tests and benches.
//!
//! Only depends on std so it can be pulled into the library's own unit tests
//! with `#[path]`. It writes just enough of the format to exercise the reader:
//! a data-section encoder, a search tree writer and a metadata block.

#![allow(dead_code)]

use std::net::IpAddr;

pub const METADATA_MARKER: &[u8] = b"\xAB\xCD\xEFMaxMind.com";

/// A value to encode into the data section
#[derive(Debug, Clone)]
pub enum Value {
    Pointer(u32),
    String(String),
    Double(f64),
    Bytes(Vec<u8>),
    Uint16(u16),
    Uint32(u32),
    Map(Vec<(String, Value)>),
    Int32(i32),
    Uint64(u64),
    Uint128(u128),
    Array(Vec<Value>),
    Bool(bool),
    Float(f32),
}

impl Value {
    pub fn str(s: &str) -> Value {
        Value::String(s.to_string())
    }

    pub fn map(entries: Vec<(&str, Value)>) -> Value {
        Value::Map(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }
}

fn push_control(type_id: u8, size: usize, buf: &mut Vec<u8>) {
    let (size_bits, extra): (u8, Vec<u8>) = if size < 29 {
        (size as u8, vec![])
    } else if size < 285 {
        (29, vec![(size - 29) as u8])
    } else if size < 65_821 {
        (30, ((size - 285) as u16).to_be_bytes().to_vec())
    } else {
        (31, ((size - 65_821) as u32).to_be_bytes()[1..].to_vec())
    };

    if type_id <= 7 {
        buf.push((type_id << 5) | size_bits);
    } else {
        buf.push(size_bits);
        buf.push(type_id - 7);
    }
    buf.extend_from_slice(&extra);
}

fn minimal_be(bytes: &[u8]) -> &[u8] {
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[first..]
}

/// Encode one value onto the end of `buf`
pub fn encode(value: &Value, buf: &mut Vec<u8>) {
    match value {
        Value::Pointer(offset) => {
            let offset = *offset;
            if offset < 2048 {
                buf.push(0x20 | ((offset >> 8) as u8 & 0x7));
                buf.push(offset as u8);
            } else if offset < 526_336 {
                let v = offset - 2048;
                buf.push(0x28 | ((v >> 16) as u8 & 0x7));
                buf.extend_from_slice(&[(v >> 8) as u8, v as u8]);
            } else if offset < 134_744_064 {
                let v = offset - 526_336;
                buf.push(0x30 | ((v >> 24) as u8 & 0x7));
                buf.extend_from_slice(&[(v >> 16) as u8, (v >> 8) as u8, v as u8]);
            } else {
                buf.push(0x38);
                buf.extend_from_slice(&offset.to_be_bytes());
            }
        }
        Value::String(s) => {
            push_control(2, s.len(), buf);
            buf.extend_from_slice(s.as_bytes());
        }
        Value::Double(d) => {
            push_control(3, 8, buf);
            buf.extend_from_slice(&d.to_be_bytes());
        }
        Value::Bytes(b) => {
            push_control(4, b.len(), buf);
            buf.extend_from_slice(b);
        }
        Value::Uint16(n) => {
            let bytes = n.to_be_bytes();
            let payload = minimal_be(&bytes);
            push_control(5, payload.len(), buf);
            buf.extend_from_slice(payload);
        }
        Value::Uint32(n) => {
            let bytes = n.to_be_bytes();
            let payload = minimal_be(&bytes);
            push_control(6, payload.len(), buf);
            buf.extend_from_slice(payload);
        }
        Value::Map(entries) => {
            push_control(7, entries.len(), buf);
            for (key, value) in entries {
                encode(&Value::String(key.clone()), buf);
                encode(value, buf);
            }
        }
        Value::Int32(n) => {
            push_control(8, 4, buf);
            buf.extend_from_slice(&n.to_be_bytes());
        }
        Value::Uint64(n) => {
            let bytes = n.to_be_bytes();
            let payload = minimal_be(&bytes);
            push_control(9, payload.len(), buf);
            buf.extend_from_slice(payload);
        }
        Value::Uint128(n) => {
            let bytes = n.to_be_bytes();
            let payload = minimal_be(&bytes);
            push_control(10, payload.len(), buf);
            buf.extend_from_slice(payload);
        }
        Value::Array(items) => {
            push_control(11, items.len(), buf);
            for item in items {
                encode(item, buf);
            }
        }
        Value::Bool(b) => push_control(14, usize::from(*b), buf),
        Value::Float(f) => {
            push_control(15, 4, buf);
            buf.extend_from_slice(&f.to_be_bytes());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Rec {
    Empty,
    Node(u32),
    Data(u32),
}

/// Writes a complete database blob
pub struct MmdbWriter {
    ip_version: u16,
    record_size: u16,
    major_version: u16,
    database_type: String,
    nodes: Vec<[Rec; 2]>,
    data: Vec<u8>,
}

impl MmdbWriter {
    pub fn new(ip_version: u16, record_size: u16) -> Self {
        Self {
            ip_version,
            record_size,
            major_version: 2,
            database_type: "Test-Country".to_string(),
            nodes: vec![[Rec::Empty, Rec::Empty]],
            data: Vec::new(),
        }
    }

    pub fn database_type(mut self, database_type: &str) -> Self {
        self.database_type = database_type.to_string();
        self
    }

    pub fn major_version(mut self, major: u16) -> Self {
        self.major_version = major;
        self
    }

    /// Append a value to the data section and return its offset
    pub fn add_value(&mut self, value: &Value) -> u32 {
        let offset = self.data.len() as u32;
        encode(value, &mut self.data);
        offset
    }

    /// Insert a CIDR pointing at a freshly encoded value
    pub fn insert(&mut self, cidr: &str, value: &Value) {
        let offset = self.add_value(value);
        self.insert_offset(cidr, offset);
    }

    /// Insert a CIDR pointing at an existing data offset
    pub fn insert_offset(&mut self, cidr: &str, offset: u32) {
        let (addr, len) = cidr.split_once('/').expect("cidr needs a prefix length");
        let addr: IpAddr = addr.parse().expect("valid address");
        let len: u32 = len.parse().expect("valid prefix length");

        let (bits, prefix) = match (addr, self.ip_version) {
            (IpAddr::V4(v4), 4) => (u128::from(u32::from(v4)) << 96, len),
            (IpAddr::V4(v4), _) => (u128::from(u32::from(v4)), 96 + len),
            (IpAddr::V6(v6), 6) => (u128::from(v6), len),
            (IpAddr::V6(_), _) => panic!("IPv6 network in an IPv4 database"),
        };
        assert!(prefix >= 1, "prefix length must be at least 1");

        let mut node = 0usize;
        for i in 0..prefix {
            let bit = ((bits >> (127 - i)) & 1) as usize;
            if i == prefix - 1 {
                self.nodes[node][bit] = Rec::Data(offset);
                return;
            }
            node = match self.nodes[node][bit] {
                Rec::Node(next) => next as usize,
                existing => {
                    // Split an empty or broader record into a new node
                    let fill = if let Rec::Data(_) = existing { existing } else { Rec::Empty };
                    self.nodes.push([fill, fill]);
                    let next = self.nodes.len() - 1;
                    self.nodes[node][bit] = Rec::Node(next as u32);
                    next
                }
            };
        }
    }

    pub fn node_count(&self) -> u32 {
        self.nodes.len() as u32
    }

    fn record_value(&self, rec: Rec) -> u32 {
        let node_count = self.node_count();
        match rec {
            Rec::Empty => node_count,
            Rec::Node(n) => n,
            Rec::Data(offset) => node_count + 16 + offset,
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let records: Vec<[u32; 2]> = self
            .nodes
            .iter()
            .map(|[l, r]| [self.record_value(*l), self.record_value(*r)])
            .collect();
        let tree = encode_tree(&records, self.record_size);

        let metadata = Value::map(vec![
            ("node_count", Value::Uint32(self.node_count())),
            ("record_size", Value::Uint16(self.record_size)),
            ("ip_version", Value::Uint16(self.ip_version)),
            ("database_type", Value::String(self.database_type.clone())),
            ("binary_format_major_version", Value::Uint16(self.major_version)),
            ("binary_format_minor_version", Value::Uint16(0)),
            ("build_epoch", Value::Uint64(1_700_000_000)),
            ("languages", Value::Array(vec![Value::str("en")])),
            (
                "description",
                Value::map(vec![("en", Value::str("synthetic test database"))]),
            ),
        ]);

        assemble(&tree, &self.data, &metadata)
    }
}

/// Serialize raw record pairs for the given record size
pub fn encode_tree(records: &[[u32; 2]], record_size: u16) -> Vec<u8> {
    let mut out = Vec::new();
    for &[left, right] in records {
        match record_size {
            16 => {
                out.extend_from_slice(&(left as u16).to_be_bytes());
                out.extend_from_slice(&(right as u16).to_be_bytes());
            }
            24 => {
                out.extend_from_slice(&left.to_be_bytes()[1..]);
                out.extend_from_slice(&right.to_be_bytes()[1..]);
            }
            28 => {
                out.extend_from_slice(&left.to_be_bytes()[1..]);
                out.push((((left >> 24) & 0x0F) << 4) as u8 | ((right >> 24) & 0x0F) as u8);
                out.extend_from_slice(&right.to_be_bytes()[1..]);
            }
            32 => {
                out.extend_from_slice(&left.to_be_bytes());
                out.extend_from_slice(&right.to_be_bytes());
            }
            other => panic!("unsupported record size {}", other),
        }
    }
    out
}

/// Concatenate tree, separator, data section, marker and metadata
pub fn assemble(tree: &[u8], data: &[u8], metadata: &Value) -> Vec<u8> {
    let mut out = Vec::with_capacity(tree.len() + 16 + data.len() + 256);
    out.extend_from_slice(tree);
    out.extend_from_slice(&[0u8; 16]);
    out.extend_from_slice(data);
    out.extend_from_slice(METADATA_MARKER);
    encode(metadata, &mut out);
    out
}

/// A database with hand-written records, for corrupt-tree scenarios
pub fn raw_database(records: &[[u32; 2]], record_size: u16, ip_version: u16, data: &[u8]) -> Vec<u8> {
    let tree = encode_tree(records, record_size);
    let metadata = Value::map(vec![
        ("node_count", Value::Uint32(records.len() as u32)),
        ("record_size", Value::Uint16(record_size)),
        ("ip_version", Value::Uint16(ip_version)),
        ("database_type", Value::str("Test-Country")),
        ("binary_format_major_version", Value::Uint16(2)),
        ("binary_format_minor_version", Value::Uint16(0)),
    ]);
    assemble(&tree, data, &metadata)
}

/// Record with a flat `country_iso_code` field
pub fn flat_country(code: &str) -> Value {
    Value::map(vec![("country_iso_code", Value::str(code))])
}

/// GeoLite2 style country record
pub fn geoip2_country(code: &str, name: &str, continent: &str) -> Value {
    Value::map(vec![
        ("continent", Value::map(vec![("code", Value::str(continent))])),
        (
            "country",
            Value::map(vec![
                ("iso_code", Value::str(code)),
                ("names", Value::map(vec![("en", Value::str(name))])),
            ]),
        ),
    ])
}

/// The two-halves country database: 0.0.0.0/1 -> A1, 128.0.0.0/1 -> A2
pub fn two_halves_country_db() -> Vec<u8> {
    let mut writer = MmdbWriter::new(6, 24);
    writer.insert("0.0.0.0/1", &flat_country("A1"));
    writer.insert("128.0.0.0/1", &flat_country("A2"));
    writer.build()
}

/// ASN database covering 1.1.1.0/24 and 8.8.8.0/24
pub fn asn_db() -> Vec<u8> {
    let mut writer = MmdbWriter::new(6, 28).database_type("GeoLite2-ASN");
    writer.insert(
        "1.1.1.0/24",
        &Value::map(vec![
            ("autonomous_system_number", Value::Uint32(13335)),
            ("autonomous_system_organization", Value::str("CLOUDFLARENET")),
        ]),
    );
    writer.insert(
        "8.8.8.0/24",
        &Value::map(vec![
            ("autonomous_system_number", Value::Uint32(15169)),
            ("autonomous_system_organization", Value::str("GOOGLE")),
        ]),
    );
    writer.build()
}

/// City database with one fully populated record for 81.2.69.0/24
pub fn city_db() -> Vec<u8> {
    let mut writer = MmdbWriter::new(6, 28).database_type("GeoLite2-City");
    let names = writer.add_value(&Value::map(vec![("en", Value::str("London"))]));
    writer.insert(
        "81.2.69.0/24",
        &Value::map(vec![
            ("city", Value::map(vec![("names", Value::Pointer(names))])),
            (
                "subdivisions",
                Value::Array(vec![Value::map(vec![(
                    "names",
                    Value::map(vec![("en", Value::str("England"))]),
                )])]),
            ),
            ("postal", Value::map(vec![("code", Value::str("EC1A"))])),
            (
                "location",
                Value::map(vec![
                    ("latitude", Value::Double(51.5142)),
                    ("longitude", Value::Double(-0.0931)),
                    ("time_zone", Value::str("Europe/London")),
                ]),
            ),
        ]),
    );
    writer.build()
}

/// Registrant database covering 192.0.2.0/24
pub fn whois_db() -> Vec<u8> {
    let mut writer = MmdbWriter::new(6, 24).database_type("Test-WHOIS");
    writer.insert(
        "192.0.2.0/24",
        &Value::map(vec![
            ("organization", Value::str("Example Registrant")),
            ("network", Value::str("192.0.2.0/24")),
        ]),
    );
    writer.build()
}
