#![no_main]
use libfuzzer_sys::fuzz_target;
use std::net::IpAddr;
use std::sync::OnceLock;

#[path = "../../tests/common/mod.rs"]
mod common;

fn reader() -> &'static geolens::Reader {
    static READER: OnceLock<geolens::Reader> = OnceLock::new();
    READER.get_or_init(|| {
        let mut writer = common::MmdbWriter::new(6, 28);
        writer.insert("1.2.3.4/32", &common::flat_country("A1"));
        writer.insert("10.0.0.0/8", &common::flat_country("A2"));
        writer.insert("192.168.0.0/16", &common::flat_country("A3"));
        writer.insert("2001:db8::/32", &common::flat_country("A4"));
        geolens::Reader::from_bytes(writer.build()).expect("fixture database")
    })
}

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(ip) = s.trim().parse::<IpAddr>() {
            let _ = reader().lookup(ip);
        }
    }
    // Raw 16 bytes as an IPv6 address
    if data.len() >= 16 {
        let mut octets = [0u8; 16];
        octets.copy_from_slice(&data[..16]);
        let _ = reader().lookup(IpAddr::from(octets));
    }
});
