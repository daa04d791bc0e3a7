#![no_main]
use libfuzzer_sys::fuzz_target;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

fuzz_target!(|data: &[u8]| {
    // Opening and querying garbage must never crash, panic or hang
    if let Ok(reader) = geolens::Reader::from_bytes(data.to_vec()) {
        let _ = reader.lookup(IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)));
        let _ = reader.lookup(IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1)));
    }
});
