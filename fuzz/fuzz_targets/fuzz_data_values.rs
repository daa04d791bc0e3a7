#![no_main]
use geolens::data_section::DataDecoder;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Any offset into arbitrary bytes: errors are fine, panics are not
    let decoder = DataDecoder::new(data);
    for offset in 0..data.len().min(64) {
        if let Ok(value) = decoder.decode(offset) {
            let _ = value.get_path(&["country", "iso_code"]);
        }
    }
});
