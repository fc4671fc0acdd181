//! Fuzz target for dump row parsing and decoding.
//!
//! Feeds arbitrary bytes through the raw record reader for every source
//! layout and decodes whatever parses.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tsw_config::SourceVersion;
use tsw_core::decode::decode;
use tsw_core::input::RawRecordReader;
use tsw_core::keys::KeyDictionary;

fuzz_target!(|data: &[u8]| {
    let keys: KeyDictionary = [(1, "a"), (2, "b")].into_iter().collect();
    for version in [SourceVersion::Legacy, SourceVersion::V254, SourceVersion::V32] {
        let reader = RawRecordReader::from_reader(data, "fuzz.csv", version, b';');
        for record in reader {
            // Errors are expected; panics are not
            if let Ok(raw) = record {
                let _ = decode(&raw, Some(&keys));
            }
        }
    }
});
