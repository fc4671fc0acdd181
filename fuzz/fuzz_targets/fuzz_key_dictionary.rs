//! Fuzz target for `key;key_id` dictionary parsing.

#![no_main]

use std::path::Path;

use libfuzzer_sys::fuzz_target;
use tsw_core::keys::KeyDictionary;

fuzz_target!(|data: &[u8]| {
    let _ = KeyDictionary::from_reader(data, Path::new("keys.csv"), b';');
});
