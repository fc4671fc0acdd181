//! Fuzz target for denylist file parsing.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tsw_config::Denylist;

fuzz_target!(|data: &str| {
    if let Ok(denylist) = Denylist::from_json_str(data) {
        assert!(!denylist.contains("ts"));
    }
});
