//! Fuzz target for convert.json parsing and validation.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tsw_config::validate::validate_config;
use tsw_config::ConvertConfig;

fuzz_target!(|data: &str| {
    // Should never panic, only return an error
    if let Ok(config) = ConvertConfig::from_json_str(data) {
        let _ = validate_config(&config);
        let _ = config.delimiter_byte();
    }
});
