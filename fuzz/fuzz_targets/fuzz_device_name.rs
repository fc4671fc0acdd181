//! Fuzz target for output file name sanitization.
//!
//! A sanitized name must never be empty and never contain a path
//! separator, whatever the registry holds.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tsw_core::registry::sanitize_name;

fuzz_target!(|input: (&str, &str)| {
    let (raw, fallback) = input;
    let name = sanitize_name(raw, fallback);
    assert!(!name.is_empty());
    assert!(!name.contains('/'));
    assert!(!name.contains('\\'));
    assert!(!name.chars().any(char::is_control));
});
