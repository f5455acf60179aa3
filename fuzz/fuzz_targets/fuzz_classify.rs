//! Fuzz target for path and glob classification.
//!
//! Classification is pure: it must not panic and must give the same answer
//! twice for the same input.

#![no_main]

use libfuzzer_sys::fuzz_target;

use sensitive_path_guard::classify::{classify, classify_glob};
use sensitive_path_guard::resolve::ResolvedPathPair;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let (original, resolved) = text.split_once('\0').unwrap_or((text, text));
    let pair = ResolvedPathPair {
        original: original.to_string(),
        resolved: resolved.to_string(),
        redirected: original != resolved,
    };

    let first = classify(&pair, true);
    assert_eq!(first, classify(&pair, true));
    // The directory tier only ever adds matches.
    if !first.is_sensitive() {
        assert!(!classify(&pair, false).is_sensitive());
    }

    assert_eq!(classify_glob(text), classify_glob(text));
});
