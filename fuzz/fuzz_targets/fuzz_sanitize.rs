//! Fuzz target for audit log sanitization.
//!
//! A sanitized value must never break the one-event-per-line format.

#![no_main]

use libfuzzer_sys::fuzz_target;

use sensitive_path_guard::audit::{AuditEvent, sanitize_log_value};

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);

    let clean = sanitize_log_value(&text);
    assert!(!clean.chars().any(char::is_control));

    let line = AuditEvent::hook_deny("Read", Some(&text), &text).format_line(&text);
    assert_eq!(line.matches('\n').count(), 1);
    assert_eq!(line.matches(" | ").count(), 3);
});
