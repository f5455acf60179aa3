//! Fuzz target for hook JSON input parsing.
//!
//! This fuzzes the JSON parsing that receives input from Claude Code's hook
//! and the tool adapter that runs on the parsed result. It tests for:
//! - Panics from malformed JSON
//! - Type confusion in `tool_input` parameters
//! - Memory issues from deeply nested structures

#![no_main]

use libfuzzer_sys::fuzz_target;

use sensitive_path_guard::hook::HookInput;

fuzz_target!(|data: &[u8]| {
    // Skip extremely large inputs
    if data.len() > 100_000 {
        return;
    }

    // Parsing and extraction must never panic
    if let Ok(input) = serde_json::from_slice::<HookInput>(data) {
        let invocation = input.into_invocation();
        for candidate in invocation.candidates() {
            assert!(!candidate.path.is_empty());
        }
    }
});
