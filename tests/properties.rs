//! Property tests for classification and log sanitization.

use proptest::prelude::*;
use sensitive_path_guard::audit::{AuditEvent, sanitize_log_value};
use sensitive_path_guard::classify::{Classification, classify, classify_glob};
use sensitive_path_guard::resolve::{ResolvedPathPair, normalize_lexical};
use sensitive_path_guard::rules::SENSITIVE_FILENAMES;
use std::path::Path;

fn pair(path: &str) -> ResolvedPathPair {
    ResolvedPathPair {
        original: path.to_string(),
        resolved: path.to_string(),
        redirected: false,
    }
}

/// Flip the case of each ASCII letter according to `mask`.
fn recase(name: &str, mask: &[bool]) -> String {
    name.chars()
        .zip(mask.iter().cycle())
        .map(|(c, upper)| if *upper { c.to_ascii_uppercase() } else { c })
        .collect()
}

proptest! {
    #[test]
    fn exact_names_are_case_insensitive(
        index in 0..SENSITIVE_FILENAMES.len(),
        mask in prop::collection::vec(any::<bool>(), 1..16),
        dir in "(/[a-z]{1,8}){0,4}",
    ) {
        let name = recase(SENSITIVE_FILENAMES[index], &mask);
        let path = format!("{dir}/{name}");
        prop_assert!(classify(&pair(&path), false).is_sensitive(), "{path}");
    }

    #[test]
    fn plain_source_files_are_never_sensitive(
        dir in "(/[a-z]{1,8}){0,4}",
        stem in "[a-z]{1,10}",
        ext in prop::sample::select(vec!["rs", "md", "txt", "toml", "py"]),
    ) {
        let path = format!("{dir}/src/{stem}.{ext}");
        prop_assert_eq!(classify(&pair(&path), true), Classification::NotSensitive);
    }

    #[test]
    fn classification_is_deterministic(path in "\\PC{0,64}", directory in any::<bool>()) {
        prop_assert_eq!(classify(&pair(&path), directory), classify(&pair(&path), directory));
        prop_assert_eq!(classify_glob(&path), classify_glob(&path));
    }

    #[test]
    fn a_sensitive_symlink_target_is_always_caught(
        stem in "[a-z]{1,10}",
        index in 0..SENSITIVE_FILENAMES.len(),
    ) {
        let link = ResolvedPathPair {
            original: format!("/work/{stem}.txt"),
            resolved: format!("/home/u/{}", SENSITIVE_FILENAMES[index]),
            redirected: true,
        };
        let Classification::Sensitive(hit) = classify(&link, false) else {
            return Err(TestCaseError::fail("symlink target not caught"));
        };
        prop_assert!(hit.symlink_bypass);
    }

    #[test]
    fn sanitized_values_stay_on_one_field(value in "\\PC*|[\\x00-\\x1f\\x7f|\"\\\\]{0,32}") {
        let clean = sanitize_log_value(&value);
        prop_assert!(!clean.chars().any(char::is_control), "{clean:?}");
        prop_assert!(!clean.contains(" | "));
    }

    #[test]
    fn any_event_is_exactly_one_line(file in any::<String>(), reason in any::<String>(), worker in any::<String>()) {
        let line = AuditEvent::hook_deny("Read", Some(&file), &reason).format_line(&worker);
        prop_assert_eq!(line.matches('\n').count(), 1);
        prop_assert!(line.ends_with('\n'));
        prop_assert_eq!(line.matches(" | ").count(), 3);
    }

    #[test]
    fn lexical_normalization_is_idempotent(path in "(/?(\\.|\\.\\.|[a-z]{1,4})){0,8}") {
        let once = normalize_lexical(Path::new(&path));
        let twice = normalize_lexical(&once);
        prop_assert_eq!(once, twice);
    }
}
