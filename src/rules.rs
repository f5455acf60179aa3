//! Static sensitivity rule tables.
//!
//! The rule set is built once per process and never mutated. Tiers, in the
//! order the classifier consults them:
//!
//! 1. exact filenames (case-insensitive set, basename only)
//! 2. filename patterns (anchored, case-insensitive, basename only)
//! 3. path patterns (searched in the full lower-cased path)
//! 4. directory patterns (only for directory-style candidates)
//!
//! Glob heuristics are a separate, substring-only check used by the tool
//! adapter to decide whether a search glob deserves scrutiny at all.

use aho_corasick::{AhoCorasick, AhoCorasickBuilder};
use fancy_regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// A compiled rule with a stable name for audit output.
#[derive(Debug)]
pub struct SensitivePattern {
    /// Compiled regex.
    pub regex: Regex,
    /// Stable identifier (e.g. `"pem-file"`).
    pub name: &'static str,
}

impl SensitivePattern {
    /// Test `haystack` against this rule.
    pub fn matches(&self, haystack: &str) -> bool {
        // Matching errors (backtrack limit) count as a hit: fail closed.
        self.regex.is_match(haystack).unwrap_or(true)
    }
}

/// Macro to create a sensitive pattern with compile-time name checking.
#[macro_export]
macro_rules! sensitive_pattern {
    ($name:literal, $re:literal) => {
        $crate::rules::SensitivePattern {
            regex: ::fancy_regex::Regex::new($re).expect(concat!(
                "sensitive pattern '",
                $name,
                "' should compile"
            )),
            name: $name,
        }
    };
}

/// Basenames that are always sensitive (compared lower-cased).
pub const SENSITIVE_FILENAMES: &[&str] = &[
    ".env",
    ".envrc",
    "credentials.json",
    "secrets.json",
    "id_rsa",
    "id_dsa",
    "id_ecdsa",
    "id_ed25519",
    ".netrc",
    ".npmrc",
    ".pypirc",
    "known_hosts",
    // Often holds registry auth when it lives in .docker/
    "config.json",
];

/// Directories whose mere listing or search is refused.
pub const SENSITIVE_DIRECTORIES: &[&str] = &[
    ".aws",
    ".ssh",
    ".gnupg",
    ".kube",
    ".docker",
    ".password-store",
];

/// Substrings that make a search glob worth checking.
pub const GLOB_HEURISTICS: &[&str] = &[
    ".env",
    "secret",
    "credential",
    "password",
    "key",
    ".ssh",
    ".aws",
    ".gnupg",
    ".kube",
    ".docker",
    ".netrc",
    ".npmrc",
    ".pypirc",
    "known_hosts",
    ".pem",
    ".p12",
    ".pfx",
    ".jks",
    "id_rsa",
    "id_dsa",
    "id_ecdsa",
    "id_ed25519",
];

fn filename_patterns() -> Vec<SensitivePattern> {
    vec![
        sensitive_pattern!("env-variant", r"(?i)^\.env\.[a-z0-9_.-]+$"),
        sensitive_pattern!("credentials-json", r"(?i)^.*credentials.*\.json$"),
        sensitive_pattern!("secrets-json", r"(?i)^.*secrets.*\.json$"),
        sensitive_pattern!("pem-file", r"(?i)^.*\.pem$"),
        sensitive_pattern!("key-file", r"(?i)^.*\.key$"),
        sensitive_pattern!("pkcs12-p12", r"(?i)^.*\.p12$"),
        sensitive_pattern!("pkcs12-pfx", r"(?i)^.*\.pfx$"),
        sensitive_pattern!("java-keystore", r"(?i)^.*\.jks$"),
        sensitive_pattern!("ssh-key-rsa", r"(?i)^.*_rsa$"),
        sensitive_pattern!("ssh-key-dsa", r"(?i)^.*_dsa$"),
        sensitive_pattern!("ssh-key-ecdsa", r"(?i)^.*_ecdsa$"),
        sensitive_pattern!("ssh-key-ed25519", r"(?i)^.*_ed25519$"),
    ]
}

fn path_patterns() -> Vec<SensitivePattern> {
    vec![
        sensitive_pattern!("aws-credentials", r"\.aws/credentials$"),
        sensitive_pattern!("aws-config", r"\.aws/config$"),
        sensitive_pattern!("kube-config", r"\.kube/config$"),
        sensitive_pattern!("docker-config", r"\.docker/config\.json$"),
        sensitive_pattern!("ssh-identity", r"\.ssh/id_[^/]+$"),
        sensitive_pattern!("ssh-known-hosts", r"\.ssh/known_hosts$"),
        sensitive_pattern!("gnupg", r"\.gnupg/.*$"),
        sensitive_pattern!("password-store", r"\.password-store/.*$"),
    ]
}

fn directory_patterns() -> Vec<SensitivePattern> {
    vec![
        sensitive_pattern!("aws-dir", r"(?:^|/)\.aws/?$"),
        sensitive_pattern!("ssh-dir", r"(?:^|/)\.ssh/?$"),
        sensitive_pattern!("gnupg-dir", r"(?:^|/)\.gnupg/?$"),
        sensitive_pattern!("kube-dir", r"(?:^|/)\.kube/?$"),
        sensitive_pattern!("docker-dir", r"(?:^|/)\.docker/?$"),
        sensitive_pattern!("password-store-dir", r"(?:^|/)\.password-store/?$"),
    ]
}

/// The complete, immutable rule set.
pub struct RuleSet {
    pub exact_names: HashSet<&'static str>,
    pub filename_patterns: Vec<SensitivePattern>,
    pub path_patterns: Vec<SensitivePattern>,
    pub directory_patterns: Vec<SensitivePattern>,
    glob_matcher: AhoCorasick,
}

impl RuleSet {
    /// The built-in tables.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            exact_names: SENSITIVE_FILENAMES.iter().copied().collect(),
            filename_patterns: filename_patterns(),
            path_patterns: path_patterns(),
            directory_patterns: directory_patterns(),
            glob_matcher: AhoCorasickBuilder::new()
                .ascii_case_insensitive(true)
                .build(GLOB_HEURISTICS)
                .expect("glob heuristics should compile"),
        }
    }

    /// First glob heuristic contained in `glob`, if any.
    #[must_use]
    pub fn glob_heuristic_hit(&self, glob: &str) -> Option<&'static str> {
        self.glob_matcher
            .find(glob)
            .map(|m| GLOB_HEURISTICS[m.pattern().as_usize()])
    }
}

impl std::fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleSet")
            .field("exact_names", &self.exact_names.len())
            .field("filename_patterns", &self.filename_patterns.len())
            .field("path_patterns", &self.path_patterns.len())
            .field("directory_patterns", &self.directory_patterns.len())
            .field("glob_heuristics", &GLOB_HEURISTICS.len())
            .finish()
    }
}

/// Process-wide rule set.
pub static RULES: LazyLock<RuleSet> = LazyLock::new(RuleSet::builtin);
