//! Sensitivity classification.
//!
//! A pure function over the static [`RULES`] and the supplied strings: no I/O,
//! no mutable state, safe to call from any thread.
//!
//! For a [`ResolvedPathPair`] whose forms differ, the original form is checked
//! first, then the resolved one. A hit that only shows up on the resolved form
//! of a redirected path is flagged as a symlink bypass attempt.

use crate::resolve::{ResolveFailure, ResolvedPathPair};
use crate::rules::{RULES, RuleSet};
use smallvec::{SmallVec, smallvec};

/// Which rule tier produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    /// Basename is in the exact-name set.
    ExactName,
    /// Basename matched a filename pattern.
    FilenamePattern,
    /// Full path matched a path pattern.
    PathPattern,
    /// Path is itself a sensitive directory.
    DirectoryPattern,
    /// Search glob contains a sensitive substring.
    GlobHeuristic,
    /// Path could not be resolved (fail-closed).
    Unresolvable,
}

impl MatchTier {
    /// Stable label for audit output.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::ExactName => "exact_name",
            Self::FilenamePattern => "filename_pattern",
            Self::PathPattern => "path_pattern",
            Self::DirectoryPattern => "directory_pattern",
            Self::GlobHeuristic => "glob_heuristic",
            Self::Unresolvable => "unresolvable",
        }
    }
}

/// Which form of the candidate was being checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathForm {
    /// Original and resolved forms coincide.
    Path,
    /// Lexically normalized input.
    Original,
    /// Symlink-resolved target.
    Resolved,
    /// A search glob, never touched on disk.
    Glob,
}

impl PathForm {
    const fn describe(self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Original => "original path",
            Self::Resolved => "resolved path (symlink target)",
            Self::Glob => "glob pattern",
        }
    }
}

/// A positive sensitivity match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensitiveMatch {
    /// Human-readable reason, used verbatim in audit lines.
    pub reason: String,
    /// The string that matched.
    pub matched_path: String,
    /// Tier that fired.
    pub tier: MatchTier,
    /// Name of the rule that fired, when the tier has named rules.
    pub rule: Option<&'static str>,
    /// Which form matched.
    pub form: PathForm,
    /// Only the symlink target matched: the request tried to go around the
    /// rules through a link.
    pub symlink_bypass: bool,
}

/// Result of classifying a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    NotSensitive,
    Sensitive(SensitiveMatch),
}

impl Classification {
    #[must_use]
    pub const fn is_sensitive(&self) -> bool {
        matches!(self, Self::Sensitive(_))
    }

    #[must_use]
    pub fn into_match(self) -> Option<SensitiveMatch> {
        match self {
            Self::Sensitive(m) => Some(m),
            Self::NotSensitive => None,
        }
    }
}

struct RuleHit {
    tier: MatchTier,
    rule: Option<&'static str>,
    subject: String,
}

/// Classify both forms of a resolved candidate.
///
/// `directory` enables the sensitive-directory tier (search tool paths).
#[must_use]
pub fn classify(pair: &ResolvedPathPair, directory: bool) -> Classification {
    classify_with(&RULES, pair, directory)
}

/// [`classify`] against an explicit rule set.
#[must_use]
pub fn classify_with(rules: &RuleSet, pair: &ResolvedPathPair, directory: bool) -> Classification {
    let forms: SmallVec<[(&str, PathForm); 2]> = if pair.is_split() {
        smallvec![
            (pair.original.as_str(), PathForm::Original),
            (pair.resolved.as_str(), PathForm::Resolved),
        ]
    } else {
        smallvec![(pair.original.as_str(), PathForm::Path)]
    };

    for (path, form) in forms {
        if let Some(hit) = check_path(rules, path, directory) {
            let symlink_bypass = form == PathForm::Resolved && pair.redirected;
            return Classification::Sensitive(build_match(hit, path, form, symlink_bypass));
        }
    }
    Classification::NotSensitive
}

/// Classify a search glob without touching the filesystem.
///
/// The regular tiers run first so the reason names the specific file class;
/// a bare heuristic hit (e.g. `*secret*`) is still sensitive.
#[must_use]
pub fn classify_glob(glob: &str) -> Classification {
    classify_glob_with(&RULES, glob)
}

/// [`classify_glob`] against an explicit rule set.
#[must_use]
pub fn classify_glob_with(rules: &RuleSet, glob: &str) -> Classification {
    if let Some(hit) = check_path(rules, glob, false) {
        return Classification::Sensitive(build_match(hit, glob, PathForm::Glob, false));
    }
    match rules.glob_heuristic_hit(glob) {
        Some(needle) => Classification::Sensitive(build_match(
            RuleHit {
                tier: MatchTier::GlobHeuristic,
                rule: Some(needle),
                subject: needle.to_string(),
            },
            glob,
            PathForm::Glob,
            false,
        )),
        None => Classification::NotSensitive,
    }
}

/// The fail-closed match for a path that could not be resolved.
#[must_use]
pub fn unresolvable(failure: &ResolveFailure) -> SensitiveMatch {
    SensitiveMatch {
        reason: format!(
            "Blocked: path '{}' could not be resolved, fail-closed ({})",
            failure.path, failure.source
        ),
        matched_path: failure.path.clone(),
        tier: MatchTier::Unresolvable,
        rule: None,
        form: PathForm::Path,
        symlink_bypass: false,
    }
}

fn check_path(rules: &RuleSet, path: &str, directory: bool) -> Option<RuleHit> {
    let path_lower = path.to_lowercase().replace('\\', "/");
    let filename = path_lower.rsplit('/').next().unwrap_or_default();

    if rules.exact_names.contains(filename) {
        return Some(RuleHit {
            tier: MatchTier::ExactName,
            rule: None,
            subject: filename.to_string(),
        });
    }

    if let Some(pattern) = rules.filename_patterns.iter().find(|p| p.matches(filename)) {
        return Some(RuleHit {
            tier: MatchTier::FilenamePattern,
            rule: Some(pattern.name),
            subject: filename.to_string(),
        });
    }

    if let Some(pattern) = rules.path_patterns.iter().find(|p| p.matches(&path_lower)) {
        return Some(RuleHit {
            tier: MatchTier::PathPattern,
            rule: Some(pattern.name),
            subject: filename.to_string(),
        });
    }

    if directory {
        if let Some(pattern) = rules
            .directory_patterns
            .iter()
            .find(|p| p.matches(&path_lower))
        {
            return Some(RuleHit {
                tier: MatchTier::DirectoryPattern,
                rule: Some(pattern.name),
                subject: filename.to_string(),
            });
        }
    }

    None
}

fn build_match(hit: RuleHit, path: &str, form: PathForm, symlink_bypass: bool) -> SensitiveMatch {
    let where_ = format!("{}: {path}", form.describe());
    let reason = match hit.tier {
        MatchTier::ExactName => {
            format!("Blocked: '{}' is a sensitive file ({where_})", hit.subject)
        }
        MatchTier::FilenamePattern => format!(
            "Blocked: '{}' matches sensitive file pattern ({where_})",
            hit.subject
        ),
        MatchTier::PathPattern => format!("Blocked: path matches sensitive pattern ({where_})"),
        MatchTier::DirectoryPattern => {
            format!("Blocked: '{}' is a sensitive directory ({where_})", hit.subject)
        }
        MatchTier::GlobHeuristic => format!(
            "Blocked: search glob targets sensitive files, contains '{}' ({where_})",
            hit.subject
        ),
        MatchTier::Unresolvable => format!("Blocked: path could not be resolved ({where_})"),
    };

    SensitiveMatch {
        reason,
        matched_path: path.to_string(),
        tier: hit.tier,
        rule: hit.rule,
        form,
        symlink_bypass,
    }
}
