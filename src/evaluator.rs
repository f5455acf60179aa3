//! Shared request evaluator for hook mode and the `check` subcommand.
//!
//! # Architecture
//!
//! For one [`ToolInvocation`] the evaluator:
//!
//! 1. extracts candidate paths for the tool ([`crate::tools::extract`]);
//! 2. resolves each non-glob candidate to its original/resolved pair;
//! 3. classifies the pair (or the glob) against the static rules;
//! 4. stops at the first sensitive candidate.
//!
//! A candidate that cannot be resolved is sensitive. The deadline is checked
//! before each resolution, so a slow filesystem surfaces as
//! [`GuardError::Timeout`] instead of a late verdict.
//!
//! The evaluator writes nothing. The audit events a decision implies are
//! returned by [`Evaluation::audit_events`] for the caller to record.
//!
//! # Example
//!
//! ```
//! use sensitive_path_guard::evaluator::{Decision, evaluate};
//! use sensitive_path_guard::timeout::Deadline;
//! use sensitive_path_guard::tools::ToolInvocation;
//! use std::time::Duration;
//!
//! let invocation = ToolInvocation::new(
//!     "Read",
//!     Some(serde_json::json!({"file_path": "/home/user/.aws/credentials"})),
//! );
//! let evaluation = evaluate(&invocation, &Deadline::new(Duration::from_secs(10))).unwrap();
//! assert!(matches!(evaluation.decision, Decision::Block { .. }));
//! ```

use crate::audit::AuditEvent;
use crate::classify::{self, Classification, MatchTier, SensitiveMatch};
use crate::error::GuardError;
use crate::resolve::{self, ResolveFailure, ResolvedPathPair};
use crate::timeout::Deadline;
use crate::tools::{CandidatePath, ToolInvocation};
use std::path::Path;

/// Guidance appended to every block message shown to the agent.
pub const REMEDIATION: &str = "\
This hook prevents access to files that commonly hold secrets:
  - API keys and application secrets (.env, credentials.json, secrets.json)
  - Private keys and certificates (*.pem, *.key, id_rsa, id_ed25519)
  - Cloud and cluster credentials (.aws/credentials, .kube/config)
  - Package registry tokens (.npmrc, .pypirc, .netrc)

Symlinks are followed: both the requested path and its target are checked.

If you need a value from one of these files:
  1. Read it from an environment variable instead of the file
  2. Ask the user for the specific, non-sensitive value you need
  3. Use `env-safe` to inspect .env files with values masked";

/// Verdict for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Block {
        /// Bare reason, as written to the audit log.
        reason: String,
    },
}

impl Decision {
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Allow => None,
            Self::Block { reason } => Some(reason),
        }
    }
}

/// The candidate that caused a block and what it matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub candidate: CandidatePath,
    pub matched: SensitiveMatch,
}

/// Outcome of evaluating one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// Tool name as the host sent it.
    pub tool_name: String,
    pub decision: Decision,
    /// Present exactly when the decision is [`Decision::Block`].
    pub finding: Option<Finding>,
    /// Number of candidates examined.
    pub candidates_checked: usize,
}

impl Evaluation {
    fn allowed(tool_name: &str, candidates_checked: usize) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            decision: Decision::Allow,
            finding: None,
            candidates_checked,
        }
    }

    fn blocked(tool_name: &str, finding: Finding, candidates_checked: usize) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            decision: Decision::Block {
                reason: finding.matched.reason.clone(),
            },
            finding: Some(finding),
            candidates_checked,
        }
    }

    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        self.decision.is_allowed()
    }

    /// Message shown to the agent: the reason followed by [`REMEDIATION`].
    #[must_use]
    pub fn deny_message(&self) -> Option<String> {
        self.decision.reason().map(format_block_message)
    }

    /// Events to record for this outcome, in write order.
    ///
    /// - allow: none
    /// - block on a rule: `SYMLINK_BYPASS_ATTEMPT` (when the link target was the
    ///   only sensitive form), `SECRET_ACCESS_ATTEMPT`, `HOOK_DENY`
    /// - block on an unresolvable path: `HOOK_DENY`
    #[must_use]
    pub fn audit_events(&self) -> Vec<AuditEvent> {
        let Some(finding) = &self.finding else {
            return Vec::new();
        };
        let requested = finding.candidate.path.as_str();
        let matched = &finding.matched;

        let mut events = Vec::with_capacity(3);
        if matched.symlink_bypass {
            events.push(AuditEvent::symlink_bypass_attempt(
                requested,
                &matched.matched_path,
            ));
        }
        if matched.tier != MatchTier::Unresolvable {
            events.push(AuditEvent::secret_access_attempt(&self.tool_name, requested));
        }
        events.push(AuditEvent::hook_deny(
            &self.tool_name,
            Some(requested),
            &matched.reason,
        ));
        events
    }
}

/// Reason plus remediation guidance.
#[must_use]
pub fn format_block_message(reason: &str) -> String {
    format!("{reason}\n\n{REMEDIATION}")
}

/// Evaluate `invocation`, resolving relative paths against the process cwd.
///
/// # Errors
///
/// [`GuardError::Timeout`] when `deadline` passes before every candidate
/// has been examined.
pub fn evaluate(invocation: &ToolInvocation, deadline: &Deadline) -> Result<Evaluation, GuardError> {
    evaluate_with(invocation, deadline, resolve::resolve)
}

/// Like [`evaluate`], resolving relative paths against `cwd`.
///
/// # Errors
///
/// See [`evaluate`].
pub fn evaluate_in(
    invocation: &ToolInvocation,
    deadline: &Deadline,
    cwd: &Path,
) -> Result<Evaluation, GuardError> {
    evaluate_with(invocation, deadline, |path| resolve::resolve_from(path, cwd))
}

fn evaluate_with<R>(
    invocation: &ToolInvocation,
    deadline: &Deadline,
    resolver: R,
) -> Result<Evaluation, GuardError>
where
    R: Fn(&str) -> Result<ResolvedPathPair, ResolveFailure>,
{
    deadline.check()?;

    let candidates = invocation.candidates();
    let mut checked = 0;

    for candidate in candidates {
        deadline.check()?;
        checked += 1;

        let classification = if candidate.is_glob() {
            classify::classify_glob(&candidate.path)
        } else {
            match resolver(&candidate.path) {
                Ok(pair) => classify::classify(&pair, candidate.directory),
                Err(failure) => {
                    tracing::debug!(error = %failure, "candidate unresolvable");
                    Classification::Sensitive(classify::unresolvable(&failure))
                }
            }
        };

        if let Classification::Sensitive(matched) = classification {
            tracing::debug!(
                tool = %invocation.tool_name,
                tier = matched.tier.label(),
                rule = matched.rule.unwrap_or("-"),
                param = candidate.origin.param(),
                "sensitive candidate"
            );
            let finding = Finding { candidate, matched };
            return Ok(Evaluation::blocked(&invocation.tool_name, finding, checked));
        }
    }

    Ok(Evaluation::allowed(&invocation.tool_name, checked))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::EventKind;
    use serde_json::{Value, json};
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    fn workspace() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        (dir, root)
    }

    fn run(root: &Path, tool: &str, input: Value) -> Evaluation {
        let invocation = ToolInvocation::new(tool, Some(input));
        evaluate_in(&invocation, &Deadline::new(Duration::from_secs(10)), root).unwrap()
    }

    fn kinds(evaluation: &Evaluation) -> Vec<EventKind> {
        evaluation.audit_events().iter().map(|e| e.kind).collect()
    }

    #[test]
    fn ordinary_file_is_allowed_without_events() {
        let (_dir, root) = workspace();
        let evaluation = run(&root, "Read", json!({"file_path": root.join("notes.txt")}));
        assert!(evaluation.is_allowed());
        assert!(evaluation.audit_events().is_empty());
        assert_eq!(evaluation.candidates_checked, 1);
    }

    #[test]
    fn dotenv_read_is_blocked() {
        let (_dir, root) = workspace();
        let evaluation = run(&root, "Read", json!({"file_path": root.join(".env")}));
        let reason = evaluation.decision.reason().unwrap();
        assert!(reason.contains(".env"));
        assert_eq!(
            kinds(&evaluation),
            vec![EventKind::SecretAccessAttempt, EventKind::HookDeny]
        );
    }

    #[test]
    fn relative_write_to_aws_credentials_is_blocked() {
        let (_dir, root) = workspace();
        let evaluation = run(&root, "Write", json!({"file_path": ".aws/credentials", "content": "x"}));
        assert!(!evaluation.is_allowed());
    }

    #[test]
    fn ungated_tool_is_allowed() {
        let (_dir, root) = workspace();
        let evaluation = run(&root, "Bash", json!({"command": "cat .env"}));
        assert!(evaluation.is_allowed());
        assert_eq!(evaluation.candidates_checked, 0);
    }

    #[test]
    fn grep_in_ssh_directory_is_blocked() {
        let (_dir, root) = workspace();
        let evaluation = run(&root, "Grep", json!({"pattern": "x", "path": root.join(".ssh")}));
        let finding = evaluation.finding.unwrap();
        assert_eq!(finding.matched.tier, MatchTier::DirectoryPattern);
    }

    #[test]
    fn grep_sensitive_glob_is_blocked() {
        let (_dir, root) = workspace();
        let evaluation = run(&root, "Grep", json!({"pattern": "x", "path": ".", "glob": "**/.env"}));
        let reason = evaluation.decision.reason().unwrap();
        assert!(reason.contains("**/.env"));
    }

    #[test]
    fn deny_message_carries_remediation_but_reason_does_not() {
        let (_dir, root) = workspace();
        let evaluation = run(&root, "Read", json!({"file_path": root.join("id_rsa")}));
        let message = evaluation.deny_message().unwrap();
        assert!(message.starts_with(evaluation.decision.reason().unwrap()));
        assert!(message.contains("env-safe"));
        assert!(!evaluation.decision.reason().unwrap().contains("env-safe"));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_to_private_key_is_a_bypass_attempt() {
        let (_dir, root) = workspace();
        let ssh = root.join(".ssh");
        std::fs::create_dir(&ssh).unwrap();
        std::fs::write(ssh.join("id_rsa"), "key").unwrap();
        std::os::unix::fs::symlink(ssh.join("id_rsa"), root.join("notes.txt")).unwrap();

        let evaluation = run(&root, "Read", json!({"file_path": root.join("notes.txt")}));
        let finding = evaluation.finding.clone().unwrap();
        assert!(finding.matched.symlink_bypass);
        assert!(finding.matched.reason.contains(&*ssh.join("id_rsa").to_string_lossy()));
        assert_eq!(
            kinds(&evaluation),
            vec![
                EventKind::SymlinkBypassAttempt,
                EventKind::SecretAccessAttempt,
                EventKind::HookDeny
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn unresolvable_path_is_blocked_with_deny_only() {
        let (_dir, root) = workspace();
        std::os::unix::fs::symlink(root.join("b"), root.join("a")).unwrap();
        std::os::unix::fs::symlink(root.join("a"), root.join("b")).unwrap();

        let evaluation = run(&root, "Read", json!({"file_path": root.join("a")}));
        let finding = evaluation.finding.clone().unwrap();
        assert_eq!(finding.matched.tier, MatchTier::Unresolvable);
        assert!(finding.matched.reason.contains("fail-closed"));
        assert_eq!(kinds(&evaluation), vec![EventKind::HookDeny]);
    }

    #[test]
    fn expired_deadline_is_a_timeout() {
        let invocation = ToolInvocation::new("Read", Some(json!({"file_path": "/tmp/x"})));
        let result = evaluate(&invocation, &Deadline::new(Duration::ZERO));
        assert!(matches!(result, Err(GuardError::Timeout)));
    }

    #[test]
    fn evaluation_is_deterministic() {
        let (_dir, root) = workspace();
        let input = json!({"file_path": root.join("server.pem")});
        assert_eq!(run(&root, "Edit", input.clone()), run(&root, "Edit", input));
    }
}
