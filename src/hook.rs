//! Claude Code hook protocol handling.
//!
//! This module handles the JSON input/output for the Claude Code `PreToolUse`
//! hook: it reads the request, runs the bounded evaluation, records audit
//! events and formats the single JSON response. Every failure along the way
//! becomes a deny payload; the process always exits 0.

use crate::audit::{AuditEvent, AuditLogger};
use crate::config::Config;
use crate::error::GuardError;
use crate::evaluator::{self, Decision};
use crate::timeout::run_bounded;
use crate::tools::ToolInvocation;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::io::{self, IsTerminal, Read, Write};

/// Tool name recorded when the request never told us which tool it was.
pub const UNKNOWN_TOOL: &str = "unknown";

const TIMEOUT_REASON: &str = "File access hook timed out (fail-closed).\n\n\
The hook could not finish checking this request within its time limit. \
Access is denied whenever the hook cannot verify that a path is safe.\n\n\
This can happen with:\n  \
  - Very deep symlink chains\n  \
  - Network-mounted filesystems\n  \
  - A system under heavy load";

const INTERNAL_ERROR_REASON: &str = "File access hook hit an internal error (fail-closed).\n\n\
Access is denied whenever the hook cannot verify that a path is safe. \
This is not a judgement about the requested file. \
Please report this if it keeps happening.";

/// Input structure from Claude Code's `PreToolUse` hook.
#[derive(Debug, Default, Deserialize)]
pub struct HookInput {
    /// The name of the tool being invoked (e.g., "Read", "Grep").
    #[serde(default)]
    pub tool_name: Option<String>,

    /// Tool-specific input parameters.
    #[serde(default)]
    pub tool_input: Option<serde_json::Value>,
}

impl HookInput {
    #[must_use]
    pub fn into_invocation(self) -> ToolInvocation {
        ToolInvocation::new(self.tool_name.unwrap_or_default(), self.tool_input)
    }
}

/// Output structure for allowing a request.
#[derive(Debug, Serialize)]
pub struct ApproveOutput {
    pub decision: &'static str,
}

/// Output structure for denying a request.
#[derive(Debug, Serialize)]
pub struct HookOutput<'a> {
    /// Hook-specific output with the decision.
    #[serde(rename = "hookSpecificOutput")]
    pub hook_specific_output: HookSpecificOutput<'a>,
}

/// Hook-specific output with decision and reason.
#[derive(Debug, Serialize)]
pub struct HookSpecificOutput<'a> {
    /// Always "`PreToolUse`" for this hook.
    #[serde(rename = "hookEventName")]
    pub hook_event_name: &'static str,

    /// Always "deny"; allows use [`ApproveOutput`].
    #[serde(rename = "permissionDecision")]
    pub permission_decision: &'static str,

    /// Human-readable explanation of the decision.
    #[serde(rename = "permissionDecisionReason")]
    pub permission_decision_reason: Cow<'a, str>,
}

/// Why a request was denied without a content judgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailClosedCause {
    Timeout,
    /// Carries the parser's message (never a filesystem path).
    MalformedRequest(String),
    Internal,
}

impl FailClosedCause {
    #[must_use]
    pub fn reason(&self) -> Cow<'static, str> {
        match self {
            Self::Timeout => Cow::Borrowed(TIMEOUT_REASON),
            Self::MalformedRequest(detail) => Cow::Owned(format!(
                "File access hook received an invalid request (fail-closed): {detail}\n\n\
                 Access is denied whenever the hook cannot parse the request."
            )),
            Self::Internal => Cow::Borrowed(INTERNAL_ERROR_REASON),
        }
    }
}

/// Result of processing a hook request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookResponse {
    /// Request may proceed.
    Allow,
    /// A candidate path is sensitive. `message` already includes remediation.
    Block { message: String },
    /// Infrastructure failure; denied without a content judgement.
    Deny(FailClosedCause),
}

impl HookResponse {
    #[must_use]
    pub const fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// The text shown to the agent, if denied.
    #[must_use]
    pub fn reason(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Allow => None,
            Self::Block { message } => Some(Cow::Borrowed(message)),
            Self::Deny(cause) => Some(cause.reason()),
        }
    }

    /// Serialize to the single-line JSON payload the host expects.
    #[must_use]
    pub fn to_json(&self) -> String {
        let rendered = match self.reason() {
            None => serde_json::to_string(&ApproveOutput { decision: "approve" }),
            Some(reason) => serde_json::to_string(&HookOutput {
                hook_specific_output: HookSpecificOutput {
                    hook_event_name: "PreToolUse",
                    permission_decision: "deny",
                    permission_decision_reason: reason,
                },
            }),
        };
        // Serializing these shapes cannot fail; keep a deny as the last resort.
        rendered.unwrap_or_else(|_| {
            r#"{"hookSpecificOutput":{"hookEventName":"PreToolUse","permissionDecision":"deny","permissionDecisionReason":"File access hook hit an internal error (fail-closed)."}}"#
                .to_string()
        })
    }
}

/// Read hook input from stdin, capped at `max_bytes`.
///
/// # Errors
///
/// Returns [`GuardError::Io`] if stdin cannot be read,
/// [`GuardError::InputTooLarge`] if the input exceeds `max_bytes`, or
/// [`GuardError::InvalidUtf8`] if it is not UTF-8.
pub fn read_hook_input(max_bytes: usize) -> Result<String, GuardError> {
    read_capped(io::stdin().lock(), max_bytes)
}

fn read_capped(reader: impl Read, max_bytes: usize) -> Result<String, GuardError> {
    let mut input = Vec::with_capacity(256);
    // Read up to limit + 1 to detect overflow
    let mut handle = reader.take(max_bytes as u64 + 1);
    handle.read_to_end(&mut input).map_err(GuardError::Io)?;

    if input.len() > max_bytes {
        return Err(GuardError::InputTooLarge(input.len()));
    }
    String::from_utf8(input).map_err(GuardError::InvalidUtf8)
}

/// Decide one request end to end.
///
/// Audit events are appended through `logger`; whether they could be written
/// has no influence on the response.
pub fn run_hook(
    config: &Config,
    logger: &AuditLogger,
    raw_input: Result<String, GuardError>,
) -> HookResponse {
    let parsed = raw_input.and_then(|raw| {
        serde_json::from_str::<HookInput>(&raw).map_err(GuardError::from)
    });
    let input = match parsed {
        Ok(input) => input,
        Err(e) => return fail_closed(config, logger, UNKNOWN_TOOL, e),
    };

    let invocation = input.into_invocation();
    let tool = if invocation.tool_name.is_empty() {
        UNKNOWN_TOOL.to_string()
    } else {
        invocation.tool_name.clone()
    };

    let outcome = run_bounded(config.deadline, move |deadline| {
        evaluator::evaluate(&invocation, &deadline)
    });

    match outcome {
        Ok(evaluation) => {
            logger.append_all(&evaluation.audit_events());
            match evaluation.decision {
                Decision::Allow => HookResponse::Allow,
                Decision::Block { ref reason } => HookResponse::Block {
                    message: evaluator::format_block_message(reason),
                },
            }
        }
        Err(e) => fail_closed(config, logger, &tool, e),
    }
}

fn fail_closed(config: &Config, logger: &AuditLogger, tool: &str, error: GuardError) -> HookResponse {
    tracing::debug!(code = error.code(), error = %error, tool, "failing closed");

    match error {
        GuardError::Timeout => {
            logger.append(&AuditEvent::hook_timeout(tool, config.deadline.as_secs()));
            HookResponse::Deny(FailClosedCause::Timeout)
        }
        e if e.is_malformed_request() => {
            let detail = e.to_string();
            logger.append(&AuditEvent::hook_error(tool, &detail));
            HookResponse::Deny(FailClosedCause::MalformedRequest(detail))
        }
        e => {
            logger.append(&AuditEvent::hook_error(tool, &format!("{}: {e}", e.code())));
            HookResponse::Deny(FailClosedCause::Internal)
        }
    }
}

/// Write the response as one line on stdout.
pub fn write_response(response: &HookResponse) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let _ = writeln!(handle, "{}", response.to_json());
    let _ = handle.flush();
}

/// Configure colored output based on TTY detection.
pub fn configure_colors() {
    if std::env::var_os("NO_COLOR").is_some() || std::env::var_os("SPG_NO_COLOR").is_some() {
        colored::control::set_override(false);
        return;
    }

    if !io::stdout().is_terminal() {
        colored::control::set_override(false);
    }
}
