//! Security audit log.
//!
//! Append-only, line-oriented, shared between every worker that mounts the
//! same log directory. One event per line:
//!
//! ```text
//! 2026-01-31T12:00:00Z | WARN | HOOK_DENY | worker=abc123 tool=Read file="/w/.env" reason="..."
//! ```
//!
//! # Guarantees
//!
//! - Every value that can carry caller-controlled text goes through
//!   [`sanitize_log_value`], so one event is always exactly one line and the
//!   ` | ` field separators cannot be forged.
//! - Appends hold an exclusive advisory lock for the duration of a single
//!   `write_all`, so concurrent writers never interleave inside a line.
//! - The file is created `0640` and re-chmodded after each write.
//! - Logging never fails the caller: [`AuditLogger::append`] reports success
//!   as a `bool` and only mentions failures through `tracing`.
//!
//! # Rotation
//!
//! Before each append, a log at or over the size limit is shifted to
//! `security.log.1`, older generations move up by one, and the generation past
//! `max_log_files` is deleted. Concurrent rotations may race; the loser's
//! rename/delete errors are ignored.

use crate::config::Config;
use crate::tools::ToolKind;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use regex::Regex;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

/// Longest command text kept in a `COMMAND_BLOCKED` line.
pub const MAX_COMMAND_CHARS: usize = 200;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").expect("ANSI escape pattern should compile")
});

/// Event severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warn,
    Error,
    Critical,
}

impl Severity {
    pub const ALL: [Self; 4] = [Self::Info, Self::Warn, Self::Error, Self::Critical];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|sev| sev.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown severity '{s}' (expected INFO, WARN, ERROR or CRITICAL)"))
    }
}

/// Kinds of security event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    HookDeny,
    HookTimeout,
    HookError,
    SecretAccessAttempt,
    SymlinkBypassAttempt,
    SuspiciousActivity,
    CommandBlocked,
}

impl EventKind {
    pub const ALL: [Self; 7] = [
        Self::HookDeny,
        Self::HookTimeout,
        Self::HookError,
        Self::SecretAccessAttempt,
        Self::SymlinkBypassAttempt,
        Self::SuspiciousActivity,
        Self::CommandBlocked,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::HookDeny => "HOOK_DENY",
            Self::HookTimeout => "HOOK_TIMEOUT",
            Self::HookError => "HOOK_ERROR",
            Self::SecretAccessAttempt => "SECRET_ACCESS_ATTEMPT",
            Self::SymlinkBypassAttempt => "SYMLINK_BYPASS_ATTEMPT",
            Self::SuspiciousActivity => "SUSPICIOUS_ACTIVITY",
            Self::CommandBlocked => "COMMAND_BLOCKED",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown event type '{s}'"))
    }
}

/// One `key=value` detail field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailValue {
    /// Written unquoted after sanitization (tool names, activity types).
    Bare(String),
    /// Written in double quotes after sanitization.
    Quoted(String),
    Number(u64),
}

impl DetailValue {
    fn write_to(&self, out: &mut String) {
        match self {
            Self::Bare(s) => out.push_str(&sanitize_log_value(s)),
            Self::Quoted(s) => {
                out.push('"');
                out.push_str(&sanitize_log_value(s));
                out.push('"');
            }
            Self::Number(n) => out.push_str(&n.to_string()),
        }
    }
}

fn tool_value(tool: &str) -> DetailValue {
    match ToolKind::from_name(tool) {
        ToolKind::Other => DetailValue::Quoted(tool.to_string()),
        kind => DetailValue::Bare(kind.as_str().to_string()),
    }
}

/// A security event ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub kind: EventKind,
    pub details: Vec<(&'static str, DetailValue)>,
}

impl AuditEvent {
    #[must_use]
    pub fn new(kind: EventKind, severity: Severity) -> Self {
        Self {
            timestamp: Utc::now(),
            severity,
            kind,
            details: Vec::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, key: &'static str, value: DetailValue) -> Self {
        self.details.push((key, value));
        self
    }

    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// A tool request was refused. Empty `file`/`reason` are omitted.
    #[must_use]
    pub fn hook_deny(tool: &str, file: Option<&str>, reason: &str) -> Self {
        let mut event = Self::new(EventKind::HookDeny, Severity::Warn).with("tool", tool_value(tool));
        if let Some(file) = file.filter(|f| !f.is_empty()) {
            event = event.with("file", DetailValue::Quoted(file.to_string()));
        }
        if !reason.is_empty() {
            event = event.with("reason", DetailValue::Quoted(reason.to_string()));
        }
        event
    }

    /// Evaluation ran out of time and the request was denied.
    #[must_use]
    pub fn hook_timeout(tool: &str, timeout_seconds: u64) -> Self {
        Self::new(EventKind::HookTimeout, Severity::Warn)
            .with("tool", tool_value(tool))
            .with("timeout_seconds", DetailValue::Number(timeout_seconds))
            .with("action", DetailValue::Bare("denied".to_string()))
    }

    /// Evaluation failed and the request was denied.
    #[must_use]
    pub fn hook_error(tool: &str, error: &str) -> Self {
        Self::new(EventKind::HookError, Severity::Error)
            .with("tool", tool_value(tool))
            .with("error", DetailValue::Quoted(error.to_string()))
            .with("action", DetailValue::Bare("denied".to_string()))
    }

    #[must_use]
    pub fn secret_access_attempt(tool: &str, file: &str) -> Self {
        Self::new(EventKind::SecretAccessAttempt, Severity::Warn)
            .with("tool", tool_value(tool))
            .with("file", DetailValue::Quoted(file.to_string()))
    }

    #[must_use]
    pub fn suspicious_activity(activity_type: &str, details: &str) -> Self {
        Self::new(EventKind::SuspiciousActivity, Severity::Error)
            .with("type", DetailValue::Bare(activity_type.to_string()))
            .with("details", DetailValue::Quoted(details.to_string()))
    }

    /// The requested path looked harmless but resolved to a sensitive one.
    #[must_use]
    pub fn symlink_bypass_attempt(original: &str, resolved: &str) -> Self {
        Self::new(EventKind::SymlinkBypassAttempt, Severity::Warn)
            .with("original", DetailValue::Quoted(original.to_string()))
            .with("resolved", DetailValue::Quoted(resolved.to_string()))
    }

    /// A shell command was refused. The command is cut to
    /// [`MAX_COMMAND_CHARS`] characters before sanitization.
    #[must_use]
    pub fn command_blocked(command: &str, reason: &str) -> Self {
        let truncated: String = command.chars().take(MAX_COMMAND_CHARS).collect();
        Self::new(EventKind::CommandBlocked, Severity::Warn)
            .with("command", DetailValue::Quoted(truncated))
            .with("reason", DetailValue::Quoted(reason.to_string()))
    }

    /// Render the full line, newline included.
    #[must_use]
    pub fn format_line(&self, worker_id: &str) -> String {
        let mut line = format!(
            "{} | {} | {} | worker={}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.severity.as_str(),
            self.kind.as_str(),
            sanitize_log_value(worker_id),
        );
        for (key, value) in &self.details {
            line.push(' ');
            line.push_str(key);
            line.push('=');
            value.write_to(&mut line);
        }
        line.push('\n');
        line
    }
}

/// Make `value` safe to embed in a single log line.
///
/// ANSI CSI sequences are stripped; backslash, newline, carriage return, tab,
/// `|` and `"` are backslash-escaped; every other control character is
/// dropped.
#[must_use]
pub fn sanitize_log_value(value: &str) -> String {
    let stripped = ANSI_ESCAPE.replace_all(value, "");
    let mut out = String::with_capacity(stripped.len());
    for ch in stripped.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '|' => out.push_str("\\|"),
            '"' => out.push_str("\\\""),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

/// Appends events to the shared security log.
#[derive(Debug, Clone)]
pub struct AuditLogger {
    path: PathBuf,
    max_size: u64,
    max_files: u32,
    worker_id: String,
}

impl AuditLogger {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            path: config.security_log_path(),
            max_size: config.max_log_size,
            max_files: config.max_log_files,
            worker_id: config.worker_id.clone(),
        }
    }

    /// Path of the active log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `event`. Returns `false` (and never panics) if it could not be
    /// written.
    pub fn append(&self, event: &AuditEvent) -> bool {
        match self.try_append(event) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    event = event.kind.as_str(),
                    error = %e,
                    "security audit log write failed"
                );
                false
            }
        }
    }

    /// Append every event in order; returns how many were written.
    pub fn append_all<'a>(&self, events: impl IntoIterator<Item = &'a AuditEvent>) -> usize {
        events.into_iter().filter(|event| self.append(event)).count()
    }

    /// Fallible append.
    pub fn try_append(&self, event: &AuditEvent) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        self.rotate_if_needed();

        let line = event.format_line(&self.worker_id);
        let mut file = open_locked(&self.path)?;
        file.write_all(line.as_bytes())?;
        drop(file);

        restrict_permissions(&self.path);
        Ok(())
    }

    fn generation(&self, n: u32) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(format!(".{n}"));
        PathBuf::from(name)
    }

    fn rotate_if_needed(&self) {
        let Ok(meta) = fs::metadata(&self.path) else {
            return;
        };
        if meta.len() < self.max_size {
            return;
        }

        tracing::debug!(path = %self.path.display(), size = meta.len(), "rotating security log");

        if self.max_files == 0 {
            ignore_race(fs::remove_file(&self.path), "remove");
            return;
        }

        ignore_race(fs::remove_file(self.generation(self.max_files)), "remove");
        for n in (1..self.max_files).rev() {
            ignore_race(fs::rename(self.generation(n), self.generation(n + 1)), "rename");
        }
        ignore_race(fs::rename(&self.path, self.generation(1)), "rename");
    }

    /// Most recent lines first, optionally filtered.
    #[must_use]
    pub fn recent_events(
        &self,
        count: usize,
        severity: Option<Severity>,
        kind: Option<EventKind>,
    ) -> Vec<String> {
        recent_events(&self.path, count, severity, kind)
    }

    /// Per-severity counts of events at or after `since`.
    #[must_use]
    pub fn count_events(&self, since: DateTime<Utc>, kind: Option<EventKind>) -> EventCounts {
        count_events(&self.path, since, kind)
    }
}

/// A rotation step lost a race with another writer, or the generation did not
/// exist yet.
fn ignore_race(result: io::Result<()>, op: &str) {
    if let Err(e) = result {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::debug!(op, error = %e, "log rotation step skipped");
        }
    }
}

fn open_locked(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o640);
    }
    let file = options.open(path)?;
    file.lock_exclusive()?;
    Ok(file)
}

fn restrict_permissions(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o640)) {
            tracing::debug!(error = %e, "could not restrict security log permissions");
        }
    }
    #[cfg(not(unix))]
    let _ = path;
}

/// Read the last `count` matching lines of the log at `path`, newest first.
///
/// A missing or unreadable log yields an empty list.
#[must_use]
pub fn recent_events(
    path: &Path,
    count: usize,
    severity: Option<Severity>,
    kind: Option<EventKind>,
) -> Vec<String> {
    let Ok(content) = fs::read_to_string(path) else {
        return Vec::new();
    };

    let severity_tag = severity.map(|s| format!("| {} |", s.as_str()));
    let kind_tag = kind.map(|k| format!("| {} |", k.as_str()));

    let matching: Vec<&str> = content
        .lines()
        .filter(|line| severity_tag.as_ref().is_none_or(|tag| line.contains(tag.as_str())))
        .filter(|line| kind_tag.as_ref().is_none_or(|tag| line.contains(tag.as_str())))
        .map(str::trim)
        .collect();

    matching
        .iter()
        .rev()
        .take(count)
        .map(|line| (*line).to_string())
        .collect()
}

/// Event counts by severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventCounts {
    pub info: usize,
    pub warn: usize,
    pub error: usize,
    pub critical: usize,
    /// All counted lines, including any with an unrecognised severity.
    pub total: usize,
}

impl EventCounts {
    #[must_use]
    pub const fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Info => self.info,
            Severity::Warn => self.warn,
            Severity::Error => self.error,
            Severity::Critical => self.critical,
        }
    }
}

/// Count events in the log at `path` stamped at or after `since`.
#[must_use]
pub fn count_events(path: &Path, since: DateTime<Utc>, kind: Option<EventKind>) -> EventCounts {
    let mut counts = EventCounts::default();
    let Ok(content) = fs::read_to_string(path) else {
        return counts;
    };
    // Fixed-width UTC stamps compare correctly as strings.
    let cutoff = since.format(TIMESTAMP_FORMAT).to_string();

    for line in content.lines() {
        let mut fields = line.splitn(4, '|').map(str::trim);
        let (Some(timestamp), Some(severity), Some(event)) =
            (fields.next(), fields.next(), fields.next())
        else {
            continue;
        };
        if timestamp < cutoff.as_str() {
            continue;
        }
        if kind.is_some_and(|k| k.as_str() != event) {
            continue;
        }

        match severity.parse::<Severity>() {
            Ok(Severity::Info) => counts.info += 1,
            Ok(Severity::Warn) => counts.warn += 1,
            Ok(Severity::Error) => counts.error += 1,
            Ok(Severity::Critical) => counts.critical += 1,
            Err(_) => {}
        }
        counts.total += 1;
    }
    counts
}
