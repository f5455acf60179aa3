//! Process configuration.
//!
//! All environment lookups happen once, in [`Config::from_env`]. The resulting
//! value is passed by reference to the audit logger, the timeout guard and the
//! hook runner; nothing downstream reads the environment ad hoc.

use std::path::PathBuf;
use std::time::Duration;

/// Root for the default log directory.
pub const ENV_HOME: &str = "HAL9000_HOME";
/// Overrides the log directory directly.
pub const ENV_LOGS_DIR: &str = "HAL9000_LOGS_DIR";
/// Explicit worker identity stamped into audit lines.
pub const ENV_WORKER_ID: &str = "WORKER_ID";
/// Hostname (Docker sets this to the container id).
pub const ENV_HOSTNAME: &str = "HOSTNAME";
/// Rotation threshold in bytes.
pub const ENV_MAX_LOG_SIZE: &str = "AUDIT_LOG_MAX_SIZE";
/// Number of rotated files to retain.
pub const ENV_MAX_LOG_FILES: &str = "AUDIT_LOG_MAX_FILES";
/// Enables diagnostic output on stderr.
pub const ENV_DEBUG: &str = "HAL9000_DEBUG";
/// Evaluation deadline in whole seconds.
pub const ENV_HOOK_TIMEOUT: &str = "HAL9000_HOOK_TIMEOUT";

pub const DEFAULT_HOME: &str = "/root/.hal9000";
pub const SECURITY_LOG_FILE: &str = "security.log";
pub const DEFAULT_MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_MAX_LOG_FILES: u32 = 5;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_INPUT_BYTES: usize = 1024 * 1024;

const CGROUP_PATH: &str = "/proc/self/cgroup";
const SHORT_ID_LEN: usize = 12;

/// Runtime configuration, constructed once at process start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory holding `security.log` and its rotations.
    pub logs_dir: PathBuf,
    /// Rotate once the log reaches this many bytes.
    pub max_log_size: u64,
    /// Rotated generations to keep (`security.log.1` ..= `.N`).
    pub max_log_files: u32,
    /// Identity stamped into every audit line.
    pub worker_id: String,
    /// Hard wall-clock bound for one evaluation.
    pub deadline: Duration,
    /// Diagnostic output on stderr.
    pub debug: bool,
    /// Cap on the hook request size.
    pub max_input_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logs_dir: PathBuf::from(DEFAULT_HOME).join("logs"),
            max_log_size: DEFAULT_MAX_LOG_SIZE,
            max_log_files: DEFAULT_MAX_LOG_FILES,
            worker_id: "unknown".to_string(),
            deadline: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            debug: false,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
        }
    }
}

impl Config {
    /// Build the configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup_with_cgroup(
            |key| std::env::var(key).ok(),
            || std::fs::read_to_string(CGROUP_PATH).ok(),
        )
    }

    /// Build the configuration from an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self::from_lookup_with_cgroup(lookup, || None)
    }

    fn from_lookup_with_cgroup(
        lookup: impl Fn(&str) -> Option<String>,
        cgroup: impl FnOnce() -> Option<String>,
    ) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let logs_dir = get(ENV_LOGS_DIR).map_or_else(
            || {
                let home = get(ENV_HOME).unwrap_or_else(|| DEFAULT_HOME.to_string());
                PathBuf::from(home).join("logs")
            },
            PathBuf::from,
        );

        let worker_id = resolve_worker_id(
            get(ENV_WORKER_ID).as_deref(),
            get(ENV_HOSTNAME).as_deref(),
            cgroup,
        );

        Self {
            logs_dir,
            max_log_size: parse_or(get(ENV_MAX_LOG_SIZE), ENV_MAX_LOG_SIZE, DEFAULT_MAX_LOG_SIZE),
            max_log_files: parse_or(
                get(ENV_MAX_LOG_FILES),
                ENV_MAX_LOG_FILES,
                DEFAULT_MAX_LOG_FILES,
            ),
            worker_id,
            deadline: Duration::from_secs(parse_or(
                get(ENV_HOOK_TIMEOUT),
                ENV_HOOK_TIMEOUT,
                DEFAULT_TIMEOUT_SECS,
            )),
            debug: get(ENV_DEBUG).is_some(),
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
        }
    }

    /// Path of the active security log.
    #[must_use]
    pub fn security_log_path(&self) -> PathBuf {
        self.logs_dir.join(SECURITY_LOG_FILE)
    }
}

fn parse_or<T: std::str::FromStr + Copy>(raw: Option<String>, key: &str, default: T) -> T {
    match raw {
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            tracing::debug!(key, value = %value, "ignoring unparseable setting");
            default
        }),
        None => default,
    }
}

/// Work out the identity stamped into audit lines.
///
/// An explicit `WORKER_ID` wins, then the hostname (Docker sets it to the short
/// container id). Without either, the container id is recovered from the cgroup
/// table, which is only read in that case.
#[must_use]
pub fn resolve_worker_id(
    worker_id: Option<&str>,
    hostname: Option<&str>,
    cgroup: impl FnOnce() -> Option<String>,
) -> String {
    if let Some(id) = worker_id.filter(|id| !id.is_empty()) {
        return id.to_string();
    }
    if let Some(host) = hostname.filter(|h| !h.is_empty()) {
        return host.to_string();
    }
    cgroup()
        .as_deref()
        .and_then(container_id_from_cgroup)
        .map_or_else(|| "unknown".to_string(), |cid| format!("unknown:{cid}"))
}

fn short_id(s: &str) -> &str {
    s.char_indices()
        .nth(SHORT_ID_LEN)
        .map_or(s, |(idx, _)| &s[..idx])
}

/// Extract a short container id from `/proc/self/cgroup` content.
#[must_use]
pub fn container_id_from_cgroup(content: &str) -> Option<String> {
    for line in content.lines() {
        if !(line.contains("docker") || line.contains("containerd")) {
            continue;
        }
        let parts: Vec<&str> = line.trim().split('/').collect();
        for (i, part) in parts.iter().enumerate() {
            if matches!(*part, "docker" | "containerd") {
                if let Some(next) = parts.get(i + 1).filter(|p| p.len() >= SHORT_ID_LEN) {
                    return Some(short_id(next).to_string());
                }
            }
            if part.len() == 64 && part.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
                return Some(part[..SHORT_ID_LEN].to_string());
            }
        }
    }
    None
}
