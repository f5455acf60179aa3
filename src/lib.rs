//! Sensitive path guard for Claude Code.
//!
//! Intercepts file-oriented tool calls (`Read`, `Write`, `Edit`, `Grep`,
//! `NotebookEdit`) before they run and denies access to secrets, keys and
//! credentials. Both the requested path and its symlink-resolved target are
//! classified, so a harmless-looking link cannot smuggle out `~/.ssh/id_rsa`.
//!
//! Every failure mode (timeout, malformed input, internal error, unresolvable
//! path) denies. Denials are recorded in a rotating, lock-protected audit log
//! shared by all concurrently running hook processes.
//!
//! # Pipeline
//!
//! ```text
//! stdin JSON ──► hook ──► timeout::run_bounded ──► evaluator
//!                 │                                   │
//!                 │                tools::extract ◄───┤
//!                 │              resolve::resolve ◄───┤
//!                 │             classify::classify ◄──┘
//!                 ▼
//!              audit ──► <logs dir>/security.log
//! ```

#![forbid(unsafe_code)]

pub mod audit;
pub mod classify;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod hook;
pub mod logging;
pub mod resolve;
pub mod rules;
pub mod timeout;
pub mod tools;

pub use audit::{AuditEvent, AuditLogger, EventKind, Severity};
pub use classify::{Classification, MatchTier, SensitiveMatch};
pub use config::Config;
pub use error::GuardError;
pub use evaluator::{Decision, Evaluation, evaluate};
pub use hook::{HookInput, HookResponse, run_hook};
pub use resolve::ResolvedPathPair;
pub use tools::{CandidateOrigin, CandidatePath, ToolInvocation, ToolKind};
