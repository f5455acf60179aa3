//! Sensitive path guard for Claude Code.
//!
//! Stops file tools from reading, writing or searching secrets, keys and
//! credentials. This hook runs before Read/Write/Edit/Grep/NotebookEdit and
//! denies requests that touch sensitive paths, following symlinks.
//!
//! Exit behavior (hook mode):
//!   - Exit 0 with JSON {"decision": "approve"} = allow
//!   - Exit 0 with JSON {"hookSpecificOutput": {"permissionDecision": "deny", ...}} = block

#![forbid(unsafe_code)]

use chrono::{DateTime, TimeDelta, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;
use sensitive_path_guard::audit::{AuditLogger, EventKind, Severity};
use sensitive_path_guard::evaluator::{self, Decision};
use sensitive_path_guard::hook;
use sensitive_path_guard::timeout::run_bounded;
use sensitive_path_guard::tools::{ToolInvocation, ToolKind};
use sensitive_path_guard::{Config, logging};
use serde_json::{Map, Value};
use std::process::ExitCode;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "spg", version, about = "Blocks Claude Code file tools from touching secrets")]
struct Cli {
    /// Evaluation deadline in seconds (overrides HAL9000_HOOK_TIMEOUT)
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check whether a tool request for PATH would be blocked
    Check {
        path: String,

        /// Tool to simulate
        #[arg(long, default_value = "Read")]
        tool: String,

        /// Search glob (Grep only)
        #[arg(long)]
        glob: Option<String>,
    },
    /// Inspect the security audit log
    Audit {
        #[command(subcommand)]
        action: AuditCommand,
    },
}

#[derive(Debug, Subcommand)]
enum AuditCommand {
    /// Most recent events, newest first
    Recent {
        #[arg(long, short = 'n', default_value_t = 20)]
        count: usize,
        #[arg(long)]
        severity: Option<Severity>,
        #[arg(long)]
        event: Option<EventKind>,
    },
    /// Event counts by severity over a time window
    Counts {
        #[arg(long, default_value_t = 24)]
        hours: i64,
        #[arg(long)]
        event: Option<EventKind>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(secs) = cli.timeout {
        config.deadline = Duration::from_secs(secs);
    }
    logging::init(&config);

    match cli.command {
        None => run_hook_mode(&config),
        Some(Command::Check { path, tool, glob }) => run_check(&config, &path, &tool, glob),
        Some(Command::Audit { action }) => run_audit(&config, action),
    }
}

fn run_hook_mode(config: &Config) -> ExitCode {
    let logger = AuditLogger::new(config);
    let input = hook::read_hook_input(config.max_input_bytes);
    let response = hook::run_hook(config, &logger, input);
    hook::write_response(&response);
    ExitCode::SUCCESS
}

fn check_invocation(path: &str, tool: &str, glob: Option<String>) -> ToolInvocation {
    let mut input = Map::new();
    let key = match ToolKind::from_name(tool) {
        ToolKind::NotebookEdit => "notebook_path",
        ToolKind::Grep => "path",
        _ => "file_path",
    };
    input.insert(key.to_string(), Value::String(path.to_string()));
    if let Some(glob) = glob {
        input.insert("glob".to_string(), Value::String(glob));
    }
    ToolInvocation::new(tool, Some(Value::Object(input)))
}

fn run_check(config: &Config, path: &str, tool: &str, glob: Option<String>) -> ExitCode {
    hook::configure_colors();

    let invocation = check_invocation(path, tool, glob);
    if !invocation.kind.is_gated() {
        println!("{} {tool} is not a gated tool", "ALLOW".green().bold());
        return ExitCode::SUCCESS;
    }

    let outcome = run_bounded(config.deadline, move |deadline| {
        evaluator::evaluate(&invocation, &deadline)
    });

    match outcome {
        Ok(evaluation) => match &evaluation.decision {
            Decision::Allow => {
                println!(
                    "{} {tool} {path} ({} candidate(s) checked)",
                    "ALLOW".green().bold(),
                    evaluation.candidates_checked
                );
                ExitCode::SUCCESS
            }
            Decision::Block { reason } => {
                println!("{} {reason}", "BLOCK".red().bold());
                if let Some(finding) = &evaluation.finding {
                    println!(
                        "  {} {}  {} {}",
                        "tier:".dimmed(),
                        finding.matched.tier.label(),
                        "rule:".dimmed(),
                        finding.matched.rule.unwrap_or("-")
                    );
                    if finding.matched.symlink_bypass {
                        println!("  {}", "reached through a symlink".yellow());
                    }
                }
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            eprintln!("{} {} ({})", "DENY".red().bold(), e, e.code());
            ExitCode::FAILURE
        }
    }
}

fn run_audit(config: &Config, action: AuditCommand) -> ExitCode {
    hook::configure_colors();
    let logger = AuditLogger::new(config);

    match action {
        AuditCommand::Recent {
            count,
            severity,
            event,
        } => {
            let lines = logger.recent_events(count, severity, event);
            if lines.is_empty() {
                println!("{}", format!("no events in {}", logger.path().display()).dimmed());
            }
            for line in lines {
                println!("{}", colorize_line(&line));
            }
        }
        AuditCommand::Counts { hours, event } => {
            let since = TimeDelta::try_hours(hours.max(0))
                .and_then(|window| Utc::now().checked_sub_signed(window))
                .unwrap_or(DateTime::<Utc>::MIN_UTC);
            let counts = logger.count_events(since, event);
            println!("{} (last {hours}h)", logger.path().display().to_string().bold());
            for severity in Severity::ALL {
                println!("  {:<8} {}", severity.as_str(), counts.get(severity));
            }
            println!("  {:<8} {}", "total", counts.total);
        }
    }
    ExitCode::SUCCESS
}

fn colorize_line(line: &str) -> String {
    let tag = |sev: Severity| format!("| {} |", sev.as_str());
    if line.contains(&tag(Severity::Critical)) || line.contains(&tag(Severity::Error)) {
        line.red().to_string()
    } else if line.contains(&tag(Severity::Warn)) {
        line.yellow().to_string()
    } else {
        line.to_string()
    }
}
