//! Concurrent writers sharing one security log.
//!
//! Every writer opens the file independently, the way separate hook processes
//! would, so the advisory lock is what keeps lines whole.

use sensitive_path_guard::audit::{AuditEvent, AuditLogger};
use sensitive_path_guard::config::Config;
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;

const WRITERS: usize = 8;
const EVENTS_PER_WRITER: usize = 50;

fn config_in(dir: &TempDir, worker: &str) -> Config {
    Config {
        logs_dir: dir.path().to_path_buf(),
        worker_id: worker.to_string(),
        ..Config::default()
    }
}

#[test]
fn concurrent_appends_never_interleave() {
    let dir = TempDir::new().unwrap();
    let barrier = Arc::new(Barrier::new(WRITERS));

    let handles: Vec<_> = (0..WRITERS)
        .map(|w| {
            let logger = AuditLogger::new(&config_in(&dir, &format!("w{w}")));
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for n in 0..EVENTS_PER_WRITER {
                    // Long, hostile payload to make torn writes visible.
                    let file = format!("/w{w}/{n}/{}\n|injected", "x".repeat(512));
                    assert!(logger.append(&AuditEvent::hook_deny("Read", Some(&file), "r")));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let content = std::fs::read_to_string(dir.path().join("security.log")).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), WRITERS * EVENTS_PER_WRITER);

    for line in &lines {
        assert!(line.contains(" | WARN | HOOK_DENY | worker=w"), "torn line: {line}");
        assert!(line.ends_with("reason=\"r\""), "torn line: {line}");
        assert_eq!(line.matches(" | ").count(), 3);
    }

    for w in 0..WRITERS {
        let tag = format!("worker=w{w} ");
        assert_eq!(
            lines.iter().filter(|l| l.contains(&tag)).count(),
            EVENTS_PER_WRITER
        );
    }
}

#[test]
fn concurrent_rotation_keeps_every_line_whole() {
    let dir = TempDir::new().unwrap();
    let barrier = Arc::new(Barrier::new(WRITERS));

    let handles: Vec<_> = (0..WRITERS)
        .map(|w| {
            let config = Config {
                max_log_size: 4 * 1024,
                max_log_files: 3,
                ..config_in(&dir, &format!("w{w}"))
            };
            let logger = AuditLogger::new(&config);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for n in 0..EVENTS_PER_WRITER {
                    logger.append(&AuditEvent::secret_access_attempt("Read", &format!("/f/{n}")));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let base = dir.path().join("security.log");
    assert!(base.exists());
    assert!(!dir.path().join("security.log.4").exists());

    for generation in ["security.log", "security.log.1", "security.log.2", "security.log.3"] {
        let Ok(content) = std::fs::read_to_string(dir.path().join(generation)) else {
            continue;
        };
        for line in content.lines() {
            assert!(line.contains("| SECRET_ACCESS_ATTEMPT |"), "{generation}: {line}");
            assert!(line.ends_with('"'), "{generation}: {line}");
        }
    }
}
