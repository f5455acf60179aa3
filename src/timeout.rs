//! Wall-clock bound on a single evaluation.
//!
//! The evaluation body runs on a dedicated worker thread while the caller
//! waits on a channel with `recv_timeout`. When the wait runs out the caller
//! gets [`GuardError::Timeout`] and abandons the worker: whatever the body
//! eventually produces is dropped with the channel.
//!
//! The body also receives a [`Deadline`] so that it can stop early between
//! steps instead of running to completion in the background.

use crate::error::GuardError;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

/// A deadline for one evaluation.
///
/// # Example
///
/// ```
/// use sensitive_path_guard::timeout::Deadline;
/// use std::time::Duration;
///
/// let deadline = Deadline::new(Duration::from_secs(10));
/// // ... resolve one candidate ...
/// if deadline.is_exceeded() {
///     // stop, the caller is denying anyway
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    max_duration: Duration,
}

impl Deadline {
    #[must_use]
    pub fn new(max_duration: Duration) -> Self {
        Self {
            start: Instant::now(),
            max_duration,
        }
    }

    /// Whether the deadline has passed. A zero-length deadline is exceeded
    /// from the start.
    #[must_use]
    pub fn is_exceeded(&self) -> bool {
        self.start.elapsed() >= self.max_duration
    }

    /// Time left, or `None` once exceeded.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.max_duration
            .checked_sub(self.start.elapsed())
            .filter(|d| !d.is_zero())
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    #[must_use]
    pub const fn max_duration(&self) -> Duration {
        self.max_duration
    }

    /// Bail out with [`GuardError::Timeout`] if the deadline has passed.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::Timeout`] once exceeded.
    pub fn check(&self) -> Result<(), GuardError> {
        if self.is_exceeded() {
            Err(GuardError::Timeout)
        } else {
            Ok(())
        }
    }
}

/// Run `body` on a worker thread, waiting at most `limit` for its result.
///
/// # Errors
///
/// - [`GuardError::Timeout`] when `limit` elapses first
/// - [`GuardError::WorkerPanicked`] when the body panics
/// - [`GuardError::WorkerSpawn`] when the thread cannot be started
/// - whatever `body` itself returns
pub fn run_bounded<T, F>(limit: Duration, body: F) -> Result<T, GuardError>
where
    T: Send + 'static,
    F: FnOnce(Deadline) -> Result<T, GuardError> + Send + 'static,
{
    let deadline = Deadline::new(limit);
    // Capacity 1 so a late worker never blocks on a receiver that is gone.
    let (tx, rx) = mpsc::sync_channel(1);

    thread::Builder::new()
        .name("spg-evaluator".to_string())
        .spawn(move || {
            let _ = tx.send(body(deadline));
        })
        .map_err(GuardError::WorkerSpawn)?;

    match rx.recv_timeout(deadline.remaining().unwrap_or(Duration::ZERO)) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            tracing::debug!(
                elapsed_ms = deadline.elapsed().as_millis() as u64,
                limit_ms = limit.as_millis() as u64,
                "evaluation deadline exceeded"
            );
            Err(GuardError::Timeout)
        }
        Err(RecvTimeoutError::Disconnected) => Err(GuardError::WorkerPanicked),
    }
}
