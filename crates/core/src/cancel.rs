//! Cooperative cancellation and the injectable wait used by the frame poll loop.
//!
//! The framer never sleeps directly: it asks a [`Sleeper`] to wait one poll
//! interval and hands it the stream's [`CancellationToken`]. The production
//! [`ThreadSleeper`] parks on the token's condvar so a cancel wakes it
//! immediately; tests substitute a sleeper that only counts.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Shared cancellation flag with wake-up support.
///
/// Clones observe the same flag. Cancelling is permanent.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    cancelled: Mutex<bool>,
    condvar: Condvar,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation and wake every thread blocked in
    /// [`wait_timeout`](Self::wait_timeout).
    pub fn cancel(&self) {
        let mut cancelled = self.inner.cancelled.lock();
        if !*cancelled {
            *cancelled = true;
            tracing::debug!("cancellation requested");
        }
        self.inner.condvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancelled.lock()
    }

    /// Block for up to `timeout`, returning early on cancellation.
    ///
    /// Returns `true` if the token is cancelled when the wait ends.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut cancelled = self.inner.cancelled.lock();
        while !*cancelled {
            if self
                .inner
                .condvar
                .wait_until(&mut cancelled, deadline)
                .timed_out()
            {
                break;
            }
        }
        *cancelled
    }
}

/// How a [`Sleeper::wait`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The full interval passed.
    Elapsed,
    /// Cancellation was observed during (or before) the wait.
    Cancelled,
}

/// Clock abstraction for the retry wait between frame polls.
pub trait Sleeper: Send + Sync {
    /// Wait one `interval`, or less if `cancel` fires.
    fn wait(&self, interval: Duration, cancel: &CancellationToken) -> WaitOutcome;
}

/// Real-time sleeper backed by the token's condvar.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn wait(&self, interval: Duration, cancel: &CancellationToken) -> WaitOutcome {
        if cancel.wait_timeout(interval) {
            WaitOutcome::Cancelled
        } else {
            WaitOutcome::Elapsed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn wait_elapses_without_cancel() {
        let token = CancellationToken::new();
        let start = Instant::now();
        assert!(!token.wait_timeout(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn cancel_wakes_waiter() {
        let token = CancellationToken::new();
        let remote = token.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });

        let start = Instant::now();
        assert!(token.wait_timeout(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }

    #[test]
    fn already_cancelled_returns_immediately() {
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(
            ThreadSleeper.wait(Duration::from_secs(10), &token),
            WaitOutcome::Cancelled
        );
    }

    #[test]
    fn cancel_is_shared_and_idempotent() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
