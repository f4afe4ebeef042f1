//! Shared-surface lock handshake
//!
//! The shared surface is guarded by a keyed mutex: whoever touches the
//! texture must hold the key, and the other side only sees fully written
//! frames. Acquisition uses a bounded per-attempt wait so a stalled peer
//! shows up as a reported timeout instead of a frozen loop.

use std::time::Duration;
use thiserror::Error;

/// Outcome of a single acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    Acquired,
    TimedOut,
}

/// A lock guarding one side of a shared surface.
///
/// Implementations wrap a DXGI keyed mutex; tests use in-memory fakes.
pub trait SurfaceLock {
    type Error;

    /// Try to acquire the key, waiting at most `timeout` for the peer.
    fn try_acquire(&self, timeout: Duration) -> Result<Acquire, Self::Error>;

    /// Release the key. Must only be called after a successful acquire.
    fn release(&self) -> Result<(), Self::Error>;
}

/// Bounded retry schedule for lock acquisition.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Per-attempt wait handed to the lock.
    pub acquire_timeout: Duration,
    /// Attempts before giving up.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub retry_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            acquire_timeout: Duration::from_millis(100),
            max_attempts: 50,
            retry_interval: Duration::from_millis(2),
        }
    }
}

#[derive(Error, Debug)]
pub enum LockError<E> {
    #[error("shared surface lock not acquired after {attempts} attempts")]
    Timeout { attempts: u32 },

    #[error("shared surface lock failed")]
    Lock(#[source] E),
}

/// Run `body` while holding the lock.
///
/// The key is released on every exit path: if `body` fails after a
/// successful acquire, the release still happens before the error is
/// returned, so the peer is never left waiting on a key we abandoned.
pub fn with_lock<L, T>(
    lock: &L,
    policy: &RetryPolicy,
    body: impl FnOnce() -> Result<T, L::Error>,
) -> Result<T, LockError<L::Error>>
where
    L: SurfaceLock,
    L::Error: std::error::Error,
{
    let mut attempts = 0u32;

    loop {
        match lock.try_acquire(policy.acquire_timeout).map_err(LockError::Lock)? {
            Acquire::Acquired => break,
            Acquire::TimedOut => {
                attempts += 1;
                if attempts >= policy.max_attempts {
                    return Err(LockError::Timeout { attempts });
                }
                tracing::trace!(attempts, "surface lock busy, retrying");
                if !policy.retry_interval.is_zero() {
                    std::thread::sleep(policy.retry_interval);
                }
            }
        }
    }

    let result = body();
    let released = lock.release();

    match (result, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(LockError::Lock(e)),
        // The body's failure is the interesting one; a release failure on
        // top of it only gets logged.
        (Err(e), released) => {
            if released.is_err() {
                tracing::warn!("surface lock release failed after body error");
            }
            Err(LockError::Lock(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::fmt;

    #[derive(Debug)]
    struct FakeLockError;

    impl fmt::Display for FakeLockError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "fake lock error")
        }
    }

    impl std::error::Error for FakeLockError {}

    struct FakeLock {
        /// Outcomes returned by successive try_acquire calls.
        script: RefCell<Vec<Acquire>>,
        acquires: RefCell<u32>,
        releases: RefCell<u32>,
    }

    impl FakeLock {
        fn scripted(outcomes: &[Acquire]) -> Self {
            Self {
                script: RefCell::new(outcomes.iter().rev().copied().collect()),
                acquires: RefCell::new(0),
                releases: RefCell::new(0),
            }
        }
    }

    impl SurfaceLock for FakeLock {
        type Error = FakeLockError;

        fn try_acquire(&self, _timeout: Duration) -> Result<Acquire, FakeLockError> {
            let outcome = self.script.borrow_mut().pop().unwrap_or(Acquire::Acquired);
            if outcome == Acquire::Acquired {
                *self.acquires.borrow_mut() += 1;
            }
            Ok(outcome)
        }

        fn release(&self) -> Result<(), FakeLockError> {
            *self.releases.borrow_mut() += 1;
            Ok(())
        }
    }

    fn quick_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            acquire_timeout: Duration::from_millis(1),
            max_attempts,
            retry_interval: Duration::ZERO,
        }
    }

    #[test]
    fn successful_body_pairs_acquire_and_release() {
        let lock = FakeLock::scripted(&[Acquire::Acquired]);

        let value = with_lock(&lock, &quick_policy(3), || Ok::<_, FakeLockError>(42)).unwrap();

        assert_eq!(value, 42);
        assert_eq!(*lock.acquires.borrow(), 1);
        assert_eq!(*lock.releases.borrow(), 1);
    }

    #[test]
    fn timeout_then_success_retries() {
        let lock = FakeLock::scripted(&[Acquire::TimedOut, Acquire::TimedOut, Acquire::Acquired]);

        with_lock(&lock, &quick_policy(5), || Ok::<_, FakeLockError>(())).unwrap();

        assert_eq!(*lock.acquires.borrow(), 1);
        assert_eq!(*lock.releases.borrow(), 1);
    }

    #[test]
    fn exhausted_retries_report_timeout_without_release() {
        let lock = FakeLock::scripted(&[Acquire::TimedOut; 4]);

        let err = with_lock(&lock, &quick_policy(3), || Ok::<_, FakeLockError>(())).unwrap_err();

        assert!(matches!(err, LockError::Timeout { attempts: 3 }));
        assert_eq!(*lock.acquires.borrow(), 0);
        assert_eq!(*lock.releases.borrow(), 0);
    }

    #[test]
    fn failing_body_still_releases() {
        let lock = FakeLock::scripted(&[Acquire::Acquired]);

        let err = with_lock(&lock, &quick_policy(3), || Err::<(), _>(FakeLockError)).unwrap_err();

        assert!(matches!(err, LockError::Lock(_)));
        assert_eq!(*lock.acquires.borrow(), 1);
        assert_eq!(*lock.releases.borrow(), 1);
    }
}
