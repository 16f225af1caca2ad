use parking_lot::{Condvar, Mutex};
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

/// A counting semaphore.
pub trait SemaphoreProvider: Send + Sync {
    /// Adds `count` permits.
    fn signal(&self, count: usize);
    /// Takes one permit, waiting at most `timeout`, or forever if `None`.
    /// Returns whether a permit was taken.
    fn wait(&self, timeout: Option<Duration>) -> bool;
    /// The provider this one decorates, if any.
    fn inner(&self) -> Option<&dyn SemaphoreProvider>;
}

#[derive(Debug, Default)]
pub struct NativeSemaphore {
    permits: Mutex<usize>,
    signalled: Condvar,
}

impl NativeSemaphore {
    /// Creates a semaphore holding `permits` permits.
    pub fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits),
            signalled: Condvar::new(),
        }
    }
}

impl SemaphoreProvider for NativeSemaphore {
    fn signal(&self, count: usize) {
        let mut permits = self.permits.lock();
        *permits += count;
        for _ in 0..count {
            self.signalled.notify_one();
        }
    }

    fn wait(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let mut permits = self.permits.lock();
        while *permits == 0 {
            match deadline {
                Some(deadline) => {
                    if self.signalled.wait_until(&mut permits, deadline).timed_out() && *permits == 0 {
                        return false;
                    }
                }
                None => self.signalled.wait(&mut permits),
            }
        }
        *permits -= 1;
        true
    }

    fn inner(&self) -> Option<&dyn SemaphoreProvider> {
        None
    }
}

/// Counts signals, successful waits and timeouts passing through to the
/// wrapped provider.
pub struct TracedSemaphore {
    inner: Box<dyn SemaphoreProvider>,
    signalled: AtomicU64,
    acquired: AtomicU64,
    timed_out: AtomicU64,
}

impl TracedSemaphore {
    pub fn new(inner: Box<dyn SemaphoreProvider>) -> Self {
        Self {
            inner,
            signalled: AtomicU64::new(0),
            acquired: AtomicU64::new(0),
            timed_out: AtomicU64::new(0),
        }
    }

    pub fn signalled(&self) -> u64 {
        self.signalled.load(Ordering::Relaxed)
    }

    pub fn acquired(&self) -> u64 {
        self.acquired.load(Ordering::Relaxed)
    }

    pub fn timed_out(&self) -> u64 {
        self.timed_out.load(Ordering::Relaxed)
    }
}

impl SemaphoreProvider for TracedSemaphore {
    fn signal(&self, count: usize) {
        self.signalled.fetch_add(count as u64, Ordering::Relaxed);
        tracing::trace!(count, "semaphore signalled");
        self.inner.signal(count);
    }

    fn wait(&self, timeout: Option<Duration>) -> bool {
        let taken = self.inner.wait(timeout);
        if taken {
            self.acquired.fetch_add(1, Ordering::Relaxed);
        } else {
            self.timed_out.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(?timeout, "semaphore wait timed out");
        }
        taken
    }

    fn inner(&self) -> Option<&dyn SemaphoreProvider> {
        Some(self.inner.as_ref())
    }
}
