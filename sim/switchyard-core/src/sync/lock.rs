use parking_lot::{lock_api::RawMutex as _, RawMutex};
use std::{
    fmt::{self, Debug, Formatter},
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
};

/// A mutual exclusion lock that is released explicitly rather than through
/// a guard.
pub trait LockProvider: Send + Sync {
    /// Blocks until the lock is held.
    fn lock(&self);
    /// Takes the lock if it is free. Returns whether it was taken.
    fn try_lock(&self) -> bool;
    /// Releases the lock.
    ///
    /// # Panics
    ///
    /// Panics if the lock is not held.
    fn unlock(&self);
    /// The provider this one decorates, if any.
    fn inner(&self) -> Option<&dyn LockProvider>;
}

/// The bottom of every lock chain, a parking_lot raw mutex.
pub struct NativeLock {
    raw: RawMutex,
    held: AtomicBool,
}

impl NativeLock {
    pub fn new() -> Self {
        Self {
            raw: RawMutex::INIT,
            held: AtomicBool::new(false),
        }
    }
}

impl Default for NativeLock {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for NativeLock {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeLock")
            .field("locked", &self.held.load(Ordering::Relaxed))
            .finish()
    }
}

impl LockProvider for NativeLock {
    fn lock(&self) {
        self.raw.lock();
        self.held.store(true, Ordering::Release);
    }

    fn try_lock(&self) -> bool {
        let taken = self.raw.try_lock();
        if taken {
            self.held.store(true, Ordering::Release);
        }
        taken
    }

    fn unlock(&self) {
        assert!(
            self.held.swap(false, Ordering::AcqRel),
            "unlocked a lock that was not held"
        );
        // SAFETY: `held` was set, so the raw mutex is locked, and the swap
        // lets exactly one caller release it.
        unsafe { self.raw.unlock() };
    }

    fn inner(&self) -> Option<&dyn LockProvider> {
        None
    }
}

/// Logs and counts every acquisition passing through to the wrapped
/// provider.
pub struct TracedLock {
    inner: Box<dyn LockProvider>,
    acquired: AtomicU64,
    contended: AtomicU64,
}

impl TracedLock {
    pub fn new(inner: Box<dyn LockProvider>) -> Self {
        Self {
            inner,
            acquired: AtomicU64::new(0),
            contended: AtomicU64::new(0),
        }
    }

    /// How many times the lock was taken.
    pub fn acquired(&self) -> u64 {
        self.acquired.load(Ordering::Relaxed)
    }

    /// How many `try_lock` calls found the lock taken.
    pub fn contended(&self) -> u64 {
        self.contended.load(Ordering::Relaxed)
    }
}

impl LockProvider for TracedLock {
    fn lock(&self) {
        self.inner.lock();
        self.acquired.fetch_add(1, Ordering::Relaxed);
        tracing::trace!("lock acquired");
    }

    fn try_lock(&self) -> bool {
        let taken = self.inner.try_lock();
        if taken {
            self.acquired.fetch_add(1, Ordering::Relaxed);
        } else {
            self.contended.fetch_add(1, Ordering::Relaxed);
        }
        tracing::trace!(taken, "try_lock");
        taken
    }

    fn unlock(&self) {
        tracing::trace!("lock released");
        self.inner.unlock();
    }

    fn inner(&self) -> Option<&dyn LockProvider> {
        Some(self.inner.as_ref())
    }
}
