use parking_lot::{lock_api::RawRwLock as _, RawRwLock};
use std::{
    fmt::{self, Debug, Formatter},
    sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
};

/// A reader-writer lock released explicitly.
pub trait RwLockProvider: Send + Sync {
    fn lock_read(&self);
    fn try_lock_read(&self) -> bool;
    /// # Panics
    ///
    /// Panics if no read lock is held.
    fn unlock_read(&self);
    fn lock_write(&self);
    fn try_lock_write(&self) -> bool;
    /// # Panics
    ///
    /// Panics if the write lock is not held.
    fn unlock_write(&self);
    /// The provider this one decorates, if any.
    fn inner(&self) -> Option<&dyn RwLockProvider>;
}

/// Any number of readers or one writer, on a parking_lot raw rwlock.
pub struct NativeRwLock {
    raw: RawRwLock,
    readers: AtomicUsize,
    writer: AtomicBool,
}

impl NativeRwLock {
    pub fn new() -> Self {
        Self {
            raw: RawRwLock::INIT,
            readers: AtomicUsize::new(0),
            writer: AtomicBool::new(false),
        }
    }
}

impl Default for NativeRwLock {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for NativeRwLock {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeRwLock")
            .field("readers", &self.readers.load(Ordering::Relaxed))
            .field("writer", &self.writer.load(Ordering::Relaxed))
            .finish()
    }
}

impl RwLockProvider for NativeRwLock {
    fn lock_read(&self) {
        self.raw.lock_shared();
        self.readers.fetch_add(1, Ordering::AcqRel);
    }

    fn try_lock_read(&self) -> bool {
        let taken = self.raw.try_lock_shared();
        if taken {
            self.readers.fetch_add(1, Ordering::AcqRel);
        }
        taken
    }

    fn unlock_read(&self) {
        let released = self
            .readers
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |readers| readers.checked_sub(1));
        assert!(released.is_ok(), "unlocked a read lock that was not held");
        // SAFETY: the reader count was positive, so a shared lock is held,
        // and the decrement claims exactly one of them.
        unsafe { self.raw.unlock_shared() };
    }

    fn lock_write(&self) {
        self.raw.lock_exclusive();
        self.writer.store(true, Ordering::Release);
    }

    fn try_lock_write(&self) -> bool {
        let taken = self.raw.try_lock_exclusive();
        if taken {
            self.writer.store(true, Ordering::Release);
        }
        taken
    }

    fn unlock_write(&self) {
        assert!(
            self.writer.swap(false, Ordering::AcqRel),
            "unlocked a write lock that was not held"
        );
        // SAFETY: `writer` was set, so the exclusive lock is held, and the
        // swap lets exactly one caller release it.
        unsafe { self.raw.unlock_exclusive() };
    }

    fn inner(&self) -> Option<&dyn RwLockProvider> {
        None
    }
}

/// Counts read and write acquisitions passing through to the wrapped
/// provider.
pub struct TracedRwLock {
    inner: Box<dyn RwLockProvider>,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl TracedRwLock {
    pub fn new(inner: Box<dyn RwLockProvider>) -> Self {
        Self {
            inner,
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

impl RwLockProvider for TracedRwLock {
    fn lock_read(&self) {
        self.inner.lock_read();
        self.reads.fetch_add(1, Ordering::Relaxed);
        tracing::trace!("read lock acquired");
    }

    fn try_lock_read(&self) -> bool {
        let taken = self.inner.try_lock_read();
        if taken {
            self.reads.fetch_add(1, Ordering::Relaxed);
        }
        taken
    }

    fn unlock_read(&self) {
        self.inner.unlock_read();
    }

    fn lock_write(&self) {
        self.inner.lock_write();
        self.writes.fetch_add(1, Ordering::Relaxed);
        tracing::trace!("write lock acquired");
    }

    fn try_lock_write(&self) -> bool {
        let taken = self.inner.try_lock_write();
        if taken {
            self.writes.fetch_add(1, Ordering::Relaxed);
        }
        taken
    }

    fn unlock_write(&self) {
        self.inner.unlock_write();
    }

    fn inner(&self) -> Option<&dyn RwLockProvider> {
        Some(self.inner.as_ref())
    }
}
