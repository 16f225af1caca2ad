//! Pluggable synchronization primitives.
//!
//! Locks, reader-writer locks and semaphores are reached through provider
//! traits so a tool can wrap the native implementation. A wrapper owns the
//! provider it decorates and exposes it through `inner`, which makes a chain
//! of decorators walkable from the outside in. Dropping the outermost
//! provider drops the whole chain.

mod lock;
pub use lock::{LockProvider, NativeLock, TracedLock};

mod rwlock;
pub use rwlock::{NativeRwLock, RwLockProvider, TracedRwLock};

mod semaphore;
pub use semaphore::{NativeSemaphore, SemaphoreProvider, TracedSemaphore};

/// Counts the providers in a chain, starting from `provider` and following
/// `inner` until the native provider at the bottom.
pub fn lock_chain_depth(provider: &dyn LockProvider) -> usize {
    let mut depth = 1;
    let mut current = provider;
    while let Some(inner) = current.inner() {
        depth += 1;
        current = inner;
    }
    depth
}
