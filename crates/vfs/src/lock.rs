//! Readers-writer lock that verifies an invariant around each critical section.
//!
//! The check runs right after the lock is acquired and again as the guard is
//! dropped, so a critical section that leaves the protected value broken is
//! caught at its exit rather than by some later, unrelated caller. Guards
//! dropped during unwinding skip the exit check to avoid a double panic.

use std::ops::{Deref, DerefMut};

use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Invariant check run against the protected value. Panics on violation.
pub type InvariantCheck<T> = fn(&T);

/// Async readers-writer lock with an optional invariant hook.
pub struct InvariantRwLock<T> {
    inner: RwLock<T>,
    check: Option<InvariantCheck<T>>,
}

impl<T> InvariantRwLock<T> {
    /// Create a lock without an invariant check.
    pub fn new(value: T) -> Self {
        Self {
            inner: RwLock::new(value),
            check: None,
        }
    }

    /// Create a lock that runs `check` on every acquire and release.
    ///
    /// # Arguments
    /// * `value` - Protected value
    /// * `check` - Invariant check; must panic on violation
    pub fn with_check(value: T, check: InvariantCheck<T>) -> Self {
        Self {
            inner: RwLock::new(value),
            check: Some(check),
        }
    }

    /// Whether an invariant check is installed.
    pub fn is_checked(&self) -> bool {
        self.check.is_some()
    }

    /// Acquire shared access.
    pub async fn read(&self) -> InvariantReadGuard<'_, T> {
        let guard: RwLockReadGuard<'_, T> = self.inner.read().await;
        if let Some(check) = self.check {
            check(&guard);
        }
        InvariantReadGuard {
            guard,
            check: self.check,
        }
    }

    /// Acquire exclusive access.
    pub async fn write(&self) -> InvariantWriteGuard<'_, T> {
        let guard: RwLockWriteGuard<'_, T> = self.inner.write().await;
        if let Some(check) = self.check {
            check(&guard);
        }
        InvariantWriteGuard {
            guard,
            check: self.check,
        }
    }
}

impl<T> std::fmt::Debug for InvariantRwLock<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvariantRwLock")
            .field("checked", &self.check.is_some())
            .finish_non_exhaustive()
    }
}

/// Shared guard returned by [`InvariantRwLock::read`].
pub struct InvariantReadGuard<'a, T> {
    guard: RwLockReadGuard<'a, T>,
    check: Option<InvariantCheck<T>>,
}

impl<T> Deref for InvariantReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> Drop for InvariantReadGuard<'_, T> {
    fn drop(&mut self) {
        if let Some(check) = self.check {
            if !std::thread::panicking() {
                check(&self.guard);
            }
        }
    }
}

/// Exclusive guard returned by [`InvariantRwLock::write`].
pub struct InvariantWriteGuard<'a, T> {
    guard: RwLockWriteGuard<'a, T>,
    check: Option<InvariantCheck<T>>,
}

impl<T> Deref for InvariantWriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for InvariantWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for InvariantWriteGuard<'_, T> {
    fn drop(&mut self) {
        if let Some(check) = self.check {
            if !std::thread::panicking() {
                check(&self.guard);
            }
        }
    }
}
