// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The inter-process lock capability.
//!
//! The table reserves a fixed area in its header for a binary lock object
//! shared by every attaching process, but does not implement one: production
//! code supplies a process-shared semaphore living in that area, tests use
//! [`LocalLock`]. Whichever attacher first initializes the region also
//! initializes the lock object.

use core::sync::atomic::{AtomicBool, Ordering};
use std::io;
use tracing::error;

/// Binary mutual exclusion over the shared region.
///
/// `acquire` blocks until the lock is held; `release` makes it available
/// again. Implementations must be usable concurrently from several processes
/// attached to the same region.
pub trait RegionLock {
    fn acquire(&self) -> Result<(), LockError>;
    fn release(&self) -> Result<(), LockError>;
}

impl<L: RegionLock> RegionLock for &L {
    fn acquire(&self) -> Result<(), LockError> {
        (**self).acquire()
    }
    fn release(&self) -> Result<(), LockError> {
        (**self).release()
    }
}

impl<L: RegionLock> RegionLock for std::sync::Arc<L> {
    fn acquire(&self) -> Result<(), LockError> {
        (**self).acquire()
    }
    fn release(&self) -> Result<(), LockError> {
        (**self).release()
    }
}

/// A lock operation failed at the OS layer.
#[derive(Debug, thiserror::Error)]
#[error("region lock failure: {0}")]
pub struct LockError(#[from] pub io::Error);

/// Holds the region lock; releases it on drop.
pub struct LockGuard<'a, L: RegionLock> {
    lock: &'a L,
}

/// Acquires the region lock, returning an RAII guard.
pub fn acquire<L: RegionLock>(lock: &L) -> Result<LockGuard<'_, L>, LockError> {
    lock.acquire()?;
    Ok(LockGuard { lock })
}

impl<L: RegionLock> Drop for LockGuard<'_, L> {
    fn drop(&mut self) {
        if let Err(err) = self.lock.release() {
            // Nothing actionable from a drop path; the next acquirer will
            // block, which is at least observable.
            error!("failed to release region lock: {err}");
        }
    }
}

/// In-process spinlock implementing [`RegionLock`].
///
/// Stands in for the process-shared semaphore when every handle lives in one
/// process (tests, single-process tools). Not suitable across processes.
#[derive(Debug, Default)]
pub struct LocalLock(AtomicBool);

impl LocalLock {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }
}

impl RegionLock for LocalLock {
    fn acquire(&self) -> Result<(), LockError> {
        loop {
            match self
                .0
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            {
                Ok(_) => return Ok(()),
                Err(_) => core::hint::spin_loop(),
            }
        }
    }

    fn release(&self) -> Result<(), LockError> {
        self.0.store(false, Ordering::Release);
        Ok(())
    }
}
