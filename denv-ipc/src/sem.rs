// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The process-shared semaphore living in the table's lock area.

use crate::error::ShmemError;
use core::ptr::NonNull;
use denv_core::{LockError, RegionLock, LOCK_AREA_OFFSET, LOCK_AREA_SIZE};
use std::io;

// The reserved lock area must hold a sem_t.
const _: () = assert!(core::mem::size_of::<libc::sem_t>() <= LOCK_AREA_SIZE);

/// Binary POSIX semaphore embedded in the shared region.
///
/// Every attaching process builds its own `SemLock` over the same bytes; the
/// semaphore object itself is shared. Exactly one attacher — the one that
/// initializes the table — calls [`SemLock::init`].
pub struct SemLock {
    sem: NonNull<libc::sem_t>,
}

// SAFETY: sem_wait/sem_post on a pshared semaphore are exactly the
// operations POSIX defines for concurrent use from any thread or process.
unsafe impl Send for SemLock {}
unsafe impl Sync for SemLock {}

impl SemLock {
    /// Locates the semaphore within a mapped table region.
    ///
    /// # Safety
    /// - `region` must be the region of an attached table, valid for at least
    ///   `LOCK_AREA_OFFSET + LOCK_AREA_SIZE` bytes and mapped for the
    ///   lifetime of the returned lock.
    /// - The semaphore bytes must either already hold a semaphore initialized
    ///   by some attacher, or [`SemLock::init`] must be called before the
    ///   first `acquire`.
    pub unsafe fn from_region(region: NonNull<[u8]>) -> Self {
        debug_assert!(region.len() >= LOCK_AREA_OFFSET + LOCK_AREA_SIZE);
        let ptr = region.cast::<u8>().as_ptr().add(LOCK_AREA_OFFSET);
        Self {
            // SAFETY: offset into a NonNull mapping is non-null.
            sem: NonNull::new_unchecked(ptr as *mut libc::sem_t),
        }
    }

    /// Initializes the semaphore: binary (value 1), shared across processes.
    pub fn init(&self) -> Result<(), ShmemError> {
        // SAFETY: `sem` points at writable, sufficiently-sized mapped memory.
        if unsafe { libc::sem_init(self.sem.as_ptr(), 1, 1) } == -1 {
            return Err(ShmemError::SemInit(io::Error::last_os_error()));
        }
        Ok(())
    }
}

impl RegionLock for SemLock {
    fn acquire(&self) -> Result<(), LockError> {
        loop {
            // SAFETY: `sem` points at an initialized semaphore.
            if unsafe { libc::sem_wait(self.sem.as_ptr()) } == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::EINTR) {
                return Err(LockError(err));
            }
        }
    }

    fn release(&self) -> Result<(), LockError> {
        // SAFETY: `sem` points at an initialized semaphore.
        if unsafe { libc::sem_post(self.sem.as_ptr()) } == -1 {
            return Err(LockError(io::Error::last_os_error()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// Process-private memory works fine for a pshared semaphore within one
    /// process, which is all these tests need.
    fn make_lock() -> (Vec<u64>, SemLock) {
        let mut buf = vec![0u64; (LOCK_AREA_OFFSET + LOCK_AREA_SIZE) / 8];
        let ptr = NonNull::new(buf.as_mut_ptr() as *mut u8).unwrap();
        let region = NonNull::slice_from_raw_parts(ptr, buf.len() * 8);
        let lock = unsafe { SemLock::from_region(region) };
        lock.init().unwrap();
        (buf, lock)
    }

    #[test]
    fn acquire_release_cycles() {
        let (_buf, lock) = make_lock();
        for _ in 0..3 {
            lock.acquire().unwrap();
            lock.release().unwrap();
        }
    }

    #[test]
    fn excludes_across_threads() {
        let (buf, lock) = make_lock();
        let lock = Arc::new(lock);
        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let lock = Arc::clone(&lock);
            let counter = Arc::clone(&counter);
            handles.push(std::thread::spawn(move || {
                for _ in 0..500 {
                    lock.acquire().unwrap();
                    let v = counter.load(std::sync::atomic::Ordering::Relaxed);
                    counter.store(v + 1, std::sync::atomic::Ordering::Relaxed);
                    lock.release().unwrap();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counter.load(std::sync::atomic::Ordering::Relaxed), 2000);
        drop(buf); // the backing memory outlives every lock user
    }
}
