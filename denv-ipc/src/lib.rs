// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! OS plumbing for the shared table: the System V shared memory segment that
//! holds the region, and the process-shared POSIX semaphore embedded in the
//! region's lock area.
//!
//! The segment identity is derived from a filesystem path with `ftok`, so
//! every process naming the same path attaches the same table. The semaphore
//! implements [`denv_core::RegionLock`]; whichever attacher finds the table
//! uninitialized creates the semaphore before seeding the table.

mod error;
mod sem;
mod shmem;

pub use error::ShmemError;
pub use sem::SemLock;
pub use shmem::Segment;
