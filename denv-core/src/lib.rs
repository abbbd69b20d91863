// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Shared-memory key/value table.
//!
//! Operates on a caller-provided memory region (typically a System V shared
//! memory segment mapped by several unrelated processes). The region holds a
//! single [`Table`]: a fixed-size open-addressed hash index with a separate
//! collision array, backed by a monotonic word-addressed byte arena that
//! stores all `name\0value\0` payloads. Entries may carry an environment
//! annotation so a caller can project them into a child process environment.
//!
//! Mutual exclusion across processes is not implemented here: the region
//! reserves a lock area in its header ([`LOCK_AREA_OFFSET`]) and all
//! serialized access goes through the [`RegionLock`] capability, supplied by
//! the caller (a process-shared semaphore in production, [`LocalLock`] in
//! tests). [`Store`] wraps a [`Table`] together with a lock and enforces the
//! locking discipline for every operation.
//!
//! Snapshots are zlib streams of the full region; see [`Store::save`] and
//! [`Store::load`].

mod element;
mod env;
mod error;
mod hash;
mod lock;
mod snapshot;
mod store;
mod table;

pub use element::flags as element_flags;
pub use env::is_valid_env_name;
pub use error::TableError;
pub use hash::fnv1a32;
pub use lock::{acquire, LocalLock, LockError, LockGuard, RegionLock};
pub use store::Store;
pub use table::{
    table_flags, Entry, Stats, Table, Word, LOCK_AREA_OFFSET, LOCK_AREA_SIZE, MAGIC, MAX_ELEMENTS,
    REGION_SIZE,
};
