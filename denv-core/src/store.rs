// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Locking discipline over a shared [`Table`].
//!
//! Every process attaching the region builds a `Store` from its own
//! [`Table`] view and its own handle to the shared lock. The rules:
//!
//! - Mutations and enumerations hold the lock for the whole operation.
//! - `get` holds the lock for the lookup and copies the value out before
//!   releasing, since borrows into the region are unstable after that.
//! - `save` acquires and immediately releases the lock, then streams the
//!   region unlocked: a snapshot captures a just-consistent state without
//!   stalling writers for the duration of the disk write.
//! - `load` holds the lock for the entire splice.

use crate::error::TableError;
use crate::lock::{acquire, RegionLock};
use crate::table::{Entry, Stats, Table, ARENA_WORDS, MAX_ELEMENTS, WORD_SIZE};
use std::io::{Read, Write};
use std::time::{Duration, Instant};

pub struct Store<L: RegionLock> {
    table: Table,
    lock: L,
}

impl<L: RegionLock> Store<L> {
    pub fn new(table: Table, lock: L) -> Self {
        Self { table, lock }
    }

    pub fn set(&self, name: &[u8], value: &[u8], is_env: bool) -> Result<(), TableError> {
        let _guard = acquire(&self.lock)?;
        self.table.set(name, value, is_env)
    }

    /// Looks up a value, copied out while the lock is held.
    pub fn get(&self, name: &[u8]) -> Result<Option<Vec<u8>>, TableError> {
        let _guard = acquire(&self.lock)?;
        Ok(self.table.get(name).map(<[u8]>::to_vec))
    }

    pub fn delete(&self, name: &[u8]) -> Result<(), TableError> {
        let _guard = acquire(&self.lock)?;
        self.table.delete(name);
        Ok(())
    }

    pub fn entries(&self) -> Result<Vec<Entry>, TableError> {
        let _guard = acquire(&self.lock)?;
        Ok(self.table.entries())
    }

    pub fn env_entries(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>, TableError> {
        let _guard = acquire(&self.lock)?;
        Ok(self.table.env_entries())
    }

    pub fn stats(&self) -> Result<Stats, TableError> {
        let _guard = acquire(&self.lock)?;
        Ok(self.table.stats())
    }

    pub fn cleanup(&self) -> Result<(), TableError> {
        let _guard = acquire(&self.lock)?;
        self.table.cleanup()
    }

    pub fn export_to<W: Write>(&self, w: W) -> Result<(), TableError> {
        let _guard = acquire(&self.lock)?;
        self.table.write_exports(w)?;
        Ok(())
    }

    /// Stores a batch of `(name, value)` pairs as environment-marked
    /// entries, checking capacity up front so a half-applied batch cannot
    /// exhaust the table. Pairs with an empty value are skipped. Returns the
    /// number of entries written.
    pub fn clone_env(&self, vars: &[(Vec<u8>, Vec<u8>)]) -> Result<usize, TableError> {
        let _guard = acquire(&self.lock)?;

        let stats = self.table.stats();
        let slots_left = 2 * MAX_ELEMENTS - stats.used_total.min(2 * MAX_ELEMENTS);
        if vars.len() > slots_left {
            return Err(TableError::CapacityExceeded { entries: vars.len() });
        }
        let incoming_bytes: usize = vars.iter().map(|(n, v)| n.len() + v.len() + 1).sum();
        let arena_left = (ARENA_WORDS - stats.data_offset) * WORD_SIZE;
        if incoming_bytes > arena_left {
            return Err(TableError::CapacityExceeded { entries: vars.len() });
        }

        let mut inserted = 0;
        for (name, value) in vars {
            if value.is_empty() {
                continue;
            }
            self.table.set(name, value, true)?;
            inserted += 1;
        }
        Ok(inserted)
    }

    /// Blocks until `name` receives a write, then consumes its update mark.
    ///
    /// Polling-based: each sample resolves the name under the lock, checks
    /// the mark, and sleeps `poll` on a miss. A name that does not exist yet
    /// is polled until it appears. Returns `Ok(false)` only when `max_wait`
    /// elapses first; with no deadline the call waits indefinitely.
    pub fn wait_for_update(
        &self,
        name: &[u8],
        poll: Duration,
        max_wait: Option<Duration>,
    ) -> Result<bool, TableError> {
        let start = Instant::now();
        loop {
            {
                let _guard = acquire(&self.lock)?;
                if self.table.take_update(name) {
                    return Ok(true);
                }
            }
            if let Some(limit) = max_wait {
                if start.elapsed() >= limit {
                    return Ok(false);
                }
            }
            std::thread::sleep(poll);
        }
    }

    /// Snapshots the region into `dst`. The lock is taken and released
    /// before streaming begins; see the module notes.
    pub fn save<W: Write>(&self, dst: W) -> Result<(), TableError> {
        let guard = acquire(&self.lock)?;
        drop(guard);
        self.table.write_snapshot(dst)
    }

    /// Replaces the table from a snapshot stream, holding the lock for the
    /// whole splice.
    pub fn load<R: Read>(&self, src: R) -> Result<(), TableError> {
        let _guard = acquire(&self.lock)?;
        self.table.load_snapshot(src)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::LocalLock;
    use crate::table::tests::make_region;
    use std::sync::Arc;

    fn make_store() -> (Vec<u64>, Store<Arc<LocalLock>>) {
        let (buf, region) = make_region();
        let table = unsafe { Table::from_region(region).unwrap() };
        table.init();
        let store = Store::new(table, Arc::new(LocalLock::new()));
        (buf, store)
    }

    #[test]
    fn basic_operations_roundtrip() {
        let (_buf, store) = make_store();
        store.set(b"FOO", b"bar", false).unwrap();
        assert_eq!(store.get(b"FOO").unwrap(), Some(b"bar".to_vec()));
        store.delete(b"FOO").unwrap();
        assert_eq!(store.get(b"FOO").unwrap(), None);
    }

    #[test]
    fn save_then_load_preserves_answers() {
        let (_buf, store) = make_store();
        store.set(b"A", b"1", false).unwrap();
        store.set(b"B", b"2", true).unwrap();

        let mut snapshot = Vec::new();
        store.save(&mut snapshot).unwrap();

        let (_buf2, other) = make_store();
        other.load(&snapshot[..]).unwrap();
        assert_eq!(other.get(b"A").unwrap(), Some(b"1".to_vec()));
        assert_eq!(other.get(b"B").unwrap(), Some(b"2".to_vec()));
        assert_eq!(
            other.env_entries().unwrap(),
            vec![(b"B".to_vec(), b"2".to_vec())]
        );
    }

    #[test]
    fn clone_env_skips_empty_values_and_counts() {
        let (_buf, store) = make_store();
        let vars = vec![
            (b"KEEP".to_vec(), b"yes".to_vec()),
            (b"EMPTY".to_vec(), Vec::new()),
            (b"ALSO".to_vec(), b"sure".to_vec()),
        ];
        assert_eq!(store.clone_env(&vars).unwrap(), 2);
        assert_eq!(store.get(b"KEEP").unwrap(), Some(b"yes".to_vec()));
        assert_eq!(store.get(b"EMPTY").unwrap(), None);
        let mut env = store.env_entries().unwrap();
        env.sort();
        assert_eq!(env.len(), 2);
    }

    #[test]
    fn clone_env_rejects_oversized_batches() {
        let (_buf, store) = make_store();
        let vars: Vec<(Vec<u8>, Vec<u8>)> = (0..2 * MAX_ELEMENTS + 1)
            .map(|i| (format!("V{i}").into_bytes(), b"x".to_vec()))
            .collect();
        assert!(matches!(
            store.clone_env(&vars),
            Err(TableError::CapacityExceeded { .. })
        ));
        // Nothing was applied.
        assert_eq!(store.stats().unwrap().used_total, 0);
    }

    #[test]
    fn wait_for_update_times_out_without_writer() {
        let (_buf, store) = make_store();
        let woke = store
            .wait_for_update(
                b"NEVER",
                Duration::from_millis(5),
                Some(Duration::from_millis(40)),
            )
            .unwrap();
        assert!(!woke);
    }

    #[test]
    fn wait_for_update_observes_concurrent_set() {
        let (_buf, region) = make_region();
        let lock = Arc::new(LocalLock::new());

        let waiter = {
            let table = unsafe { Table::from_region(region).unwrap() };
            table.init();
            Store::new(table, Arc::clone(&lock))
        };
        let writer = {
            let table = unsafe { Table::from_region(region).unwrap() };
            Store::new(table, Arc::clone(&lock))
        };

        std::thread::scope(|s| {
            let handle = s.spawn(|| {
                waiter.wait_for_update(
                    b"X",
                    Duration::from_millis(5),
                    Some(Duration::from_secs(10)),
                )
            });
            std::thread::sleep(Duration::from_millis(30));
            writer.set(b"X", b"hello", false).unwrap();
            let woke = handle.join().unwrap().unwrap();
            assert!(woke);
        });
        assert_eq!(waiter.get(b"X").unwrap(), Some(b"hello".to_vec()));
    }

    #[test]
    fn interleaved_handles_never_observe_torn_payloads() {
        let (_buf, region) = make_region();
        let lock = Arc::new(LocalLock::new());
        let a = {
            let table = unsafe { Table::from_region(region).unwrap() };
            table.init();
            Store::new(table, Arc::clone(&lock))
        };
        let b = {
            let table = unsafe { Table::from_region(region).unwrap() };
            Store::new(table, Arc::clone(&lock))
        };

        let long_a = vec![b'a'; 512];
        let long_b = vec![b'b'; 512];
        std::thread::scope(|s| {
            let writer = s.spawn(|| {
                for _ in 0..200 {
                    a.set(b"K", &long_a, false).unwrap();
                    a.set(b"K", &long_b, false).unwrap();
                }
            });
            let reader = s.spawn(|| {
                for _ in 0..200 {
                    if let Some(v) = b.get(b"K").unwrap() {
                        // Either payload in full, never a mixture.
                        assert!(v.iter().all(|&c| c == b'a') || v.iter().all(|&c| c == b'b'));
                    }
                }
            });
            writer.join().unwrap();
            reader.join().unwrap();
        });
    }
}
