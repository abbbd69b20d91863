// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The shared table: region layout, arena, and index algorithms.
//!
//! # Layout
//!
//! The region is statically partitioned into four sub-regions:
//!
//! ```text
//! +--------+-------------------+---------------------+--------------------+
//! | Header | Primary elements  | Collision elements  |     Word arena     |
//! |        | M x 4 words       | M x 4 words         | B words            |
//! +--------+-------------------+---------------------+--------------------+
//! ```
//!
//! - **Header**: magic, table flags, entry counters, total size, the arena
//!   bump cursor, and a 64-byte area reserved for an inter-process lock
//!   object owned by the caller.
//! - **Primary elements**: one slot per hash bucket, M = 2048.
//! - **Collision elements**: append-only overflow slots chained from primary
//!   slots via `collision_next`.
//! - **Word arena**: append-only storage for all `name\0value\0` payloads,
//!   addressed in words. Reclaimed only by [`Table::cleanup`].
//!
//! # Thread / process safety
//!
//! None of the methods here take the inter-process lock; they assume the
//! caller serializes access (see [`Store`](crate::Store)). Borrow returns
//! (`get`) are valid only while that serialization holds.

use crate::element::{flags, Element, Slot, ELEMENT_SIZE};
use crate::error::TableError;
use crate::hash::{bucket, round_up_pow2};
use core::ptr::NonNull;
use std::ptr;

/// The native word: all arena offsets and sizes are expressed in these.
pub type Word = usize;

pub(crate) const WORD_SIZE: usize = core::mem::size_of::<Word>();

// The layout below hard-codes 8-byte words.
const _: () = assert!(WORD_SIZE == 8, "a 64-bit platform is required");

/// Number of primary buckets; also the size of the collision array.
pub const MAX_ELEMENTS: usize = 1 << 11; // 2048

/// Arena length in words (8 MiB of payload storage).
pub(crate) const ARENA_WORDS: usize = 1 << 20;

/// First region word of every valid table: ASCII "DENV" in the high bytes.
pub const MAGIC: Word = 0x4445_4e56 << 32;

/// Table-level flag bits.
pub mod table_flags {
    use super::Word;

    /// Set once by whichever attacher first initializes the region.
    pub const INITIALIZED: Word = 1 << 0;
    /// Reserved by the format; never set by this implementation.
    pub const BUSY: Word = 1 << 1;
}

/// Byte offsets within the header. All accessed as single words except the
/// lock area, which is opaque to this crate.
mod header {
    pub const MAGIC_OFFSET: usize = 0;
    pub const FLAGS_OFFSET: usize = 8;
    pub const USED_OFFSET: usize = 16;
    pub const COLLISION_USED_OFFSET: usize = 24;
    pub const TOTAL_SIZE_OFFSET: usize = 32;
    pub const BLOCK_CURSOR_OFFSET: usize = 40;
    pub const LOCK_OFFSET: usize = 64;
    pub const LOCK_SIZE: usize = 64;
    pub const SIZE: usize = 128;
}

/// Offset of the reserved inter-process lock area within the region.
pub const LOCK_AREA_OFFSET: usize = header::LOCK_OFFSET;
/// Size of the reserved lock area in bytes.
pub const LOCK_AREA_SIZE: usize = header::LOCK_SIZE;

const PRIMARY_OFFSET: usize = header::SIZE;
const COLLISION_OFFSET: usize = PRIMARY_OFFSET + MAX_ELEMENTS * ELEMENT_SIZE;
pub(crate) const ARENA_OFFSET: usize = COLLISION_OFFSET + MAX_ELEMENTS * ELEMENT_SIZE;

/// Full region length in bytes; also the value of the `total_size` header
/// field and the exact inflated length of a snapshot.
pub const REGION_SIZE: usize = ARENA_OFFSET + ARENA_WORDS * WORD_SIZE;

// Compile-time checks on the partitioning.
const _: () = assert!(ARENA_OFFSET % WORD_SIZE == 0);
const _: () = assert!(header::LOCK_OFFSET + header::LOCK_SIZE <= header::SIZE);
const _: () = assert!(MAX_ELEMENTS.is_power_of_two());

/// Point-in-time table counters, as reported by `stats`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Stats {
    pub total_size_bytes: usize,
    /// Arena bump cursor, in words.
    pub data_offset: usize,
    /// Live primary entries.
    pub used_hash: usize,
    /// High-water count of appended collision slots.
    pub used_collision: usize,
    pub used_total: usize,
}

/// One listed entry: its name and whether it carries the environment mark.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub name: Vec<u8>,
    pub is_env: bool,
}

/// A key/value table over a caller-provided memory region.
///
/// `Table` is a non-owning view: the caller keeps the region mapped for the
/// lifetime of the value and of any borrow obtained from it.
#[derive(Debug)]
pub struct Table {
    base: NonNull<u8>,
}

// SAFETY: the underlying memory is a shared mapping mutated by several
// processes. All access is serialized by the caller through the region lock
// (see `Store`), which is the same discipline the other processes follow.
unsafe impl Send for Table {}
unsafe impl Sync for Table {}

impl Table {
    /// Wraps a memory region without examining its contents.
    ///
    /// # Safety
    /// - `region` must be valid for reads and writes of `region.len()` bytes
    ///   and remain mapped for the lifetime of the returned `Table` and any
    ///   borrow produced from it.
    /// - `region` must be word-aligned: every header and element accessor
    ///   reads and writes whole [`Word`]s at word-aligned offsets.
    /// - Concurrent access must be serialized through the region lock.
    pub unsafe fn from_region(region: NonNull<[u8]>) -> Result<Self, TableError> {
        debug_assert!(region.cast::<u8>().as_ptr().align_offset(WORD_SIZE) == 0);
        if region.len() < REGION_SIZE {
            return Err(TableError::RegionTooSmall {
                needed: REGION_SIZE,
                got: region.len(),
            });
        }
        Ok(Self {
            base: region.cast(),
        })
    }

    /// Seeds a fresh region: magic, counters, cursor, total size, and the
    /// INITIALIZED flag. The lock area is left untouched; the caller
    /// initializes its lock object there before calling this.
    pub fn init(&self) {
        self.set_word(header::MAGIC_OFFSET, MAGIC);
        self.set_word(header::USED_OFFSET, 0);
        self.set_word(header::COLLISION_USED_OFFSET, 0);
        self.set_word(header::TOTAL_SIZE_OFFSET, REGION_SIZE);
        self.set_word(header::BLOCK_CURSOR_OFFSET, 0);
        let flags = self.word(header::FLAGS_OFFSET);
        self.set_word(header::FLAGS_OFFSET, flags | table_flags::INITIALIZED);
    }

    pub fn is_initialized(&self) -> bool {
        self.word(header::FLAGS_OFFSET) & table_flags::INITIALIZED != 0
    }

    /// Rejects foreign or damaged regions: the magic must match and the
    /// recorded total size must equal the compiled-in region size.
    pub fn validate(&self) -> Result<(), TableError> {
        if self.word(header::MAGIC_OFFSET) != MAGIC {
            return Err(TableError::BadMagic);
        }
        if self.total_size() != REGION_SIZE {
            return Err(TableError::Corrupt);
        }
        Ok(())
    }

    // -- Header accessors ---------------------------------------------------

    #[inline]
    fn word(&self, byte_offset: usize) -> Word {
        debug_assert!(byte_offset + WORD_SIZE <= REGION_SIZE);
        // SAFETY: `byte_offset` is one of the compile-time header offsets or
        // an element-slot offset, all within the validated region.
        unsafe { ptr::read(self.base.as_ptr().add(byte_offset) as *const Word) }
    }

    #[inline]
    fn set_word(&self, byte_offset: usize, value: Word) {
        debug_assert!(byte_offset + WORD_SIZE <= REGION_SIZE);
        // SAFETY: as in `word`; writes are serialized by the caller.
        unsafe { ptr::write(self.base.as_ptr().add(byte_offset) as *mut Word, value) }
    }

    pub(crate) fn used(&self) -> usize {
        self.word(header::USED_OFFSET)
    }

    pub(crate) fn collision_used(&self) -> usize {
        self.word(header::COLLISION_USED_OFFSET)
    }

    pub(crate) fn total_size(&self) -> usize {
        self.word(header::TOTAL_SIZE_OFFSET)
    }

    pub(crate) fn cursor(&self) -> usize {
        self.word(header::BLOCK_CURSOR_OFFSET)
    }

    // -- Element accessors --------------------------------------------------

    fn slot_offset(slot: Slot) -> usize {
        match slot {
            Slot::Primary(i) => {
                debug_assert!(i < MAX_ELEMENTS);
                PRIMARY_OFFSET + i * ELEMENT_SIZE
            }
            Slot::Collision(i) => {
                debug_assert!(i < MAX_ELEMENTS);
                COLLISION_OFFSET + i * ELEMENT_SIZE
            }
        }
    }

    pub(crate) fn element(&self, slot: Slot) -> Element {
        let off = Self::slot_offset(slot);
        Element {
            flags: self.word(off),
            data_index: self.word(off + WORD_SIZE),
            data_word_size: self.word(off + 2 * WORD_SIZE),
            collision_next: self.word(off + 3 * WORD_SIZE),
        }
    }

    pub(crate) fn put_element(&self, slot: Slot, e: Element) {
        let off = Self::slot_offset(slot);
        self.set_word(off, e.flags);
        self.set_word(off + WORD_SIZE, e.data_index);
        self.set_word(off + 2 * WORD_SIZE, e.data_word_size);
        self.set_word(off + 3 * WORD_SIZE, e.collision_next);
    }

    // -- Arena --------------------------------------------------------------

    /// Payload capacity in words for a payload of `bytes` bytes: next power
    /// of two, then whole words, at least one word.
    fn payload_words(bytes: usize) -> usize {
        round_up_pow2(bytes).div_ceil(WORD_SIZE).max(1)
    }

    /// Bump-allocates `words` words from the arena and returns the word
    /// offset of the slice. There is no per-entry free.
    fn slice_words(&self, words: usize) -> Result<Word, TableError> {
        let cursor = self.cursor();
        if words > ARENA_WORDS - cursor {
            return Err(TableError::ArenaFull);
        }
        self.set_word(header::BLOCK_CURSOR_OFFSET, cursor + words);
        Ok(cursor)
    }

    fn arena_slice(&self) -> &[u8] {
        // SAFETY: the arena sub-region lies within the validated region; the
        // returned borrow is bounded by `&self` and the caller's lock.
        unsafe {
            core::slice::from_raw_parts(
                self.base.as_ptr().add(ARENA_OFFSET),
                ARENA_WORDS * WORD_SIZE,
            )
        }
    }

    /// Name bytes at a payload's word offset (up to the first NUL).
    fn payload_name(&self, word_offset: Word) -> &[u8] {
        let rest = &self.arena_slice()[word_offset * WORD_SIZE..];
        let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        &rest[..end]
    }

    /// Value bytes of a payload: past the name's NUL, up to the next NUL.
    fn payload_value(&self, word_offset: Word) -> &[u8] {
        let rest = &self.arena_slice()[word_offset * WORD_SIZE..];
        let name_end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        let after = &rest[(name_end + 1).min(rest.len())..];
        let end = after.iter().position(|&b| b == 0).unwrap_or(after.len());
        &after[..end]
    }

    /// Writes `name\0value\0` at the given word offset.
    fn write_payload(&self, word_offset: Word, name: &[u8], value: &[u8]) {
        debug_assert!(word_offset * WORD_SIZE + name.len() + value.len() + 2 <= ARENA_WORDS * WORD_SIZE);
        // SAFETY: the destination slice was reserved by `slice_words` (or is
        // an in-place rewrite within the element's recorded capacity), so the
        // write stays inside the arena.
        unsafe {
            let dst = self.base.as_ptr().add(ARENA_OFFSET + word_offset * WORD_SIZE);
            ptr::copy_nonoverlapping(name.as_ptr(), dst, name.len());
            *dst.add(name.len()) = 0;
            let vdst = dst.add(name.len() + 1);
            ptr::copy_nonoverlapping(value.as_ptr(), vdst, value.len());
            *vdst.add(value.len()) = 0;
        }
    }

    // -- Index operations ---------------------------------------------------

    /// Inserts or updates an entry. `is_env` is the only caller-controlled
    /// flag; everything else is protocol state managed here.
    pub fn set(&self, name: &[u8], value: &[u8], is_env: bool) -> Result<(), TableError> {
        if name.is_empty() || name.contains(&0) {
            return Err(TableError::InvalidName);
        }
        if value.contains(&0) {
            return Err(TableError::InvalidValue);
        }

        let need_words = Self::payload_words(name.len() + value.len() + 2);
        let extra = if is_env { flags::IS_ENV } else { 0 };

        let h = bucket(name);
        let e = self.element(Slot::Primary(h));

        if !e.is_used() {
            let data_index = self.slice_words(need_words)?;
            self.write_payload(data_index, name, value);
            self.put_element(
                Slot::Primary(h),
                Element {
                    flags: flags::USED | flags::UPDATED | extra,
                    data_index,
                    data_word_size: need_words,
                    collision_next: 0,
                },
            );
            self.set_word(header::USED_OFFSET, self.used() + 1);
            return Ok(());
        }

        if self.payload_name(e.data_index) == name {
            return self.rewrite(Slot::Primary(h), e, name, value, need_words, extra);
        }

        // Collision: walk the chain from the primary slot, updating a match
        // or appending a fresh overflow slot at the chain's tail.
        let mut prev = Slot::Primary(h);
        let mut prev_e = e;
        loop {
            if !prev_e.has_collision() {
                let idx = self.collision_used();
                if idx >= MAX_ELEMENTS {
                    return Err(TableError::CollisionsFull);
                }
                let data_index = self.slice_words(need_words)?;
                self.write_payload(data_index, name, value);
                self.put_element(
                    Slot::Collision(idx),
                    Element {
                        flags: flags::USED | flags::UPDATED | extra,
                        data_index,
                        data_word_size: need_words,
                        collision_next: 0,
                    },
                );
                prev_e.flags |= flags::HAS_COLLISION;
                prev_e.collision_next = idx;
                self.put_element(prev, prev_e);
                self.set_word(header::COLLISION_USED_OFFSET, idx + 1);
                return Ok(());
            }

            let cur = prev_e.collision_next;
            let ce = self.element(Slot::Collision(cur));
            if self.payload_name(ce.data_index) == name {
                return self.rewrite(Slot::Collision(cur), ce, name, value, need_words, extra);
            }
            prev = Slot::Collision(cur);
            prev_e = ce;
        }
    }

    /// Overwrites an existing element's payload, in place when the reserved
    /// capacity suffices, through a fresh arena slice otherwise (the old
    /// slice is abandoned until compaction).
    fn rewrite(
        &self,
        slot: Slot,
        mut e: Element,
        name: &[u8],
        value: &[u8],
        need_words: usize,
        extra: Word,
    ) -> Result<(), TableError> {
        let was_tombstone = !e.is_live();
        if e.data_word_size < need_words {
            e.data_index = self.slice_words(need_words)?;
            e.data_word_size = need_words;
        }
        self.write_payload(e.data_index, name, value);
        e.flags |= flags::UPDATED | extra;
        e.flags &= !flags::FREED;
        self.put_element(slot, e);
        if was_tombstone {
            if let Slot::Primary(_) = slot {
                self.set_word(header::USED_OFFSET, self.used() + 1);
            }
        }
        Ok(())
    }

    /// Resolves a name to its slot, live entries only.
    pub(crate) fn find_slot(&self, name: &[u8]) -> Option<Slot> {
        let h = bucket(name);
        let e = self.element(Slot::Primary(h));
        if !e.is_used() {
            return None;
        }
        if self.payload_name(e.data_index) == name {
            return e.is_live().then_some(Slot::Primary(h));
        }
        let mut cur = e;
        while cur.has_collision() {
            let idx = cur.collision_next;
            let ce = self.element(Slot::Collision(idx));
            if self.payload_name(ce.data_index) == name {
                return ce.is_live().then_some(Slot::Collision(idx));
            }
            cur = ce;
        }
        None
    }

    /// Looks up a value. The returned borrow is valid until the next
    /// mutation of the same key or a compaction; callers copy before
    /// releasing the region lock if they need stability.
    pub fn get(&self, name: &[u8]) -> Option<&[u8]> {
        let slot = self.find_slot(name)?;
        Some(self.payload_value(self.element(slot).data_index))
    }

    /// Tombstones an entry. Absent names are a no-op. The arena slice is not
    /// reclaimed here.
    pub fn delete(&self, name: &[u8]) {
        let Some(slot) = self.find_slot(name) else {
            return;
        };
        let mut e = self.element(slot);
        e.flags |= flags::FREED;
        self.put_element(slot, e);
        if let Slot::Primary(_) = slot {
            self.set_word(header::USED_OFFSET, self.used() - 1);
        }
    }

    /// Consumes the update mark on a live entry. Returns `true` when the
    /// mark was set (and is now cleared).
    pub fn take_update(&self, name: &[u8]) -> bool {
        let Some(slot) = self.find_slot(name) else {
            return false;
        };
        let mut e = self.element(slot);
        if !e.is_updated() {
            return false;
        }
        e.flags &= !flags::UPDATED;
        self.put_element(slot, e);
        true
    }

    // -- Enumeration --------------------------------------------------------

    fn for_each_live(&self, mut f: impl FnMut(Slot, Element)) {
        for i in 0..MAX_ELEMENTS {
            for slot in [Slot::Primary(i), Slot::Collision(i)] {
                let e = self.element(slot);
                if e.is_live() {
                    f(slot, e);
                }
            }
        }
    }

    /// All live entries in slot order (primary then collision per index).
    pub fn entries(&self) -> Vec<Entry> {
        let mut out = Vec::new();
        self.for_each_live(|_, e| {
            out.push(Entry {
                name: self.payload_name(e.data_index).to_vec(),
                is_env: e.is_env(),
            });
        });
        out
    }

    /// Live entries carrying the environment mark, as owned (name, value)
    /// pairs. Entries with an empty name are skipped.
    pub fn env_entries(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut out = Vec::new();
        self.for_each_live(|_, e| {
            if e.is_env() {
                let name = self.payload_name(e.data_index);
                if !name.is_empty() {
                    out.push((name.to_vec(), self.payload_value(e.data_index).to_vec()));
                }
            }
        });
        out
    }

    pub fn stats(&self) -> Stats {
        let used_hash = self.used();
        let used_collision = self.collision_used();
        Stats {
            total_size_bytes: self.total_size(),
            data_offset: self.cursor(),
            used_hash,
            used_collision,
            used_total: used_hash + used_collision,
        }
    }

    // -- Compaction ---------------------------------------------------------

    /// Rebuilds the table without tombstones or abandoned arena slices.
    ///
    /// Re-inserts every live entry into a scratch table in process heap,
    /// then copies the scratch region back over the live one. The lock area
    /// bytes are preserved so the embedded lock object stays valid.
    pub fn cleanup(&self) -> Result<(), TableError> {
        // Word-backed scratch so the `Table` accessors get aligned words.
        let mut scratch = vec![0u64; REGION_SIZE / WORD_SIZE];
        let scratch_ptr =
            NonNull::new(scratch.as_mut_ptr() as *mut u8).ok_or(TableError::Corrupt)?;
        let region = NonNull::slice_from_raw_parts(scratch_ptr, REGION_SIZE);
        // SAFETY: `scratch` is a private, zeroed, word-aligned,
        // exclusively-owned buffer that outlives `clean`.
        let clean = unsafe { Table::from_region(region)? };
        clean.init();
        // Carry the live flag word over so the splice can't drop table state.
        clean.set_word(header::FLAGS_OFFSET, self.word(header::FLAGS_OFFSET));

        let mut result = Ok(());
        self.for_each_live(|_, e| {
            if result.is_err() {
                return;
            }
            let name = self.payload_name(e.data_index);
            let value = self.payload_value(e.data_index);
            result = clean.set(name, value, e.is_env());
        });
        result?;

        // Splice the scratch region back, skipping the live lock area.
        // SAFETY: both regions are at least REGION_SIZE bytes; ranges are
        // in-bounds and the buffers do not overlap.
        unsafe {
            let dst = self.base.as_ptr();
            let src = scratch.as_ptr() as *const u8;
            ptr::copy_nonoverlapping(src, dst, header::LOCK_OFFSET);
            let after = header::LOCK_OFFSET + header::LOCK_SIZE;
            ptr::copy_nonoverlapping(src.add(after), dst.add(after), REGION_SIZE - after);
        }
        Ok(())
    }

    // -- Raw region access (snapshot codec) ---------------------------------

    pub(crate) fn base_ptr(&self) -> *mut u8 {
        self.base.as_ptr()
    }

    pub(crate) fn lock_area_range() -> (usize, usize) {
        (header::LOCK_OFFSET, header::LOCK_OFFSET + header::LOCK_SIZE)
    }
}
