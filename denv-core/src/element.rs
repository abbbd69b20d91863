// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Fixed-width element records.
//!
//! An element describes one key's location and state: a flags word, the word
//! offset of its `name\0value\0` payload in the arena, the reserved payload
//! capacity in words, and the index of the next element in its collision
//! chain.

use crate::table::Word;

/// Per-element flag bits. Part of the on-disk/in-segment format.
pub mod flags {
    use crate::table::Word;

    /// Slot holds an entry (live or tombstoned).
    pub const USED: Word = 1 << 0;
    /// `collision_next` points at the next chain element.
    pub const HAS_COLLISION: Word = 1 << 1;
    /// Entry was deleted; the slot is a tombstone until re-set or compaction.
    pub const FREED: Word = 1 << 2;
    /// Entry is eligible for injection into a child process environment.
    pub const IS_ENV: Word = 1 << 3;
    /// Reserved by the format; never set by this implementation.
    pub const IS_BEING_READ: Word = 1 << 4;
    /// Set on every successful write; consumed by the await protocol.
    pub const UPDATED: Word = 1 << 5;
}

pub(crate) const ELEMENT_WORDS: usize = 4;
pub(crate) const ELEMENT_SIZE: usize = ELEMENT_WORDS * core::mem::size_of::<Word>();

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Element {
    pub flags: Word,
    pub data_index: Word,
    pub data_word_size: Word,
    pub collision_next: Word,
}

impl Element {
    #[inline]
    pub fn is_used(&self) -> bool {
        self.flags & flags::USED != 0
    }

    /// Used and not tombstoned.
    #[inline]
    pub fn is_live(&self) -> bool {
        self.flags & (flags::USED | flags::FREED) == flags::USED
    }

    #[inline]
    pub fn has_collision(&self) -> bool {
        self.flags & flags::HAS_COLLISION != 0
    }

    #[inline]
    pub fn is_env(&self) -> bool {
        self.flags & flags::IS_ENV != 0
    }

    #[inline]
    pub fn is_updated(&self) -> bool {
        self.flags & flags::UPDATED != 0
    }
}

/// Addresses one slot in either element array.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Slot {
    Primary(usize),
    Collision(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_predicates() {
        let mut e = Element::default();
        assert!(!e.is_used());
        assert!(!e.is_live());

        e.flags = flags::USED | flags::UPDATED;
        assert!(e.is_used());
        assert!(e.is_live());
        assert!(e.is_updated());
        assert!(!e.is_env());

        e.flags |= flags::FREED;
        assert!(e.is_used());
        assert!(!e.is_live());
    }
}
