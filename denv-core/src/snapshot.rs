// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Snapshot codec: the full region as a zlib stream.
//!
//! A snapshot inflates to exactly [`REGION_SIZE`](crate::REGION_SIZE) bytes,
//! whose first word is the table magic. Loading validates both before
//! touching the live region, then splices everything except the lock area so
//! the embedded lock object survives.

use crate::error::TableError;
use crate::table::{Table, Word, MAGIC, REGION_SIZE, WORD_SIZE};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use std::ptr;

/// Stream granularity for both directions.
const SNAPSHOT_CHUNK: usize = 512 * 1024;

impl Table {
    /// Compresses the full region into `dst`.
    ///
    /// The caller must not hold the region lock; the stream reflects
    /// whatever state concurrent writers produce while it runs, which is an
    /// accepted property of snapshots (they are consistent in practice
    /// because writers are short-lived).
    pub fn write_snapshot<W: Write>(&self, dst: W) -> Result<(), TableError> {
        if self.total_size() != REGION_SIZE {
            return Err(TableError::Corrupt);
        }
        // SAFETY: the region is at least REGION_SIZE bytes and mapped for
        // the lifetime of `self`. Concurrent mutation would race this read;
        // see the method contract above.
        let region = unsafe { core::slice::from_raw_parts(self.base_ptr(), REGION_SIZE) };

        let mut encoder = ZlibEncoder::new(dst, Compression::default());
        for chunk in region.chunks(SNAPSHOT_CHUNK) {
            encoder.write_all(chunk)?;
        }
        encoder.finish()?;
        Ok(())
    }

    /// Replaces the region contents from a snapshot stream.
    ///
    /// The stream must inflate to exactly the region size and carry the
    /// table magic in its first word; anything else leaves the live region
    /// untouched. The lock area bytes are preserved. The caller holds the
    /// region lock for the whole call.
    pub fn load_snapshot<R: Read>(&self, src: R) -> Result<(), TableError> {
        let mut decoder = ZlibDecoder::new(src);
        let mut buf = vec![0u8; REGION_SIZE];
        let mut filled = 0usize;
        while filled < REGION_SIZE {
            let end = (filled + SNAPSHOT_CHUNK).min(REGION_SIZE);
            let n = decoder.read(&mut buf[filled..end])?;
            if n == 0 {
                return Err(TableError::Corrupt);
            }
            filled += n;
        }
        // The stream must end here; a longer payload is not a table image.
        let mut overflow = [0u8; 1];
        if decoder.read(&mut overflow)? != 0 {
            return Err(TableError::Corrupt);
        }

        let magic = Word::from_ne_bytes(buf[..WORD_SIZE].try_into().map_err(|_| TableError::Corrupt)?);
        if magic != MAGIC {
            return Err(TableError::BadMagic);
        }

        let (lock_start, lock_end) = Table::lock_area_range();
        // SAFETY: both buffers span REGION_SIZE bytes; the two copies stay
        // in-bounds and do not overlap each other.
        unsafe {
            let dst = self.base_ptr();
            let src = buf.as_ptr();
            ptr::copy_nonoverlapping(src, dst, lock_start);
            ptr::copy_nonoverlapping(
                src.add(lock_end),
                dst.add(lock_end),
                REGION_SIZE - lock_end,
            );
        }
        Ok(())
    }
}
