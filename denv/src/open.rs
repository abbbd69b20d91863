// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Attaching and initializing the shared environment.

use anyhow::Context;
use denv_core::{Store, Table, REGION_SIZE};
use denv_ipc::{Segment, SemLock};
use std::path::Path;
use tracing::debug;

/// An attached shared environment: the segment mapping plus a locked view of
/// the table inside it. Keep the value alive as long as the store is used;
/// [`OpenEnv::close`] detaches explicitly.
pub struct OpenEnv {
    segment: Segment,
    pub store: Store<SemLock>,
}

/// Attaches (creating if necessary) the segment keyed by `bind` and returns
/// a ready-to-use store.
///
/// Whichever process first observes the table uninitialized seeds the
/// semaphore and then the table. Later attachers validate the magic instead.
pub fn open(bind: &Path) -> anyhow::Result<OpenEnv> {
    let segment = Segment::attach(bind, REGION_SIZE)
        .with_context(|| format!("failed to attach shared memory environment at \"{}\"", bind.display()))?;
    let region = segment.region();

    // SAFETY: `region` is a fresh mapping of at least REGION_SIZE bytes that
    // `segment` keeps alive for as long as `OpenEnv` holds both; access is
    // serialized by the embedded semaphore.
    let table = unsafe { Table::from_region(region)? };
    let lock = unsafe { SemLock::from_region(region) };

    if !table.is_initialized() {
        debug!(segment = segment.id(), "initializing fresh table");
        lock.init()?;
        table.init();
    } else {
        table.validate()?;
    }

    Ok(OpenEnv {
        segment,
        store: Store::new(table, lock),
    })
}

impl OpenEnv {
    /// Detaches the mapping. Dropping the value detaches too; this form
    /// surfaces the error.
    pub fn close(self) -> anyhow::Result<()> {
        self.segment
            .detach()
            .context("failed to detach shared memory")
    }
}
