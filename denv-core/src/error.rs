// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::lock::LockError;
use std::io;

/// Errors surfaced by table operations.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("region too small: need {needed} bytes, got {got}")]
    RegionTooSmall { needed: usize, got: usize },
    #[error("shared table magic mismatch")]
    BadMagic,
    #[error("table header or snapshot is inconsistent")]
    Corrupt,
    #[error("table arena is out of space")]
    ArenaFull,
    #[error("collision table is full")]
    CollisionsFull,
    #[error("entry name is empty or contains a NUL byte")]
    InvalidName,
    #[error("entry value contains a NUL byte")]
    InvalidValue,
    #[error("not enough free space for {entries} incoming entries")]
    CapacityExceeded { entries: usize },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Lock(#[from] LockError),
}
