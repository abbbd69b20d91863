// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::io;

/// Errors from segment and semaphore system calls, each carrying the OS
/// error that caused it.
#[derive(Debug, thiserror::Error)]
pub enum ShmemError {
    #[error("segment path is not representable")]
    InvalidPath,
    #[error("failed to derive a segment key: {0}")]
    Key(#[source] io::Error),
    #[error("failed to create or open the shared memory segment: {0}")]
    Create(#[source] io::Error),
    #[error("failed to attach the shared memory segment: {0}")]
    Attach(#[source] io::Error),
    #[error("failed to detach the shared memory segment: {0}")]
    Detach(#[source] io::Error),
    #[error("failed to remove the shared memory segment: {0}")]
    Destroy(#[source] io::Error),
    #[error("failed to initialize the shared semaphore: {0}")]
    SemInit(#[source] io::Error),
}
