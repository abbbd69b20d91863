// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bind-path resolution.
//!
//! The shared segment is keyed by a filesystem path. By default that path is
//! `$HOME/.local/share/denv`, created on first use; `-b` overrides it with a
//! path that must already exist (the override is how two cooperating tools
//! point at a second, separate table).

use anyhow::{bail, Context};
use std::ffi::OsString;
use std::os::unix::fs::DirBuilderExt;
use std::path::PathBuf;

const DEFAULT_BIND_SUBPATH: &str = ".local/share/denv";

pub fn resolve(overridden: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    resolve_with_home(overridden, std::env::var_os("HOME"))
}

pub(crate) fn resolve_with_home(
    overridden: Option<PathBuf>,
    home: Option<OsString>,
) -> anyhow::Result<PathBuf> {
    if let Some(path) = overridden {
        if !path.exists() {
            bail!("bind path \"{}\" doesn't exist", path.display());
        }
        return Ok(path);
    }

    let Some(home) = home else {
        bail!("HOME environment variable is not set");
    };
    let path = PathBuf::from(home).join(DEFAULT_BIND_SUBPATH);
    if !path.exists() {
        std::fs::DirBuilder::new()
            .recursive(true)
            .mode(0o766)
            .create(&path)
            .with_context(|| format!("could not create bind path \"{}\"", path.display()))?;
    }
    Ok(path)
}
