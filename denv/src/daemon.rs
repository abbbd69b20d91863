// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Daemon mode: keep the table resident and snapshot it on termination.
//!
//! On start, an existing save file is loaded back into the table. The
//! process then blocks on SIGTERM/SIGINT/SIGHUP; on wake it rotates the
//! previous save file to `<name>.old` and writes a fresh snapshot.

use crate::{bind, open};
use anyhow::Context;
use nix::sys::signal::{SigSet, Signal};
use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn};

const DEFAULT_SAVE_NAME: &str = "save.denv";

pub fn run(bind_override: Option<PathBuf>, savefile: Option<PathBuf>) -> anyhow::Result<ExitCode> {
    let bind = bind::resolve(bind_override)?;
    let save_path = savefile.unwrap_or_else(|| bind.join(DEFAULT_SAVE_NAME));

    let env = open::open(&bind)?;

    if save_path.exists() {
        let file = File::open(&save_path)
            .with_context(|| format!("failed to open \"{}\"", save_path.display()))?;
        env.store
            .load(file)
            .with_context(|| format!("failed to load \"{}\"", save_path.display()))?;
        info!(path = %save_path.display(), "restored snapshot");
    }

    // Block the termination signals before waiting on them so a signal
    // delivered between the two calls is not lost.
    let mut mask = SigSet::empty();
    for sig in [Signal::SIGTERM, Signal::SIGINT, Signal::SIGHUP] {
        mask.add(sig);
    }
    mask.thread_block()
        .context("failed to block termination signals")?;

    println!("PID: {} Waiting until SIGTERM...", std::process::id());

    let sig = mask.wait().context("failed waiting for a signal")?;
    info!(signal = %sig, "terminating, snapshotting table");

    if save_path.exists() {
        let mut rotated = save_path.clone().into_os_string();
        rotated.push(".old");
        if let Err(err) = std::fs::rename(&save_path, &rotated) {
            warn!("couldn't move the current save file aside: {err}");
            return Err(err).context("failed to rotate the previous save file");
        }
    }

    let file = File::create(&save_path)
        .with_context(|| format!("failed to create \"{}\"", save_path.display()))?;
    env.store
        .save(file)
        .with_context(|| format!("failed to save \"{}\"", save_path.display()))?;
    info!(path = %save_path.display(), "snapshot written");

    env.close()?;
    Ok(ExitCode::SUCCESS)
}
