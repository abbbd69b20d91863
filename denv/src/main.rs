// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

mod bind;
mod cli;
mod daemon;
mod open;
mod version;

use anyhow::{bail, Context};
use clap::Parser;
use cli::{Cli, Command};
use denv_core::is_valid_env_name;
use denv_ipc::Segment;
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, Read, Write};
use std::os::unix::ffi::OsStringExt;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Sleep between samples while awaiting an update.
const AWAIT_POLL: Duration = Duration::from_millis(100);

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("denv: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    if cli.version {
        println!("{}", version::version_string());
        return Ok(ExitCode::SUCCESS);
    }
    let Some(command) = cli.command else {
        // Unreachable behind arg_required_else_help, but don't panic on it.
        bail!("missing command");
    };

    match command {
        Command::Version => {
            println!("{}", version::version_string());
            Ok(ExitCode::SUCCESS)
        }
        Command::Set {
            env,
            bind,
            name,
            value,
        } => cmd_set(env, bind, name, value),
        Command::Get { bind, name } => cmd_get(bind, name),
        Command::Rm { bind, name } => cmd_rm(bind, name),
        Command::Ls { suppress, bind } => cmd_ls(suppress, bind),
        Command::Drop { force, bind } => cmd_drop(force, bind),
        Command::Stats { csv: _, bind } => cmd_stats(bind),
        Command::Cleanup { bind } => cmd_cleanup(bind),
        Command::Save { bind, file } => cmd_save(bind, file),
        Command::Load { force, bind, file } => cmd_load(force, bind, file),
        Command::Await { bind, name } => cmd_await(bind, name),
        Command::Exec {
            bind,
            program,
            args,
        } => cmd_exec(bind, program, args),
        Command::Clone { bind } => cmd_clone(bind),
        Command::Export { bind, file } => cmd_export(bind, file),
        Command::Daemon { bind, savefile } => daemon::run(bind, savefile),
    }
}

fn cmd_set(
    env: bool,
    bind: Option<PathBuf>,
    name: String,
    value: String,
) -> anyhow::Result<ExitCode> {
    if env && !is_valid_env_name(name.as_bytes()) {
        bail!("invalid environment variable name \"{name}\"");
    }
    let value: Vec<u8> = if value == "-" {
        let mut buf = Vec::new();
        io::stdin()
            .read_to_end(&mut buf)
            .context("couldn't read the value from stdin")?;
        buf
    } else {
        value.into_bytes()
    };

    let opened = open::open(&bind::resolve(bind)?)?;
    opened.store.set(name.as_bytes(), &value, env)?;
    opened.close()?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_get(bind: Option<PathBuf>, name: String) -> anyhow::Result<ExitCode> {
    let opened = open::open(&bind::resolve(bind)?)?;
    let value = opened.store.get(name.as_bytes())?;
    opened.close()?;

    match value {
        Some(value) => {
            let mut out = io::stdout().lock();
            out.write_all(&value)?;
            out.write_all(b"\n")?;
            out.flush()?;
            Ok(ExitCode::SUCCESS)
        }
        // A miss is quiet: scripts probe with `denv get` and branch on the
        // exit code.
        None => Ok(ExitCode::FAILURE),
    }
}

fn cmd_rm(bind: Option<PathBuf>, name: String) -> anyhow::Result<ExitCode> {
    let opened = open::open(&bind::resolve(bind)?)?;
    opened.store.delete(name.as_bytes())?;
    opened.close()?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_ls(suppress: bool, bind: Option<PathBuf>) -> anyhow::Result<ExitCode> {
    let opened = open::open(&bind::resolve(bind)?)?;
    let entries = opened.store.entries()?;
    opened.close()?;

    let mut out = io::stdout().lock();
    for entry in entries {
        let name = String::from_utf8_lossy(&entry.name);
        if entry.is_env && !suppress {
            writeln!(out, "{name:<20} (ENV)")?;
        } else {
            writeln!(out, "{name}")?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_drop(force: bool, bind: Option<PathBuf>) -> anyhow::Result<ExitCode> {
    let path = bind::resolve(bind)?;
    if !force
        && !confirm("Are you sure you want to destroy the shared memory environment? [N/y]")?
    {
        return Ok(ExitCode::SUCCESS);
    }
    Segment::destroy(&path).context("failed to destroy the shared memory environment")?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_stats(bind: Option<PathBuf>) -> anyhow::Result<ExitCode> {
    let opened = open::open(&bind::resolve(bind)?)?;
    let stats = opened.store.stats()?;
    opened.close()?;

    println!("total_size_bytes,data_offset,used_hash,used_collision,used_total");
    println!(
        "{},{},{},{},{}",
        stats.total_size_bytes, stats.data_offset, stats.used_hash, stats.used_collision, stats.used_total
    );
    Ok(ExitCode::SUCCESS)
}

fn cmd_cleanup(bind: Option<PathBuf>) -> anyhow::Result<ExitCode> {
    let opened = open::open(&bind::resolve(bind)?)?;
    opened.store.cleanup()?;
    opened.close()?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_save(bind: Option<PathBuf>, file: PathBuf) -> anyhow::Result<ExitCode> {
    let opened = open::open(&bind::resolve(bind)?)?;
    let dst =
        File::create(&file).with_context(|| format!("failed to open \"{}\"", file.display()))?;
    opened.store.save(dst)?;
    opened.close()?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_load(force: bool, bind: Option<PathBuf>, file: PathBuf) -> anyhow::Result<ExitCode> {
    if !force {
        let prompt = format!(
            "This will overwrite current variables, Are you sure you want to load \"{}\" to denv? [N/y]",
            file.display()
        );
        if !confirm(&prompt)? {
            return Ok(ExitCode::SUCCESS);
        }
    }
    let opened = open::open(&bind::resolve(bind)?)?;
    let src =
        File::open(&file).with_context(|| format!("failed to open \"{}\"", file.display()))?;
    opened
        .store
        .load(src)
        .with_context(|| format!("failed to load \"{}\"", file.display()))?;
    opened.close()?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_await(bind: Option<PathBuf>, name: String) -> anyhow::Result<ExitCode> {
    let opened = open::open(&bind::resolve(bind)?)?;
    opened
        .store
        .wait_for_update(name.as_bytes(), AWAIT_POLL, None)?;
    opened.close()?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_exec(
    bind: Option<PathBuf>,
    program: OsString,
    args: Vec<OsString>,
) -> anyhow::Result<ExitCode> {
    let opened = open::open(&bind::resolve(bind)?)?;
    let pairs = opened.store.env_entries()?;

    let mut command = std::process::Command::new(&program);
    command.args(&args);
    for (name, value) in pairs {
        command.env(OsString::from_vec(name), OsString::from_vec(value));
    }
    // Only returns on failure; on success the process image is replaced and
    // the segment attachment dies with it.
    let err = command.exec();
    Err(err).with_context(|| format!("error while trying to execute \"{}\"", program.to_string_lossy()))
}

fn cmd_clone(bind: Option<PathBuf>) -> anyhow::Result<ExitCode> {
    let vars: Vec<(Vec<u8>, Vec<u8>)> = std::env::vars_os()
        .map(|(name, value)| (name.into_vec(), value.into_vec()))
        .filter(|(name, _)| is_valid_env_name(name))
        .collect();

    let opened = open::open(&bind::resolve(bind)?)?;
    let inserted = opened.store.clone_env(&vars)?;
    opened.close()?;
    tracing::debug!(inserted, "cloned environment");
    Ok(ExitCode::SUCCESS)
}

fn cmd_export(bind: Option<PathBuf>, file: String) -> anyhow::Result<ExitCode> {
    let opened = open::open(&bind::resolve(bind)?)?;
    if file == "-" {
        let stdout = io::stdout().lock();
        opened.store.export_to(stdout)?;
    } else {
        let dst =
            File::create(&file).with_context(|| format!("failed to open \"{file}\""))?;
        opened.store.export_to(dst)?;
    }
    opened.close()?;
    Ok(ExitCode::SUCCESS)
}

/// Prints a prompt and reads one line; only a leading `y`/`Y` proceeds.
fn confirm(prompt: &str) -> anyhow::Result<bool> {
    println!("{prompt}");
    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("couldn't read the confirmation")?;
    Ok(matches!(line.chars().next(), Some('y' | 'Y')))
}
