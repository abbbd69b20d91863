// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Command-line surface.

use clap::{Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "denv",
    about = "Shared-memory environment variable database",
    disable_version_flag = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Print the version and exit
    #[arg(short = 'v', long = "version")]
    pub version: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the version and exit
    Version,

    /// Set a key to a value (a VALUE of "-" reads from stdin)
    Set {
        /// Mark the entry as an environment variable
        #[arg(short = 'e')]
        env: bool,
        /// Override the shared segment bind path
        #[arg(short = 'b', value_name = "PATH")]
        bind: Option<PathBuf>,
        name: String,
        /// The value to store ("-" reads stdin; leading dashes are allowed)
        #[arg(allow_hyphen_values = true)]
        value: String,
    },

    /// Print the value stored under a key
    Get {
        /// Override the shared segment bind path
        #[arg(short = 'b', value_name = "PATH")]
        bind: Option<PathBuf>,
        name: String,
    },

    /// Remove a key and its value
    Rm {
        /// Override the shared segment bind path
        #[arg(short = 'b', value_name = "PATH")]
        bind: Option<PathBuf>,
        name: String,
    },

    /// List all keys
    Ls {
        /// Suppress the environment variable indicator
        #[arg(short = 'x')]
        suppress: bool,
        /// Override the shared segment bind path
        #[arg(short = 'b', value_name = "PATH")]
        bind: Option<PathBuf>,
    },

    /// Destroy the shared memory environment
    Drop {
        /// Skip the confirmation prompt
        #[arg(short = 'f')]
        force: bool,
        /// Override the shared segment bind path
        #[arg(short = 'b', value_name = "PATH")]
        bind: Option<PathBuf>,
    },

    /// Print table statistics
    Stats {
        /// CSV output (the default)
        #[arg(long)]
        csv: bool,
        /// Override the shared segment bind path
        #[arg(short = 'b', value_name = "PATH")]
        bind: Option<PathBuf>,
    },

    /// Clear deleted variables from memory
    Cleanup {
        /// Override the shared segment bind path
        #[arg(short = 'b', value_name = "PATH")]
        bind: Option<PathBuf>,
    },

    /// Save the table to a file
    Save {
        /// Override the shared segment bind path
        #[arg(short = 'b', value_name = "PATH")]
        bind: Option<PathBuf>,
        file: PathBuf,
    },

    /// Overwrite the table from a save file
    Load {
        /// Skip the confirmation prompt
        #[arg(short = 'f')]
        force: bool,
        /// Override the shared segment bind path
        #[arg(short = 'b', value_name = "PATH")]
        bind: Option<PathBuf>,
        file: PathBuf,
    },

    /// Block until a key receives a new value
    Await {
        /// Override the shared segment bind path
        #[arg(short = 'b', value_name = "PATH")]
        bind: Option<PathBuf>,
        name: String,
    },

    /// Execute a program with the environment-marked entries injected
    Exec {
        /// Override the shared segment bind path
        #[arg(short = 'b', value_name = "PATH")]
        bind: Option<PathBuf>,
        program: OsString,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<OsString>,
    },

    /// Copy the current process environment into the table
    Clone {
        /// Override the shared segment bind path
        #[arg(short = 'b', value_name = "PATH")]
        bind: Option<PathBuf>,
    },

    /// Write "export NAME=VALUE" lines to a file, or to stdout with "-"
    Export {
        /// Override the shared segment bind path
        #[arg(short = 'b', value_name = "PATH")]
        bind: Option<PathBuf>,
        file: String,
    },

    /// Load a save file, then snapshot the table again on SIGTERM
    Daemon {
        /// Override the shared segment bind path
        #[arg(short = 'b', value_name = "PATH")]
        bind: Option<PathBuf>,
        /// Save file (defaults to save.denv under the bind path)
        savefile: Option<PathBuf>,
    },
}
