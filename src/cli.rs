//! Command-line interface definitions.
//!
//! Defines the argument parser and subcommands using clap's derive API.
//! Each subcommand corresponds to a distinct operation: migrating call
//! sites, removing deprecated definitions, validating markers, or listing
//! them.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Migrate callers of deprecated Python APIs and retire the old definitions.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Rewrite call sites of deprecated constructs in place.
    Migrate {
        /// Actually modify files (default is dry-run).
        #[arg(long)]
        write: bool,

        /// Confirm each replacement individually.
        #[arg(short, long)]
        interactive: bool,

        /// Paths to scan. Defaults to current directory.
        #[arg(short, long)]
        paths: Option<Vec<PathBuf>>,

        /// Glob patterns for directories/files to exclude (e.g., "build", "*_pb2.py").
        /// By default, entries starting with `.` or `_` are excluded.
        #[arg(short, long)]
        exclude: Vec<String>,

        /// Disable default exclusion of `.` and `_` prefixed entries.
        #[arg(long)]
        no_default_excludes: bool,

        /// Project root for resolving `from x import y` to local modules.
        /// Defaults to the current directory.
        #[arg(long)]
        project_root: Option<PathBuf>,

        /// Print additional diagnostics to stderr.
        #[arg(short, long)]
        verbose: bool,
    },

    /// Delete deprecated definitions whose removal is due.
    Remove {
        /// Actually modify files (default is dry-run).
        #[arg(long)]
        write: bool,

        /// Remove every marked construct regardless of version.
        #[arg(long)]
        all: bool,

        /// Remove constructs deprecated since before this version.
        #[arg(long)]
        before: Option<String>,

        /// Remove constructs whose `remove_in` this version has reached.
        #[arg(long)]
        current_version: Option<String>,

        /// Paths to scan. Defaults to current directory.
        #[arg(short, long)]
        paths: Option<Vec<PathBuf>>,

        /// Glob patterns for directories/files to exclude.
        #[arg(short, long)]
        exclude: Vec<String>,

        /// Disable default exclusion of `.` and `_` prefixed entries.
        #[arg(long)]
        no_default_excludes: bool,

        /// Print additional diagnostics to stderr.
        #[arg(short, long)]
        verbose: bool,
    },

    /// Verify that every marked construct can be migrated.
    Check {
        /// Paths to scan. Defaults to current directory.
        #[arg(short, long)]
        paths: Option<Vec<PathBuf>>,

        /// Glob patterns for directories/files to exclude.
        #[arg(short, long)]
        exclude: Vec<String>,

        /// Disable default exclusion of `.` and `_` prefixed entries.
        #[arg(long)]
        no_default_excludes: bool,

        /// Emit JSON instead of human-readable output.
        #[arg(long)]
        json: bool,

        /// Print additional diagnostics to stderr.
        #[arg(short, long)]
        verbose: bool,
    },

    /// List marked constructs with their replacements and versions.
    Info {
        /// Paths to scan. Defaults to current directory.
        #[arg(short, long)]
        paths: Option<Vec<PathBuf>>,

        /// Glob patterns for directories/files to exclude.
        #[arg(short, long)]
        exclude: Vec<String>,

        /// Disable default exclusion of `.` and `_` prefixed entries.
        #[arg(long)]
        no_default_excludes: bool,

        /// Emit JSON instead of human-readable output.
        #[arg(long)]
        json: bool,
    },
}
