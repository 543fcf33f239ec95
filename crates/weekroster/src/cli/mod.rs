//! Command-line interface for weekroster.
//!
//! This module provides the CLI structure for the `weekroster` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    CategoryArg, ConfigCommand, ListCommand, PruneCommand, RemoveCommand, ResetCommand,
    SignupCommand, StatusCommand, WeeksCommand,
};

use crate::logging::Verbosity;

/// weekroster - Weekly signups with a self-promoting waitlist
///
/// Each week has a fixed number of slots per category. Signups past the
/// limit join a waitlist, and whoever is first in line is promoted and
/// emailed when a slot opens.
#[derive(Debug, Parser)]
#[command(name = "weekroster")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Path to the secrets file (defaults to secrets.toml next to the config)
    #[arg(long, global = true, value_name = "FILE")]
    pub secrets: Option<PathBuf>,

    /// Increase verbosity (-v for activity, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all diagnostics except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the weeks open for signups
    Weeks(WeeksCommand),

    /// Show confirmed players and waitlists
    List(ListCommand),

    /// Sign a player up for a week
    Signup(SignupCommand),

    /// Remove a signup, promoting the next waitlisted player
    Remove(RemoveCommand),

    /// Show where a player sits for a week
    Status(StatusCommand),

    /// Clear every signup for a week
    Reset(ResetCommand),

    /// Drop weeks that have passed
    Prune(PruneCommand),

    /// View or check configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.verbose, self.quiet)
    }
}
