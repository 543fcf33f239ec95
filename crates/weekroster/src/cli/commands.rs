//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::roster::Category;
use crate::week::WeekKey;

/// Parse a `YYYY-MM-DD` date into the week containing it.
fn parse_week(value: &str) -> Result<WeekKey, String> {
    WeekKey::parse(value).map_err(|e| e.to_string())
}

/// List offered weeks.
#[derive(Debug, Args)]
pub struct WeeksCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Show rosters.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Week to show (any date in it); defaults to every offered week
    #[arg(short, long, value_parser = parse_week)]
    pub week: Option<WeekKey>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Sign a player up.
#[derive(Debug, Args)]
pub struct SignupCommand {
    /// Player name
    #[arg(short, long)]
    pub name: String,

    /// Contact address for promotion notices
    #[arg(short, long)]
    pub email: String,

    /// Category to sign up in
    #[arg(short = 't', long, value_enum)]
    pub category: CategoryArg,

    /// Week to sign up for (any date in it); defaults to the current week
    #[arg(short, long, value_parser = parse_week)]
    pub week: Option<WeekKey>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Remove a player's signup.
#[derive(Debug, Args)]
pub struct RemoveCommand {
    /// Player name
    #[arg(short, long)]
    pub name: String,

    /// Week to remove from (any date in it); defaults to the current week
    #[arg(short, long, value_parser = parse_week)]
    pub week: Option<WeekKey>,

    /// Category to remove from; found automatically if omitted
    #[arg(short = 't', long, value_enum)]
    pub category: Option<CategoryArg>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Look up where a player sits.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Player name
    #[arg(short, long)]
    pub name: String,

    /// Week to check (any date in it); defaults to the current week
    #[arg(short, long, value_parser = parse_week)]
    pub week: Option<WeekKey>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Clear one week.
#[derive(Debug, Args)]
pub struct ResetCommand {
    /// Week to clear (any date in it)
    #[arg(short, long, value_parser = parse_week)]
    pub week: WeekKey,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Drop past weeks.
#[derive(Debug, Args)]
pub struct PruneCommand {
    /// Drop weeks before this one; defaults to the current week
    #[arg(short, long, value_parser = parse_week)]
    pub before: Option<WeekKey>,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration and secrets file paths
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Category argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CategoryArg {
    /// Man-matching player
    Mmp,
    /// Woman-matching player
    Wmp,
    /// No matching preference
    #[value(alias = "no-preference", alias = "no_preference")]
    Xmp,
}

impl From<CategoryArg> for Category {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Mmp => Category::Mmp,
            CategoryArg::Wmp => Category::Wmp,
            CategoryArg::Xmp => Category::NoPreference,
        }
    }
}
