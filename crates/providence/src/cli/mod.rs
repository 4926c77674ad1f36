//! Command-line interface for providence.
//!
//! Argument definitions for the `providence` binary. Handlers live in
//! `main.rs`.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::logging::Verbosity;

pub use commands::{ConfigCommand, OutputFormat, ProfilesCommand, RunCommand, ScriptCommand};

/// providence - Scripted surveillance dashboard
///
/// Plays a fixed narrative of log lines, camera feeds and profile matches
/// to the terminal.
#[derive(Debug, Parser)]
#[command(name = "providence")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Play the timeline
    Run(RunCommand),

    /// Inspect the profile roster
    #[command(subcommand)]
    Profiles(ProfilesCommand),

    /// Inspect or check the script
    #[command(subcommand)]
    Script(ScriptCommand),

    /// View or validate configuration
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
