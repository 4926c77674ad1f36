//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::config::Config;
use crate::sink::TerminalFormat;

/// Run command arguments.
///
/// Every flag overrides the matching configuration value for this run only.
#[derive(Debug, Default, Args)]
pub struct RunCommand {
    /// Number of ticks to play
    #[arg(short, long)]
    pub ticks: Option<u32>,

    /// Delay between ticks in milliseconds
    #[arg(short, long, value_name = "MS")]
    pub delay_ms: Option<u64>,

    /// Number of log lines kept on screen
    #[arg(long)]
    pub capacity: Option<usize>,

    /// Seed for reproducible jitter and noise
    #[arg(long)]
    pub seed: Option<u64>,

    /// Script file to play instead of the built-in one
    #[arg(short, long, value_name = "FILE")]
    pub script: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

impl RunCommand {
    /// Apply the overrides to a loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(ticks) = self.ticks {
            config.playback.tick_count = ticks;
        }
        if let Some(delay) = self.delay_ms {
            config.playback.tick_delay_ms = delay;
        }
        if let Some(capacity) = self.capacity {
            config.playback.log_capacity = capacity;
        }
        if self.seed.is_some() {
            config.playback.seed = self.seed;
        }
        if self.script.is_some() {
            config.playback.script_path.clone_from(&self.script);
        }
    }
}

/// Profile roster commands.
#[derive(Debug, Subcommand)]
pub enum ProfilesCommand {
    /// List every profile in roster order
    List {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show one profile
    Show {
        /// Profile identifier
        id: String,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// Script commands.
#[derive(Debug, Subcommand)]
pub enum ScriptCommand {
    /// Show the configured script
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Check a script against the profile roster
    Validate {
        /// Script file to check (defaults to the configured script)
        file: Option<PathBuf>,
    },
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

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format for the run command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// One JSON object per line
    Json,
}

impl From<OutputFormat> for TerminalFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Plain => Self::Plain,
            OutputFormat::Json => Self::Json,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_conversion() {
        assert_eq!(TerminalFormat::from(OutputFormat::Plain), TerminalFormat::Plain);
        assert_eq!(TerminalFormat::from(OutputFormat::Json), TerminalFormat::Json);
    }

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Plain);
    }

    #[test]
    fn test_run_command_overrides() {
        let cmd = RunCommand {
            ticks: Some(20),
            delay_ms: Some(0),
            capacity: Some(10),
            seed: Some(7),
            script: Some(PathBuf::from("/tmp/story.toml")),
            format: OutputFormat::Json,
        };
        let mut config = Config::default();
        cmd.apply(&mut config);

        assert_eq!(config.playback.tick_count, 20);
        assert_eq!(config.playback.tick_delay_ms, 0);
        assert_eq!(config.playback.log_capacity, 10);
        assert_eq!(config.playback.seed, Some(7));
        assert_eq!(
            config.playback.script_path,
            Some(PathBuf::from("/tmp/story.toml"))
        );
    }

    #[test]
    fn test_run_command_without_flags_keeps_config() {
        let mut config = Config::default();
        config.playback.seed = Some(99);
        RunCommand::default().apply(&mut config);
        assert_eq!(config, {
            let mut expected = Config::default();
            expected.playback.seed = Some(99);
            expected
        });
    }

    #[test]
    fn test_profiles_command_debug() {
        let cmd = ProfilesCommand::Show {
            id: "104".to_string(),
            json: false,
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Show"));
        assert!(debug_str.contains("104"));
    }

    #[test]
    fn test_config_command_debug() {
        let cmd = ConfigCommand::Show { json: false };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Show"));
    }
}
