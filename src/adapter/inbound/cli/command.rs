//! Command-line interface definitions.
//!
//! `stackwarden` with no subcommand performs a full update cycle, the same as
//! `stackwarden run`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::infrastructure::config::settings::DEFAULT_CONFIG_PATH;

/// Keeps a native inference runtime and its web front-end updated and healthy
#[derive(Parser, Debug)]
#[command(name = "stackwarden")]
#[command(version)]
pub struct Cli {
    /// JSON output for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Decrease output verbosity
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase output verbosity
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// The requested subcommand, `run` when none was given.
    #[must_use]
    pub fn command_or_default(self) -> Commands {
        self.command.unwrap_or_else(|| Commands::Run(RunArgs::default()))
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check for updates, apply them and converge both services (requires root)
    Run(RunArgs),

    /// Report the current state of the stack without changing anything
    Status(StatusArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the configuration file (missing file means defaults)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Remove a run lock held by a live process once the wait window elapses
    #[arg(long)]
    pub force_unlock: bool,

    /// Exit non-zero when any phase ends degraded or failed
    #[arg(long)]
    pub strict: bool,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            config: PathBuf::from(DEFAULT_CONFIG_PATH),
            force_unlock: false,
            strict: false,
        }
    }
}

/// Arguments for the `status` subcommand.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Path to the configuration file (missing file means defaults)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn bare_invocation_means_run() {
        let cli = Cli::try_parse_from(["stackwarden"]).unwrap();
        match cli.command_or_default() {
            Commands::Run(args) => {
                assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_PATH));
                assert!(!args.force_unlock);
            }
            Commands::Status(_) => panic!("expected run"),
        }
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "stackwarden",
            "--json",
            "run",
            "--config",
            "/tmp/c.toml",
            "--force-unlock",
            "--strict",
        ])
        .unwrap();
        assert!(cli.json);
        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.config, PathBuf::from("/tmp/c.toml"));
        assert!(args.force_unlock && args.strict);
    }
}
