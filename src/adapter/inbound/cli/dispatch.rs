//! Entry point from `main`: route the parsed command to its handler.

use crate::adapter::inbound::cli::command::{Cli, Commands};
use crate::adapter::inbound::cli::{output, run, status};
use crate::application::shutdown::Shutdown;

/// Run the parsed command and return the process exit code.
pub async fn dispatch(cli: Cli, shutdown: Shutdown) -> u8 {
    output::configure(output::OutputConfig::new(cli.json, cli.quiet, cli.verbose));
    match cli.command_or_default() {
        Commands::Run(args) => run::execute(&args, shutdown).await,
        Commands::Status(args) => status::execute(&args).await,
    }
}
