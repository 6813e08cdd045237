//! Handler for the `run` command.

use std::sync::Arc;

use tracing::error;

use crate::adapter::inbound::cli::command::RunArgs;
use crate::adapter::inbound::cli::{exit, output, report};
use crate::application::orchestration::{Orchestrator, RunSummary};
use crate::application::shutdown::Shutdown;
use crate::error::{Error, LockError};
use crate::infrastructure::bootstrap::build_drivers;
use crate::infrastructure::config::lock::LockPolicy;
use crate::infrastructure::config::settings::Config;

/// Execute one update cycle.
pub async fn execute(args: &RunArgs, shutdown: Shutdown) -> u8 {
    let config = match load_config(args) {
        Ok(config) => config,
        Err(message) => {
            output::error(&message);
            return exit::SETUP;
        }
    };
    config.init_logging();

    if !is_root() {
        output::error("run requires root privileges");
        output::hint("re-run with sudo, or use `stackwarden status` to inspect");
        return exit::SETUP;
    }

    let drivers = match build_drivers(&config) {
        Ok(drivers) => drivers,
        Err(error) => {
            error!(error = %error, "Driver setup failed");
            output::error(&format!("setup failed: {error}"));
            return exit::SETUP;
        }
    };

    let policy = if args.force_unlock {
        LockPolicy::Force
    } else {
        config.lock.on_timeout
    };
    let orchestrator = Orchestrator::new(Arc::new(config), drivers, shutdown).lock_policy(policy);

    match orchestrator.run().await {
        Ok(summary) => {
            let status_file = summary
                .status_file
                .as_ref()
                .map(|path| path.display().to_string());
            report::render(&summary.report, status_file.as_deref());
            exit_code(&summary, args.strict)
        }
        Err(Error::Lock(LockError::Contended { path, owner_pid })) => {
            output::error(&format!(
                "another run (pid {owner_pid}) holds {}",
                path.display()
            ));
            output::hint("wait for it to finish, or pass --force-unlock");
            exit::LOCKED
        }
        Err(error) => {
            output::error(&error.to_string());
            exit::SETUP
        }
    }
}

fn load_config(args: &RunArgs) -> Result<Config, String> {
    let mut config = Config::load_or_default(&args.config)
        .map_err(|error| format!("invalid configuration {}: {error}", args.config.display()))?;
    if output::verbosity() > 0 {
        config.logging.level = "debug".into();
    }
    Ok(config)
}

fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

/// Map a finished run to the process exit code.
#[must_use]
pub fn exit_code(summary: &RunSummary, strict: bool) -> u8 {
    if summary.cancelled() {
        exit::CANCELLED
    } else if strict && !summary.report.is_clean() {
        exit::DEGRADED
    } else {
        exit::OK
    }
}
