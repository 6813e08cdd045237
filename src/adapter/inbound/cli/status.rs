//! Handler for the `status` command: observe only, never change anything.

use tracing::error;

use crate::adapter::inbound::cli::command::StatusArgs;
use crate::adapter::inbound::cli::{exit, output, report};
use crate::application::directory::{invoking_home, DirectoryResolver};
use crate::application::report::StatusReporter;
use crate::infrastructure::bootstrap::build_drivers;
use crate::infrastructure::config::settings::Config;

pub async fn execute(args: &StatusArgs) -> u8 {
    let mut config = match Config::load_or_default(&args.config) {
        Ok(config) => config,
        Err(error) => {
            output::error(&format!(
                "invalid configuration {}: {error}",
                args.config.display()
            ));
            return exit::SETUP;
        }
    };
    // Status may run unprivileged; the shared run log is left to `run`.
    config.logging.file = None;
    config.init_logging();

    let drivers = match build_drivers(&config) {
        Ok(drivers) => drivers,
        Err(error) => {
            error!(error = %error, "Driver setup failed");
            output::error(&format!("setup failed: {error}"));
            return exit::SETUP;
        }
    };

    let home = invoking_home(config.invoking_user.as_deref());
    let assets = DirectoryResolver::new(config.assets.clone(), home).find_existing();
    let report = StatusReporter::new(&config, &drivers)
        .collect("status", assets.as_ref())
        .await;
    report::render(&report, None);
    exit::OK
}
