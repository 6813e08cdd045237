use std::process::ExitCode;

use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing::warn;

use stackwarden::adapter::inbound::cli::command::Cli;
use stackwarden::adapter::inbound::cli::dispatch::dispatch;
use stackwarden::application::shutdown::Shutdown;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        warn!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    ExitCode::from(dispatch(cli, Shutdown::new(shutdown_rx)).await)
}

async fn wait_for_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
