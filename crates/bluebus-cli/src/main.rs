//! ble-connect: connect to the first device advertising a service UUID

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use bluebus_cli::{app, cli::Cli, config::AppConfig};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::load(&cli) {
        Ok(config) => config,
        Err(e) => {
            setup_logging(cli.verbose);
            error!("{}", e);
            std::process::exit(1);
        }
    };
    setup_logging(config.verbose);

    if let Err(e) = app::run(&config, &cli.uuid).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

/// Setup logging based on verbosity level; `RUST_LOG` takes precedence when set
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
