//! QR Batch Generator
//!
//! Generates a numbered range of QR code images, optionally with a logo,
//! into a sharded output directory tree using a fixed pool of workers.

mod config;
mod dispatch;
mod error;
mod monitor;
mod paths;
mod pool;
mod producer;
mod report;
mod run;
mod template;
mod worker;

use crate::config::{Cli, Config};
use crate::run::run;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env before the log filter and clap read the environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "qrbatch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = match Config::try_from(cli) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Configuration rejected");
            std::process::exit(e.exit_code());
        }
    };
    info!("Configuration loaded: {:?}", config);

    let token = CancellationToken::new();
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, shutting down...");
            ctrl_c_token.cancel();
        }
    });

    let summary = match run(&config, token).await {
        Ok(summary) => summary,
        Err(e) => {
            error!(error = %e, "Run failed");
            std::process::exit(e.exit_code());
        }
    };

    let mut code = summary.exit_code();
    if let Some(path) = &config.report {
        match summary.write_json(path) {
            Ok(()) => info!(path = %path.display(), "Report written"),
            Err(e) => {
                error!(error = %e, "Failed to write report");
                code = code.max(e.exit_code());
            }
        }
    }

    // Exit explicitly so a worker stuck in a blocking call cannot hold the
    // process open.
    std::process::exit(code);
}
