use anyhow::Context;
use clap::Parser;
use tracing::info;

use chatroom::{
    config::{self, ServerConfig},
    Listener,
};

/// Relay every line a client sends to all other connected clients.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = config::DEFAULT_BIND_HOST)]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = config::DEFAULT_PORT)]
    port: u16,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config = ServerConfig::new(cli.host, cli.port);
    config.validate()?;

    let listener = Listener::from_config(&config)
        .with_context(|| format!("Failed to start server on {}", config.address()))?;

    info!("Server started");
    listener.serve();

    Ok(())
}

fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();
}
