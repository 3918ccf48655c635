use std::{
    io::{self, BufRead},
    path::PathBuf,
    process,
    sync::Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::error;

use chatroom::{
    config::{self, ClientConfig},
    ChatHistory, Client, Display, MessageObserver,
};

/// Terminal chat client: stdin lines are sent, relay lines are printed.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Name shown to the other participants
    #[arg(short, long)]
    username: String,

    /// Relay host
    #[arg(long, default_value = config::DEFAULT_HOST)]
    host: String,

    /// Relay port
    #[arg(short, long, default_value_t = config::DEFAULT_PORT)]
    port: u16,

    /// Chat history file
    #[arg(long, default_value = config::DEFAULT_HISTORY_FILE)]
    history: PathBuf,

    /// Don't load or save chat history
    #[arg(long)]
    no_history: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

struct Terminal;

impl Display for Terminal {
    fn on_line_received(&self, line: &str) {
        println!("{line}");
    }

    fn on_disconnected(&self) {
        eprintln!("Server has shut down");
        process::exit(0);
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let mut config = ClientConfig::new(cli.host, cli.port, cli.username);
    config.history = (!cli.no_history).then_some(cli.history);
    config.validate()?;

    let history = config.history.as_ref().map(|path| Arc::new(ChatHistory::open(path)));
    if let Some(history) = &history {
        for message in history.messages() {
            println!("{}", message.render());
        }
    }

    let observer = history.map(|h| h as Arc<dyn MessageObserver>);
    let (client, reader) = Client::connect(&config, Arc::new(Terminal), observer)
        .with_context(|| format!("Could not find server at {}", config.address()))?;

    let client = Arc::new(client);
    client.listen(reader).context("Couldn't start listener thread")?;

    for line in io::stdin().lock().lines() {
        let line = line.context("Reading stdin")?;

        if let Err(e) = client.send(&line) {
            error!("Sending failed: {}", e);
            break;
        }
    }

    client.close();
    Ok(())
}

fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}
