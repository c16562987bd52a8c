//! CLI for ssehub
//!
//! Subcommands:
//! - `serve`: run the relay (event stream, publish and health routes)
//! - `listen`: connect to an event stream and print what arrives (useful for smoke tests)

use std::path::PathBuf;

use clap::Parser;
use futures_util::StreamExt;
use ssehub::app::App;
use ssehub::config::load_config;
use ssehub::server;
use ssehub::utils::logging;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "ssehub")]
enum Command {
    /// Start the relay server
    Serve {
        /// Configuration file (defaults to config/default.* when present)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Connect to an event stream and print received frames
    Listen {
        /// Event stream URL to connect to
        #[arg(long, default_value = "http://127.0.0.1:8080/events")]
        url: String,
        /// Resume after this event id
        #[arg(long)]
        last_event_id: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cmd = Command::parse();

    match cmd {
        Command::Serve { config } => {
            if let Err(e) = run_server(config).await {
                // Logging may not be up yet if the configuration was unusable.
                eprintln!("Server failed: {e}");
                std::process::exit(1);
            }
        }
        Command::Listen { url, last_event_id } => {
            logging::init("info", false);
            if let Err(e) = run_listener(&url, last_event_id).await {
                error!("Listener failed: {e}");
                std::process::exit(1);
            }
        }
    }
}

async fn run_server(config: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let settings = load_config(config.as_deref())?;
    logging::init(&settings.logging.level, settings.logging.json);
    info!(pid = std::process::id(), "Process starting");

    let shutdown = CancellationToken::new();
    tokio::spawn(server::shutdown_signal(shutdown.clone()));

    let app = App::build(&settings, shutdown.clone());
    let served = server::serve(&settings.server, app.router, shutdown.clone()).await;

    // Make sure the hub is torn down even if the server failed on its own.
    shutdown.cancel();
    app.controller.await?;
    info!("Process stopping");
    served.map_err(Into::into)
}

async fn run_listener(
    url: &str,
    last_event_id: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut request = reqwest::Client::new()
        .get(url)
        .header("accept", "text/event-stream");
    if let Some(id) = last_event_id {
        request = request.header("last-event-id", id);
    }

    let response = request.send().await?.error_for_status()?;
    info!(status = %response.status(), "Connected to {url}");

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        print!("{}", String::from_utf8_lossy(&chunk?));
    }

    info!("Stream closed by server");
    Ok(())
}
