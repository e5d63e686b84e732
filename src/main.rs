use std::net::{IpAddr, SocketAddr};

use anyhow::Context;
use clap::Parser;

use ranchwatch::api::{self, ApiState};
use ranchwatch::cli::{Cli, Command, run_history_command};
use ranchwatch::config::Config;
use ranchwatch::history::HistoryStore;
use ranchwatch::logging::{self, LogFormat};
use ranchwatch::server::Server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load `.env` before anything reads the environment.
    let _ = dotenvy::dotenv();
    logging::init(LogFormat::from_env());

    let cli = Cli::parse();
    let mut config = Config::from_env()?;

    match cli.command.unwrap_or(Command::Serve { port: None }) {
        Command::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            serve(config).await
        }
        Command::History(cmd) => {
            let store = HistoryStore::from_config(&config);
            run_history_command(cmd, &store).await
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let ip: IpAddr = config
        .host
        .parse()
        .with_context(|| format!("invalid HOST '{}'", config.host))?;
    let addr = SocketAddr::new(ip, config.port);

    let state = ApiState::from_config(&config)?;
    tracing::info!(
        history = %state.store.path().display(),
        history_max = state.store.history_max(),
        vision = state.vision.name(),
        auth = config.api_access_key.is_some(),
        voice_relay = config.voice.upstream_url.is_some(),
        "Starting ranch monitor"
    );

    let mut server = Server::new(addr);
    server.start(api::router(state)).await?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    server.shutdown().await;

    Ok(())
}
