//! Command line interface.
//!
//! With no subcommand the server starts. `history` subcommands read the
//! same data file offline and print JSON.

use clap::{Parser, Subcommand};

use crate::history::{HistoryQuery, HistoryStore};

#[derive(Parser, Debug)]
#[command(name = "ranchwatch", version, about = "Ranch monitoring backend")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP API and voice relay (default)
    Serve {
        /// Override the listening port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Inspect the analysis history
    #[command(subcommand)]
    History(HistoryCommand),
}

#[derive(Subcommand, Debug, Clone)]
pub enum HistoryCommand {
    /// List records, newest first
    List {
        /// Only records from this camera
        #[arg(long)]
        camera_id: Option<String>,

        #[arg(short, long)]
        limit: Option<i64>,

        #[arg(short, long)]
        offset: Option<i64>,
    },

    /// Show one record
    Show {
        /// Record id
        id: String,
    },

    /// Print aggregate figures
    Summary,
}

/// Run a history command and return the JSON to print.
pub async fn render_history_command(
    cmd: HistoryCommand,
    store: &HistoryStore,
) -> anyhow::Result<String> {
    let json = match cmd {
        HistoryCommand::List {
            camera_id,
            limit,
            offset,
        } => {
            let query = HistoryQuery {
                camera_id,
                limit,
                offset,
            };
            serde_json::to_string_pretty(&store.query(&query).await?)?
        }
        HistoryCommand::Show { id } => match store.find(&id).await? {
            Some(record) => serde_json::to_string_pretty(&record)?,
            None => anyhow::bail!("No record with id '{}'", id),
        },
        HistoryCommand::Summary => serde_json::to_string_pretty(&store.summary().await?)?,
    };
    Ok(json)
}

/// Run a history command, printing its output.
pub async fn run_history_command(cmd: HistoryCommand, store: &HistoryStore) -> anyhow::Result<()> {
    println!("{}", render_history_command(cmd, store).await?);
    Ok(())
}
