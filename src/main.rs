// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Diagram-Sync command line client
//!
//! Logs in to the document store, lists diagrams, replays queued offline
//! saves and restores the last open document without a canvas attached.

use anyhow::Context;
use clap::{Parser, Subcommand};
use diagram_sync::{
    config::Config,
    models::ListQuery,
    services::{Collaborators, TokenStore},
    store::{keys, FileStore, KeyValueStore},
    time_utils::format_epoch_ms,
    SyncClient,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "diagram-sync")]
#[command(about = "Sync client for the diagram document store")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and store credentials
    Login {
        #[arg(long, short = 'u')]
        username: String,
        #[arg(long, env = "DIAGRAM_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget stored credentials
    Logout,
    /// Show the logged-in identity
    Whoami {
        /// Also ask the server
        #[arg(long)]
        remote: bool,
    },
    /// List (or search) diagrams
    List {
        #[arg(long)]
        project: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        offset: Option<u32>,
        /// Only diagrams owned by the caller
        #[arg(long)]
        mine: bool,
        /// Full-text search instead of listing
        #[arg(long, short = 'q')]
        search: Option<String>,
    },
    /// Open a diagram, making it the current document
    Open { id: String },
    /// Start a new blank diagram
    New,
    /// Delete a diagram
    Delete { id: String },
    /// Replay queued offline saves
    Drain,
    /// Reopen the document that was current last time
    Resume,
    /// Show current document, queue and auth state
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries command output
    init_logging();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::debug!(api = %config.api_base_url, state_dir = %config.state_dir.display(), "Configuration loaded");

    let file_store = FileStore::open(&config.state_dir).context("Failed to open state directory")?;
    tracing::debug!(path = %file_store.path().display(), "State store opened");
    let store: Arc<dyn KeyValueStore> = Arc::new(file_store);
    let client = SyncClient::new(config, store)?;

    match cli.command {
        Command::Login { username, password } => {
            let state = client.auth.login(&username, &password).await?;
            print_json(&state)?;
        }
        Command::Logout => {
            client.auth.logout();
            println!("Logged out");
        }
        Command::Whoami { remote } => {
            print_json(&client.auth.auth_state())?;
            if remote {
                print_json(&client.api.me().await?)?;
            }
        }
        Command::List {
            project,
            tags,
            limit,
            offset,
            mine,
            search,
        } => {
            let controller = client.controller(Collaborators::headless());
            let documents = match search {
                Some(q) => {
                    controller
                        .search_documents(&q, project.as_deref(), limit)
                        .await?
                }
                None => {
                    let query = ListQuery {
                        project,
                        tags,
                        limit,
                        offset,
                        mine,
                    };
                    controller.list_documents(&query).await?
                }
            };
            print_json(&documents)?;
        }
        Command::Open { id } => {
            let controller = client.controller(Collaborators::headless());
            let read_only = controller.switch_to(&id).await.into_result(&id)?;
            controller.wait_for_background().await;
            tracing::info!(document_id = %id, read_only, "Opened document");
            print_json(&controller.session())?;
        }
        Command::New => {
            let controller = client.controller(Collaborators::headless());
            let id = controller.create_new().await;
            controller.wait_for_background().await;
            println!("{id}");
        }
        Command::Delete { id } => {
            let controller = client.controller(Collaborators::headless());
            if client.store.get(keys::CURRENT_DOCUMENT)?.as_deref() == Some(id.as_str()) {
                // Make it current so the blank-document swap runs.
                controller.switch_to(&id).await;
            }
            controller.delete_current(&id).await?;
            controller.wait_for_background().await;
            println!("Deleted {id}");
        }
        Command::Drain => {
            let controller = client.controller(Collaborators::headless());
            let synced = controller.on_reconnect().await?;
            let remaining = client.queue.pending_count()?;
            println!("Synced {synced} queued save(s), {remaining} remaining");
        }
        Command::Resume => {
            let controller = client.controller(Collaborators::headless());
            match controller.restore_last_session().await {
                Some(outcome) => {
                    tracing::info!(?outcome, "Session restore finished");
                    controller.wait_for_background().await;
                    print_json(&controller.session())?;
                }
                None => println!("No previous session"),
            }
        }
        Command::Status => {
            let stored = TokenStore::new(client.store.clone()).load()?;
            let status = serde_json::json!({
                "auth": client.auth.auth_state(),
                "accessTokenExpiresAt": stored.access.map(|t| format_epoch_ms(t.expires_at_ms)),
                "refreshTokenExpiresAt": stored.refresh.map(|t| format_epoch_ms(t.expires_at_ms)),
                "currentDocumentId": client.store.get(keys::CURRENT_DOCUMENT)?,
                "pendingSaves": client.queue.pending_ids()?,
            });
            print_json(&status)?;
        }
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("diagram_sync=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
