//! # cadence
//!
//! A terminal task tracker that keeps a local task list and a remote,
//! per-user task collection side by side without merging them.
//!
//! ## Usage
//!
//! ```bash
//! # Add a task (estimates: 30, 60, 90, 120, 180, 240 minutes)
//! cadence add "Read chapter 3" --due 2025-12-01 --minutes 60
//!
//! # Toggle completion by id or id prefix
//! cadence toggle 3f2a
//!
//! # List tasks: all, completed or todo
//! cadence list --filter todo
//!
//! # Summary cards and the next three upcoming tasks
//! cadence dashboard --focus-minutes 75
//!
//! # Remote collection for the configured user
//! cadence remote summary
//! cadence remote add "Lab report" --description "Section 2" --due 2025-12-03
//! ```
//!
//! ## Data Storage
//!
//! Tasks are saved as `storedTasks.json` in your local data directory
//! (`~/.local/share/cadence` on Linux). Override with `CADENCE_DATA_DIR`.
//! Settings are read from `config.toml` in the config directory, or from
//! `CADENCE_CONFIG`.

use std::io;
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cadence::aggregate::TaskFilter;
use cadence::commands::*;
use cadence::config::Config;
use cadence::engine::ReconciliationEngine;
use cadence::error::{Error, Result};
use cadence::remote::{FileRemoteStore, RemoteTaskMirror, RemoteTaskStore};
use cadence::service;
use cadence::storage::{FileBlobStore, LocalTaskStore};
use cadence::sync::RemoteTaskList;

#[derive(Parser)]
#[command(name = "cadence")]
#[command(about = "Task tracker with a local list and a remote mirror", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new task
    Add {
        /// Task title (quoted if it has spaces)
        title: String,
        /// Due date, YYYY-MM-DD or "YYYY-MM-DD HH:MM"
        #[arg(short, long)]
        due: String,
        /// Estimated minutes (30, 60, 90, 120, 180 or 240)
        #[arg(short, long, default_value_t = 30)]
        minutes: u32,
    },
    /// Toggle a task between done and not done
    Toggle {
        /// Task id or unique id prefix
        id: String,
    },
    /// List tasks
    List {
        /// Which tasks to show
        #[arg(short, long, value_enum, default_value_t = TaskFilter::All)]
        filter: TaskFilter,
    },
    /// Show summary cards and upcoming tasks
    Dashboard {
        /// Total focus minutes from the focus timer
        #[arg(long)]
        focus_minutes: Option<u32>,
        /// Upcoming tasks to show
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Work with the remote task collection
    Remote {
        /// User whose tasks to use (defaults to remote.user_id in config)
        #[arg(short, long, global = true)]
        user: Option<String>,
        #[command(subcommand)]
        command: RemoteCommands,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum RemoteCommands {
    /// Summary of the remote collection
    Summary,
    /// Add a remote task
    Add {
        title: String,
        #[arg(short, long, default_value = "")]
        description: String,
        #[arg(long)]
        due: Option<String>,
    },
    /// Toggle a remote task
    Toggle { id: String },
    /// Delete a remote task
    Delete { id: String },
}

#[tokio::main]
async fn main() {
    // Tracing is opt-in via RUST_LOG.
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|raw| EnvFilter::try_new(raw.trim()).ok())
        .unwrap_or_else(|| EnvFilter::new("off"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("Error: {err}");
        std::process::exit(err.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load_or_default(&Config::default_path());

    match cli.command {
        Commands::Remote { user, command } => run_remote(&config, user, command).await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "cadence", &mut io::stdout());
            Ok(())
        }
        command => run_local(&config, command).await,
    }
}

async fn run_local(config: &Config, command: Commands) -> Result<()> {
    let blobs = FileBlobStore::new(config.data.resolved_dir());
    let engine = ReconciliationEngine::new(LocalTaskStore::new(Arc::new(blobs)));
    let (handle, join) = service::spawn(engine);
    cmd_load(&handle, false).await?;

    match command {
        Commands::Add { title, due, minutes } => {
            cmd_add(&handle, &title, &due, minutes, false).await?;
        }
        Commands::Toggle { id } => {
            cmd_toggle(&handle, &id, false).await?;
        }
        Commands::List { filter } => cmd_list(&handle, filter).await?,
        Commands::Dashboard {
            focus_minutes,
            limit,
        } => {
            handle
                .set_focus_minutes(focus_minutes.unwrap_or(config.dashboard.focus_minutes))
                .await?;
            cmd_dashboard(
                &handle.aggregate(),
                limit.unwrap_or(config.dashboard.upcoming_limit),
            );
        }
        Commands::Remote { .. } | Commands::Completions { .. } => {}
    }

    drop(handle);
    join.await?;
    Ok(())
}

async fn run_remote(config: &Config, user: Option<String>, command: RemoteCommands) -> Result<()> {
    let user_id = user
        .or_else(|| config.remote.user_id.clone())
        .ok_or_else(|| {
            Error::InvalidArgument("no user given; pass --user or set remote.user_id".to_string())
        })?;
    let dir = config
        .remote
        .path
        .clone()
        .unwrap_or_else(|| config.data.resolved_dir().join("remote"));
    let store: Arc<dyn RemoteTaskStore> = Arc::new(FileRemoteStore::new(dir));

    match command {
        RemoteCommands::Summary => {
            let mirror = RemoteTaskMirror::new(store);
            cmd_remote_summary(&mirror, &user_id, config.dashboard.upcoming_limit).await;
        }
        RemoteCommands::Add {
            title,
            description,
            due,
        } => {
            let mut list = RemoteTaskList::new(store, user_id);
            cmd_remote_add(&mut list, &title, &description, due.as_deref(), false).await?;
        }
        RemoteCommands::Toggle { id } => {
            let mut list = RemoteTaskList::new(store, user_id);
            cmd_remote_toggle(&mut list, &id, false).await?;
        }
        RemoteCommands::Delete { id } => {
            let mut list = RemoteTaskList::new(store, user_id);
            cmd_remote_delete(&mut list, &id, false).await?;
        }
    }
    Ok(())
}
