//! # Threadline CLI (`threadline`)
//!
//! ## Usage
//!
//! ```bash
//! threadline --config ./config/threadline.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `threadline init` | Create the SQLite database and run schema migrations |
//! | `threadline import <file>` | Load documents from JSON Lines |
//! | `threadline add [file]` | Analyze and store one document |
//! | `threadline documents` | List completed documents, newest first |
//! | `threadline document --id <id>` | Print a stored document |
//! | `threadline search <query>` | Find documents related to a query |
//! | `threadline analyze --note <id>` | Analyze note text from a file or stdin |
//! | `threadline compose --note <id>` | Stream draft edits from stdin through the scheduler |
//! | `threadline note --note <id>` | Print a stored note |
//! | `threadline serve` | Start the HTTP server |
//!
//! Logs go to stderr and honor `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use threadline::{commands, config, migrate, server};

/// Threadline: narrative threads and related reading for your notes.
#[derive(Parser)]
#[command(name = "threadline", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/threadline.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// Import documents from a JSON Lines file.
    ///
    /// Documents without embeddings are embedded from their knowledge,
    /// reading contexts and insights using the configured provider.
    Import {
        /// Path to the `.jsonl` file.
        file: PathBuf,

        /// Owner of the imported documents (defaults to `[store].default_user`).
        #[arg(long)]
        user: Option<String>,
    },

    /// Analyze document content and store it with its embeddings.
    ///
    /// Reads the content from `file`, or stdin when omitted.
    Add {
        file: Option<PathBuf>,

        /// Document id (a random UUID when omitted).
        #[arg(long)]
        id: Option<String>,

        /// Where the content came from.
        #[arg(long)]
        url: Option<String>,

        #[arg(long)]
        user: Option<String>,
    },

    /// List completed documents as JSON, newest first.
    Documents {
        #[arg(long)]
        user: Option<String>,
    },

    /// Print a stored document as JSON.
    Document {
        #[arg(long)]
        id: String,

        #[arg(long)]
        user: Option<String>,
    },

    /// Print the documents related to a free-text query.
    Search {
        query: String,

        #[arg(long)]
        user: Option<String>,
    },

    /// Analyze a note once and print the result as JSON.
    ///
    /// Reads the full note text from `--file`, or stdin when omitted.
    /// Unchanged text returns the stored note without calling any provider.
    Analyze {
        #[arg(long)]
        note: String,

        #[arg(long)]
        user: Option<String>,

        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Feed stdin lines as an evolving draft through the debounced scheduler.
    ///
    /// Prints one JSON line per published analysis and exits once input
    /// ends and no analysis is in flight.
    Compose {
        #[arg(long)]
        note: String,

        #[arg(long)]
        user: Option<String>,
    },

    /// Print a stored note as JSON.
    Note {
        #[arg(long)]
        note: String,

        #[arg(long)]
        user: Option<String>,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let default_user = cfg.store.default_user.clone();

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Import { file, user } => {
            let user = user.unwrap_or(default_user);
            commands::run_import(&cfg, &file, &user).await?;
        }
        Commands::Add { file, id, url, user } => {
            let user = user.unwrap_or(default_user);
            commands::run_add(&cfg, &user, file.as_deref(), id, url).await?;
        }
        Commands::Documents { user } => {
            let user = user.unwrap_or(default_user);
            commands::run_documents(&cfg, &user).await?;
        }
        Commands::Document { id, user } => {
            let user = user.unwrap_or(default_user);
            commands::run_document(&cfg, &id, &user).await?;
        }
        Commands::Search { query, user } => {
            let user = user.unwrap_or(default_user);
            commands::run_search(&cfg, &query, &user).await?;
        }
        Commands::Analyze { note, user, file } => {
            let user = user.unwrap_or(default_user);
            commands::run_analyze(&cfg, &note, &user, file.as_deref()).await?;
        }
        Commands::Compose { note, user } => {
            let user = user.unwrap_or(default_user);
            commands::run_compose(&cfg, &note, &user).await?;
        }
        Commands::Note { note, user } => {
            let user = user.unwrap_or(default_user);
            commands::run_note(&cfg, &note, &user).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
