//! Shelfsync CLI - Offline-first book catalog from the command line

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use shelfsync_core::BackendChoice;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

/// Parse and validate a page number (must be at least 1)
fn parse_page(s: &str) -> Result<u32, String> {
    let n: u32 = s.parse().map_err(|_| format!("'{}' is not a valid number", s))?;
    if n < 1 {
        Err("page must be at least 1".to_string())
    } else {
        Ok(n)
    }
}

#[derive(Parser)]
#[command(name = "shelfsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Never contact the remote catalog
    #[arg(long, global = true)]
    offline: bool,

    /// Directory for the local cache (overrides SHELFSYNC_DATA_DIR)
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Storage engine: auto, sqlite or kv (overrides SHELFSYNC_BACKEND)
    #[arg(long, global = true, value_name = "BACKEND")]
    backend: Option<BackendChoice>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the browsable genres
    Genres,

    /// Browse one page of a genre
    Browse {
        /// Genre id (e.g. fiction)
        genre: String,

        /// Page number
        #[arg(short, long, default_value = "1", value_parser = parse_page)]
        page: u32,

        /// Clear the genre cache and start again from page 1
        #[arg(long)]
        refresh: bool,
    },

    /// Search the catalog by title or author
    Search {
        /// Search text
        query: String,

        /// Page number
        #[arg(short, long, default_value = "1", value_parser = parse_page)]
        page: u32,
    },

    /// Show the details of a single work
    Show {
        /// Work key (e.g. /works/OL45883W)
        key: String,
    },

    /// Manage custom reading lists
    Lists {
        #[command(subcommand)]
        command: ListCommands,
    },
}

#[derive(Subcommand)]
enum ListCommands {
    /// Show all lists
    Ls,

    /// Create a new list
    Create {
        name: String,

        #[arg(short, long)]
        description: Option<String>,
    },

    /// Rename a list and replace its description
    Rename {
        id: Uuid,

        name: String,

        #[arg(short, long)]
        description: Option<String>,
    },

    /// Delete a list
    Delete { id: Uuid },

    /// Add a work to a list
    Add { id: Uuid, key: String },

    /// Remove a work from a list
    Remove { id: Uuid, key: String },

    /// Show the books in a list
    Books { id: Uuid },

    /// Show the lists containing a work
    Containing { key: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; logs go to stderr so stdout stays parseable
    let filter = if cli.verbose {
        "shelfsync_cli=debug,shelfsync_core=debug"
    } else {
        "shelfsync_cli=info,shelfsync_core=warn"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let app = commands::App::open(commands::Options {
        offline: cli.offline,
        data_dir: cli.data_dir,
        backend: cli.backend,
        json: cli.json,
    })?;

    match cli.command {
        Commands::Genres => commands::genres(&app),

        Commands::Browse {
            genre,
            page,
            refresh,
        } => commands::browse(&app, &genre, page, refresh).await,

        Commands::Search { query, page } => commands::search(&app, &query, page).await,

        Commands::Show { key } => commands::show(&app, &key).await,

        Commands::Lists { command } => match command {
            ListCommands::Ls => commands::list_all(&app).await,
            ListCommands::Create { name, description } => {
                commands::create_list(&app, &name, description.as_deref()).await
            }
            ListCommands::Rename {
                id,
                name,
                description,
            } => commands::rename_list(&app, id, &name, description.as_deref()).await,
            ListCommands::Delete { id } => commands::delete_list(&app, id).await,
            ListCommands::Add { id, key } => commands::add_to_list(&app, id, &key).await,
            ListCommands::Remove { id, key } => commands::remove_from_list(&app, id, &key).await,
            ListCommands::Books { id } => commands::list_books(&app, id).await,
            ListCommands::Containing { key } => commands::lists_containing(&app, &key).await,
        },
    }
}
