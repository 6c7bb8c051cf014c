//! CLI command implementations

mod catalog;
mod lists;

pub use catalog::{browse, genres, search, show};
pub use lists::{
    add_to_list, create_list, delete_list, list_all, list_books, lists_containing,
    remove_from_list, rename_list,
};

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use shelfsync_core::connectivity::ConnectivityStatus;
use shelfsync_core::{
    open_backend, BackendChoice, Book, CatalogSync, ConnectivityMonitor, ListManager,
    OpenLibraryClient, Settings,
};

/// Global flags that shape how the core is wired
pub struct Options {
    pub offline: bool,
    pub data_dir: Option<PathBuf>,
    pub backend: Option<BackendChoice>,
    pub json: bool,
}

/// The wired-up core shared by every command
pub struct App {
    pub sync: CatalogSync,
    pub lists: ListManager,
    pub json: bool,
}

impl App {
    pub fn open(options: Options) -> Result<Self> {
        let mut settings = Settings::from_env().context("Invalid SHELFSYNC_* environment")?;
        if let Some(dir) = options.data_dir {
            settings.data_dir = dir;
        }
        if let Some(backend) = options.backend {
            settings.backend = backend;
        }

        let backend = open_backend(&settings).with_context(|| {
            format!("Failed to open the cache in {}", settings.data_dir.display())
        })?;
        tracing::debug!("Cache backend: {}", backend.kind());

        let remote =
            OpenLibraryClient::new(&settings).context("Failed to build the HTTP client")?;

        // No platform detection here; --offline is the only signal
        let status = if options.offline {
            ConnectivityStatus::OFFLINE
        } else {
            ConnectivityStatus::UNKNOWN
        };
        let connectivity = ConnectivityMonitor::new(status);

        Ok(Self {
            sync: CatalogSync::new(
                Arc::clone(&backend),
                Arc::new(remote),
                Arc::new(connectivity),
                &settings,
            ),
            lists: ListManager::new(backend),
            json: options.json,
        })
    }

    /// Print `value` as pretty JSON when `--json` is set, otherwise run `text`
    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce(&T)) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            text(value);
        }
        Ok(())
    }
}

/// One-line summary of a book
fn book_line(book: &Book) -> String {
    let mut line = format!("{}  {}", book.key, book.title);
    if !book.authors.is_empty() {
        let names: Vec<&str> = book.authors.iter().map(|a| a.name.as_str()).collect();
        line.push_str(&format!(" by {}", names.join(", ")));
    }
    if let Some(year) = book.first_publish_year {
        line.push_str(&format!(" ({})", year));
    }
    line
}
