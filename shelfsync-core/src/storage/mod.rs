//! Persistence backends for the offline cache and user lists
//!
//! Two engines implement [`PersistenceBackend`]: [`SqliteBackend`] (tables,
//! joins, transactions) and [`KvBackend`] (whole-collection documents over a
//! [`StorageProvider`]). Callers cannot tell them apart; one is chosen at
//! startup by [`open_backend`] and never swapped afterwards.

mod kv;
mod provider;
mod schema;
mod sqlite;

pub use kv::KvBackend;
pub use provider::{LocalStorage, MemoryStorage, StorageProvider};
pub use schema::CURRENT_VERSION;
pub use sqlite::SqliteBackend;

use crate::config::{BackendChoice, Settings};
use crate::error::StorageError;
use crate::types::{Book, CustomList, ListDraft, ListInsert, ListUpdate};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Which engine is serving a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Sqlite,
    KeyValue,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Sqlite => write!(f, "sqlite"),
            BackendKind::KeyValue => write!(f, "key-value"),
        }
    }
}

/// A slice of a genre's cached result set
#[derive(Debug, Clone, PartialEq)]
pub struct GenreSlice {
    /// Books ordered by cached position
    pub books: Vec<Book>,
    /// Number of books cached for the genre overall
    pub total: u64,
}

/// Uniform storage contract shared by both engines
#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Which engine this is
    fn kind(&self) -> BackendKind;

    // ── Books ───────────────────────────────────────────────────────────────

    /// Insert or replace a book by key.
    ///
    /// An empty author list leaves the stored authors untouched; a non-empty
    /// one replaces them.
    async fn upsert_book(&self, book: &Book) -> StorageResult<()>;

    /// Upsert several books
    async fn upsert_books(&self, books: &[Book]) -> StorageResult<()> {
        for book in books {
            self.upsert_book(book).await?;
        }
        Ok(())
    }

    async fn get_book(&self, key: &str) -> StorageResult<Option<Book>>;

    /// Case-insensitive substring search over titles and author names
    async fn search_local(&self, query: &str, limit: usize) -> StorageResult<Vec<Book>>;

    // ── Genre cache ─────────────────────────────────────────────────────────

    /// Upsert `books`, then record each at `start_position + index` for the genre.
    ///
    /// Existing positions for the genre are kept.
    async fn save_genre_page(
        &self,
        genre_id: &str,
        books: &[Book],
        start_position: u64,
    ) -> StorageResult<()>;

    /// Books for one page of the genre, ordered by position
    async fn get_genre_page(
        &self,
        genre_id: &str,
        page: u32,
        page_size: u32,
    ) -> StorageResult<GenreSlice>;

    async fn has_genre_cache(&self, genre_id: &str) -> StorageResult<bool>;

    /// Drop the genre's positions; the books stay cached
    async fn clear_genre_cache(&self, genre_id: &str) -> StorageResult<()>;

    // ── Lists ───────────────────────────────────────────────────────────────

    /// Atomically check the list limit and name uniqueness, then insert
    async fn create_list(&self, draft: &ListDraft, max_lists: usize) -> StorageResult<ListInsert>;

    /// All lists, newest first
    async fn list_all(&self) -> StorageResult<Vec<CustomList>>;

    async fn list_count(&self) -> StorageResult<usize>;

    async fn get_list(&self, id: Uuid) -> StorageResult<Option<CustomList>>;

    /// Whether another list already uses `name` (trimmed, ignoring case)
    async fn list_name_exists(&self, name: &str, exclude: Option<Uuid>) -> StorageResult<bool>;

    /// Atomically check name uniqueness (excluding `id`), then update
    async fn update_list(&self, id: Uuid, draft: &ListDraft) -> StorageResult<ListUpdate>;

    /// Delete a list and its memberships. Returns whether it existed.
    async fn delete_list(&self, id: Uuid) -> StorageResult<bool>;

    // ── Memberships ─────────────────────────────────────────────────────────

    /// Link a cached book to a list. Returns false if it was already linked.
    ///
    /// Fails with `NotFound` when either the list or the book is missing.
    async fn add_membership(&self, list_id: Uuid, book_key: &str) -> StorageResult<bool>;

    /// Unlink a book from a list. Returns whether a link was removed.
    async fn remove_membership(&self, list_id: Uuid, book_key: &str) -> StorageResult<bool>;

    async fn is_member(&self, list_id: Uuid, book_key: &str) -> StorageResult<bool>;

    /// Books in a list, most recently added first
    async fn books_in_list(&self, list_id: Uuid) -> StorageResult<Vec<Book>>;

    /// Lists containing the book, newest first
    async fn lists_containing(&self, book_key: &str) -> StorageResult<Vec<CustomList>>;
}

/// Select and open the backend for this process.
///
/// `Auto` probes the relational engine and falls back to the key-value store
/// over the data directory when it cannot be opened.
pub fn open_backend(settings: &Settings) -> StorageResult<Arc<dyn PersistenceBackend>> {
    std::fs::create_dir_all(&settings.data_dir)?;
    let db_path = settings.database_path();

    match settings.backend {
        BackendChoice::Sqlite => {
            tracing::info!("Using SQLite cache at {}", db_path.display());
            Ok(Arc::new(SqliteBackend::open(&db_path)?))
        }
        BackendChoice::KeyValue => {
            tracing::info!("Using key-value cache in {}", settings.data_dir.display());
            Ok(Arc::new(KvBackend::new(Arc::new(LocalStorage::new(
                settings.kv_path(),
            )))))
        }
        BackendChoice::Auto => match SqliteBackend::open(&db_path) {
            Ok(backend) => {
                tracing::info!("Using SQLite cache at {}", db_path.display());
                Ok(Arc::new(backend))
            }
            Err(e) => {
                tracing::warn!("SQLite unavailable ({}), using key-value cache", e);
                Ok(Arc::new(KvBackend::new(Arc::new(LocalStorage::new(
                    settings.kv_path(),
                )))))
            }
        },
    }
}
