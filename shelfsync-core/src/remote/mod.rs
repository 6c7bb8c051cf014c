//! Remote catalog access
//!
//! The sync service only talks to [`CatalogClient`]; [`OpenLibraryClient`] is
//! the bundled HTTP implementation.

mod openlibrary;

pub use openlibrary::OpenLibraryClient;

use crate::error::RemoteError;
use crate::types::{Book, Page};
use async_trait::async_trait;

/// Result type for remote catalog calls
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// A source of catalog data that may be unreachable at any time
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// One page of works for a genre
    async fn search_by_genre(
        &self,
        genre_id: &str,
        page: u32,
        page_size: u32,
    ) -> RemoteResult<Page<Book>>;

    /// One page of free-text search results
    async fn search(&self, query: &str, page: u32, page_size: u32) -> RemoteResult<Page<Book>>;

    /// Full record for a single work. Authors may be missing.
    async fn get_detail(&self, work_key: &str) -> RemoteResult<Book>;
}
