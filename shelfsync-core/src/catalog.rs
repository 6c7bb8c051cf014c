//! Offline-first catalog reads
//!
//! Every read prefers the remote catalog when the connectivity signal says
//! the device is online, writes what it fetched into the local cache, and
//! falls back to the cache whenever the remote is unreachable. Remote errors
//! never reach the caller; storage errors always do.

use std::sync::Arc;

use crate::config::Settings;
use crate::connectivity::ConnectivitySignal;
use crate::remote::CatalogClient;
use crate::storage::{PersistenceBackend, StorageResult};
use crate::types::{page_offset, sanitize_page, Book, Page, PageOrigin};

/// Coordinates the remote catalog, the local cache and the connectivity signal
pub struct CatalogSync {
    backend: Arc<dyn PersistenceBackend>,
    remote: Arc<dyn CatalogClient>,
    connectivity: Arc<dyn ConnectivitySignal>,
    page_size: u32,
    search_limit: usize,
}

impl CatalogSync {
    pub fn new(
        backend: Arc<dyn PersistenceBackend>,
        remote: Arc<dyn CatalogClient>,
        connectivity: Arc<dyn ConnectivitySignal>,
        settings: &Settings,
    ) -> Self {
        Self {
            backend,
            remote,
            connectivity,
            page_size: settings.page_size.max(1),
            search_limit: settings.search_limit.max(1),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub async fn is_online(&self) -> bool {
        self.connectivity.is_online().await
    }

    /// One page of a genre.
    ///
    /// Online results are cached at positions `(page - 1) * page_size + i`.
    pub async fn browse_genre(&self, genre_id: &str, page: u32) -> StorageResult<Page<Book>> {
        let page = sanitize_page(page);

        if self.is_online().await {
            match self.remote.search_by_genre(genre_id, page, self.page_size).await {
                Ok(fetched) => {
                    let start = page_offset(page, self.page_size);
                    if let Err(e) = self
                        .backend
                        .save_genre_page(genre_id, &fetched.items, start)
                        .await
                    {
                        tracing::warn!("Failed to cache genre '{}' page {}: {}", genre_id, page, e);
                    }
                    return Ok(fetched);
                }
                Err(e) => {
                    tracing::warn!(
                        "Remote genre fetch failed for '{}', falling back to cache: {}",
                        genre_id,
                        e
                    );
                }
            }
        } else {
            tracing::debug!("Offline, reading genre '{}' page {} from cache", genre_id, page);
        }

        self.cached_genre_page(genre_id, page).await
    }

    async fn cached_genre_page(&self, genre_id: &str, page: u32) -> StorageResult<Page<Book>> {
        let slice = self
            .backend
            .get_genre_page(genre_id, page, self.page_size)
            .await?;
        Ok(Page::new(
            slice.books,
            slice.total,
            page,
            self.page_size,
            PageOrigin::Cache,
        ))
    }

    /// Free-text search.
    ///
    /// The cache has no pagination of its own: offline answers are every local
    /// match up to the search limit, as page 1 of 1, whatever page was asked for.
    pub async fn search(&self, query: &str, page: u32) -> StorageResult<Page<Book>> {
        let page = sanitize_page(page);

        if self.is_online().await {
            match self.remote.search(query, page, self.page_size).await {
                Ok(fetched) => {
                    if let Err(e) = self.backend.upsert_books(&fetched.items).await {
                        tracing::warn!("Failed to cache search results for '{}': {}", query, e);
                    }
                    return Ok(fetched);
                }
                Err(e) => {
                    tracing::warn!("Remote search failed for '{}', searching cache: {}", query, e);
                }
            }
        }

        let books = self.backend.search_local(query, self.search_limit).await?;
        tracing::debug!("Local search for '{}' found {} books", query, books.len());
        Ok(Page::single(books, PageOrigin::Cache))
    }

    /// A single work, merged with whatever the cache already knows about it.
    ///
    /// Bare ids such as `OL1W` are read as `/works/OL1W`. `None` means the
    /// work is neither cached nor available remotely.
    pub async fn book_detail(&self, key: &str) -> StorageResult<Option<Book>> {
        let key = Book::normalize_key(key);
        let cached = self.backend.get_book(&key).await?;

        if !self.is_online().await {
            return Ok(cached);
        }

        match self.remote.get_detail(&key).await {
            Ok(fresh) => {
                let merged = Book::merge_detail(cached, fresh);
                if let Err(e) = self.backend.upsert_book(&merged).await {
                    tracing::warn!("Failed to cache details for '{}': {}", key, e);
                }
                Ok(Some(merged))
            }
            Err(e) => {
                tracing::warn!("Remote detail failed for '{}', using cache: {}", key, e);
                Ok(cached)
            }
        }
    }

    /// Forget the genre's cached positions and browse it again from page 1
    pub async fn refresh_genre(&self, genre_id: &str) -> StorageResult<Page<Book>> {
        self.backend.clear_genre_cache(genre_id).await?;
        self.browse_genre(genre_id, 1).await
    }

    pub async fn has_genre_cache(&self, genre_id: &str) -> StorageResult<bool> {
        self.backend.has_genre_cache(genre_id).await
    }
}
