//! Storage failures reach the caller; cache-write failures after a remote
//! success do not.

use async_trait::async_trait;
use shelfsync_core::connectivity::{ConnectivityMonitor, ConnectivitySignal};
use shelfsync_core::error::{ListError, RemoteError, StorageError};
use shelfsync_core::remote::{CatalogClient, RemoteResult};
use shelfsync_core::storage::{
    BackendKind, GenreSlice, KvBackend, MemoryStorage, PersistenceBackend, StorageResult,
};
use shelfsync_core::types::{
    Author, Book, CustomList, ListDraft, ListInsert, ListUpdate, Page, PageOrigin,
};
use shelfsync_core::{CatalogSync, ListManager, Settings};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

// =============================================================================
// Failing backend
// =============================================================================

/// Delegates to a real backend until told to fail reads or writes.
struct FailingBackend {
    inner: Arc<dyn PersistenceBackend>,
    reads: AtomicBool,
    writes: AtomicBool,
}

impl FailingBackend {
    fn new() -> Self {
        Self {
            inner: Arc::new(KvBackend::new(Arc::new(MemoryStorage::new()))),
            reads: AtomicBool::new(false),
            writes: AtomicBool::new(false),
        }
    }

    fn fail_reads(&self, fail: bool) {
        self.reads.store(fail, Ordering::SeqCst);
    }

    fn fail_writes(&self, fail: bool) {
        self.writes.store(fail, Ordering::SeqCst);
    }

    fn read(&self) -> StorageResult<()> {
        if self.reads.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("disk detached".to_string()));
        }
        Ok(())
    }

    fn write(&self) -> StorageResult<()> {
        if self.writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("disk full".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PersistenceBackend for FailingBackend {
    fn kind(&self) -> BackendKind {
        self.inner.kind()
    }

    async fn upsert_book(&self, book: &Book) -> StorageResult<()> {
        self.write()?;
        self.inner.upsert_book(book).await
    }

    async fn get_book(&self, key: &str) -> StorageResult<Option<Book>> {
        self.read()?;
        self.inner.get_book(key).await
    }

    async fn search_local(&self, query: &str, limit: usize) -> StorageResult<Vec<Book>> {
        self.read()?;
        self.inner.search_local(query, limit).await
    }

    async fn save_genre_page(
        &self,
        genre_id: &str,
        books: &[Book],
        start_position: u64,
    ) -> StorageResult<()> {
        self.write()?;
        self.inner.save_genre_page(genre_id, books, start_position).await
    }

    async fn get_genre_page(
        &self,
        genre_id: &str,
        page: u32,
        page_size: u32,
    ) -> StorageResult<GenreSlice> {
        self.read()?;
        self.inner.get_genre_page(genre_id, page, page_size).await
    }

    async fn has_genre_cache(&self, genre_id: &str) -> StorageResult<bool> {
        self.read()?;
        self.inner.has_genre_cache(genre_id).await
    }

    async fn clear_genre_cache(&self, genre_id: &str) -> StorageResult<()> {
        self.write()?;
        self.inner.clear_genre_cache(genre_id).await
    }

    async fn create_list(&self, draft: &ListDraft, max_lists: usize) -> StorageResult<ListInsert> {
        self.write()?;
        self.inner.create_list(draft, max_lists).await
    }

    async fn list_all(&self) -> StorageResult<Vec<CustomList>> {
        self.read()?;
        self.inner.list_all().await
    }

    async fn list_count(&self) -> StorageResult<usize> {
        self.read()?;
        self.inner.list_count().await
    }

    async fn get_list(&self, id: Uuid) -> StorageResult<Option<CustomList>> {
        self.read()?;
        self.inner.get_list(id).await
    }

    async fn list_name_exists(&self, name: &str, exclude: Option<Uuid>) -> StorageResult<bool> {
        self.read()?;
        self.inner.list_name_exists(name, exclude).await
    }

    async fn update_list(&self, id: Uuid, draft: &ListDraft) -> StorageResult<ListUpdate> {
        self.write()?;
        self.inner.update_list(id, draft).await
    }

    async fn delete_list(&self, id: Uuid) -> StorageResult<bool> {
        self.write()?;
        self.inner.delete_list(id).await
    }

    async fn add_membership(&self, list_id: Uuid, book_key: &str) -> StorageResult<bool> {
        self.write()?;
        self.inner.add_membership(list_id, book_key).await
    }

    async fn remove_membership(&self, list_id: Uuid, book_key: &str) -> StorageResult<bool> {
        self.write()?;
        self.inner.remove_membership(list_id, book_key).await
    }

    async fn is_member(&self, list_id: Uuid, book_key: &str) -> StorageResult<bool> {
        self.read()?;
        self.inner.is_member(list_id, book_key).await
    }

    async fn books_in_list(&self, list_id: Uuid) -> StorageResult<Vec<Book>> {
        self.read()?;
        self.inner.books_in_list(list_id).await
    }

    async fn lists_containing(&self, book_key: &str) -> StorageResult<Vec<CustomList>> {
        self.read()?;
        self.inner.lists_containing(book_key).await
    }
}

// =============================================================================
// Fixed catalog
// =============================================================================

/// Answers every query with the same three books, or fails when told to.
#[derive(Default)]
struct FixedCatalog {
    failing: AtomicBool,
}

impl FixedCatalog {
    fn books() -> Vec<Book> {
        (1..=3)
            .map(|n| {
                Book::new(format!("/works/OL{n}W"), format!("Dune {n}"))
                    .with_author(Author::new("Frank Herbert"))
            })
            .collect()
    }

    fn enter(&self) -> RemoteResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(RemoteError::Status(503))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CatalogClient for FixedCatalog {
    async fn search_by_genre(&self, _: &str, page: u32, page_size: u32) -> RemoteResult<Page<Book>> {
        self.enter()?;
        Ok(Page::new(Self::books(), 3, page, page_size, PageOrigin::Remote))
    }

    async fn search(&self, _: &str, page: u32, page_size: u32) -> RemoteResult<Page<Book>> {
        self.enter()?;
        Ok(Page::new(Self::books(), 3, page, page_size, PageOrigin::Remote))
    }

    async fn get_detail(&self, work_key: &str) -> RemoteResult<Book> {
        self.enter()?;
        Ok(Book::new(work_key, "Dune").with_description("Spice must flow."))
    }
}

struct Harness {
    sync: CatalogSync,
    backend: Arc<FailingBackend>,
    catalog: Arc<FixedCatalog>,
    monitor: Arc<ConnectivityMonitor>,
}

fn harness() -> Harness {
    let backend = Arc::new(FailingBackend::new());
    let catalog = Arc::new(FixedCatalog::default());
    let monitor = Arc::new(ConnectivityMonitor::optimistic());
    let sync = CatalogSync::new(
        backend.clone() as Arc<dyn PersistenceBackend>,
        catalog.clone() as Arc<dyn CatalogClient>,
        monitor.clone() as Arc<dyn ConnectivitySignal>,
        &Settings::default(),
    );
    Harness {
        sync,
        backend,
        catalog,
        monitor,
    }
}

// =============================================================================
// Catalog reads
// =============================================================================

#[tokio::test]
async fn offline_reads_surface_storage_failures() {
    let h = harness();
    h.monitor.set_online(false);
    h.backend.fail_reads(true);

    let browse = h.sync.browse_genre("fiction", 1).await;
    assert!(matches!(browse, Err(StorageError::Unavailable(_))));

    let search = h.sync.search("dune", 1).await;
    assert!(matches!(search, Err(StorageError::Unavailable(_))));

    let detail = h.sync.book_detail("/works/OL1W").await;
    assert!(matches!(detail, Err(StorageError::Unavailable(_))));
}

#[tokio::test]
async fn remote_failure_with_broken_cache_is_a_storage_failure() {
    let h = harness();
    h.catalog.failing.store(true, Ordering::SeqCst);
    h.backend.fail_reads(true);

    let browse = h.sync.browse_genre("fiction", 1).await;
    assert!(matches!(browse, Err(StorageError::Unavailable(_))));
}

#[tokio::test]
async fn cache_write_failure_keeps_remote_results() {
    let h = harness();
    h.backend.fail_writes(true);

    let browse = h.sync.browse_genre("fiction", 1).await.unwrap();
    assert_eq!(browse.origin, PageOrigin::Remote);
    assert_eq!(browse.items, FixedCatalog::books());

    let search = h.sync.search("dune", 1).await.unwrap();
    assert_eq!(search.origin, PageOrigin::Remote);
    assert_eq!(search.items.len(), 3);

    let detail = h.sync.book_detail("OL1W").await.unwrap().unwrap();
    assert_eq!(detail.description.as_deref(), Some("Spice must flow."));

    // Nothing reached the cache
    assert!(!h.backend.has_genre_cache("fiction").await.unwrap());
    assert_eq!(h.backend.get_book("/works/OL1W").await.unwrap(), None);
}

// =============================================================================
// Lists
// =============================================================================

#[tokio::test]
async fn list_operations_surface_storage_failures() {
    let backend = Arc::new(FailingBackend::new());
    let lists = ListManager::new(backend.clone() as Arc<dyn PersistenceBackend>);

    backend.fail_reads(true);
    let err = lists.create("Favorites", None).await.unwrap_err();
    assert!(matches!(err, ListError::Storage(StorageError::Unavailable(_))));
    assert!(!err.is_business_rule());

    backend.fail_reads(false);
    backend.fail_writes(true);
    let err = lists.create("Favorites", None).await.unwrap_err();
    assert!(matches!(err, ListError::Storage(StorageError::Unavailable(_))));

    backend.fail_writes(false);
    let list = lists.create("Favorites", None).await.unwrap();

    backend.fail_writes(true);
    let book = Book::new("/works/OL1W", "Dune");
    let err = lists.add_book_to_list(list.id, &book).await.unwrap_err();
    assert!(matches!(err, ListError::Storage(_)));

    backend.fail_writes(false);
    assert!(lists.books_in_list(list.id).await.unwrap().is_empty());
}
