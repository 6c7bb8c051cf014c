//! Key-value fallback backend
//!
//! Every collection lives in one JSON document. Each operation reads the
//! documents it needs, modifies them and writes them back while holding a
//! single lock, so list creation stays an atomic check-and-insert.

use super::{BackendKind, GenreSlice, PersistenceBackend, StorageProvider, StorageResult};
use crate::error::StorageError;
use crate::types::{
    name_key, now_millis, page_offset, Book, CustomList, ListDraft, ListInsert, ListMembership,
    ListUpdate,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

const BOOKS_KEY: &str = "books.json";
const GENRES_KEY: &str = "genre_books.json";
const LISTS_KEY: &str = "lists.json";
const MEMBERSHIPS_KEY: &str = "list_books.json";

/// Books keyed by work key
type BookDoc = BTreeMap<String, Book>;
/// Genre id -> book key -> position
type GenreDoc = BTreeMap<String, BTreeMap<String, u64>>;

/// A list as persisted; the book count is derived on read
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredList {
    id: Uuid,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StoredList {
    fn with_count(&self, memberships: &[ListMembership]) -> CustomList {
        CustomList {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            book_count: memberships.iter().filter(|m| m.list_id == self.id).count(),
        }
    }
}

/// Persistence backend over a flat key-value store
pub struct KvBackend {
    store: Arc<dyn StorageProvider>,
    doc_lock: Mutex<()>,
}

impl KvBackend {
    pub fn new(store: Arc<dyn StorageProvider>) -> Self {
        Self {
            store,
            doc_lock: Mutex::new(()),
        }
    }

    async fn load<T: DeserializeOwned + Default>(&self, key: &str) -> StorageResult<T> {
        match self.store.read(key).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(StorageError::NotFound(_)) => Ok(T::default()),
            Err(e) => Err(e),
        }
    }

    async fn save<T: Serialize>(&self, key: &str, value: &T) -> StorageResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.store.write(key, bytes).await
    }

    fn put_book(books: &mut BookDoc, book: &Book) {
        let mut stored = book.clone();
        stored.authors = book.distinct_authors();
        if stored.authors.is_empty() {
            if let Some(previous) = books.get(&book.key) {
                stored.authors = previous.authors.clone();
            }
        }
        books.insert(stored.key.clone(), stored);
    }

    /// Lists newest first; later insertions win ties
    fn newest_first<'a>(
        lists: impl DoubleEndedIterator<Item = &'a StoredList>,
    ) -> Vec<&'a StoredList> {
        let mut ordered: Vec<_> = lists.rev().collect();
        ordered.sort_by_key(|l| Reverse(l.created_at));
        ordered
    }

    fn touch(lists: &mut [StoredList], id: Uuid) -> bool {
        match lists.iter_mut().find(|l| l.id == id) {
            Some(list) => {
                list.updated_at = now_millis();
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl PersistenceBackend for KvBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::KeyValue
    }

    async fn upsert_book(&self, book: &Book) -> StorageResult<()> {
        self.upsert_books(std::slice::from_ref(book)).await
    }

    async fn upsert_books(&self, books: &[Book]) -> StorageResult<()> {
        let _guard = self.doc_lock.lock().await;
        let mut doc: BookDoc = self.load(BOOKS_KEY).await?;
        for book in books {
            Self::put_book(&mut doc, book);
        }
        self.save(BOOKS_KEY, &doc).await
    }

    async fn get_book(&self, key: &str) -> StorageResult<Option<Book>> {
        let _guard = self.doc_lock.lock().await;
        let mut doc: BookDoc = self.load(BOOKS_KEY).await?;
        Ok(doc.remove(key))
    }

    async fn search_local(&self, query: &str, limit: usize) -> StorageResult<Vec<Book>> {
        let _guard = self.doc_lock.lock().await;
        let doc: BookDoc = self.load(BOOKS_KEY).await?;
        let needle = query.trim().to_lowercase();
        Ok(doc
            .into_values()
            .filter(|b| b.matches(&needle))
            .take(limit)
            .collect())
    }

    async fn save_genre_page(
        &self,
        genre_id: &str,
        books: &[Book],
        start_position: u64,
    ) -> StorageResult<()> {
        let _guard = self.doc_lock.lock().await;

        let mut book_doc: BookDoc = self.load(BOOKS_KEY).await?;
        for book in books {
            Self::put_book(&mut book_doc, book);
        }
        self.save(BOOKS_KEY, &book_doc).await?;

        let mut genre_doc: GenreDoc = self.load(GENRES_KEY).await?;
        let positions = genre_doc.entry(genre_id.to_string()).or_default();
        for (index, book) in books.iter().enumerate() {
            positions.insert(book.key.clone(), start_position + index as u64);
        }
        self.save(GENRES_KEY, &genre_doc).await
    }

    async fn get_genre_page(
        &self,
        genre_id: &str,
        page: u32,
        page_size: u32,
    ) -> StorageResult<GenreSlice> {
        let _guard = self.doc_lock.lock().await;
        let genre_doc: GenreDoc = self.load(GENRES_KEY).await?;
        let Some(positions) = genre_doc.get(genre_id) else {
            return Ok(GenreSlice {
                books: Vec::new(),
                total: 0,
            });
        };

        let mut ordered: Vec<(u64, &String)> = positions.iter().map(|(k, p)| (*p, k)).collect();
        ordered.sort();

        let book_doc: BookDoc = self.load(BOOKS_KEY).await?;
        let offset = usize::try_from(page_offset(page, page_size)).unwrap_or(usize::MAX);
        let books = ordered
            .into_iter()
            .skip(offset)
            .take(page_size as usize)
            .filter_map(|(_, key)| book_doc.get(key).cloned())
            .collect();

        Ok(GenreSlice {
            books,
            total: positions.len() as u64,
        })
    }

    async fn has_genre_cache(&self, genre_id: &str) -> StorageResult<bool> {
        let _guard = self.doc_lock.lock().await;
        let genre_doc: GenreDoc = self.load(GENRES_KEY).await?;
        Ok(genre_doc.get(genre_id).is_some_and(|p| !p.is_empty()))
    }

    async fn clear_genre_cache(&self, genre_id: &str) -> StorageResult<()> {
        let _guard = self.doc_lock.lock().await;
        let mut genre_doc: GenreDoc = self.load(GENRES_KEY).await?;
        if genre_doc.remove(genre_id).is_some() {
            self.save(GENRES_KEY, &genre_doc).await?;
        }
        Ok(())
    }

    async fn create_list(&self, draft: &ListDraft, max_lists: usize) -> StorageResult<ListInsert> {
        let _guard = self.doc_lock.lock().await;
        let mut lists: Vec<StoredList> = self.load(LISTS_KEY).await?;

        if lists.len() >= max_lists {
            return Ok(ListInsert::LimitReached);
        }
        let key = draft.name_key();
        if lists.iter().any(|l| name_key(&l.name) == key) {
            return Ok(ListInsert::NameTaken);
        }

        let now = now_millis();
        let stored = StoredList {
            id: Uuid::new_v4(),
            name: draft.name.clone(),
            description: draft.description.clone(),
            created_at: now,
            updated_at: now,
        };
        let created = stored.with_count(&[]);
        lists.push(stored);
        self.save(LISTS_KEY, &lists).await?;

        Ok(ListInsert::Created(created))
    }

    async fn list_all(&self) -> StorageResult<Vec<CustomList>> {
        let _guard = self.doc_lock.lock().await;
        let lists: Vec<StoredList> = self.load(LISTS_KEY).await?;
        let memberships: Vec<ListMembership> = self.load(MEMBERSHIPS_KEY).await?;
        Ok(Self::newest_first(lists.iter())
            .into_iter()
            .map(|l| l.with_count(&memberships))
            .collect())
    }

    async fn list_count(&self) -> StorageResult<usize> {
        let _guard = self.doc_lock.lock().await;
        let lists: Vec<StoredList> = self.load(LISTS_KEY).await?;
        Ok(lists.len())
    }

    async fn get_list(&self, id: Uuid) -> StorageResult<Option<CustomList>> {
        let _guard = self.doc_lock.lock().await;
        let lists: Vec<StoredList> = self.load(LISTS_KEY).await?;
        let Some(list) = lists.iter().find(|l| l.id == id) else {
            return Ok(None);
        };
        let memberships: Vec<ListMembership> = self.load(MEMBERSHIPS_KEY).await?;
        Ok(Some(list.with_count(&memberships)))
    }

    async fn list_name_exists(&self, name: &str, exclude: Option<Uuid>) -> StorageResult<bool> {
        let _guard = self.doc_lock.lock().await;
        let lists: Vec<StoredList> = self.load(LISTS_KEY).await?;
        let key = name_key(name);
        Ok(lists
            .iter()
            .any(|l| name_key(&l.name) == key && Some(l.id) != exclude))
    }

    async fn update_list(&self, id: Uuid, draft: &ListDraft) -> StorageResult<ListUpdate> {
        let _guard = self.doc_lock.lock().await;
        let mut lists: Vec<StoredList> = self.load(LISTS_KEY).await?;

        if !lists.iter().any(|l| l.id == id) {
            return Ok(ListUpdate::Missing);
        }
        let key = draft.name_key();
        if lists.iter().any(|l| l.id != id && name_key(&l.name) == key) {
            return Ok(ListUpdate::NameTaken);
        }

        let Some(list) = lists.iter_mut().find(|l| l.id == id) else {
            return Ok(ListUpdate::Missing);
        };
        list.name = draft.name.clone();
        list.description = draft.description.clone();
        list.updated_at = now_millis();
        let stored = list.clone();
        self.save(LISTS_KEY, &lists).await?;

        let memberships: Vec<ListMembership> = self.load(MEMBERSHIPS_KEY).await?;
        Ok(ListUpdate::Updated(stored.with_count(&memberships)))
    }

    async fn delete_list(&self, id: Uuid) -> StorageResult<bool> {
        let _guard = self.doc_lock.lock().await;
        let mut lists: Vec<StoredList> = self.load(LISTS_KEY).await?;
        let before = lists.len();
        lists.retain(|l| l.id != id);
        if lists.len() == before {
            return Ok(false);
        }

        let mut memberships: Vec<ListMembership> = self.load(MEMBERSHIPS_KEY).await?;
        memberships.retain(|m| m.list_id != id);
        self.save(MEMBERSHIPS_KEY, &memberships).await?;
        self.save(LISTS_KEY, &lists).await?;
        Ok(true)
    }

    async fn add_membership(&self, list_id: Uuid, book_key: &str) -> StorageResult<bool> {
        let _guard = self.doc_lock.lock().await;
        let mut lists: Vec<StoredList> = self.load(LISTS_KEY).await?;
        if !lists.iter().any(|l| l.id == list_id) {
            return Err(StorageError::NotFound(format!("list {}", list_id)));
        }
        let books: BookDoc = self.load(BOOKS_KEY).await?;
        if !books.contains_key(book_key) {
            return Err(StorageError::NotFound(format!("book {}", book_key)));
        }

        let mut memberships: Vec<ListMembership> = self.load(MEMBERSHIPS_KEY).await?;
        let inserted = !memberships
            .iter()
            .any(|m| m.list_id == list_id && m.book_key == book_key);
        if inserted {
            memberships.push(ListMembership {
                list_id,
                book_key: book_key.to_string(),
                added_at: now_millis(),
            });
            self.save(MEMBERSHIPS_KEY, &memberships).await?;
        }

        Self::touch(&mut lists, list_id);
        self.save(LISTS_KEY, &lists).await?;
        Ok(inserted)
    }

    async fn remove_membership(&self, list_id: Uuid, book_key: &str) -> StorageResult<bool> {
        let _guard = self.doc_lock.lock().await;
        let mut memberships: Vec<ListMembership> = self.load(MEMBERSHIPS_KEY).await?;
        let before = memberships.len();
        memberships.retain(|m| !(m.list_id == list_id && m.book_key == book_key));
        let removed = memberships.len() != before;
        if removed {
            self.save(MEMBERSHIPS_KEY, &memberships).await?;
        }

        let mut lists: Vec<StoredList> = self.load(LISTS_KEY).await?;
        if Self::touch(&mut lists, list_id) {
            self.save(LISTS_KEY, &lists).await?;
        }
        Ok(removed)
    }

    async fn is_member(&self, list_id: Uuid, book_key: &str) -> StorageResult<bool> {
        let _guard = self.doc_lock.lock().await;
        let memberships: Vec<ListMembership> = self.load(MEMBERSHIPS_KEY).await?;
        Ok(memberships
            .iter()
            .any(|m| m.list_id == list_id && m.book_key == book_key))
    }

    async fn books_in_list(&self, list_id: Uuid) -> StorageResult<Vec<Book>> {
        let _guard = self.doc_lock.lock().await;
        let memberships: Vec<ListMembership> = self.load(MEMBERSHIPS_KEY).await?;
        let books: BookDoc = self.load(BOOKS_KEY).await?;

        let mut entries: Vec<&ListMembership> = memberships
            .iter()
            .rev()
            .filter(|m| m.list_id == list_id)
            .collect();
        entries.sort_by_key(|m| Reverse(m.added_at));

        Ok(entries
            .into_iter()
            .filter_map(|m| books.get(&m.book_key).cloned())
            .collect())
    }

    async fn lists_containing(&self, book_key: &str) -> StorageResult<Vec<CustomList>> {
        let _guard = self.doc_lock.lock().await;
        let lists: Vec<StoredList> = self.load(LISTS_KEY).await?;
        let memberships: Vec<ListMembership> = self.load(MEMBERSHIPS_KEY).await?;

        let containing = lists.iter().filter(|l| {
            memberships
                .iter()
                .any(|m| m.list_id == l.id && m.book_key == book_key)
        });
        Ok(Self::newest_first(containing)
            .into_iter()
            .map(|l| l.with_count(&memberships))
            .collect())
    }
}
