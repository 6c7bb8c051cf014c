//! Relational backend on SQLite
//!
//! rusqlite is blocking, so every call runs on the blocking pool with the
//! connection behind a mutex. Multi-statement writes use transactions; list
//! creation checks the count and the name inside one immediate transaction.

use super::schema::ensure_schema;
use super::{BackendKind, GenreSlice, PersistenceBackend, StorageResult};
use crate::error::StorageError;
use crate::types::{
    name_key, now_millis, page_offset, Author, Book, CustomList, ListDraft, ListInsert,
    ListUpdate,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Persistence backend on a SQLite database
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBackend {
    /// Open or create a cache database at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Self::prepare(conn)
    }

    /// Open an in-memory database with the full schema. Useful for testing.
    pub fn open_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Self::prepare(conn)
    }

    fn prepare(conn: Connection) -> StorageResult<Self> {
        ensure_schema(&conn)?;
        // Unicode-aware lowering; SQLite's LOWER() only folds ASCII
        conn.create_scalar_function(
            "fold",
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| {
                let text: Option<String> = ctx.get(0)?;
                Ok(text.map(|t| t.to_lowercase()))
            },
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StorageResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StorageError::Unavailable("connection lock poisoned".to_string()))?;
            f(&mut *guard)
        })
        .await
        .map_err(|e| StorageError::Unavailable(e.to_string()))?
    }
}

// ── Row mapping ─────────────────────────────────────────────────────────────

fn timestamp(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

fn conversion_error(
    idx: usize,
    ty: Type,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(err))
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| serde_json::from_str(&s).map_err(|e| conversion_error(idx, Type::Text, e)))
        .transpose()
}

fn to_json<T: serde::Serialize>(value: &Option<T>) -> StorageResult<Option<String>> {
    Ok(value.as_ref().map(serde_json::to_string).transpose()?)
}

fn uuid_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, Type::Text, e))
}

const LIST_COLUMNS: &str =
    "cl.id, cl.name, cl.description, cl.created_at, cl.updated_at, COUNT(m.book_key)";

fn row_to_list(row: &Row<'_>) -> rusqlite::Result<CustomList> {
    Ok(CustomList {
        id: uuid_column(row, 0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: timestamp(row.get(3)?),
        updated_at: timestamp(row.get(4)?),
        book_count: row.get::<_, i64>(5)? as usize,
    })
}

fn read_authors(conn: &Connection, book_key: &str) -> rusqlite::Result<Vec<Author>> {
    let mut stmt = conn.prepare_cached(
        "SELECT a.key, a.name FROM authors a
         JOIN book_authors ba ON ba.author_id = a.id
         WHERE ba.book_key = ?1
         ORDER BY ba.position",
    )?;
    let rows = stmt.query_map(params![book_key], |row| {
        let key: String = row.get(0)?;
        Ok(Author {
            key: (!key.is_empty()).then_some(key),
            name: row.get(1)?,
        })
    })?;
    rows.collect()
}

fn read_book(conn: &Connection, key: &str) -> rusqlite::Result<Option<Book>> {
    let book = conn
        .query_row(
            "SELECT key, title, first_publish_year, cover_url, cover_id, description, subjects, isbn
             FROM books WHERE key = ?1",
            params![key],
            |row| {
                Ok(Book {
                    key: row.get(0)?,
                    title: row.get(1)?,
                    authors: Vec::new(),
                    first_publish_year: row.get(2)?,
                    cover_url: row.get(3)?,
                    cover_id: row.get(4)?,
                    description: row.get(5)?,
                    subjects: json_column(row, 6)?,
                    isbn: json_column(row, 7)?,
                })
            },
        )
        .optional()?;

    match book {
        Some(mut book) => {
            book.authors = read_authors(conn, &book.key)?;
            Ok(Some(book))
        }
        None => Ok(None),
    }
}

fn read_books(conn: &Connection, keys: Vec<String>) -> rusqlite::Result<Vec<Book>> {
    let mut books = Vec::with_capacity(keys.len());
    for key in keys {
        if let Some(book) = read_book(conn, &key)? {
            books.push(book);
        }
    }
    Ok(books)
}

fn read_list(conn: &Connection, id: Uuid) -> rusqlite::Result<Option<CustomList>> {
    conn.query_row(
        &format!(
            "SELECT {LIST_COLUMNS} FROM custom_lists cl
             LEFT JOIN custom_list_books m ON m.list_id = cl.id
             WHERE cl.id = ?1
             GROUP BY cl.id"
        ),
        params![id.to_string()],
        row_to_list,
    )
    .optional()
}

// ── Writes ──────────────────────────────────────────────────────────────────

/// Insert or update one book. Authors are replaced only when the book lists any.
fn put_book(conn: &Connection, book: &Book) -> StorageResult<()> {
    let now = now_millis().timestamp_millis();
    conn.execute(
        "INSERT INTO books (key, title, first_publish_year, cover_url, cover_id, description,
             subjects, isbn, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
         ON CONFLICT(key) DO UPDATE SET
             title = excluded.title,
             first_publish_year = excluded.first_publish_year,
             cover_url = excluded.cover_url,
             cover_id = excluded.cover_id,
             description = excluded.description,
             subjects = excluded.subjects,
             isbn = excluded.isbn,
             updated_at = excluded.updated_at",
        params![
            book.key,
            book.title,
            book.first_publish_year,
            book.cover_url,
            book.cover_id,
            book.description,
            to_json(&book.subjects)?,
            to_json(&book.isbn)?,
            now,
        ],
    )?;

    let authors = book.distinct_authors();
    if authors.is_empty() {
        return Ok(());
    }

    // Clear and re-insert author links
    conn.execute(
        "DELETE FROM book_authors WHERE book_key = ?1",
        params![book.key],
    )?;
    for (position, author) in authors.iter().enumerate() {
        let key = author.key.as_deref().unwrap_or("");
        conn.execute(
            "INSERT OR IGNORE INTO authors (key, name) VALUES (?1, ?2)",
            params![key, author.name],
        )?;
        let author_id: i64 = conn.query_row(
            "SELECT id FROM authors WHERE key = ?1 AND name = ?2",
            params![key, author.name],
            |row| row.get(0),
        )?;
        conn.execute(
            "INSERT INTO book_authors (book_key, author_id, position) VALUES (?1, ?2, ?3)",
            params![book.key, author_id, position as i64],
        )?;
    }
    Ok(())
}

fn touch_list(conn: &Connection, id: Uuid) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE custom_lists SET updated_at = ?2 WHERE id = ?1",
        params![id.to_string(), now_millis().timestamp_millis()],
    )
}

fn exists(conn: &Connection, sql: &str, param: &str) -> rusqlite::Result<bool> {
    conn.query_row(sql, params![param], |row| row.get(0))
}

#[async_trait]
impl PersistenceBackend for SqliteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    async fn upsert_book(&self, book: &Book) -> StorageResult<()> {
        self.upsert_books(std::slice::from_ref(book)).await
    }

    async fn upsert_books(&self, books: &[Book]) -> StorageResult<()> {
        let books = books.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            for book in &books {
                put_book(&tx, book)?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_book(&self, key: &str) -> StorageResult<Option<Book>> {
        let key = key.to_string();
        self.with_conn(move |conn| Ok(read_book(conn, &key)?)).await
    }

    async fn search_local(&self, query: &str, limit: usize) -> StorageResult<Vec<Book>> {
        let needle = query.trim().to_lowercase();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_conn(move |conn| {
            let keys = {
                let mut stmt = conn.prepare(
                    "SELECT DISTINCT b.key FROM books b
                     LEFT JOIN book_authors ba ON ba.book_key = b.key
                     LEFT JOIN authors a ON a.id = ba.author_id
                     WHERE instr(fold(b.title), ?1) > 0 OR instr(fold(a.name), ?1) > 0
                     ORDER BY b.key
                     LIMIT ?2",
                )?;
                let rows = stmt.query_map(params![needle, limit], |row| row.get(0))?;
                rows.collect::<rusqlite::Result<Vec<String>>>()?
            };
            Ok(read_books(conn, keys)?)
        })
        .await
    }

    async fn save_genre_page(
        &self,
        genre_id: &str,
        books: &[Book],
        start_position: u64,
    ) -> StorageResult<()> {
        let genre_id = genre_id.to_string();
        let books = books.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            for book in &books {
                put_book(&tx, book)?;
            }
            for (index, book) in books.iter().enumerate() {
                let position = i64::try_from(start_position + index as u64)
                    .map_err(|_| StorageError::Constraint("genre position overflow".into()))?;
                tx.execute(
                    "INSERT INTO genre_books (genre_id, book_key, position) VALUES (?1, ?2, ?3)
                     ON CONFLICT(genre_id, book_key) DO UPDATE SET position = excluded.position",
                    params![genre_id, book.key, position],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_genre_page(
        &self,
        genre_id: &str,
        page: u32,
        page_size: u32,
    ) -> StorageResult<GenreSlice> {
        let genre_id = genre_id.to_string();
        let offset = i64::try_from(page_offset(page, page_size)).unwrap_or(i64::MAX);
        self.with_conn(move |conn| {
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM genre_books WHERE genre_id = ?1",
                params![genre_id],
                |row| row.get(0),
            )?;

            let keys = {
                let mut stmt = conn.prepare(
                    "SELECT gb.book_key FROM genre_books gb
                     JOIN books b ON b.key = gb.book_key
                     WHERE gb.genre_id = ?1
                     ORDER BY gb.position, gb.book_key
                     LIMIT ?2 OFFSET ?3",
                )?;
                let rows = stmt.query_map(params![genre_id, page_size, offset], |row| row.get(0))?;
                rows.collect::<rusqlite::Result<Vec<String>>>()?
            };

            Ok(GenreSlice {
                books: read_books(conn, keys)?,
                total: total as u64,
            })
        })
        .await
    }

    async fn has_genre_cache(&self, genre_id: &str) -> StorageResult<bool> {
        let genre_id = genre_id.to_string();
        self.with_conn(move |conn| {
            Ok(exists(
                conn,
                "SELECT EXISTS(SELECT 1 FROM genre_books WHERE genre_id = ?1)",
                &genre_id,
            )?)
        })
        .await
    }

    async fn clear_genre_cache(&self, genre_id: &str) -> StorageResult<()> {
        let genre_id = genre_id.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM genre_books WHERE genre_id = ?1",
                params![genre_id],
            )?;
            Ok(())
        })
        .await
    }

    async fn create_list(&self, draft: &ListDraft, max_lists: usize) -> StorageResult<ListInsert> {
        let draft = draft.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let count: i64 = tx.query_row("SELECT COUNT(*) FROM custom_lists", [], |row| {
                row.get(0)
            })?;
            if count as usize >= max_lists {
                return Ok(ListInsert::LimitReached);
            }
            let key = draft.name_key();
            if exists(
                &tx,
                "SELECT EXISTS(SELECT 1 FROM custom_lists WHERE name_key = ?1)",
                &key,
            )? {
                return Ok(ListInsert::NameTaken);
            }

            let id = Uuid::new_v4();
            let now = now_millis();
            tx.execute(
                "INSERT INTO custom_lists (id, name, name_key, description, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![
                    id.to_string(),
                    draft.name,
                    key,
                    draft.description,
                    now.timestamp_millis()
                ],
            )?;
            tx.commit()?;

            Ok(ListInsert::Created(CustomList {
                id,
                name: draft.name,
                description: draft.description,
                created_at: now,
                updated_at: now,
                book_count: 0,
            }))
        })
        .await
    }

    async fn list_all(&self) -> StorageResult<Vec<CustomList>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LIST_COLUMNS} FROM custom_lists cl
                 LEFT JOIN custom_list_books m ON m.list_id = cl.id
                 GROUP BY cl.id
                 ORDER BY cl.created_at DESC, cl.rowid DESC"
            ))?;
            let rows = stmt.query_map([], row_to_list)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn list_count(&self) -> StorageResult<usize> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM custom_lists", [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
    }

    async fn get_list(&self, id: Uuid) -> StorageResult<Option<CustomList>> {
        self.with_conn(move |conn| Ok(read_list(conn, id)?)).await
    }

    async fn list_name_exists(&self, name: &str, exclude: Option<Uuid>) -> StorageResult<bool> {
        let key = name_key(name);
        let exclude = exclude.map(|id| id.to_string());
        self.with_conn(move |conn| {
            let found: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM custom_lists
                 WHERE name_key = ?1 AND (?2 IS NULL OR id != ?2))",
                params![key, exclude],
                |row| row.get(0),
            )?;
            Ok(found)
        })
        .await
    }

    async fn update_list(&self, id: Uuid, draft: &ListDraft) -> StorageResult<ListUpdate> {
        let draft = draft.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let id_text = id.to_string();

            if !exists(
                &tx,
                "SELECT EXISTS(SELECT 1 FROM custom_lists WHERE id = ?1)",
                &id_text,
            )? {
                return Ok(ListUpdate::Missing);
            }
            let key = draft.name_key();
            let taken: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM custom_lists WHERE name_key = ?1 AND id != ?2)",
                params![key, id_text],
                |row| row.get(0),
            )?;
            if taken {
                return Ok(ListUpdate::NameTaken);
            }

            tx.execute(
                "UPDATE custom_lists
                 SET name = ?2, name_key = ?3, description = ?4, updated_at = ?5
                 WHERE id = ?1",
                params![
                    id_text,
                    draft.name,
                    key,
                    draft.description,
                    now_millis().timestamp_millis()
                ],
            )?;
            let updated = read_list(&tx, id)?;
            tx.commit()?;

            Ok(updated.map_or(ListUpdate::Missing, ListUpdate::Updated))
        })
        .await
    }

    async fn delete_list(&self, id: Uuid) -> StorageResult<bool> {
        self.with_conn(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM custom_lists WHERE id = ?1",
                params![id.to_string()],
            )?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn add_membership(&self, list_id: Uuid, book_key: &str) -> StorageResult<bool> {
        let book_key = book_key.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let id_text = list_id.to_string();

            if !exists(
                &tx,
                "SELECT EXISTS(SELECT 1 FROM custom_lists WHERE id = ?1)",
                &id_text,
            )? {
                return Err(StorageError::NotFound(format!("list {}", list_id)));
            }
            if !exists(
                &tx,
                "SELECT EXISTS(SELECT 1 FROM books WHERE key = ?1)",
                &book_key,
            )? {
                return Err(StorageError::NotFound(format!("book {}", book_key)));
            }

            let inserted = tx.execute(
                "INSERT OR IGNORE INTO custom_list_books (list_id, book_key, added_at)
                 VALUES (?1, ?2, ?3)",
                params![id_text, book_key, now_millis().timestamp_millis()],
            )?;
            touch_list(&tx, list_id)?;
            tx.commit()?;
            Ok(inserted > 0)
        })
        .await
    }

    async fn remove_membership(&self, list_id: Uuid, book_key: &str) -> StorageResult<bool> {
        let book_key = book_key.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let removed = tx.execute(
                "DELETE FROM custom_list_books WHERE list_id = ?1 AND book_key = ?2",
                params![list_id.to_string(), book_key],
            )?;
            touch_list(&tx, list_id)?;
            tx.commit()?;
            Ok(removed > 0)
        })
        .await
    }

    async fn is_member(&self, list_id: Uuid, book_key: &str) -> StorageResult<bool> {
        let book_key = book_key.to_string();
        self.with_conn(move |conn| {
            let found: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM custom_list_books WHERE list_id = ?1 AND book_key = ?2)",
                params![list_id.to_string(), book_key],
                |row| row.get(0),
            )?;
            Ok(found)
        })
        .await
    }

    async fn books_in_list(&self, list_id: Uuid) -> StorageResult<Vec<Book>> {
        self.with_conn(move |conn| {
            let keys = {
                let mut stmt = conn.prepare(
                    "SELECT m.book_key FROM custom_list_books m
                     JOIN books b ON b.key = m.book_key
                     WHERE m.list_id = ?1
                     ORDER BY m.added_at DESC, m.rowid DESC",
                )?;
                let rows = stmt.query_map(params![list_id.to_string()], |row| row.get(0))?;
                rows.collect::<rusqlite::Result<Vec<String>>>()?
            };
            Ok(read_books(conn, keys)?)
        })
        .await
    }

    async fn lists_containing(&self, book_key: &str) -> StorageResult<Vec<CustomList>> {
        let book_key = book_key.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LIST_COLUMNS} FROM custom_lists cl
                 LEFT JOIN custom_list_books m ON m.list_id = cl.id
                 WHERE cl.id IN (SELECT list_id FROM custom_list_books WHERE book_key = ?1)
                 GROUP BY cl.id
                 ORDER BY cl.created_at DESC, cl.rowid DESC"
            ))?;
            let rows = stmt.query_map(params![book_key], row_to_list)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }
}
