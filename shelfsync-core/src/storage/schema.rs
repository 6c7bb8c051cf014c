//! SQLite schema creation and version tracking.

use crate::error::StorageError;
use rusqlite::Connection;

/// Current schema version. Increment when adding migrations.
pub const CURRENT_VERSION: i32 = 1;

/// Create the schema on a fresh database, or verify an existing one.
pub(crate) fn ensure_schema(conn: &Connection) -> Result<(), StorageError> {
    let version = get_schema_version(conn)?;
    if version == 0 {
        create_schema(conn)?;
    } else if version > CURRENT_VERSION {
        return Err(StorageError::SchemaVersion {
            found: version,
            supported: CURRENT_VERSION,
        });
    }
    Ok(())
}

/// Create all tables and indexes if they don't exist.
fn create_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [CURRENT_VERSION],
    )?;
    Ok(())
}

/// Get the current schema version, or 0 if no schema exists.
pub(crate) fn get_schema_version(conn: &Connection) -> Result<i32, StorageError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

// Timestamps are Unix milliseconds. Author keys use '' for "no key" so the
// (key, name) uniqueness constraint also covers keyless authors.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS books (
    key TEXT PRIMARY KEY NOT NULL,
    title TEXT NOT NULL,
    first_publish_year INTEGER,
    cover_url TEXT,
    cover_id INTEGER,
    description TEXT,
    subjects TEXT,
    isbn TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS authors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    key TEXT NOT NULL DEFAULT '',
    name TEXT NOT NULL,
    UNIQUE (key, name)
);

CREATE TABLE IF NOT EXISTS book_authors (
    book_key TEXT NOT NULL REFERENCES books(key) ON DELETE CASCADE,
    author_id INTEGER NOT NULL REFERENCES authors(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    PRIMARY KEY (book_key, author_id)
);

CREATE TABLE IF NOT EXISTS genre_books (
    genre_id TEXT NOT NULL,
    book_key TEXT NOT NULL REFERENCES books(key) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    PRIMARY KEY (genre_id, book_key)
);

CREATE TABLE IF NOT EXISTS custom_lists (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    name_key TEXT NOT NULL UNIQUE,
    description TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS custom_list_books (
    list_id TEXT NOT NULL REFERENCES custom_lists(id) ON DELETE CASCADE,
    book_key TEXT NOT NULL REFERENCES books(key) ON DELETE CASCADE,
    added_at INTEGER NOT NULL,
    PRIMARY KEY (list_id, book_key)
);

CREATE INDEX IF NOT EXISTS idx_books_title ON books(title);
CREATE INDEX IF NOT EXISTS idx_book_authors_book ON book_authors(book_key);
CREATE INDEX IF NOT EXISTS idx_genre_books_genre ON genre_books(genre_id, position);
CREATE INDEX IF NOT EXISTS idx_custom_list_books_list ON custom_list_books(list_id);
CREATE INDEX IF NOT EXISTS idx_custom_list_books_book ON custom_list_books(book_key);
"#;
