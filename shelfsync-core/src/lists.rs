//! Custom reading lists
//!
//! Validation and business rules live here; the backend enforces the count
//! limit and name uniqueness again inside its own atomic write, so concurrent
//! callers cannot slip past the checks below.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use uuid::Uuid;

use crate::error::{ListError, NameError, StorageError};
use crate::storage::PersistenceBackend;
use crate::types::{Book, CustomList, ListDraft, ListInsert, ListUpdate, MAX_LISTS};

pub const MIN_NAME_LENGTH: usize = 2;
pub const MAX_NAME_LENGTH: usize = 50;

type ListResult<T> = std::result::Result<T, ListError>;

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-zA-Z\u{C0}-\u{D6}\u{D8}-\u{F6}\u{F8}-\u{FF}0-9\s_-]+$")
            .expect("valid list name pattern")
    })
}

/// Check a list name and return it trimmed.
///
/// Length is counted in characters after trimming.
pub fn validate_name(name: &str) -> Result<String, NameError> {
    let trimmed = name.trim();
    let len = trimmed.chars().count();

    if len < MIN_NAME_LENGTH {
        return Err(NameError::TooShort {
            min: MIN_NAME_LENGTH,
        });
    }
    if len > MAX_NAME_LENGTH {
        return Err(NameError::TooLong {
            max: MAX_NAME_LENGTH,
        });
    }
    if !name_pattern().is_match(trimmed) {
        return Err(NameError::InvalidCharacters);
    }
    Ok(trimmed.to_string())
}

/// Creates, edits and fills custom lists
pub struct ListManager {
    backend: Arc<dyn PersistenceBackend>,
    max_lists: usize,
}

impl ListManager {
    pub fn new(backend: Arc<dyn PersistenceBackend>) -> Self {
        Self {
            backend,
            max_lists: MAX_LISTS,
        }
    }

    pub fn max_lists(&self) -> usize {
        self.max_lists
    }

    pub async fn create(&self, name: &str, description: Option<&str>) -> ListResult<CustomList> {
        let name = validate_name(name)?;

        if self.backend.list_count().await? >= self.max_lists {
            return Err(ListError::ListLimitExceeded {
                max: self.max_lists,
            });
        }
        if self.backend.list_name_exists(&name, None).await? {
            return Err(ListError::DuplicateName);
        }

        let draft = ListDraft::new(&name, description);
        match self.backend.create_list(&draft, self.max_lists).await? {
            ListInsert::Created(list) => {
                tracing::info!("Created list '{}' ({})", list.name, list.id);
                Ok(list)
            }
            ListInsert::LimitReached => Err(ListError::ListLimitExceeded {
                max: self.max_lists,
            }),
            ListInsert::NameTaken => Err(ListError::DuplicateName),
        }
    }

    /// Rename a list and replace its description. The count limit does not apply.
    pub async fn update(
        &self,
        id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> ListResult<CustomList> {
        let name = validate_name(name)?;

        if self.backend.list_name_exists(&name, Some(id)).await? {
            return Err(ListError::DuplicateName);
        }

        let draft = ListDraft::new(&name, description);
        match self.backend.update_list(id, &draft).await? {
            ListUpdate::Updated(list) => Ok(list),
            ListUpdate::NameTaken => Err(ListError::DuplicateName),
            ListUpdate::Missing => Err(ListError::ListNotFound(id)),
        }
    }

    /// Delete a list and its memberships. Deleting a missing list succeeds.
    pub async fn delete(&self, id: Uuid) -> ListResult<()> {
        if self.backend.delete_list(id).await? {
            tracing::info!("Deleted list {}", id);
        } else {
            tracing::debug!("List {} already gone", id);
        }
        Ok(())
    }

    /// All lists, newest first
    pub async fn lists(&self) -> ListResult<Vec<CustomList>> {
        Ok(self.backend.list_all().await?)
    }

    pub async fn get(&self, id: Uuid) -> ListResult<Option<CustomList>> {
        Ok(self.backend.get_list(id).await?)
    }

    async fn require(&self, id: Uuid) -> ListResult<CustomList> {
        self.backend
            .get_list(id)
            .await?
            .ok_or(ListError::ListNotFound(id))
    }

    /// Add a book to a list, caching the book on the way.
    pub async fn add_book_to_list(&self, list_id: Uuid, book: &Book) -> ListResult<()> {
        self.require(list_id).await?;

        if self.backend.is_member(list_id, &book.key).await? {
            return Err(ListError::AlreadyInList);
        }

        self.backend.upsert_book(book).await?;
        match self.backend.add_membership(list_id, &book.key).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(ListError::AlreadyInList),
            // The list vanished between the check and the insert
            Err(StorageError::NotFound(_)) => Err(ListError::ListNotFound(list_id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a book from a list. The book itself stays cached.
    pub async fn remove_book_from_list(&self, list_id: Uuid, book_key: &str) -> ListResult<bool> {
        Ok(self.backend.remove_membership(list_id, book_key).await?)
    }

    pub async fn is_book_in_list(&self, list_id: Uuid, book_key: &str) -> ListResult<bool> {
        Ok(self.backend.is_member(list_id, book_key).await?)
    }

    /// Books in a list, most recently added first
    pub async fn books_in_list(&self, list_id: Uuid) -> ListResult<Vec<Book>> {
        self.require(list_id).await?;
        Ok(self.backend.books_in_list(list_id).await?)
    }

    pub async fn lists_containing(&self, book_key: &str) -> ListResult<Vec<CustomList>> {
        Ok(self.backend.lists_containing(book_key).await?)
    }

    pub async fn can_create_more(&self) -> ListResult<bool> {
        Ok(self.remaining_slots().await? > 0)
    }

    pub async fn remaining_slots(&self) -> ListResult<usize> {
        let count = self.backend.list_count().await?;
        Ok(self.max_lists.saturating_sub(count))
    }
}
