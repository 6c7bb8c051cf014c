//! User-curated reading lists

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum number of lists that may exist at once
pub const MAX_LISTS: usize = 3;

/// A user-defined collection of books
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomList {
    /// Generated at creation, never reused
    pub id: Uuid,

    /// Trimmed display name, unique ignoring case
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Computed from memberships at read time
    pub book_count: usize,
}

/// Name and description for a list about to be created or updated.
///
/// Both values are trimmed; a blank description becomes `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListDraft {
    pub name: String,
    pub description: Option<String>,
}

impl ListDraft {
    pub fn new(name: &str, description: Option<&str>) -> Self {
        Self {
            name: name.trim().to_string(),
            description: description
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
        }
    }

    /// Comparison key used for the uniqueness constraint
    pub fn name_key(&self) -> String {
        name_key(&self.name)
    }
}

/// Normalize a list name for case- and whitespace-insensitive comparison
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A book's membership in a list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListMembership {
    pub list_id: Uuid,
    pub book_key: String,
    pub added_at: DateTime<Utc>,
}

/// Result of the backend's atomic check-and-insert for a new list
#[derive(Debug, Clone, PartialEq)]
pub enum ListInsert {
    Created(CustomList),
    LimitReached,
    NameTaken,
}

/// Result of the backend's atomic check-and-update for an existing list
#[derive(Debug, Clone, PartialEq)]
pub enum ListUpdate {
    Updated(CustomList),
    NameTaken,
    Missing,
}

/// Current time truncated to millisecond precision.
///
/// Both backends store milliseconds, so timestamps compare equal across them.
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_trims_and_drops_blank_description() {
        let draft = ListDraft::new("  Summer reads ", Some("   "));
        assert_eq!(draft.name, "Summer reads");
        assert_eq!(draft.description, None);

        let draft = ListDraft::new("Sci-fi", Some(" space ships "));
        assert_eq!(draft.description.as_deref(), Some("space ships"));
    }

    #[test]
    fn test_name_key_ignores_case_and_padding() {
        assert_eq!(name_key(" Favorites "), name_key("favorites"));
        assert_eq!(name_key("ÑANDÚ"), "ñandú");
    }

    #[test]
    fn test_now_millis_has_no_sub_millisecond_part() {
        assert_eq!(now_millis().timestamp_subsec_nanos() % 1_000_000, 0);
    }
}
