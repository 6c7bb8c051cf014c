//! The cached book record and its authors

use serde::{Deserialize, Serialize};

/// A contributor to a work.
///
/// Identity is the `(key, name)` pair; the key is optional because search
/// results sometimes carry names without author keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Author {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub name: String,
}

impl Author {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            key: None,
            name: name.into(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// A cataloged work
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Book {
    /// Catalog work key (e.g. "/works/OL45883W"); the sole identity
    pub key: String,

    pub title: String,

    /// Authors in catalog order
    #[serde(default)]
    pub authors: Vec<Author>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_publish_year: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_id: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subjects: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<Vec<String>>,
}

impl Book {
    /// Create a book with only the required fields
    pub fn new(key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            authors: Vec::new(),
            first_publish_year: None,
            cover_url: None,
            cover_id: None,
            description: None,
            subjects: None,
            isbn: None,
        }
    }

    /// Canonical work key: `OL1W`, `/OL1W` and `works/OL1W` all become `/works/OL1W`.
    pub fn normalize_key(key: &str) -> String {
        let id = key.trim().trim_start_matches('/');
        let id = id.strip_prefix("works/").unwrap_or(id);
        format!("/works/{}", id)
    }

    pub fn with_author(mut self, author: Author) -> Self {
        self.authors.push(author);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.first_publish_year = Some(year);
        self
    }

    /// Get the primary author (first listed)
    pub fn primary_author(&self) -> Option<&str> {
        self.authors.first().map(|a| a.name.as_str())
    }

    /// Authors with repeated `(key, name)` pairs collapsed to their first occurrence.
    pub fn distinct_authors(&self) -> Vec<Author> {
        let mut seen = std::collections::HashSet::new();
        self.authors
            .iter()
            .filter(|a| seen.insert((a.key.as_deref(), a.name.as_str())))
            .cloned()
            .collect()
    }

    /// Combine a freshly fetched detail record with the cached copy.
    ///
    /// Scalar fields present in `fresh` win; absent ones keep the cached value.
    /// Authors come from `fresh` only when it lists any.
    pub fn merge_detail(cached: Option<Book>, fresh: Book) -> Book {
        let Some(cached) = cached else {
            return fresh;
        };

        Book {
            key: fresh.key,
            title: if fresh.title.is_empty() {
                cached.title
            } else {
                fresh.title
            },
            authors: if fresh.authors.is_empty() {
                cached.authors
            } else {
                fresh.authors
            },
            first_publish_year: fresh.first_publish_year.or(cached.first_publish_year),
            cover_url: fresh.cover_url.or(cached.cover_url),
            cover_id: fresh.cover_id.or(cached.cover_id),
            description: fresh.description.or(cached.description),
            subjects: fresh.subjects.or(cached.subjects),
            isbn: fresh.isbn.or(cached.isbn),
        }
    }

    /// Case-insensitive substring match over title and author names.
    pub fn matches(&self, needle_lower: &str) -> bool {
        self.title.to_lowercase().contains(needle_lower)
            || self
                .authors
                .iter()
                .any(|a| a.name.to_lowercase().contains(needle_lower))
    }
}
