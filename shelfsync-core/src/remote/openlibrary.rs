use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{CatalogClient, RemoteResult};
use crate::config::Settings;
use crate::error::RemoteError;
use crate::types::{page_offset, Author, Book, Genre, Page, PageOrigin};

const SEARCH_FIELDS: &str = "key,title,author_name,author_key,first_publish_year,cover_i,subject,isbn";

/// Cover image size accepted by the covers service
#[derive(Debug, Clone, Copy)]
enum CoverSize {
    Medium,
    Large,
}

impl CoverSize {
    fn suffix(self) -> &'static str {
        match self {
            CoverSize::Medium => "M",
            CoverSize::Large => "L",
        }
    }
}

/// HTTP client for the Open Library API.
pub struct OpenLibraryClient {
    http: reqwest::Client,
    api_base: String,
    covers_base: String,
}

impl OpenLibraryClient {
    pub fn new(settings: &Settings) -> RemoteResult<Self> {
        Self::with_endpoints(
            &settings.api_base_url,
            &settings.covers_base_url,
            settings.request_timeout,
        )
    }

    pub fn with_endpoints(api_base: &str, covers_base: &str, timeout: Duration) -> RemoteResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("shelfsync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            covers_base: covers_base.trim_end_matches('/').to_string(),
        })
    }

    fn cover_url(&self, cover_id: i64, size: CoverSize) -> String {
        format!("{}/b/id/{}-{}.jpg", self.covers_base, cover_id, size.suffix())
    }

    /// GET a JSON document and decode it.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> RemoteResult<T> {
        tracing::debug!("GET {}", url);
        let resp = self.http.get(url).query(query).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RemoteError::Status(status.as_u16()));
        }

        let text = resp.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            let snippet: String = text.chars().take(200).collect();
            RemoteError::Decode(format!("{e}. Response: {snippet}"))
        })
    }

    fn subject_url(&self, genre_id: &str) -> String {
        // Unknown ids are passed through as subject slugs
        let subject = Genre::find(genre_id).map_or(genre_id, |g| g.subject);
        format!(
            "{}/subjects/{}.json",
            self.api_base,
            urlencoding::encode(subject)
        )
    }

    fn work_url(&self, work_key: &str) -> String {
        format!("{}{}.json", self.api_base, Book::normalize_key(work_key))
    }

    fn map_subject_work(&self, work: SubjectWork) -> Book {
        let authors = work
            .authors
            .into_iter()
            .map(|a| Author {
                key: a.key,
                name: a.name,
            })
            .collect();

        Book {
            key: work.key,
            title: work.title,
            authors,
            first_publish_year: work.first_publish_year,
            cover_url: work.cover_id.map(|id| self.cover_url(id, CoverSize::Medium)),
            cover_id: work.cover_id,
            description: None,
            subjects: work.subject,
            isbn: None,
        }
    }

    fn map_search_doc(&self, doc: SearchDoc) -> Book {
        // author_key lines up with author_name by index but may be shorter
        let mut keys = doc.author_key.into_iter();
        let authors = doc
            .author_name
            .into_iter()
            .map(|name| Author {
                key: keys.next(),
                name,
            })
            .collect();

        Book {
            key: doc.key,
            title: doc.title,
            authors,
            first_publish_year: doc.first_publish_year,
            cover_url: doc.cover_i.map(|id| self.cover_url(id, CoverSize::Medium)),
            cover_id: doc.cover_i,
            description: None,
            subjects: doc.subject,
            isbn: doc.isbn,
        }
    }

    fn map_work(&self, work: WorkResponse) -> Book {
        let cover_id = work.covers.first().copied();
        Book {
            key: work.key,
            title: work.title,
            authors: Vec::new(),
            first_publish_year: None,
            cover_url: cover_id.map(|id| self.cover_url(id, CoverSize::Large)),
            cover_id,
            description: work.description.map(Description::into_text),
            subjects: work.subjects,
            isbn: None,
        }
    }
}

#[async_trait]
impl CatalogClient for OpenLibraryClient {
    async fn search_by_genre(
        &self,
        genre_id: &str,
        page: u32,
        page_size: u32,
    ) -> RemoteResult<Page<Book>> {
        let query = [
            ("limit", page_size.to_string()),
            ("offset", page_offset(page, page_size).to_string()),
        ];
        let resp: SubjectResponse = self.get_json(&self.subject_url(genre_id), &query).await?;

        let items = resp
            .works
            .into_iter()
            .map(|w| self.map_subject_work(w))
            .collect();
        Ok(Page::new(items, resp.work_count, page, page_size, PageOrigin::Remote))
    }

    async fn search(&self, query: &str, page: u32, page_size: u32) -> RemoteResult<Page<Book>> {
        let params = [
            ("q", query.to_string()),
            ("limit", page_size.to_string()),
            ("offset", page_offset(page, page_size).to_string()),
            ("fields", SEARCH_FIELDS.to_string()),
        ];
        let url = format!("{}/search.json", self.api_base);
        let resp: SearchResponse = self.get_json(&url, &params).await?;

        let items = resp
            .docs
            .into_iter()
            .map(|d| self.map_search_doc(d))
            .collect();
        Ok(Page::new(items, resp.num_found, page, page_size, PageOrigin::Remote))
    }

    async fn get_detail(&self, work_key: &str) -> RemoteResult<Book> {
        let work: WorkResponse = self.get_json(&self.work_url(work_key), &[]).await?;
        Ok(self.map_work(work))
    }
}

// ── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SubjectResponse {
    #[serde(default)]
    works: Vec<SubjectWork>,
    #[serde(default)]
    work_count: u64,
}

#[derive(Debug, Deserialize)]
struct SubjectWork {
    key: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    authors: Vec<SubjectAuthor>,
    first_publish_year: Option<i32>,
    cover_id: Option<i64>,
    subject: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct SubjectAuthor {
    key: Option<String>,
    name: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    docs: Vec<SearchDoc>,
    #[serde(default, rename = "numFound")]
    num_found: u64,
}

#[derive(Debug, Deserialize)]
struct SearchDoc {
    key: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    author_name: Vec<String>,
    #[serde(default)]
    author_key: Vec<String>,
    first_publish_year: Option<i32>,
    cover_i: Option<i64>,
    subject: Option<Vec<String>>,
    isbn: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct WorkResponse {
    key: String,
    #[serde(default)]
    title: String,
    description: Option<Description>,
    #[serde(default)]
    covers: Vec<i64>,
    subjects: Option<Vec<String>>,
}

/// Work descriptions arrive either as plain text or as a typed text object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Description {
    Text(String),
    Typed { value: String },
}

impl Description {
    fn into_text(self) -> String {
        match self {
            Description::Text(s) | Description::Typed { value: s } => s,
        }
    }
}
