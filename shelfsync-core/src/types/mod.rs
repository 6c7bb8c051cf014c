//! Core types shared by the cache, the sync service and the list manager

mod book;
mod genre;
mod list;
mod page;

pub use book::{Author, Book};
pub use genre::{Genre, GENRES};
pub use list::{
    name_key, now_millis, CustomList, ListDraft, ListInsert, ListMembership, ListUpdate,
    MAX_LISTS,
};
pub use page::{page_offset, sanitize_page, total_pages, Page, PageOrigin};
