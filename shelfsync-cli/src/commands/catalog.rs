//! Genre browsing, search and work details

use anyhow::{bail, Result};
use shelfsync_core::{Book, Genre, Page, PageOrigin, GENRES};

use super::{book_line, App};

/// List the browsable genres
pub fn genres(app: &App) -> Result<()> {
    app.emit(&GENRES, |genres| {
        for genre in genres.iter() {
            println!("{:<10} {} - {}", genre.id, genre.name, genre.description);
        }
    })
}

/// Browse one page of a genre
pub async fn browse(app: &App, genre: &str, page: u32, refresh: bool) -> Result<()> {
    if Genre::find(genre).is_none() {
        tracing::info!("'{}' is not a known genre, using it as a subject", genre);
    }

    let result = if refresh {
        app.sync.refresh_genre(genre).await?
    } else {
        app.sync.browse_genre(genre, page).await?
    };
    print_page(app, &result)
}

/// Search by title or author
pub async fn search(app: &App, query: &str, page: u32) -> Result<()> {
    let result = app.sync.search(query, page).await?;
    print_page(app, &result)
}

/// Show a single work
pub async fn show(app: &App, key: &str) -> Result<()> {
    let Some(book) = app.sync.book_detail(key).await? else {
        bail!("Book not found: {}", key);
    };

    app.emit(&book, |book: &Book| {
        println!("Title:       {}", book.title);
        println!("Key:         {}", book.key);
        if !book.authors.is_empty() {
            let names: Vec<&str> = book.authors.iter().map(|a| a.name.as_str()).collect();
            println!("Authors:     {}", names.join(", "));
        }
        if let Some(year) = book.first_publish_year {
            println!("First published: {}", year);
        }
        if let Some(cover) = &book.cover_url {
            println!("Cover:       {}", cover);
        }
        if let Some(subjects) = &book.subjects {
            println!("Subjects:    {}", subjects.join(", "));
        }
        if let Some(desc) = &book.description {
            println!();
            println!("{}", desc);
        }
    })
}

fn print_page(app: &App, page: &Page<Book>) -> Result<()> {
    app.emit(page, |page| {
        if page.is_offline_empty() {
            println!("Nothing cached yet (offline)");
            return;
        }
        if page.is_empty() {
            println!("No results");
            return;
        }

        for book in &page.items {
            println!("{}", book_line(book));
        }
        let source = match page.origin {
            PageOrigin::Remote => "remote",
            PageOrigin::Cache => "cache",
        };
        println!();
        println!(
            "Page {} of {} ({} books, from {})",
            page.current_page, page.total_pages, page.total_items, source
        );
    })
}
