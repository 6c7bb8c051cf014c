//! Custom list commands

use anyhow::{Context, Result};
use serde::Serialize;
use shelfsync_core::{Book, CustomList};
use uuid::Uuid;

use super::{book_line, App};

#[derive(Serialize)]
struct ListOverview<'a> {
    lists: &'a [CustomList],
    remaining_slots: usize,
}

fn list_line(list: &CustomList) -> String {
    let noun = if list.book_count == 1 { "book" } else { "books" };
    let mut line = format!("{}  {} ({} {})", list.id, list.name, list.book_count, noun);
    if let Some(desc) = &list.description {
        line.push_str(&format!(" - {}", desc));
    }
    line
}

/// Show all lists and the remaining capacity
pub async fn list_all(app: &App) -> Result<()> {
    let lists = app.lists.lists().await?;
    let overview = ListOverview {
        lists: &lists,
        remaining_slots: app.lists.remaining_slots().await?,
    };

    app.emit(&overview, |o| {
        if o.lists.is_empty() {
            println!("No lists yet");
        }
        for list in o.lists {
            println!("{}", list_line(list));
        }
        println!(
            "{} of {} list slots free",
            o.remaining_slots,
            app.lists.max_lists()
        );
    })
}

pub async fn create_list(app: &App, name: &str, description: Option<&str>) -> Result<()> {
    let list = app.lists.create(name, description).await?;
    app.emit(&list, |l| println!("Created {}", list_line(l)))
}

pub async fn rename_list(
    app: &App,
    id: Uuid,
    name: &str,
    description: Option<&str>,
) -> Result<()> {
    let list = app.lists.update(id, name, description).await?;
    app.emit(&list, |l| println!("Updated {}", list_line(l)))
}

pub async fn delete_list(app: &App, id: Uuid) -> Result<()> {
    app.lists.delete(id).await?;
    if !app.json {
        println!("Deleted list {}", id);
    }
    Ok(())
}

/// Add a work to a list, resolving it from the cache or the remote catalog
pub async fn add_to_list(app: &App, id: Uuid, key: &str) -> Result<()> {
    let book = app
        .sync
        .book_detail(key)
        .await?
        .with_context(|| format!("Book not found: {}", key))?;

    app.lists.add_book_to_list(id, &book).await?;
    if !app.json {
        println!("Added '{}' to list {}", book.title, id);
    }
    Ok(())
}

pub async fn remove_from_list(app: &App, id: Uuid, key: &str) -> Result<()> {
    let key = Book::normalize_key(key);
    let removed = app.lists.remove_book_from_list(id, &key).await?;
    if !app.json {
        if removed {
            println!("Removed {} from list {}", key, id);
        } else {
            println!("{} was not in list {}", key, id);
        }
    }
    Ok(())
}

/// Books in a list, most recently added first
pub async fn list_books(app: &App, id: Uuid) -> Result<()> {
    let books = app.lists.books_in_list(id).await?;
    app.emit(&books, |books| {
        if books.is_empty() {
            println!("This list is empty");
        }
        for book in books {
            println!("{}", book_line(book));
        }
    })
}

pub async fn lists_containing(app: &App, key: &str) -> Result<()> {
    let key = Book::normalize_key(key);
    let lists = app.lists.lists_containing(&key).await?;
    app.emit(&lists, |lists| {
        if lists.is_empty() {
            println!("{} is not in any list", key);
        }
        for list in lists {
            println!("{}", list_line(list));
        }
    })
}
