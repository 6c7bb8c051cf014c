//! List manager business rules, run against both backends

use shelfsync_core::error::{ListError, NameError};
use shelfsync_core::storage::{KvBackend, LocalStorage, PersistenceBackend, SqliteBackend};
use shelfsync_core::types::{Author, Book};
use shelfsync_core::ListManager;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

/// Both engines on disk, kept alive by the returned directory
fn backends() -> (TempDir, Vec<Arc<dyn PersistenceBackend>>) {
    let dir = TempDir::new().unwrap();
    let sqlite = SqliteBackend::open(&dir.path().join("lists.db")).unwrap();
    let kv = KvBackend::new(Arc::new(LocalStorage::new(dir.path().join("kv"))));
    (dir, vec![Arc::new(sqlite), Arc::new(kv)])
}

fn dune() -> Book {
    Book::new("/works/OL893415W", "Dune").with_author(Author::new("Frank Herbert"))
}

#[tokio::test]
async fn duplicate_names_ignore_case_and_padding() {
    let (_dir, backends) = backends();
    for backend in backends {
        let lists = ListManager::new(backend);
        lists.create("Favorites", None).await.unwrap();

        let err = lists.create(" favorites ", None).await.unwrap_err();
        assert!(matches!(err, ListError::DuplicateName));
        assert!(err.is_business_rule());
        assert_eq!(lists.lists().await.unwrap().len(), 1);
    }
}

#[tokio::test]
async fn fourth_list_is_rejected() {
    let (_dir, backends) = backends();
    for backend in backends {
        let lists = ListManager::new(backend);
        assert_eq!(lists.remaining_slots().await.unwrap(), 3);
        for name in ["One", "Two", "Three"] {
            lists.create(name, Some("a description")).await.unwrap();
        }
        assert!(!lists.can_create_more().await.unwrap());
        assert_eq!(lists.remaining_slots().await.unwrap(), 0);

        for description in [None, Some(""), Some("something long and different")] {
            let err = lists.create("Four", description).await.unwrap_err();
            assert!(matches!(err, ListError::ListLimitExceeded { max: 3 }));
        }
    }
}

#[tokio::test]
async fn validation_happens_before_storage() {
    let (_dir, backends) = backends();
    for backend in backends {
        let lists = ListManager::new(backend);
        for (name, expected) in [
            ("x", NameError::TooShort { min: 2 }),
            ("  ", NameError::TooShort { min: 2 }),
            ("Books & more", NameError::InvalidCharacters),
        ] {
            match lists.create(name, None).await {
                Err(ListError::Validation(e)) => assert_eq!(e, expected),
                other => panic!("expected validation failure for {:?}, got {:?}", name, other),
            }
        }
        assert!(lists.lists().await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn create_trims_input() {
    let (_dir, backends) = backends();
    for backend in backends {
        let lists = ListManager::new(backend);
        let list = lists
            .create("  Summer reads  ", Some("   "))
            .await
            .unwrap();
        assert_eq!(list.name, "Summer reads");
        assert_eq!(list.description, None);
        assert_eq!(list.book_count, 0);
    }
}

#[tokio::test]
async fn update_checks_other_lists_only() {
    let (_dir, backends) = backends();
    for backend in backends {
        let lists = ListManager::new(backend);
        let a = lists.create("Favorites", None).await.unwrap();
        lists.create("Classics", None).await.unwrap();
        lists.create("Third", None).await.unwrap();

        // At the limit, updating is still allowed
        let renamed = lists
            .update(a.id, "favorites", Some("mine"))
            .await
            .unwrap();
        assert_eq!(renamed.name, "favorites");
        assert_eq!(renamed.description.as_deref(), Some("mine"));

        assert!(matches!(
            lists.update(a.id, " CLASSICS", None).await,
            Err(ListError::DuplicateName)
        ));
        assert!(matches!(
            lists.update(a.id, "?", None).await,
            Err(ListError::Validation(NameError::TooShort { .. }))
        ));

        let ghost = Uuid::new_v4();
        assert!(matches!(
            lists.update(ghost, "Ghost", None).await,
            Err(ListError::ListNotFound(id)) if id == ghost
        ));
    }
}

#[tokio::test]
async fn remove_and_re_add_cycle() {
    let (_dir, backends) = backends();
    for backend in backends {
        let lists = ListManager::new(Arc::clone(&backend));
        let list = lists.create("Favorites", None).await.unwrap();
        let book = dune();

        // Adding caches the book even though it was never fetched
        assert!(backend.get_book(&book.key).await.unwrap().is_none());
        lists.add_book_to_list(list.id, &book).await.unwrap();
        assert!(backend.get_book(&book.key).await.unwrap().is_some());

        assert!(matches!(
            lists.add_book_to_list(list.id, &book).await,
            Err(ListError::AlreadyInList)
        ));

        for _ in 0..3 {
            assert!(lists.remove_book_from_list(list.id, &book.key).await.unwrap());
            assert!(!lists.is_book_in_list(list.id, &book.key).await.unwrap());
            lists.add_book_to_list(list.id, &book).await.unwrap();
            assert!(lists.is_book_in_list(list.id, &book.key).await.unwrap());
        }

        let books = lists.books_in_list(list.id).await.unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(lists.get(list.id).await.unwrap().unwrap().book_count, 1);

        let containing = lists.lists_containing(&book.key).await.unwrap();
        assert_eq!(containing.len(), 1);
        assert_eq!(containing[0].id, list.id);
    }
}

#[tokio::test]
async fn missing_list_is_reported() {
    let (_dir, backends) = backends();
    for backend in backends {
        let lists = ListManager::new(backend);
        let ghost = Uuid::new_v4();

        assert!(matches!(
            lists.add_book_to_list(ghost, &dune()).await,
            Err(ListError::ListNotFound(_))
        ));
        assert!(matches!(
            lists.books_in_list(ghost).await,
            Err(ListError::ListNotFound(_))
        ));
        assert!(!lists.remove_book_from_list(ghost, "/works/OL1W").await.unwrap());
    }
}

#[tokio::test]
async fn delete_is_idempotent_and_frees_a_slot() {
    let (_dir, backends) = backends();
    for backend in backends {
        let lists = ListManager::new(Arc::clone(&backend));
        let list = lists.create("Favorites", None).await.unwrap();
        lists.add_book_to_list(list.id, &dune()).await.unwrap();
        for name in ["Two", "Three"] {
            lists.create(name, None).await.unwrap();
        }

        lists.delete(list.id).await.unwrap();
        lists.delete(list.id).await.unwrap();

        assert_eq!(lists.remaining_slots().await.unwrap(), 1);
        assert!(lists.lists_containing(&dune().key).await.unwrap().is_empty());
        assert!(backend.get_book(&dune().key).await.unwrap().is_some());

        // The freed name and slot are reusable
        lists.create("favorites", None).await.unwrap();
    }
}

#[tokio::test]
async fn concurrent_creates_respect_the_limit() {
    let (_dir, backends) = backends();
    for backend in backends {
        let lists = Arc::new(ListManager::new(backend));

        let handles: Vec<_> = (0..8)
            .map(|n| {
                let lists = Arc::clone(&lists);
                tokio::spawn(async move { lists.create(&format!("List {n}"), None).await })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(ListError::ListLimitExceeded { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(created, 3);
        assert_eq!(lists.lists().await.unwrap().len(), 3);
    }
}

#[tokio::test]
async fn concurrent_creates_with_same_name() {
    let (_dir, backends) = backends();
    for backend in backends {
        let lists = Arc::new(ListManager::new(backend));

        let handles: Vec<_> = ["Shared", " shared", "SHARED "]
            .into_iter()
            .map(|name| {
                let lists = Arc::clone(&lists);
                tokio::spawn(async move { lists.create(name, None).await })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(ListError::DuplicateName) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(created, 1);
    }
}
