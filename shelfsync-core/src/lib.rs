//! Shelfsync Core Library
//!
//! Offline-first book catalog: a local cache behind one of two storage
//! engines, a remote catalog client, a connectivity signal, and the services
//! that combine them ([`CatalogSync`] for reads, [`ListManager`] for custom
//! reading lists).

pub mod catalog;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod lists;
pub mod remote;
pub mod storage;
pub mod types;

pub use catalog::CatalogSync;
pub use config::{BackendChoice, Settings};
pub use connectivity::{
    ConnectionType, ConnectivityMonitor, ConnectivitySignal, ConnectivityStatus,
    StatusSubscription,
};
pub use error::{ListError, NameError, RemoteError, Result, ShelfError, StorageError};
pub use lists::{validate_name, ListManager};
pub use remote::{CatalogClient, OpenLibraryClient};
pub use storage::{open_backend, BackendKind, PersistenceBackend};
pub use types::{Author, Book, CustomList, Genre, Page, PageOrigin, GENRES, MAX_LISTS};
