pub mod catalog;
pub mod covers;
pub mod db;
pub mod error;
pub mod ingest;
pub mod models;
pub mod store;

pub use catalog::{CatalogClient, SearchPage, WorkRecord};
pub use covers::CoverStore;
pub use error::{CatalogError, IngestError, ShelfError};
pub use ingest::{Library, ShelfAddition};
pub use models::{Author, Book, Shelf, User};
pub use store::Store;
