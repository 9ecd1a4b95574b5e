use std::path::Path;

use crate::catalog::{trailing_segment, CatalogClient};
use crate::covers::CoverStore;
use crate::error::{IngestError, ShelfError};
use crate::models::{Author, Book, Shelf, User};
use crate::store::Store;

/// Fallback title when the remote work record carries none.
pub const DEFAULT_TITLE: &str = "No Title Available";
/// Sentinel attached when no author can be resolved for a work.
pub const UNKNOWN_AUTHOR: &str = "Unknown Author";
/// Name given to a user's lazily created shelf.
pub const DEFAULT_SHELF_NAME: &str = "My Shelf";

// Open Library answers missing covers with a tiny placeholder body rather
// than a 404; anything under this size is not a real image.
const MIN_COVER_BYTES: usize = 1024;

/// The ingestion and reconciliation core: composes the repository, the
/// catalog client and the cover store. One instance per request-handling
/// context; all operations are synchronous.
pub struct Library {
    store: Store,
    catalog: CatalogClient,
    covers: CoverStore,
}

/// Outcome of a shelf reconciliation.
#[derive(Debug)]
pub struct ShelfAddition {
    pub book: Book,
    pub shelf: Shelf,
    pub newly_added: bool,
}

impl Library {
    pub fn new(store: Store, catalog: CatalogClient, covers: CoverStore) -> Self {
        Self {
            store,
            catalog,
            covers,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn catalog(&self) -> &CatalogClient {
        &self.catalog
    }

    /// Resolves external author references to local rows, creating them by
    /// name as needed. A reference that fails remotely is skipped; an empty
    /// result degrades to the "Unknown Author" sentinel, so the returned list
    /// is never empty. Only storage faults propagate.
    pub fn resolve_authors(&self, author_refs: &[String]) -> Result<Vec<Author>, IngestError> {
        let mut authors: Vec<Author> = Vec::new();
        for author_ref in author_refs {
            let author_id = trailing_segment(author_ref);
            match self.catalog.fetch_author(author_id) {
                Ok(record) => {
                    let author = self
                        .store
                        .get_or_create_author(&record.name, record.bio.as_deref())?;
                    if !authors.iter().any(|existing| existing.id == author.id) {
                        authors.push(author);
                    }
                }
                Err(err) => {
                    log::warn!("skipping author {}: {}", author_id, err);
                }
            }
        }
        if authors.is_empty() {
            authors.push(self.store.get_or_create_author(UNKNOWN_AUTHOR, None)?);
        }
        Ok(authors)
    }

    /// Cache-first ingestion keyed by the external catalog id. A local hit
    /// returns without touching the network; otherwise the work record is
    /// fetched, authors resolved, the row created atomically, and the cover
    /// downloaded best-effort. A failed work fetch persists nothing.
    pub fn get_or_create_book(&self, external_id: &str) -> Result<(Book, bool), IngestError> {
        if let Some(book) = self.store.find_book_by_external_id(external_id)? {
            return Ok((book, false));
        }

        let work = self
            .catalog
            .fetch_work(external_id)
            .map_err(|source| IngestError::WorkFetch {
                external_id: external_id.to_string(),
                source,
            })?;
        let title = work.title.unwrap_or_else(|| DEFAULT_TITLE.to_string());
        let authors = self.resolve_authors(&work.author_refs)?;

        let (mut book, created) = self.store.insert_book_if_absent(external_id, &title)?;
        self.store.replace_book_authors(&book.id, &authors)?;
        book.authors = authors;

        if created {
            log::info!("book created: {} ({})", book.title, external_id);
            if let Some(cover_id) = work.cover_id {
                if let Some(path) = self.fetch_and_store_cover(external_id, cover_id) {
                    self.store.set_book_cover(&book.id, &path)?;
                    book.cover_path = Some(path);
                }
            }
        }

        Ok((book, created))
    }

    /// Ensures the user has a shelf and that the book is on it. Requires an
    /// authenticated user; an ingestion failure leaves shelf state untouched.
    pub fn add_book_to_shelf(
        &self,
        user: Option<&User>,
        external_id: &str,
    ) -> Result<ShelfAddition, ShelfError> {
        let user = user.ok_or(ShelfError::Unauthorized)?;
        let (book, _) = self.get_or_create_book(external_id)?;
        let shelf = self
            .store
            .get_or_create_shelf(&user.id, DEFAULT_SHELF_NAME)
            .map_err(IngestError::from)?;
        let newly_added = self
            .store
            .add_book_to_shelf(&shelf.id, &book.id)
            .map_err(IngestError::from)?;
        if newly_added {
            log::info!("book {} shelved for {}", book.external_id, user.email);
        }
        Ok(ShelfAddition {
            book,
            shelf,
            newly_added,
        })
    }

    /// Deletion hook for the presentation layer: removes the row (join rows
    /// cascade) and the cover file it owned. Returns false when no such book
    /// exists.
    pub fn delete_book(&self, external_id: &str) -> Result<bool, IngestError> {
        let Some(book) = self.store.find_book_by_external_id(external_id)? else {
            return Ok(false);
        };
        self.store.delete_book(&book.id)?;
        if let Some(cover_path) = book.cover_path.as_deref() {
            if let Err(err) = self.covers.delete(Path::new(cover_path)) {
                log::warn!("could not remove cover for {}: {}", external_id, err);
            }
        }
        log::info!("book deleted: {} ({})", book.title, external_id);
        Ok(true)
    }

    fn fetch_and_store_cover(&self, external_id: &str, cover_id: i64) -> Option<String> {
        let image = match self.catalog.fetch_cover(cover_id) {
            Ok(image) => image,
            Err(err) => {
                log::warn!("cover fetch failed for {}: {}", external_id, err);
                return None;
            }
        };
        if image.bytes.len() < MIN_COVER_BYTES {
            log::info!(
                "cover for {} too small ({} bytes), likely a placeholder",
                external_id,
                image.bytes.len()
            );
            return None;
        }
        match self
            .covers
            .save(external_id, &image.bytes, image.content_type.as_deref())
        {
            Ok(path) => Some(path.to_string_lossy().into_owned()),
            Err(err) => {
                log::warn!("cover save failed for {}: {}", external_id, err);
                None
            }
        }
    }
}
