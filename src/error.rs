use thiserror::Error;

/// Failures from the remote catalog. The client performs no retries; every
/// failed lookup surfaces as one of these and the caller decides what is
/// fatal.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    RemoteUnavailable(String),
    #[error("catalog response malformed: {0}")]
    RemoteMalformed(String),
}

#[derive(Debug, Error)]
pub enum IngestError {
    /// The primary work-record fetch failed; nothing was persisted.
    #[error("could not ingest work {external_id}: {source}")]
    WorkFetch {
        external_id: String,
        source: CatalogError,
    },
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

#[derive(Debug, Error)]
pub enum ShelfError {
    #[error("an authenticated user is required")]
    Unauthorized,
    #[error(transparent)]
    Ingest(#[from] IngestError),
}
