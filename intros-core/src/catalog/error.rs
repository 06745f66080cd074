use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("failed to open catalog database at {path}: {source}")]
    OpenDatabase {
        path: PathBuf,
        source: rusqlite::Error,
    },
    #[error("catalog store path not configured")]
    MissingStore,
    #[error("catalog entry {id} has a malformed id")]
    CorruptId { id: String },
    #[error("catalog entry for {path} already exists")]
    DuplicatePath { path: PathBuf },
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;
