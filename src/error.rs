use std::path::PathBuf;
use thiserror::Error;

/// Failures while loading or reading the admission tables.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("data directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("no CSV tables found in {}", .0.display())]
    NoTables(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl DataError {
    /// True for the two fatal "nothing to load" cases.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DataError::DirectoryNotFound(_) | DataError::NoTables(_))
    }
}

#[derive(Debug, Error)]
pub enum RecommendError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error(transparent)]
    Data(#[from] DataError),
}
