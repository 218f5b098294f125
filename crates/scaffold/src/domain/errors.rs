//! Domain-specific errors.

use std::path::PathBuf;

use thiserror::Error;

/// Hard failures raised by the source-mutation engine and the file writer.
///
/// Structural variants abort the individual call before any mutation happens. Write conflicts are
/// not represented here: they are recorded as [`Conflict`](crate::domain::model::Conflict) data.
#[derive(Debug, Error)]
pub enum ScaffoldError {
    #[error("marker '{marker}' not found")]
    MarkerNotFound { marker: String },
    #[error("marker '{end}' must appear after '{start}'")]
    MarkerOrderInvalid { start: String, end: String },
    #[error("no import block found")]
    NoImportBlockFound,
    #[error("filesystem error at {}: {source}", path.display())]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("document is not bound to a file path")]
    NoDocumentPath,
}

impl ScaffoldError {
    pub(crate) fn marker_not_found(marker: impl Into<String>) -> Self {
        Self::MarkerNotFound {
            marker: marker.into(),
        }
    }

    pub(crate) fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileSystem {
            path: path.into(),
            source,
        }
    }
}

pub type ScaffoldResult<T> = Result<T, ScaffoldError>;
