//! Error taxonomy shared by every component of the code archive service.

use std::io;
use thiserror::Error;

/// Coarse classification used by the HTTP layer to pick a status code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    PathViolation,
    ExtractionFailure,
    Internal,
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("item `{0}` not found or has no code archive")]
    ItemNotFound(String),
    #[error("code archive `{0}` not found")]
    ArchiveNotFound(String),
    #[error("file `{0}` not found")]
    FileNotFound(String),
    #[error("path `{path}` rejected: {reason}")]
    PathViolation { path: String, reason: &'static str },
    #[error("extracting archive `{archive}` failed: {source}")]
    Extraction {
        archive: String,
        #[source]
        source: Box<ArchiveError>,
    },
    #[error("unsupported archive format")]
    UnsupportedFormat,
    #[error("archive is corrupted: {0}")]
    Corrupted(String),
    #[error("archive expands beyond the {limit} byte limit")]
    SizeLimitExceeded { limit: u64 },
    #[error("file tree exceeds the {limit} {what} limit")]
    TreeLimitExceeded { what: &'static str, limit: usize },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;

impl ArchiveError {
    pub fn violation(path: impl Into<String>, reason: &'static str) -> Self {
        Self::PathViolation {
            path: path.into(),
            reason,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ItemNotFound(_) | Self::ArchiveNotFound(_) | Self::FileNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::PathViolation { .. } => ErrorKind::PathViolation,
            Self::Extraction { .. }
            | Self::UnsupportedFormat
            | Self::Corrupted(_)
            | Self::SizeLimitExceeded { .. }
            | Self::TreeLimitExceeded { .. } => ErrorKind::ExtractionFailure,
            Self::Sqlx(_) | Self::Io(_) | Self::Join(_) => ErrorKind::Internal,
        }
    }
}

impl From<zip::result::ZipError> for ArchiveError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io_err) => Self::Io(io_err),
            other => Self::Corrupted(other.to_string()),
        }
    }
}
