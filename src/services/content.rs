//! Sandboxed reads of individual files from an extraction root.

use crate::models::language::Language;
use crate::services::{
    error::{ArchiveError, ArchiveResult},
    sandbox,
};
use bytes::Bytes;
use std::{fs, io::ErrorKind, path::Path};

/// Raw bytes of one extracted file plus its display language.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileContent {
    pub bytes: Bytes,
    pub language: Language,
}

/// Read `relative` from below `root`.
///
/// Path safety is decided by [`sandbox::resolve`] before the filesystem is
/// touched for reading. Anything that is not a regular file is `FileNotFound`.
pub fn read_file(root: &Path, relative: &str) -> ArchiveResult<FileContent> {
    let path = sandbox::resolve(root, relative)?;

    let metadata = match fs::metadata(&path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(ArchiveError::FileNotFound(relative.to_string()));
        }
        Err(err) => return Err(err.into()),
    };
    if !metadata.is_file() {
        return Err(ArchiveError::FileNotFound(relative.to_string()));
    }

    let bytes = fs::read(&path)?;
    Ok(FileContent {
        bytes: Bytes::from(bytes),
        language: Language::from_path(relative),
    })
}
