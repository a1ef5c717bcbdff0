//! src/services/sandbox.rs
//!
//! Containment checks for client-supplied and archive-supplied paths.
//!
//! Every path that reaches the filesystem below an extraction root goes
//! through [`resolve`]: the relative path is normalized lexically first,
//! then the joined result is compared against the canonical root after the
//! filesystem has resolved any symbolic links.

use crate::services::error::{ArchiveError, ArchiveResult};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

/// Lexically normalize a relative path.
///
/// Both `/` and `\` separate segments. `.` segments are dropped and `..`
/// pops the previous segment; a `..` with nothing left to pop, an absolute
/// input, a drive prefix, or a NUL byte is a violation. The result may be
/// empty (for example `"./"`).
pub fn normalize(relative: &str) -> ArchiveResult<PathBuf> {
    if relative.contains('\0') {
        return Err(ArchiveError::violation(relative, "contains a NUL byte"));
    }
    if relative.starts_with(['/', '\\']) {
        return Err(ArchiveError::violation(relative, "absolute paths are not allowed"));
    }

    let mut segments: Vec<&str> = Vec::new();
    for (index, segment) in relative.split(['/', '\\']).enumerate() {
        if index == 0 && is_drive_prefix(segment) {
            return Err(ArchiveError::violation(relative, "drive prefixes are not allowed"));
        }
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(ArchiveError::violation(relative, "climbs above the root"));
                }
            }
            normal => segments.push(normal),
        }
    }

    Ok(segments.iter().collect())
}

/// Resolve `relative` beneath `root`, guaranteeing the result stays inside.
///
/// Returns the canonical location of the target when it exists, or the
/// canonical location of its nearest existing ancestor joined with the
/// remaining segments when it does not. Symbolic links are followed by the
/// canonicalization, so a link pointing outside the root is rejected, and a
/// dangling link is rejected outright.
pub fn resolve(root: &Path, relative: &str) -> ArchiveResult<PathBuf> {
    let normalized = normalize(relative)?;
    if normalized.as_os_str().is_empty() {
        return Err(ArchiveError::violation(relative, "empty path"));
    }

    let canonical_root = root.canonicalize()?;
    let candidate = canonical_root.join(&normalized);
    let resolved = canonicalize_existing(&candidate, relative)?;

    if resolved == canonical_root || !resolved.starts_with(&canonical_root) {
        return Err(ArchiveError::violation(relative, "escapes the extraction root"));
    }
    Ok(resolved)
}

/// Canonicalize the longest existing prefix of `path` and re-append the rest.
fn canonicalize_existing(path: &Path, original: &str) -> ArchiveResult<PathBuf> {
    let mut missing = Vec::new();
    let mut current = path.to_path_buf();

    loop {
        match current.canonicalize() {
            Ok(canonical) => {
                let mut resolved = canonical;
                resolved.extend(missing.iter().rev());
                return Ok(resolved);
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                if current.symlink_metadata().is_ok() {
                    return Err(ArchiveError::violation(original, "dangling symbolic link"));
                }
                let Some(name) = current.file_name().map(|n| n.to_os_string()) else {
                    return Err(ArchiveError::Io(err));
                };
                missing.push(name);
                if !current.pop() {
                    return Err(ArchiveError::Io(err));
                }
            }
            Err(err) => return Err(ArchiveError::Io(err)),
        }
    }
}

/// `C:`-style first segment.
fn is_drive_prefix(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
