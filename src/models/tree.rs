//! Represents one entry of the file tree listed for an extracted archive.

use crate::models::language::Language;
use serde::{Deserialize, Serialize};

/// Whether a tree entry is a file or a directory.
///
/// Directories serialize as `"folder"` to match what browser clients expect.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    #[serde(rename = "file")]
    File,
    #[serde(rename = "folder")]
    Directory,
}

/// A file or directory in an extracted archive.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TreeNode {
    /// Last path segment.
    pub name: String,

    #[serde(rename = "type")]
    pub kind: NodeKind,

    /// Path relative to the extraction root, always `/`-separated.
    pub path: String,

    /// Children ordered by name (directories only).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub children: Option<Vec<TreeNode>>,

    /// Inferred language (files only).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub language: Option<Language>,
}

impl TreeNode {
    pub fn file(name: String, path: String) -> Self {
        let language = Language::from_path(&name);
        Self {
            name,
            kind: NodeKind::File,
            path,
            children: None,
            language: Some(language),
        }
    }

    pub fn directory(name: String, path: String, children: Vec<TreeNode>) -> Self {
        Self {
            name,
            kind: NodeKind::Directory,
            path,
            children: Some(children),
            language: None,
        }
    }
}
