//! Builds the ordered file tree of an extraction root.

use crate::models::tree::TreeNode;
use crate::services::error::{ArchiveError, ArchiveResult};
use std::{
    fs,
    path::{Path, PathBuf},
    vec::IntoIter,
};
use tracing::debug;

/// Walks an extraction root with an explicit stack, bounded in depth and
/// total node count.
///
/// Siblings are ordered by name, byte-wise ascending, with files and
/// directories interleaved. Symbolic links and special files are neither
/// followed nor listed.
#[derive(Clone, Copy, Debug)]
pub struct TreeBuilder {
    pub max_depth: usize,
    pub max_nodes: usize,
}

/// A directory whose children are still being visited.
struct Frame {
    name: String,
    path: String,
    depth: usize,
    pending: IntoIter<Entry>,
    children: Vec<TreeNode>,
}

struct Entry {
    name: String,
    location: PathBuf,
    is_dir: bool,
}

impl TreeBuilder {
    pub fn new(max_depth: usize, max_nodes: usize) -> Self {
        Self {
            max_depth,
            max_nodes,
        }
    }

    pub fn build(&self, root: &Path) -> ArchiveResult<Vec<TreeNode>> {
        let mut nodes = 0usize;
        let mut stack = vec![Frame {
            name: String::new(),
            path: String::new(),
            depth: 0,
            pending: read_sorted(root)?.into_iter(),
            children: Vec::new(),
        }];

        while let Some(frame) = stack.last_mut() {
            let Some(entry) = frame.pending.next() else {
                let Some(done) = stack.pop() else { break };
                match stack.last_mut() {
                    Some(parent) => parent
                        .children
                        .push(TreeNode::directory(done.name, done.path, done.children)),
                    None => return Ok(done.children),
                }
                continue;
            };

            nodes += 1;
            if nodes > self.max_nodes {
                return Err(ArchiveError::TreeLimitExceeded {
                    what: "node",
                    limit: self.max_nodes,
                });
            }

            let depth = frame.depth + 1;
            if depth > self.max_depth {
                return Err(ArchiveError::TreeLimitExceeded {
                    what: "depth",
                    limit: self.max_depth,
                });
            }

            let path = if frame.path.is_empty() {
                entry.name.clone()
            } else {
                format!("{}/{}", frame.path, entry.name)
            };

            if entry.is_dir {
                let pending = read_sorted(&entry.location)?.into_iter();
                stack.push(Frame {
                    name: entry.name,
                    path,
                    depth,
                    pending,
                    children: Vec::new(),
                });
            } else {
                frame.children.push(TreeNode::file(entry.name, path));
            }
        }

        Ok(Vec::new())
    }
}

/// Regular files and directories of `dir`, sorted by name.
fn read_sorted(dir: &Path) -> ArchiveResult<Vec<Entry>> {
    let mut entries = Vec::new();
    for item in fs::read_dir(dir)? {
        let item = item?;
        let file_type = item.file_type()?;
        if !file_type.is_dir() && !file_type.is_file() {
            continue;
        }
        let name = match item.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                debug!("skipping non UTF-8 name {}", raw.to_string_lossy());
                continue;
            }
        };
        entries.push(Entry {
            name,
            location: item.path(),
            is_dir: file_type.is_dir(),
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{language::Language, tree::NodeKind};

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, relative.as_bytes()).unwrap();
    }

    fn names(nodes: &[TreeNode]) -> Vec<&str> {
        nodes.iter().map(|node| node.name.as_str()).collect()
    }

    #[test]
    fn orders_siblings_by_name_interleaving_kinds() {
        let root = tempfile::tempdir().unwrap();
        touch(root.path(), "src/index.js");
        touch(root.path(), "src/components/Header.js");

        let tree = TreeBuilder::new(8, 100).build(root.path()).unwrap();

        assert_eq!(names(&tree), ["src"]);
        let src = &tree[0];
        assert_eq!(src.kind, NodeKind::Directory);
        assert_eq!(src.path, "src");

        let children = src.children.as_ref().unwrap();
        assert_eq!(names(children), ["components", "index.js"]);
        assert_eq!(children[0].kind, NodeKind::Directory);
        assert_eq!(children[1].path, "src/index.js");
        assert_eq!(children[1].language, Some(Language::JavaScript));

        let header = &children[0].children.as_ref().unwrap()[0];
        assert_eq!(header.path, "src/components/Header.js");
    }

    #[test]
    fn ordering_is_case_sensitive() {
        let root = tempfile::tempdir().unwrap();
        for name in ["b.md", "README.md", "a.css", "Zeta"] {
            touch(root.path(), name);
        }

        let tree = TreeBuilder::new(8, 100).build(root.path()).unwrap();
        assert_eq!(names(&tree), ["README.md", "Zeta", "a.css", "b.md"]);
        assert_eq!(tree[1].language, Some(Language::Text));
    }

    #[test]
    fn repeated_builds_are_identical() {
        let root = tempfile::tempdir().unwrap();
        for name in ["x/y/z.ts", "x/a.json", "b.html", "c/d.css"] {
            touch(root.path(), name);
        }

        let builder = TreeBuilder::new(8, 100);
        let first = serde_json::to_vec(&builder.build(root.path()).unwrap()).unwrap();
        let second = serde_json::to_vec(&builder.build(root.path()).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_directories_are_listed() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("assets")).unwrap();

        let tree = TreeBuilder::new(8, 100).build(root.path()).unwrap();
        assert_eq!(tree[0].children, Some(Vec::new()));
    }

    #[test]
    fn depth_limit_aborts_build() {
        let root = tempfile::tempdir().unwrap();
        touch(root.path(), "a/b/c/d/e.txt");

        let err = TreeBuilder::new(4, 100).build(root.path()).unwrap_err();
        assert!(matches!(
            err,
            ArchiveError::TreeLimitExceeded { what: "depth", limit: 4 }
        ));
        assert!(TreeBuilder::new(5, 100).build(root.path()).is_ok());
    }

    #[test]
    fn node_limit_aborts_build() {
        let root = tempfile::tempdir().unwrap();
        for index in 0..10 {
            touch(root.path(), &format!("file-{index}.txt"));
        }

        let err = TreeBuilder::new(8, 9).build(root.path()).unwrap_err();
        assert!(matches!(
            err,
            ArchiveError::TreeLimitExceeded { what: "node", limit: 9 }
        ));
        assert_eq!(TreeBuilder::new(8, 10).build(root.path()).unwrap().len(), 10);
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_not_listed_or_followed() {
        let outside = tempfile::tempdir().unwrap();
        touch(outside.path(), "secret.txt");
        let root = tempfile::tempdir().unwrap();
        touch(root.path(), "keep.txt");
        std::os::unix::fs::symlink(outside.path(), root.path().join("link")).unwrap();

        let tree = TreeBuilder::new(8, 100).build(root.path()).unwrap();
        assert_eq!(names(&tree), ["keep.txt"]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn non_utf8_names_are_skipped() {
        use std::{ffi::OsStr, os::unix::ffi::OsStrExt};

        let root = tempfile::tempdir().unwrap();
        touch(root.path(), "keep.txt");
        fs::write(root.path().join(OsStr::from_bytes(b"bad\xff")), b"one").unwrap();
        fs::write(root.path().join(OsStr::from_bytes(b"bad\xfe")), b"two").unwrap();

        let tree = TreeBuilder::new(8, 100).build(root.path()).unwrap();
        assert_eq!(names(&tree), ["keep.txt"]);
    }
}
