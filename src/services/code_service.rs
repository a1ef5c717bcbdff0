//! src/services/code_service.rs
//!
//! CodeService — the per-request entry point for browsing uploaded code
//! archives. It locates an item's archive, makes sure it is extracted, and
//! then lists the tree or reads a single file from the extraction root.
//! Downloads hand back the stored archive untouched.

use crate::{
    config::AppConfig,
    models::{archive::ArchiveRef, tree::TreeNode},
    services::{
        catalog::Catalog,
        content::{self, FileContent},
        error::{ArchiveError, ArchiveResult},
        extraction::ExtractionManager,
        locator::ArchiveLocator,
        tree::TreeBuilder,
    },
};
use std::{
    fs::Metadata,
    io,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::fs::File;
use tracing::debug;

/// Shared state handed to every HTTP handler.
#[derive(Clone)]
pub struct CodeService {
    /// Directory where uploaded archives are stored.
    pub storage_dir: PathBuf,

    locator: ArchiveLocator,
    extractions: ExtractionManager,
    tree: TreeBuilder,
}

impl CodeService {
    pub fn new(catalog: Arc<dyn Catalog>, cfg: &AppConfig) -> Self {
        Self {
            storage_dir: cfg.storage_dir.clone(),
            locator: ArchiveLocator::new(catalog, &cfg.storage_dir),
            extractions: ExtractionManager::new(&cfg.extract_dir, cfg.max_extracted_bytes),
            tree: TreeBuilder::new(cfg.max_tree_depth, cfg.max_tree_nodes),
        }
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        self.locator.catalog()
    }

    #[cfg(test)]
    pub fn extractions(&self) -> &ExtractionManager {
        &self.extractions
    }

    /// Ordered file tree of the archive attached to `item_key`.
    pub async fn get_structure(&self, item_key: &str) -> ArchiveResult<Vec<TreeNode>> {
        let archive = self.locator.locate(item_key).await?;
        let root = self.extractions.ensure_extracted(&archive).await?;

        let builder = self.tree;
        let tree = tokio::task::spawn_blocking(move || builder.build(&root)).await?;
        tree.map_err(|err| extraction_failure(&archive, err))
    }

    /// Bytes and language of one file inside the archive of `item_key`.
    pub async fn get_file_content(
        &self,
        item_key: &str,
        file_path: &str,
    ) -> ArchiveResult<FileContent> {
        let archive = self.locator.locate(item_key).await?;
        let root = self.extractions.ensure_extracted(&archive).await?;

        debug!("reading {} from archive {}", file_path, archive.file_name);
        let relative = file_path.to_string();
        tokio::task::spawn_blocking(move || content::read_file(&root, &relative)).await?
    }

    /// Open the stored archive named `archive_key` for streaming.
    pub async fn open_archive(
        &self,
        archive_key: &str,
    ) -> ArchiveResult<(ArchiveRef, File, Metadata)> {
        let archive = self.locator.locate_by_archive_key(archive_key).await?;
        let file = File::open(&archive.path)
            .await
            .map_err(|err| not_found_or_io(err, &archive.path, archive_key))?;
        let metadata = file.metadata().await?;
        Ok((archive, file, metadata))
    }
}

/// Tree-walk failures are reported like extraction failures.
fn extraction_failure(archive: &ArchiveRef, err: ArchiveError) -> ArchiveError {
    match err {
        ArchiveError::TreeLimitExceeded { .. } => ArchiveError::Extraction {
            archive: archive.file_name.clone(),
            source: Box::new(err),
        },
        other => other,
    }
}

fn not_found_or_io(err: io::Error, path: &Path, key: &str) -> ArchiveError {
    if err.kind() == io::ErrorKind::NotFound {
        debug!("archive {} vanished before it was opened", path.display());
        ArchiveError::ArchiveNotFound(key.to_string())
    } else {
        ArchiveError::Io(err)
    }
}
