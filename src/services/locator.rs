//! Maps catalog items and archive keys to stored archives.

use crate::models::archive::ArchiveRef;
use crate::services::{
    catalog::Catalog,
    error::{ArchiveError, ArchiveResult},
};
use std::{path::PathBuf, sync::Arc};
use tokio::fs;

#[derive(Clone)]
pub struct ArchiveLocator {
    catalog: Arc<dyn Catalog>,
    storage_dir: PathBuf,
}

impl ArchiveLocator {
    pub fn new(catalog: Arc<dyn Catalog>, storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            catalog,
            storage_dir: storage_dir.into(),
        }
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    /// Archive of catalog item `item_key`.
    ///
    /// `ItemNotFound` when the item is unknown or has no archive reference,
    /// `ArchiveNotFound` when the referenced file is not in storage.
    pub async fn locate(&self, item_key: &str) -> ArchiveResult<ArchiveRef> {
        let reference = self
            .catalog
            .archive_reference(item_key)
            .await?
            .ok_or_else(|| ArchiveError::ItemNotFound(item_key.to_string()))?;
        let archive = ArchiveRef::from_reference(&self.storage_dir, &reference)
            .ok_or_else(|| ArchiveError::ItemNotFound(item_key.to_string()))?;

        self.ensure_stored(archive).await
    }

    /// Archive named directly by a client-supplied key (the stored file name).
    pub async fn locate_by_archive_key(&self, archive_key: &str) -> ArchiveResult<ArchiveRef> {
        let archive = ArchiveRef::from_reference(&self.storage_dir, archive_key)
            .ok_or_else(|| ArchiveError::ArchiveNotFound(archive_key.to_string()))?;

        self.ensure_stored(archive).await
    }

    async fn ensure_stored(&self, archive: ArchiveRef) -> ArchiveResult<ArchiveRef> {
        match fs::metadata(&archive.path).await {
            Ok(meta) if meta.is_file() => Ok(archive),
            Ok(_) => Err(ArchiveError::ArchiveNotFound(archive.file_name)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(ArchiveError::ArchiveNotFound(archive.file_name))
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::catalog::MemoryCatalog;

    fn locator(storage: &std::path::Path) -> ArchiveLocator {
        let catalog = MemoryCatalog::default()
            .with_item("with-code", Some("/uploads/shop.zip"))
            .with_item("missing-file", Some("gone.zip"))
            .with_item("no-code", None)
            .with_item("dir-ref", Some("uploads/"));
        ArchiveLocator::new(Arc::new(catalog), storage)
    }

    #[tokio::test]
    async fn locates_archive_by_item() {
        let storage = tempfile::tempdir().unwrap();
        std::fs::write(storage.path().join("shop.zip"), b"PK").unwrap();

        let archive = locator(storage.path()).locate("with-code").await.unwrap();
        assert_eq!(archive.id, "shop");
        assert_eq!(archive.path, storage.path().join("shop.zip"));
    }

    #[tokio::test]
    async fn reports_not_found_cases() {
        let storage = tempfile::tempdir().unwrap();
        let locator = locator(storage.path());

        assert!(matches!(
            locator.locate("unknown").await,
            Err(ArchiveError::ItemNotFound(_))
        ));
        assert!(matches!(
            locator.locate("no-code").await,
            Err(ArchiveError::ItemNotFound(_))
        ));
        assert!(matches!(
            locator.locate("dir-ref").await,
            Err(ArchiveError::ItemNotFound(_))
        ));
        assert!(matches!(
            locator.locate("missing-file").await,
            Err(ArchiveError::ArchiveNotFound(_))
        ));
    }

    #[tokio::test]
    async fn archive_key_is_reduced_to_final_segment() {
        let storage = tempfile::tempdir().unwrap();
        std::fs::write(storage.path().join("shop.zip"), b"PK").unwrap();
        let locator = locator(storage.path());

        let archive = locator
            .locate_by_archive_key("../../shop.zip")
            .await
            .unwrap();
        assert_eq!(archive.path, storage.path().join("shop.zip"));

        std::fs::create_dir(storage.path().join("shop")).unwrap();
        assert!(matches!(
            locator.locate_by_archive_key("shop").await,
            Err(ArchiveError::ArchiveNotFound(_))
        ));
    }
}
