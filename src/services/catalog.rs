//! Read-only access to the product catalog.
//!
//! The catalog is owned by another part of the system; this service only needs
//! to know which uploaded archive (if any) belongs to an item.

use crate::services::error::ArchiveResult;
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;

#[async_trait]
pub trait Catalog: Send + Sync {
    /// Stored archive reference of `item_key`, or `None` when the item does
    /// not exist or has no archive.
    async fn archive_reference(&self, item_key: &str) -> ArchiveResult<Option<String>>;

    /// Cheap connectivity check used by the readiness probe.
    async fn ping(&self) -> ArchiveResult<()>;
}

/// Catalog backed by the `products` table in SQLite.
#[derive(Clone)]
pub struct SqliteCatalog {
    db: Arc<SqlitePool>,
}

impl SqliteCatalog {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn archive_reference(&self, item_key: &str) -> ArchiveResult<Option<String>> {
        let code = sqlx::query_scalar::<_, Option<String>>("SELECT code FROM products WHERE id = ?")
            .bind(item_key)
            .fetch_optional(&*self.db)
            .await?;

        Ok(code.flatten().filter(|reference| !reference.trim().is_empty()))
    }

    async fn ping(&self) -> ArchiveResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
pub use memory::MemoryCatalog;
