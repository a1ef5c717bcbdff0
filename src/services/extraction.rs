//! src/services/extraction.rs
//!
//! ExtractionManager — makes sure each archive is decompressed into its
//! extraction root exactly once per process, no matter how many requests
//! ask for it at the same time.
//!
//! One [`ExtractionRecord`] exists per archive identifier. It lives behind an
//! async mutex that acts as the exclusivity token: first-time extraction for an
//! identifier happens while holding it, and requests for other identifiers
//! never touch it. Archives are unpacked into a private staging directory and
//! renamed into place, so an extraction root that exists on disk is always
//! complete.

use crate::models::archive::ArchiveRef;
use crate::services::{
    error::{ArchiveError, ArchiveResult},
    unpack,
};
use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};
use tokio::{fs, sync::Mutex as AsyncMutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtractionState {
    Unextracted,
    Extracting,
    Ready,
    Failed,
}

/// Per-archive extraction bookkeeping.
#[derive(Debug)]
pub struct ExtractionRecord {
    pub archive_id: String,
    pub root: PathBuf,
    pub state: ExtractionState,
}

type RecordHandle = Arc<AsyncMutex<ExtractionRecord>>;

#[derive(Clone)]
pub struct ExtractionManager {
    inner: Arc<Inner>,
}

struct Inner {
    extract_dir: PathBuf,
    max_extracted_bytes: u64,
    /// Populated lazily, never evicted.
    records: Mutex<HashMap<String, RecordHandle>>,
    decompressions: AtomicUsize,
}

impl ExtractionManager {
    pub fn new(extract_dir: impl Into<PathBuf>, max_extracted_bytes: u64) -> Self {
        Self {
            inner: Arc::new(Inner {
                extract_dir: extract_dir.into(),
                max_extracted_bytes,
                records: Mutex::new(HashMap::new()),
                decompressions: AtomicUsize::new(0),
            }),
        }
    }

    /// Number of decompression runs started since this manager was created.
    #[cfg(test)]
    pub fn decompressions(&self) -> usize {
        self.inner.decompressions.load(Ordering::SeqCst)
    }

    /// Deterministic extraction root for an archive.
    ///
    /// `<extract_dir>/<id>`, or `<extract_dir>/<id>.extracted` when that name
    /// is the archive itself or any other non-directory (an extensionless
    /// archive stored next to `<id>.zip`).
    pub fn extraction_root(&self, archive: &ArchiveRef) -> PathBuf {
        let root = self.inner.extract_dir.join(&archive.id);
        let occupied = std::fs::symlink_metadata(&root).is_ok_and(|meta| !meta.is_dir());
        if root == archive.path || occupied {
            self.inner.extract_dir.join(format!("{}.extracted", archive.id))
        } else {
            root
        }
    }

    /// Current state of an archive's record, if one has been created.
    #[cfg(test)]
    pub async fn state(&self, archive_id: &str) -> Option<ExtractionState> {
        let record = self.lookup(archive_id)?;
        let guard = record.lock().await;
        Some(guard.state)
    }

    /// Return the extraction root for `archive`, decompressing it first if
    /// this is the first request to need it.
    ///
    /// The decompression runs on a detached task: if the caller goes away the
    /// work still finishes and the token is released only afterwards.
    pub async fn ensure_extracted(&self, archive: &ArchiveRef) -> ArchiveResult<PathBuf> {
        let record = self.record(archive);
        {
            let guard = record.lock().await;
            if guard.state == ExtractionState::Ready && is_dir(&guard.root).await {
                return Ok(guard.root.clone());
            }
        }

        let manager = self.clone();
        let archive = archive.clone();
        tokio::spawn(async move { manager.extract_exclusive(record, archive).await }).await?
    }

    #[cfg(test)]
    fn lookup(&self, archive_id: &str) -> Option<RecordHandle> {
        let records = self
            .inner
            .records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        records.get(archive_id).cloned()
    }

    fn record(&self, archive: &ArchiveRef) -> RecordHandle {
        let mut records = self
            .inner
            .records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        records
            .entry(archive.id.clone())
            .or_insert_with(|| {
                Arc::new(AsyncMutex::new(ExtractionRecord {
                    archive_id: archive.id.clone(),
                    root: self.extraction_root(archive),
                    state: ExtractionState::Unextracted,
                }))
            })
            .clone()
    }

    /// Holds the exclusivity token for the whole check-extract-publish cycle.
    async fn extract_exclusive(
        &self,
        record: RecordHandle,
        archive: ArchiveRef,
    ) -> ArchiveResult<PathBuf> {
        let mut guard = record.lock().await;
        let root = guard.root.clone();

        // Someone else may have finished while we waited, possibly in an
        // earlier process.
        if is_dir(&root).await {
            if guard.state != ExtractionState::Ready {
                debug!(
                    "extraction root for {} already present at {}",
                    guard.archive_id,
                    root.display()
                );
            }
            guard.state = ExtractionState::Ready;
            return Ok(root);
        }

        guard.state = ExtractionState::Extracting;
        match self.extract(&archive, &root).await {
            Ok(()) => {
                guard.state = ExtractionState::Ready;
                Ok(root)
            }
            Err(err) => {
                warn!(
                    "extraction of archive {} ({}) failed: {}",
                    guard.archive_id, archive.file_name, err
                );
                guard.state = ExtractionState::Failed;
                Err(ArchiveError::Extraction {
                    archive: archive.file_name.clone(),
                    source: Box::new(err),
                })
            }
        }
    }

    /// Unpack into a staging directory and rename it onto `root`.
    async fn extract(&self, archive: &ArchiveRef, root: &Path) -> ArchiveResult<()> {
        let staging = self
            .inner
            .extract_dir
            .join(format!(".{}.partial-{}", archive.id, Uuid::new_v4()));
        fs::create_dir_all(&self.inner.extract_dir).await?;

        self.inner.decompressions.fetch_add(1, Ordering::SeqCst);
        info!(
            "extracting archive {} into {}",
            archive.file_name,
            root.display()
        );

        let source = archive.path.clone();
        let target = staging.clone();
        let limit = self.inner.max_extracted_bytes;
        let unpacked =
            tokio::task::spawn_blocking(move || unpack::unpack(&source, &target, limit)).await;

        let report = match unpacked {
            Ok(Ok(report)) => report,
            Ok(Err(err)) => {
                remove_partial(&staging).await;
                return Err(err);
            }
            Err(join_err) => {
                remove_partial(&staging).await;
                return Err(join_err.into());
            }
        };

        if let Err(err) = fs::rename(&staging, root).await {
            remove_partial(&staging).await;
            return Err(err.into());
        }

        info!(
            "archive {} ready: {} files, {} directories, {} bytes, {} skipped",
            archive.file_name, report.files, report.directories, report.bytes, report.skipped
        );
        Ok(())
    }
}

async fn is_dir(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false)
}

/// Best-effort removal of a staging directory.
async fn remove_partial(path: &Path) {
    match fs::remove_dir_all(path).await {
        Ok(()) => debug!("removed partial extraction {}", path.display()),
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => warn!(
            "failed to remove partial extraction {}: {}",
            path.display(),
            err
        ),
    }
}
