//! Backup directory crawler.
//!
//! Rebuilds the file catalogue from scratch on every run. Each root is
//! walked on a blocking thread and every regular file is streamed to the
//! async side, which writes it to the store before taking the next one.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use vigil_core::{NewFile, RecordId};
use vigil_store::CatalogStore;
use walkdir::{DirEntry, WalkDir};

use crate::error::{Result, ScanError};

/// Files buffered between the walker thread and the store writer.
const WALK_BUFFER: usize = 256;

/// A file written to the catalogue by this crawl.
#[derive(Debug, Clone)]
pub struct CrawledFile {
    pub id: RecordId,
    pub file: NewFile,
}

/// Outcome of crawling one root.
#[derive(Debug, Clone)]
pub struct RootReport {
    /// Absolute form of the configured root.
    pub root: PathBuf,
    pub files: Vec<CrawledFile>,
    /// Entries that could not be read and were left out.
    pub skipped: usize,
}

impl RootReport {
    fn empty(root: PathBuf) -> Self {
        Self {
            root,
            files: Vec::new(),
            skipped: 0,
        }
    }
}

/// Outcome of a full crawl, one report per root in input order.
#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    pub roots: Vec<RootReport>,
}

impl CrawlReport {
    pub fn total_files(&self) -> usize {
        self.roots.iter().map(|r| r.files.len()).sum()
    }
}

pub struct DirectoryCrawler {
    store: Arc<dyn CatalogStore>,
}

impl DirectoryCrawler {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    /// Clear the file catalogue and re-crawl every root.
    ///
    /// Unreadable entries are skipped. A store failure aborts the crawl, and
    /// the catalogue then holds only what was written before it.
    pub async fn crawl(&self, roots: &[PathBuf]) -> Result<CrawlReport> {
        self.store.clear_files().await?;

        let mut report = CrawlReport::default();
        for root in roots {
            report.roots.push(self.crawl_root(root).await?);
        }
        Ok(report)
    }

    async fn crawl_root(&self, root: &Path) -> Result<RootReport> {
        let start = Instant::now();
        let root = absolute(root)?;

        match tokio::fs::metadata(&root).await {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => {
                tracing::warn!(root = %root.display(), "Backup root is not a directory, skipping");
                return Ok(RootReport::empty(root));
            }
            Err(e) => {
                tracing::warn!(root = %root.display(), error = %e, "Backup root unreadable, skipping");
                return Ok(RootReport::empty(root));
            }
        }

        tracing::info!(root = %root.display(), "Crawling backup root");

        let (tx, mut rx) = mpsc::channel(WALK_BUFFER);
        let walk_root = root.clone();
        let walker = tokio::task::spawn_blocking(move || walk(&walk_root, &tx));

        let mut files = Vec::new();
        while let Some(file) = rx.recv().await {
            let id = self.store.upsert_file(&file).await?;
            files.push(CrawledFile { id, file });
        }

        let skipped = walker.await.map_err(|e| ScanError::Join(e.to_string()))?;

        tracing::info!(
            root = %root.display(),
            files = files.len(),
            skipped,
            duration_ms = start.elapsed().as_millis(),
            "Backup root crawled"
        );

        Ok(RootReport {
            root,
            files,
            skipped,
        })
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Walk `root` depth-first and send every regular file. Returns the number
/// of entries skipped. Stops early if the receiver is gone.
fn walk(root: &Path, tx: &mpsc::Sender<NewFile>) -> usize {
    let mut skipped = 0;

    for entry in WalkDir::new(root).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(root = %root.display(), error = %e, "Skipping unreadable entry");
                skipped += 1;
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        match new_file(&entry) {
            Ok(file) => {
                if tx.blocking_send(file).is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(path = %entry.path().display(), error = %e, "Skipping unreadable file");
                skipped += 1;
            }
        }
    }

    skipped
}

fn new_file(entry: &DirEntry) -> std::io::Result<NewFile> {
    let metadata = entry.metadata().map_err(std::io::Error::from)?;
    let modified: DateTime<Utc> = metadata.modified()?.into();

    Ok(NewFile {
        filename: entry.file_name().to_string_lossy().into_owned(),
        filepath: entry.path().to_string_lossy().into_owned(),
        size: metadata.len(),
        last_modified: modified,
    })
}

#[cfg(test)]
pub(crate) mod testing {
    //! Store backend whose file writes always fail.

    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use vigil_core::{FileRecord, NewFile, RecordId, ServerRecord, ServerUpdate};
    use vigil_store::{CatalogStore, MemoryStore, StoreError};

    /// Accepts clears and server writes but rejects every file write,
    /// counting how many were attempted.
    #[derive(Default)]
    pub struct RejectingStore {
        inner: MemoryStore,
        file_writes: AtomicUsize,
    }

    impl RejectingStore {
        pub fn attempts(&self) -> usize {
            self.file_writes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CatalogStore for RejectingStore {
        async fn clear_files(&self) -> Result<(), StoreError> {
            self.inner.clear_files().await
        }

        async fn upsert_file(&self, _file: &NewFile) -> Result<RecordId, StoreError> {
            self.file_writes.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Connection("connection reset by peer".to_string()))
        }

        async fn list_files(&self) -> Result<Vec<FileRecord>, StoreError> {
            self.inner.list_files().await
        }

        async fn clear_servers(&self) -> Result<(), StoreError> {
            self.inner.clear_servers().await
        }

        async fn upsert_server_by_hostname(
            &self,
            hostname: &str,
            update: &ServerUpdate,
        ) -> Result<RecordId, StoreError> {
            self.inner.upsert_server_by_hostname(hostname, update).await
        }

        async fn list_servers(&self) -> Result<Vec<ServerRecord>, StoreError> {
            self.inner.list_servers().await
        }
    }
}
