//! The catalogue persistence contract shared by all backends.

use async_trait::async_trait;

use vigil_core::{FileRecord, NewFile, RecordId, ServerRecord, ServerUpdate};

/// Errors from catalogue operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Neo4j connection error: {0}")]
    Connection(String),

    #[error("Neo4j query error: {0}")]
    Query(#[from] neo4rs::Error),

    #[error("Failed to decode {field}: {reason}")]
    Decode { field: String, reason: String },

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

/// Durable keyed store for file and server records.
///
/// The file catalogue is full-replace: a directory scan calls
/// [`clear_files`](CatalogStore::clear_files) and then writes every file it
/// finds. The server catalogue accumulates: servers are upserted by hostname
/// and only disappear through [`clear_servers`](CatalogStore::clear_servers).
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Remove every file record.
    async fn clear_files(&self) -> Result<(), StoreError>;

    /// Write a crawled file. A second write for the same filepath replaces
    /// the first and keeps its id.
    async fn upsert_file(&self, file: &NewFile) -> Result<RecordId, StoreError>;

    /// All file records of the current crawl generation.
    async fn list_files(&self) -> Result<Vec<FileRecord>, StoreError>;

    /// Remove every server record.
    async fn clear_servers(&self) -> Result<(), StoreError>;

    /// Insert a server if the hostname is unknown, otherwise overwrite all
    /// fields and refresh `scan_time`. The record id is stable across updates.
    ///
    /// This is a read-check-then-write sequence; callers issuing concurrent
    /// upserts for one hostname must serialize them.
    async fn upsert_server_by_hostname(
        &self,
        hostname: &str,
        update: &ServerUpdate,
    ) -> Result<RecordId, StoreError>;

    /// All known servers.
    async fn list_servers(&self) -> Result<Vec<ServerRecord>, StoreError>;
}

/// Reject hostnames that cannot serve as a catalogue key.
pub(crate) fn validate_hostname(hostname: &str) -> Result<(), StoreError> {
    if hostname.trim().is_empty() {
        return Err(StoreError::InvalidRecord(
            "server hostname must not be empty".to_string(),
        ));
    }
    Ok(())
}
