//! Process-local catalogue backend.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use vigil_core::{FileRecord, NewFile, RecordId, ServerRecord, ServerUpdate};

use crate::catalog::{validate_hostname, CatalogStore, StoreError};

/// Records kept in insertion order with a key index alongside.
#[derive(Debug)]
struct Table<T> {
    rows: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T> Table<T> {
    fn clear(&mut self) {
        self.rows.clear();
        self.index.clear();
    }
}

/// In-memory [`CatalogStore`]. Listing returns records in insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: RwLock<Table<FileRecord>>,
    servers: RwLock<Table<ServerRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn clear_files(&self) -> Result<(), StoreError> {
        self.files.write().await.clear();
        Ok(())
    }

    async fn upsert_file(&self, file: &NewFile) -> Result<RecordId, StoreError> {
        let mut table = self.files.write().await;
        let now = Utc::now();

        if let Some(&pos) = table.index.get(&file.filepath) {
            let row = &mut table.rows[pos];
            row.filename = file.filename.clone();
            row.size = file.size;
            row.last_modified = file.last_modified;
            row.scan_time = now;
            return Ok(row.id);
        }

        let id = RecordId::new();
        table.rows.push(FileRecord {
            id,
            filename: file.filename.clone(),
            filepath: file.filepath.clone(),
            size: file.size,
            last_modified: file.last_modified,
            scan_time: now,
        });
        let pos = table.rows.len() - 1;
        table.index.insert(file.filepath.clone(), pos);
        Ok(id)
    }

    async fn list_files(&self) -> Result<Vec<FileRecord>, StoreError> {
        Ok(self.files.read().await.rows.clone())
    }

    async fn clear_servers(&self) -> Result<(), StoreError> {
        self.servers.write().await.clear();
        Ok(())
    }

    async fn upsert_server_by_hostname(
        &self,
        hostname: &str,
        update: &ServerUpdate,
    ) -> Result<RecordId, StoreError> {
        validate_hostname(hostname)?;
        let mut table = self.servers.write().await;
        let now = Utc::now();

        if let Some(&pos) = table.index.get(hostname) {
            let row = &mut table.rows[pos];
            row.ip_address = update.ip_address.clone();
            row.detected_os = update.detected_os.clone();
            row.open_ports = update.open_ports.clone();
            row.last_scan = update.last_scan;
            row.is_reachable = update.is_reachable;
            row.scan_time = now;
            return Ok(row.id);
        }

        let id = RecordId::new();
        table.rows.push(ServerRecord {
            id,
            hostname: hostname.to_string(),
            ip_address: update.ip_address.clone(),
            detected_os: update.detected_os.clone(),
            open_ports: update.open_ports.clone(),
            is_reachable: update.is_reachable,
            last_scan: update.last_scan,
            scan_time: now,
        });
        let pos = table.rows.len() - 1;
        table.index.insert(hostname.to_string(), pos);
        Ok(id)
    }

    async fn list_servers(&self) -> Result<Vec<ServerRecord>, StoreError> {
        Ok(self.servers.read().await.rows.clone())
    }
}
