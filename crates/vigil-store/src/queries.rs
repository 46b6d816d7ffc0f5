//! Read operations for the graph-backed catalogue.

use chrono::{DateTime, Utc};
use neo4rs::{query, Row};
use uuid::Uuid;

use vigil_core::{FileRecord, RecordId, ServerRecord};

use crate::catalog::StoreError;
use crate::client::GraphStore;

impl GraphStore {
    /// All `:BackupFile` nodes, ordered by filepath.
    pub(crate) async fn fetch_files(&self) -> Result<Vec<FileRecord>, StoreError> {
        let q = query(
            "MATCH (f:BackupFile)
             RETURN f.id AS id, f.filename AS filename, f.filepath AS filepath,
                    f.size AS size, f.last_modified AS last_modified,
                    f.scan_time AS scan_time
             ORDER BY f.filepath",
        );

        self.query_rows(q)
            .await?
            .iter()
            .map(row_to_file)
            .collect()
    }

    /// All `:Server` nodes, ordered by hostname.
    pub(crate) async fn fetch_servers(&self) -> Result<Vec<ServerRecord>, StoreError> {
        let q = query(
            "MATCH (s:Server)
             RETURN s.id AS id, s.hostname AS hostname, s.ip_address AS ip_address,
                    s.detected_os AS detected_os, s.open_ports AS open_ports,
                    s.is_reachable AS is_reachable, s.last_scan AS last_scan,
                    s.scan_time AS scan_time
             ORDER BY s.hostname",
        );

        self.query_rows(q)
            .await?
            .iter()
            .map(row_to_server)
            .collect()
    }
}

// ── Helpers ──────────────────────────────────────────────────────

fn row_to_file(row: &Row) -> Result<FileRecord, StoreError> {
    let size: i64 = field(row, "size")?;
    Ok(FileRecord {
        id: parse_record_id(&field::<String>(row, "id")?)?,
        filename: field(row, "filename")?,
        filepath: field(row, "filepath")?,
        size: u64::try_from(size).map_err(|e| decode_error("size", e))?,
        last_modified: timestamp(row, "last_modified")?,
        scan_time: timestamp(row, "scan_time")?,
    })
}

fn row_to_server(row: &Row) -> Result<ServerRecord, StoreError> {
    let ip: String = field(row, "ip_address")?;
    Ok(ServerRecord {
        id: parse_record_id(&field::<String>(row, "id")?)?,
        hostname: field(row, "hostname")?,
        ip_address: Some(ip).filter(|s| !s.is_empty()),
        detected_os: field(row, "detected_os")?,
        open_ports: field(row, "open_ports")?,
        is_reachable: field(row, "is_reachable")?,
        last_scan: timestamp(row, "last_scan")?,
        scan_time: timestamp(row, "scan_time")?,
    })
}

fn field<T>(row: &Row, key: &str) -> Result<T, StoreError>
where
    T: for<'de> serde::Deserialize<'de>,
{
    row.get(key).map_err(|e| decode_error(key, e))
}

fn timestamp(row: &Row, key: &str) -> Result<DateTime<Utc>, StoreError> {
    let raw: String = field(row, key)?;
    parse_timestamp(key, &raw)
}

pub(crate) fn parse_timestamp(key: &str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| decode_error(key, e))
}

pub(crate) fn parse_record_id(raw: &str) -> Result<RecordId, StoreError> {
    Uuid::parse_str(raw)
        .map(RecordId)
        .map_err(|e| decode_error("id", e))
}

fn decode_error(field: &str, reason: impl std::fmt::Display) -> StoreError {
    StoreError::Decode {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
