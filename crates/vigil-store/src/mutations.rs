//! Write operations for the graph-backed catalogue.
//!
//! Files and servers both use MERGE on their identity key so a repeated
//! write updates in place. Timestamps are stored as RFC 3339 strings.

use chrono::Utc;
use neo4rs::query;

use vigil_core::{NewFile, RecordId, ServerUpdate};

use crate::catalog::{validate_hostname, StoreError};
use crate::client::GraphStore;
use crate::queries::parse_record_id;

impl GraphStore {
    /// Delete every `:BackupFile` node.
    pub(crate) async fn delete_files(&self) -> Result<(), StoreError> {
        self.run(query("MATCH (f:BackupFile) DETACH DELETE f")).await
    }

    /// Delete every `:Server` node.
    pub(crate) async fn delete_servers(&self) -> Result<(), StoreError> {
        self.run(query("MATCH (s:Server) DETACH DELETE s")).await
    }

    /// Upsert a `:BackupFile` keyed by filepath.
    pub(crate) async fn merge_file(&self, file: &NewFile) -> Result<RecordId, StoreError> {
        let q = query(
            "MERGE (f:BackupFile {filepath: $filepath})
             ON CREATE SET f.id = $id
             SET f.filename = $filename, f.size = $size,
                 f.last_modified = $last_modified, f.scan_time = $now
             RETURN f.id AS id",
        )
        .param("filepath", file.filepath.clone())
        .param("id", RecordId::new().to_string())
        .param("filename", file.filename.clone())
        .param("size", file.size as i64)
        .param("last_modified", file.last_modified.to_rfc3339())
        .param("now", Utc::now().to_rfc3339());

        self.returned_id(q).await
    }

    /// Upsert a `:Server` keyed by hostname, overwriting every field.
    pub(crate) async fn merge_server(
        &self,
        hostname: &str,
        update: &ServerUpdate,
    ) -> Result<RecordId, StoreError> {
        validate_hostname(hostname)?;

        let q = query(
            "MERGE (s:Server {hostname: $hostname})
             ON CREATE SET s.id = $id
             SET s.ip_address = $ip_address, s.detected_os = $detected_os,
                 s.open_ports = $open_ports, s.last_scan = $last_scan,
                 s.is_reachable = $is_reachable, s.scan_time = $now
             RETURN s.id AS id",
        )
        .param("hostname", hostname.to_string())
        .param("id", RecordId::new().to_string())
        .param("ip_address", update.ip_address.clone().unwrap_or_default())
        .param("detected_os", update.detected_os.clone())
        .param("open_ports", update.open_ports.clone())
        .param("last_scan", update.last_scan.to_rfc3339())
        .param("is_reachable", update.is_reachable)
        .param("now", Utc::now().to_rfc3339());

        self.returned_id(q).await
    }

    async fn returned_id(&self, q: neo4rs::Query) -> Result<RecordId, StoreError> {
        let row = self.query_one(q).await?.ok_or_else(|| StoreError::Decode {
            field: "id".to_string(),
            reason: "MERGE returned no row".to_string(),
        })?;
        let raw: String = row.get("id").map_err(|e| StoreError::Decode {
            field: "id".to_string(),
            reason: e.to_string(),
        })?;
        parse_record_id(&raw)
    }
}
