//! Neo4j connection management and the graph-backed catalogue.

use async_trait::async_trait;
use neo4rs::{query, ConfigBuilder, Graph, Query};

use vigil_core::{FileRecord, NewFile, RecordId, ServerRecord, ServerUpdate};

use crate::catalog::{CatalogStore, StoreError};

/// Configuration for connecting to Neo4j.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub max_connections: u32,
    pub fetch_size: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "vigil-dev".to_string(),
            max_connections: 16,
            fetch_size: 256,
        }
    }
}

/// Catalogue stored as `:BackupFile` and `:Server` nodes in Neo4j.
///
/// Clone is cheap (inner Arc).
#[derive(Clone)]
pub struct GraphStore {
    graph: Graph,
}

impl GraphStore {
    /// Connect to Neo4j and make sure the key constraints exist.
    pub async fn connect(config: &GraphConfig) -> Result<Self, StoreError> {
        let neo_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .max_connections(config.max_connections as usize)
            .fetch_size(config.fetch_size)
            .build()
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let graph = Graph::connect(neo_config)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let store = Self { graph };
        store.ensure_schema().await?;

        tracing::info!(uri = %config.uri, "Connected to Neo4j");
        Ok(store)
    }

    /// Create the uniqueness constraints the upserts rely on.
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.run(query(
            "CREATE CONSTRAINT vigil_server_hostname IF NOT EXISTS
             FOR (s:Server) REQUIRE s.hostname IS UNIQUE",
        ))
        .await?;
        self.run(query(
            "CREATE CONSTRAINT vigil_file_path IF NOT EXISTS
             FOR (f:BackupFile) REQUIRE f.filepath IS UNIQUE",
        ))
        .await
    }

    /// Execute a write-only query (CREATE, MERGE, DELETE, SET).
    pub(crate) async fn run(&self, query: Query) -> Result<(), StoreError> {
        self.graph.run(query).await?;
        Ok(())
    }

    /// Execute a read query and collect all rows.
    pub(crate) async fn query_rows(&self, query: Query) -> Result<Vec<neo4rs::Row>, StoreError> {
        let mut stream = self.graph.execute(query).await?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Execute a read query and return the first row, if any.
    pub(crate) async fn query_one(&self, query: Query) -> Result<Option<neo4rs::Row>, StoreError> {
        let mut stream = self.graph.execute(query).await?;
        Ok(stream.next().await?)
    }
}

#[async_trait]
impl CatalogStore for GraphStore {
    async fn clear_files(&self) -> Result<(), StoreError> {
        self.delete_files().await
    }

    async fn upsert_file(&self, file: &NewFile) -> Result<RecordId, StoreError> {
        self.merge_file(file).await
    }

    async fn list_files(&self) -> Result<Vec<FileRecord>, StoreError> {
        self.fetch_files().await
    }

    async fn clear_servers(&self) -> Result<(), StoreError> {
        self.delete_servers().await
    }

    async fn upsert_server_by_hostname(
        &self,
        hostname: &str,
        update: &ServerUpdate,
    ) -> Result<RecordId, StoreError> {
        self.merge_server(hostname, update).await
    }

    async fn list_servers(&self) -> Result<Vec<ServerRecord>, StoreError> {
        self.fetch_servers().await
    }
}
