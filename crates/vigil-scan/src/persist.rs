//! Catalogue persistence for discovered servers.
//!
//! Two probes can resolve to the same hostname (a server with two
//! addresses). The store's upsert is read-then-write, so writes for one
//! hostname go through a per-hostname mutex while distinct hostnames write
//! in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use vigil_core::{RecordId, ServerUpdate};
use vigil_store::CatalogStore;

use crate::error::Result;

/// Per-hostname write locks.
#[derive(Debug, Default)]
pub struct HostLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl HostLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock guarding writes for `hostname`, created on first use.
    async fn lock_for(&self, hostname: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(hostname.to_string()).or_default().clone()
    }
}

/// Upsert a server while holding its hostname's lock.
pub async fn upsert_server(
    store: &dyn CatalogStore,
    locks: &HostLocks,
    hostname: &str,
    update: &ServerUpdate,
) -> Result<RecordId> {
    let lock = locks.lock_for(hostname).await;
    let _guard = lock.lock().await;

    let id = store.upsert_server_by_hostname(hostname, update).await?;
    tracing::debug!(hostname = %hostname, id = %id, "Server upserted");
    Ok(id)
}
