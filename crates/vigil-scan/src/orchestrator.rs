//! Scan orchestration.
//!
//! Exposes the two independently triggerable scans (directory crawl and
//! server discovery) plus the read side that joins both catalogues into
//! freshness statuses. The two scans share nothing but the store.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use uuid::Uuid;
use vigil_core::{classify_all, FileRecord, ServerStatus, Subnet};
use vigil_store::CatalogStore;

use crate::config::ScanConfig;
use crate::crawler::DirectoryCrawler;
use crate::discover::SubnetDiscoverer;
use crate::error::{Result, ScanError};
use crate::probe::NetworkProbe;

/// Capability to issue raw network probes.
///
/// OS fingerprinting needs raw sockets. The caller decides whether the
/// process holds that privilege; the orchestrator never inspects process
/// identity itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbePrivilege(bool);

impl ProbePrivilege {
    pub fn granted() -> Self {
        Self(true)
    }

    pub fn denied() -> Self {
        Self(false)
    }

    pub fn is_granted(&self) -> bool {
        self.0
    }

    /// Fail with [`ScanError::PrivilegeRequired`] unless granted.
    pub fn require(&self) -> Result<()> {
        if self.0 {
            Ok(())
        } else {
            Err(ScanError::PrivilegeRequired)
        }
    }
}

/// A scan that finished without error, possibly having found nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome<T> {
    Completed(T),
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryScanSummary {
    pub per_root_file_counts: Vec<(PathBuf, usize)>,
    pub total_files: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerScanSummary {
    pub per_subnet_counts: Vec<(Subnet, usize)>,
    pub server_count: usize,
}

pub struct ScanOrchestrator {
    config: ScanConfig,
    store: Arc<dyn CatalogStore>,
    probe: Arc<dyn NetworkProbe>,
    privilege: ProbePrivilege,
}

impl ScanOrchestrator {
    pub fn new(
        config: ScanConfig,
        store: Arc<dyn CatalogStore>,
        probe: Arc<dyn NetworkProbe>,
        privilege: ProbePrivilege,
    ) -> Self {
        Self {
            config,
            store,
            probe,
            privilege,
        }
    }

    /// Rebuild the file catalogue from the configured roots.
    pub async fn run_directory_scan(&self) -> Result<ScanOutcome<DirectoryScanSummary>> {
        let scan_id = Uuid::new_v4();
        let start = Instant::now();
        let roots = self.config.targets().directories;

        tracing::info!(scan_id = %scan_id, roots = roots.len(), "Directory scan started");

        let report = DirectoryCrawler::new(Arc::clone(&self.store))
            .crawl(&roots)
            .await?;

        let summary = DirectoryScanSummary {
            per_root_file_counts: report
                .roots
                .iter()
                .map(|r| (r.root.clone(), r.files.len()))
                .collect(),
            total_files: report.total_files(),
        };

        tracing::info!(
            scan_id = %scan_id,
            files = summary.total_files,
            duration_ms = start.elapsed().as_millis(),
            "Directory scan complete"
        );

        if summary.total_files == 0 {
            return Ok(ScanOutcome::Empty);
        }
        Ok(ScanOutcome::Completed(summary))
    }

    /// Discover servers on the configured subnets and upsert them.
    ///
    /// Fails with [`ScanError::PrivilegeRequired`] before any probe is sent
    /// when the orchestrator was built without probe privilege.
    pub async fn run_server_scan(&self) -> Result<ScanOutcome<ServerScanSummary>> {
        if let Err(e) = self.privilege.require() {
            tracing::error!("Server scan requires elevated privilege");
            return Err(e);
        }

        let scan_id = Uuid::new_v4();
        let start = Instant::now();
        let subnets = self.config.targets().subnets;

        tracing::info!(scan_id = %scan_id, subnets = subnets.len(), "Server scan started");

        let report = SubnetDiscoverer::new(Arc::clone(&self.probe), Arc::clone(&self.store))
            .discover(&subnets)
            .await?;

        let summary = ServerScanSummary {
            per_subnet_counts: report
                .subnets
                .iter()
                .map(|s| (s.subnet.clone(), s.servers.len()))
                .collect(),
            server_count: report.server_count(),
        };

        tracing::info!(
            scan_id = %scan_id,
            servers = summary.server_count,
            duration_ms = start.elapsed().as_millis(),
            "Server scan complete"
        );

        if summary.server_count == 0 {
            return Ok(ScanOutcome::Empty);
        }
        Ok(ScanOutcome::Completed(summary))
    }

    /// Backup status of every known server as of `now`.
    pub async fn freshness_report(&self, now: DateTime<Utc>) -> Result<Vec<ServerStatus>> {
        let servers = self.store.list_servers().await?;
        let files = self.store.list_files().await?;
        Ok(classify_all(&servers, &files, now))
    }

    pub async fn list_files(&self) -> Result<Vec<FileRecord>> {
        Ok(self.store.list_files().await?)
    }

    /// Forget every discovered server.
    pub async fn clear_servers(&self) -> Result<()> {
        self.store.clear_servers().await?;
        tracing::info!("Server catalogue cleared");
        Ok(())
    }
}
