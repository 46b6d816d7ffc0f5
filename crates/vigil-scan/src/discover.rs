//! Two-phase subnet discovery.
//!
//! Subnets are processed one after another. For each, a liveness sweep
//! finds responsive addresses, then every live address gets its own deep
//! probe task. All probes of a subnet settle before the next subnet starts;
//! a probe that hangs holds up its subnet until nmap's own host timeout
//! fires.

use std::net::IpAddr;
use std::sync::Arc;

use chrono::Utc;
use vigil_core::{RecordId, ServerUpdate, Subnet, UNKNOWN_OS};
use vigil_store::{CatalogStore, StoreError};

use crate::error::{Result, ScanError};
use crate::persist::{self, HostLocks};
use crate::probe::{NetworkProbe, OpenPort};

/// A server written to the catalogue by a successful probe.
#[derive(Debug, Clone)]
pub struct DiscoveredServer {
    pub id: RecordId,
    pub hostname: String,
    pub update: ServerUpdate,
}

/// Outcome of discovery for one subnet.
#[derive(Debug, Clone)]
pub struct SubnetReport {
    pub subnet: Subnet,
    /// Addresses the liveness sweep reported.
    pub live_hosts: usize,
    /// Probes that errored or panicked.
    pub failed_probes: usize,
    pub servers: Vec<DiscoveredServer>,
}

/// Outcome of discovery across all subnets, in input order.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    pub subnets: Vec<SubnetReport>,
}

impl DiscoveryReport {
    pub fn server_count(&self) -> usize {
        self.subnets.iter().map(|s| s.servers.len()).sum()
    }
}

/// Drives sweeps and deep probes and writes results through the store.
pub struct SubnetDiscoverer {
    probe: Arc<dyn NetworkProbe>,
    store: Arc<dyn CatalogStore>,
    locks: Arc<HostLocks>,
}

impl SubnetDiscoverer {
    pub fn new(probe: Arc<dyn NetworkProbe>, store: Arc<dyn CatalogStore>) -> Self {
        Self {
            probe,
            store,
            locks: Arc::new(HostLocks::new()),
        }
    }

    /// Discover every subnet in order.
    ///
    /// Sweep and probe failures are logged and excluded. A store write
    /// failure fails the run once the affected subnet has settled.
    pub async fn discover(&self, subnets: &[Subnet]) -> Result<DiscoveryReport> {
        let mut report = DiscoveryReport::default();
        for subnet in subnets {
            report.subnets.push(self.discover_subnet(subnet).await?);
        }
        Ok(report)
    }

    async fn discover_subnet(&self, subnet: &Subnet) -> Result<SubnetReport> {
        tracing::info!(cidr = %subnet, "Sweeping subnet");

        let live = match self.probe.sweep(subnet).await {
            Ok(hosts) => hosts,
            Err(e) => {
                tracing::warn!(cidr = %subnet, error = %e, "Liveness sweep failed, skipping subnet");
                Vec::new()
            }
        };

        tracing::info!(cidr = %subnet, live_hosts = live.len(), "Liveness sweep complete");

        let mut handles = Vec::with_capacity(live.len());
        for ip in live.iter().copied() {
            let probe = Arc::clone(&self.probe);
            let store = Arc::clone(&self.store);
            let locks = Arc::clone(&self.locks);
            let handle = tokio::spawn(async move {
                probe_host(probe.as_ref(), store.as_ref(), &locks, ip).await
            });
            handles.push((ip, handle));
        }

        let mut servers = Vec::with_capacity(live.len());
        let mut failed_probes = 0;
        let mut write_error: Option<StoreError> = None;

        for (ip, handle) in handles {
            match handle.await {
                Ok(Ok(server)) => {
                    tracing::info!(
                        cidr = %subnet,
                        hostname = %server.hostname,
                        processed = servers.len() + 1,
                        "Host probed"
                    );
                    servers.push(server);
                }
                Ok(Err(ScanError::Store(e))) => {
                    tracing::error!(ip = %ip, error = %e, "Failed to store probed host");
                    failed_probes += 1;
                    write_error.get_or_insert(e);
                }
                Ok(Err(e)) => {
                    tracing::warn!(ip = %ip, error = %e, "Host probe failed");
                    failed_probes += 1;
                }
                Err(e) => {
                    tracing::error!(ip = %ip, error = %e, "Host probe task panicked");
                    failed_probes += 1;
                }
            }
        }

        if let Some(e) = write_error {
            return Err(ScanError::Store(e));
        }

        tracing::info!(
            cidr = %subnet,
            live_hosts = live.len(),
            servers = servers.len(),
            failed = failed_probes,
            "Subnet discovery complete"
        );

        Ok(SubnetReport {
            subnet: subnet.clone(),
            live_hosts: live.len(),
            failed_probes,
            servers,
        })
    }
}

/// Fingerprint one host, resolve its name, and upsert it.
async fn probe_host(
    probe: &dyn NetworkProbe,
    store: &dyn CatalogStore,
    locks: &HostLocks,
    ip: IpAddr,
) -> Result<DiscoveredServer> {
    let fingerprint = probe.fingerprint(ip).await?;
    let hostname = probe
        .reverse_lookup(ip)
        .await
        .unwrap_or_else(|| ip.to_string());

    let update = ServerUpdate {
        ip_address: Some(ip.to_string()),
        detected_os: fingerprint.os.unwrap_or_else(|| UNKNOWN_OS.to_string()),
        open_ports: fingerprint.open_ports.iter().map(OpenPort::display).collect(),
        last_scan: Utc::now(),
        is_reachable: true,
    };

    let id = persist::upsert_server(store, locks, &hostname, &update).await?;

    Ok(DiscoveredServer {
        id,
        hostname,
        update,
    })
}


#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use vigil_core::{FileRecord, NewFile, ServerRecord};
    use vigil_store::MemoryStore;

    use super::testing::FakeProbe;
    use super::*;

    fn subnets(cidrs: &[&str]) -> Vec<Subnet> {
        cidrs.iter().map(|c| c.parse().unwrap()).collect()
    }

    #[tokio::test]
    async fn test_partial_probe_failure_is_isolated() {
        let probe = FakeProbe::default()
            .with_subnet(
                "10.0.1.0/24",
                &["10.0.1.1", "10.0.1.2", "10.0.1.3", "10.0.1.4", "10.0.1.5"],
            )
            .failing_host("10.0.1.3");
        let store = Arc::new(MemoryStore::new());
        let discoverer = SubnetDiscoverer::new(Arc::new(probe), store.clone());

        let report = discoverer.discover(&subnets(&["10.0.1.0/24"])).await.unwrap();

        assert_eq!(report.server_count(), 4);
        assert_eq!(report.subnets[0].live_hosts, 5);
        assert_eq!(report.subnets[0].failed_probes, 1);

        let servers = store.list_servers().await.unwrap();
        assert_eq!(servers.len(), 4);
        assert!(servers.iter().all(|s| s.hostname != "10.0.1.3"));
    }

    #[tokio::test]
    async fn test_unresolved_host_uses_ip_as_hostname() {
        let probe = FakeProbe::default()
            .with_subnet("10.0.2.0/24", &["10.0.2.7", "10.0.2.8"])
            .named("10.0.2.8", "backup-web1.corp.local");
        let store = Arc::new(MemoryStore::new());
        let discoverer = SubnetDiscoverer::new(Arc::new(probe), store.clone());

        discoverer.discover(&subnets(&["10.0.2.0/24"])).await.unwrap();

        let mut servers = store.list_servers().await.unwrap();
        servers.sort_by(|a, b| a.hostname.cmp(&b.hostname));
        assert_eq!(servers[0].hostname, "10.0.2.7");
        assert_eq!(servers[1].hostname, "backup-web1.corp.local");

        let web1 = &servers[1];
        assert_eq!(web1.ip_address.as_deref(), Some("10.0.2.8"));
        assert_eq!(web1.detected_os, "Linux 5.15");
        assert_eq!(web1.open_ports, vec!["22/tcp (ssh)", "9100/tcp (unknown)"]);
        assert!(web1.is_reachable);
    }

    #[tokio::test]
    async fn test_failed_sweep_moves_to_next_subnet() {
        let probe = FakeProbe::default()
            .failing_sweep("10.0.1.0/24")
            .with_subnet("10.0.2.0/24", &["10.0.2.1"]);
        let store = Arc::new(MemoryStore::new());
        let discoverer = SubnetDiscoverer::new(Arc::new(probe), store.clone());

        let report = discoverer
            .discover(&subnets(&["10.0.1.0/24", "10.0.2.0/24"]))
            .await
            .unwrap();

        assert_eq!(report.subnets.len(), 2);
        assert_eq!(report.subnets[0].live_hosts, 0);
        assert!(report.subnets[0].servers.is_empty());
        assert_eq!(report.subnets[1].servers.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_sweep_yields_no_servers() {
        let probe = FakeProbe::default().with_subnet("192.168.99.0/24", &[]);
        let store = Arc::new(MemoryStore::new());
        let discoverer = SubnetDiscoverer::new(Arc::new(probe), store.clone());

        let report = discoverer
            .discover(&subnets(&["192.168.99.0/24"]))
            .await
            .unwrap();
        assert_eq!(report.server_count(), 0);
        assert!(store.list_servers().await.unwrap().is_empty());
    }

    /// Store whose upsert reads, yields, then writes, recording how many
    /// upserts overlap per hostname and overall.
    #[derive(Default)]
    struct SlowStore {
        inner: MemoryStore,
        in_flight: StdMutex<HashMap<String, usize>>,
        max_same_host: StdMutex<usize>,
        max_total: StdMutex<usize>,
    }

    impl SlowStore {
        fn enter(&self, hostname: &str) {
            let mut in_flight = self.in_flight.lock().unwrap();
            let count = in_flight.entry(hostname.to_string()).or_default();
            *count += 1;
            let same = *count;
            let total: usize = in_flight.values().sum();

            let mut max_same = self.max_same_host.lock().unwrap();
            *max_same = (*max_same).max(same);
            let mut max_total = self.max_total.lock().unwrap();
            *max_total = (*max_total).max(total);
        }

        fn leave(&self, hostname: &str) {
            let mut in_flight = self.in_flight.lock().unwrap();
            if let Some(count) = in_flight.get_mut(hostname) {
                *count -= 1;
            }
        }
    }

    #[async_trait]
    impl CatalogStore for SlowStore {
        async fn clear_files(&self) -> std::result::Result<(), StoreError> {
            self.inner.clear_files().await
        }

        async fn upsert_file(&self, file: &NewFile) -> std::result::Result<RecordId, StoreError> {
            self.inner.upsert_file(file).await
        }

        async fn list_files(&self) -> std::result::Result<Vec<FileRecord>, StoreError> {
            self.inner.list_files().await
        }

        async fn clear_servers(&self) -> std::result::Result<(), StoreError> {
            self.inner.clear_servers().await
        }

        async fn upsert_server_by_hostname(
            &self,
            hostname: &str,
            update: &ServerUpdate,
        ) -> std::result::Result<RecordId, StoreError> {
            self.enter(hostname);
            tokio::time::sleep(Duration::from_millis(20)).await;
            let id = self.inner.upsert_server_by_hostname(hostname, update).await;
            self.leave(hostname);
            id
        }

        async fn list_servers(&self) -> std::result::Result<Vec<ServerRecord>, StoreError> {
            self.inner.list_servers().await
        }
    }

    #[tokio::test]
    async fn test_upserts_serialized_per_hostname() {
        let probe = FakeProbe::default()
            .with_subnet(
                "10.0.3.0/24",
                &["10.0.3.1", "10.0.3.2", "10.0.3.3", "10.0.3.4"],
            )
            .named("10.0.3.1", "web1")
            .named("10.0.3.2", "web1")
            .named("10.0.3.3", "db1")
            .named("10.0.3.4", "mail1");
        let store = Arc::new(SlowStore::default());
        let discoverer = SubnetDiscoverer::new(Arc::new(probe), store.clone());

        let report = discoverer.discover(&subnets(&["10.0.3.0/24"])).await.unwrap();
        assert_eq!(report.server_count(), 4);

        assert_eq!(*store.max_same_host.lock().unwrap(), 1);
        assert!(*store.max_total.lock().unwrap() > 1);

        let servers = store.list_servers().await.unwrap();
        assert_eq!(servers.len(), 3);
        let web1 = servers.iter().find(|s| s.hostname == "web1").unwrap();
        let ip = web1.ip_address.as_deref().unwrap();
        assert!(ip == "10.0.3.1" || ip == "10.0.3.2");
    }

    /// Store that rejects every server write.
    struct ReadOnlyStore(MemoryStore);

    #[async_trait]
    impl CatalogStore for ReadOnlyStore {
        async fn clear_files(&self) -> std::result::Result<(), StoreError> {
            self.0.clear_files().await
        }

        async fn upsert_file(&self, file: &NewFile) -> std::result::Result<RecordId, StoreError> {
            self.0.upsert_file(file).await
        }

        async fn list_files(&self) -> std::result::Result<Vec<FileRecord>, StoreError> {
            self.0.list_files().await
        }

        async fn clear_servers(&self) -> std::result::Result<(), StoreError> {
            self.0.clear_servers().await
        }

        async fn upsert_server_by_hostname(
            &self,
            _hostname: &str,
            _update: &ServerUpdate,
        ) -> std::result::Result<RecordId, StoreError> {
            Err(StoreError::Connection("database is read-only".to_string()))
        }

        async fn list_servers(&self) -> std::result::Result<Vec<ServerRecord>, StoreError> {
            self.0.list_servers().await
        }
    }

    #[tokio::test]
    async fn test_store_failure_fails_discovery() {
        let probe = FakeProbe::default()
            .with_subnet("10.0.4.0/24", &["10.0.4.1", "10.0.4.2"])
            .with_subnet("10.0.5.0/24", &["10.0.5.1"]);
        let probe = Arc::new(probe);
        let store = Arc::new(ReadOnlyStore(MemoryStore::new()));
        let discoverer = SubnetDiscoverer::new(probe.clone(), store);

        let err = discoverer
            .discover(&subnets(&["10.0.4.0/24", "10.0.5.0/24"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::Store(StoreError::Connection(_))));

        // One sweep plus two fingerprints and two lookups; the second
        // subnet is never swept.
        assert_eq!(probe.calls(), 5);
    }
}
