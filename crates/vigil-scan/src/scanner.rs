//! Nmap process wrapper.
//!
//! Executes nmap as a child process via `tokio::process::Command` and
//! parses the XML output into typed Rust structs.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use vigil_core::Subnet;

use crate::error::{Result, ScanError};
use crate::nmap_xml::{self, NmapHost, NmapRun};
use crate::probe::{HostFingerprint, NetworkProbe, OpenPort};

/// The three nmap invocations discovery needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    /// Ping sweep of a whole subnet, no DNS.
    Sweep,
    /// Fast top-100 port scan with OS detection and a single retry.
    Fingerprint,
    /// List scan of one address; only performs reverse DNS.
    ReverseLookup,
}

impl ProbeKind {
    /// Return the nmap flags for this probe.
    pub fn nmap_flags(&self) -> Vec<&'static str> {
        match self {
            Self::Sweep => vec!["-n", "-sn", "--min-parallelism", "100"],
            Self::Fingerprint => vec![
                "-n",
                "-T4",
                "-F",
                "--min-parallelism",
                "100",
                "--max-retries",
                "1",
                "-O",
            ],
            Self::ReverseLookup => vec!["-sL"],
        }
    }
}

/// Wrapper around the nmap binary.
pub struct NmapScanner {
    nmap_path: String,
    host_timeout: Duration,
}

impl NmapScanner {
    pub fn new(nmap_path: &str, host_timeout: Duration) -> Self {
        Self {
            nmap_path: nmap_path.to_string(),
            host_timeout,
        }
    }

    /// Verify nmap is installed and accessible.
    pub async fn verify_installation(&self) -> Result<String> {
        let output = Command::new(&self.nmap_path)
            .arg("--version")
            .output()
            .await
            .map_err(|_| ScanError::NmapNotFound {
                path: self.nmap_path.clone(),
            })?;

        String::from_utf8(output.stdout).map_err(|e| ScanError::XmlParse(e.to_string()))
    }

    /// Arguments for one invocation, excluding the binary itself.
    fn command_args(&self, kind: ProbeKind, target: &str, ipv6: bool) -> Vec<String> {
        let mut args: Vec<String> = kind.nmap_flags().into_iter().map(String::from).collect();
        if kind == ProbeKind::Fingerprint {
            args.push("--host-timeout".to_string());
            args.push(format!("{}s", self.host_timeout.as_secs().max(1)));
        }
        if ipv6 {
            args.push("-6".to_string());
        }
        args.extend(["-oX", "-", "--noninteractive"].map(String::from));
        args.push(target.to_string());
        args
    }

    /// Execute nmap against the target and parse its XML report.
    async fn run(&self, kind: ProbeKind, target: &str, ipv6: bool) -> Result<NmapRun> {
        let start = Instant::now();
        let args = self.command_args(kind, target, ipv6);

        tracing::debug!(target = %target, probe = ?kind, "Starting nmap");

        let output = Command::new(&self.nmap_path)
            .args(&args)
            .output()
            .await
            .map_err(|e| ScanError::NmapNotFound {
                path: format!("{}: {e}", self.nmap_path),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(ScanError::NmapFailed {
                code: output.status.code().unwrap_or(-1),
                stderr,
            });
        }

        let run = nmap_xml::parse_nmap_xml(&output.stdout)?;

        tracing::debug!(
            target = %target,
            probe = ?kind,
            duration_ms = start.elapsed().as_millis(),
            "Nmap finished"
        );

        Ok(run)
    }
}

#[async_trait]
impl NetworkProbe for NmapScanner {
    async fn sweep(&self, subnet: &Subnet) -> Result<Vec<IpAddr>> {
        let target = subnet.to_string();
        let run = self
            .run(ProbeKind::Sweep, &target, subnet.net().addr().is_ipv6())
            .await?;
        Ok(run.live_addresses())
    }

    async fn fingerprint(&self, ip: IpAddr) -> Result<HostFingerprint> {
        let run = self
            .run(ProbeKind::Fingerprint, &ip.to_string(), ip.is_ipv6())
            .await?;
        fingerprint_from_run(&run, ip)
    }

    async fn reverse_lookup(&self, ip: IpAddr) -> Option<String> {
        match self
            .run(ProbeKind::ReverseLookup, &ip.to_string(), ip.is_ipv6())
            .await
        {
            Ok(run) => run
                .host(ip)
                .and_then(NmapHost::ptr_name)
                .map(String::from),
            Err(e) => {
                tracing::debug!(ip = %ip, error = %e, "Reverse lookup failed");
                None
            }
        }
    }
}

/// Extract the fingerprint of `ip` from a deep-probe report.
pub(crate) fn fingerprint_from_run(run: &NmapRun, ip: IpAddr) -> Result<HostFingerprint> {
    let host = run
        .host(ip)
        .filter(|h| h.is_up())
        .ok_or_else(|| ScanError::HostDown { ip: ip.to_string() })?;

    let open_ports = host
        .open_ports()
        .map(|p| OpenPort {
            port: p.port_id,
            protocol: p.protocol.clone(),
            service: p.service.as_ref().map(|s| s.name.clone()),
        })
        .collect();

    Ok(HostFingerprint {
        ip,
        os: host.os_name().map(String::from),
        open_ports,
    })
}
