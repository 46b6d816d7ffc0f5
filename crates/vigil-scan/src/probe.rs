//! The network probing seam used by subnet discovery.

use std::net::IpAddr;

use async_trait::async_trait;
use vigil_core::{format_open_port, Subnet};

use crate::error::Result;

/// An open port seen by a deep probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenPort {
    pub port: u16,
    pub protocol: String,
    pub service: Option<String>,
}

impl OpenPort {
    /// Catalogue form, e.g. `"22/tcp (ssh)"`.
    pub fn display(&self) -> String {
        format_open_port(self.port, &self.protocol, self.service.as_deref())
    }
}

/// What a deep probe learned about one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFingerprint {
    pub ip: IpAddr,
    /// Best OS match, if fingerprinting produced one.
    pub os: Option<String>,
    /// Open ports in the order the probe reported them.
    pub open_ports: Vec<OpenPort>,
}

/// Two-phase network probing: a cheap subnet-wide liveness sweep, then
/// per-host fingerprinting and reverse-DNS resolution.
///
/// Implementations bound each call with their own timeouts; callers add no
/// deadline on top.
#[async_trait]
pub trait NetworkProbe: Send + Sync {
    /// Addresses in the subnet that responded to a liveness probe.
    async fn sweep(&self, subnet: &Subnet) -> Result<Vec<IpAddr>>;

    /// Port and OS fingerprint of a single live host.
    async fn fingerprint(&self, ip: IpAddr) -> Result<HostFingerprint>;

    /// Reverse-DNS name for the address, `None` if it does not resolve.
    async fn reverse_lookup(&self, ip: IpAddr) -> Option<String>;
}
