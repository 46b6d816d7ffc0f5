//! Nmap XML output deserialization.
//!
//! Every probe runs nmap with `-oX -` and reads the structured XML from
//! stdout. Only the elements the probes consume are modelled; everything
//! else in the document is ignored by serde.

use std::net::IpAddr;

use serde::Deserialize;

use crate::error::{Result, ScanError};

/// Root element: `<nmaprun>`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename = "nmaprun")]
pub struct NmapRun {
    #[serde(rename = "host", default)]
    pub hosts: Vec<NmapHost>,
}

/// A single host from scan results.
#[derive(Debug, Clone, Deserialize)]
pub struct NmapHost {
    pub status: Option<HostStatus>,
    #[serde(rename = "address", default)]
    pub addresses: Vec<Address>,
    pub hostnames: Option<Hostnames>,
    pub ports: Option<Ports>,
    pub os: Option<OsMatches>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostStatus {
    #[serde(rename = "@state")]
    pub state: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Address {
    #[serde(rename = "@addr")]
    pub addr: String,
    #[serde(rename = "@addrtype")]
    pub addr_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Hostnames {
    #[serde(rename = "hostname", default)]
    pub hostnames: Vec<Hostname>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Hostname {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@type")]
    pub hostname_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ports {
    #[serde(rename = "port", default)]
    pub ports: Vec<NmapPort>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NmapPort {
    #[serde(rename = "@protocol")]
    pub protocol: String,
    #[serde(rename = "@portid")]
    pub port_id: u16,
    pub state: PortState,
    pub service: Option<NmapService>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortState {
    #[serde(rename = "@state")]
    pub state: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NmapService {
    #[serde(rename = "@name")]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OsMatches {
    #[serde(rename = "osmatch", default)]
    pub matches: Vec<OsMatch>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OsMatch {
    #[serde(rename = "@name")]
    pub name: String,
}

impl NmapHost {
    /// The host's IP address (IPv4 preferred over IPv6), if present.
    pub fn ip(&self) -> Option<IpAddr> {
        let by_type = |ty: &str| {
            self.addresses
                .iter()
                .find(|a| a.addr_type == ty)
                .and_then(|a| a.addr.parse::<IpAddr>().ok())
        };
        by_type("ipv4").or_else(|| by_type("ipv6"))
    }

    /// The reverse-DNS (PTR) name, falling back to the first hostname.
    pub fn ptr_name(&self) -> Option<&str> {
        let names = &self.hostnames.as_ref()?.hostnames;
        names
            .iter()
            .find(|h| h.hostname_type.as_deref() == Some("PTR"))
            .or_else(|| names.first())
            .map(|h| h.name.as_str())
            .filter(|name| !name.is_empty())
    }

    /// Check if the host is up.
    pub fn is_up(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.state == "up")
    }

    /// Get the best OS match name (highest accuracy, first in list).
    pub fn os_name(&self) -> Option<&str> {
        self.os
            .as_ref()
            .and_then(|os| os.matches.first())
            .map(|m| m.name.as_str())
    }

    /// Ports reported in the `open` state, in document order.
    pub fn open_ports(&self) -> impl Iterator<Item = &NmapPort> {
        self.ports
            .iter()
            .flat_map(|p| p.ports.iter())
            .filter(|p| p.state.state == "open")
    }
}

impl NmapRun {
    /// Addresses of every host reported up.
    pub fn live_addresses(&self) -> Vec<IpAddr> {
        self.hosts
            .iter()
            .filter(|h| h.is_up())
            .filter_map(NmapHost::ip)
            .collect()
    }

    /// The host entry for a specific address.
    pub fn host(&self, ip: IpAddr) -> Option<&NmapHost> {
        self.hosts.iter().find(|h| h.ip() == Some(ip))
    }
}

/// Parse nmap XML bytes into a structured `NmapRun`.
pub fn parse_nmap_xml(xml: &[u8]) -> Result<NmapRun> {
    quick_xml::de::from_reader(xml).map_err(|e| ScanError::XmlParse(format!("{e}")))
}
