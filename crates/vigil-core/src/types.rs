//! Catalogue record types shared by the scanners, the store, and the CLI.
//!
//! Two catalogues exist: backup files found under storage roots (rebuilt on
//! every directory scan) and servers found via network discovery (upserted by
//! hostname, never pruned).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

// ── Identity ──────────────────────────────────────────────────────

/// Unique identifier for a stored catalogue record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RecordId(pub Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Files ─────────────────────────────────────────────────────────

/// A file found under a backup-storage root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileRecord {
    pub id: RecordId,
    pub filename: String,
    /// Absolute path of the file at crawl time.
    pub filepath: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    /// When the record was written to the catalogue.
    pub scan_time: DateTime<Utc>,
}

/// Write payload for a crawled file. `scan_time` is stamped by the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewFile {
    pub filename: String,
    pub filepath: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

// ── Servers ───────────────────────────────────────────────────────

/// A server found via network discovery, keyed by hostname.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerRecord {
    pub id: RecordId,
    /// Reverse-DNS name, or the literal IP when resolution failed.
    pub hostname: String,
    pub ip_address: Option<String>,
    pub detected_os: String,
    /// Ordered `"port/protocol (service)"` entries.
    pub open_ports: Vec<String>,
    pub is_reachable: bool,
    pub last_scan: DateTime<Utc>,
    pub scan_time: DateTime<Utc>,
}

impl ServerRecord {
    /// Open ports joined for display, e.g. `"22/tcp (ssh), 80/tcp (http)"`.
    pub fn open_ports_display(&self) -> String {
        self.open_ports.join(", ")
    }
}

/// Full-field update applied by an upsert keyed on hostname.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerUpdate {
    pub ip_address: Option<String>,
    pub detected_os: String,
    pub open_ports: Vec<String>,
    pub last_scan: DateTime<Utc>,
    pub is_reachable: bool,
}

/// Fallback OS label when fingerprinting produced no match.
pub const UNKNOWN_OS: &str = "Unknown";

/// Render an open port the way it is stored: `"22/tcp (ssh)"`.
pub fn format_open_port(port: u16, protocol: &str, service: Option<&str>) -> String {
    format!("{port}/{protocol} ({})", service.unwrap_or("unknown"))
}

// ── Status ────────────────────────────────────────────────────────

/// Derived backup health of a server. Never persisted.
///
/// Orders from healthiest to worst.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BackupStatus {
    /// A matching backup no older than the freshness threshold exists.
    Green,
    /// Matching backups exist but the newest is older than the threshold.
    Yellow,
    /// No file matches the server.
    Red,
}

impl BackupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Red => "red",
        }
    }
}

impl fmt::Display for BackupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One row of a freshness report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerStatus {
    pub server: ServerRecord,
    pub status: BackupStatus,
    /// The newest file matching the server, if any.
    pub latest_backup: Option<FileRecord>,
}

// ── Scan targets ──────────────────────────────────────────────────

/// A validated CIDR scan target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Subnet(IpNet);

impl Subnet {
    pub fn net(&self) -> &IpNet {
        &self.0
    }
}

impl FromStr for Subnet {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<IpNet>()
            .map(Subnet)
            .map_err(|e| CoreError::InvalidSubnet {
                value: s.to_string(),
                reason: e.to_string(),
            })
    }
}

impl TryFrom<String> for Subnet {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Subnet> for String {
    fn from(value: Subnet) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_open_port() {
        assert_eq!(format_open_port(22, "tcp", Some("ssh")), "22/tcp (ssh)");
        assert_eq!(format_open_port(161, "udp", None), "161/udp (unknown)");
    }

    #[test]
    fn test_backup_status_serde() {
        assert_eq!(
            serde_json::to_string(&BackupStatus::Yellow).unwrap(),
            "\"yellow\""
        );
        assert_eq!(BackupStatus::Red.to_string(), "red");
    }

    #[test]
    fn test_subnet_parse() {
        let subnet: Subnet = " 10.0.1.0/24 ".parse().unwrap();
        assert_eq!(subnet.to_string(), "10.0.1.0/24");
        assert!("10.0.1.0".parse::<Subnet>().is_err());
        assert!("not-a-net/8".parse::<Subnet>().is_err());
    }

    #[test]
    fn test_open_ports_display() {
        let server = ServerRecord {
            id: RecordId::new(),
            hostname: "web1".to_string(),
            ip_address: None,
            detected_os: UNKNOWN_OS.to_string(),
            open_ports: vec!["22/tcp (ssh)".to_string(), "80/tcp (http)".to_string()],
            is_reachable: true,
            last_scan: Utc::now(),
            scan_time: Utc::now(),
        };
        assert_eq!(server.open_ports_display(), "22/tcp (ssh), 80/tcp (http)");
    }
}
