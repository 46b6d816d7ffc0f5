//! Error types for the vigil-scan crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Nmap not found at path: {path}")]
    NmapNotFound { path: String },

    #[error("Nmap exited with code {code}: {stderr}")]
    NmapFailed { code: i32, stderr: String },

    #[error("Failed to parse nmap XML output: {0}")]
    XmlParse(String),

    #[error("Host {ip} did not respond to the probe")]
    HostDown { ip: String },

    #[error("Elevated privilege required for network probing")]
    PrivilegeRequired,

    #[error("Store error: {0}")]
    Store(#[from] vigil_store::StoreError),

    #[error("Task failed: {0}")]
    Join(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ScanError>;
