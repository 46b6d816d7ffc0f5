//! vigil-scan: Backup catalogue crawler and network discovery for Vigil.
//!
//! Crawls backup-storage roots into the file catalogue, discovers servers on
//! configured subnets with nmap, and joins both into per-server backup
//! freshness reports.

pub mod config;
pub mod crawler;
pub mod discover;
pub mod error;
pub mod listing;
pub mod nmap_xml;
pub mod orchestrator;
pub mod persist;
pub mod probe;
pub mod scanner;
