//! vigil-core: Shared types and backup-freshness classification for Vigil.
//!
//! This crate provides the foundational pieces used across Vigil components:
//! - Catalogue records (`FileRecord`, `ServerRecord`) and their write payloads
//! - The `BackupStatus` classifier that joins servers against backup files
//! - Common error types

pub mod error;
pub mod status;
pub mod types;

pub use error::CoreError;
pub use status::{classify, classify_all, newest_matching_backup, FRESHNESS_THRESHOLD_DAYS};
pub use types::*;
