//! vigil-store: persistence gateway for the file and server catalogues.
//!
//! Scanners write through the [`CatalogStore`] trait and the status
//! classifier reads back through it. Two backends exist: [`MemoryStore`]
//! for tests and throwaway runs, and [`GraphStore`] backed by Neo4j.

pub mod catalog;
pub mod client;
pub mod memory;
pub mod mutations;
pub mod queries;

pub use catalog::{CatalogStore, StoreError};
pub use client::{GraphConfig, GraphStore};
pub use memory::MemoryStore;
