//! storefleet-core - Core library for Storefleet
//!
//! Provisions and tears down isolated per-tenant store stacks on a cluster:
//!
//! - **db**: Durable store records (SQLite)
//! - **namespace**: Cluster namespace management (kubectl)
//! - **release**: Packaged application releases (helm)
//! - **values**: Deployment values and generated credentials
//! - **orchestrator**: Store lifecycle and reconciliation loop
//! - **exec**: Async subprocess runner shared by the cluster tools

pub mod db;
pub mod error;
pub mod exec;
pub mod namespace;
pub mod orchestrator;
pub mod release;
pub mod types;
pub mod values;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types
pub use db::Database;
pub use error::{Error, Result};
pub use orchestrator::{ProvisionerConfig, ReconcileReport, StoreOrchestrator};
pub use types::{ReleaseStatus, Store, StoreStatus};
