//! Database types for storefleet-core.

use serde::Serialize;

// ─────────────────────────────────────────────────────────────────────────────
// Input Types (for creating entities)
// ─────────────────────────────────────────────────────────────────────────────

/// Input for inserting a new store record
#[derive(Debug, Clone)]
pub struct NewStore {
    pub store_id: String,
    pub store_name: String,
    pub namespace: String,
    pub url: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregates
// ─────────────────────────────────────────────────────────────────────────────

/// Number of store records per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStatusCounts {
    pub provisioning: u32,
    pub ready: u32,
    pub failed: u32,
    pub deleted: u32,
}
