//! Shared types for storefleet-core.
//!
//! These types are used by the orchestrator, the database layer and the
//! HTTP layer in storefleet-server.

use serde::{Deserialize, Serialize};

/// Prefix shared by a store's namespace and release name.
pub const STORE_PREFIX: &str = "store-";

// ─────────────────────────────────────────────────────────────────────────────
// Entity Types
// ─────────────────────────────────────────────────────────────────────────────

/// A provisioned store: the durable record of one tenant stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    pub store_id: String,
    pub store_name: String,
    pub namespace: String,
    pub status: StoreStatus,
    pub url: String,
    pub created_at: i64,
    pub deleted_at: Option<i64>,
}

impl Store {
    /// Name of the release installed for this store.
    pub fn release_name(&self) -> String {
        resource_name(&self.store_id)
    }
}

/// Lifecycle status of a store record.
///
/// ```text
/// provisioning ──► ready ──┐
///      │                   ├──► deleted
///      └────────► failed ──┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreStatus {
    Provisioning,
    Ready,
    Failed,
    Deleted,
}

impl StoreStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreStatus::Provisioning => "provisioning",
            StoreStatus::Ready => "ready",
            StoreStatus::Failed => "failed",
            StoreStatus::Deleted => "deleted",
        }
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: StoreStatus) -> bool {
        use StoreStatus::*;
        matches!(
            (self, next),
            (Provisioning, Ready)
                | (Provisioning, Failed)
                | (Provisioning, Deleted)
                | (Ready, Deleted)
                | (Failed, Deleted)
        )
    }
}

impl std::fmt::Display for StoreStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StoreStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "provisioning" => Ok(StoreStatus::Provisioning),
            "ready" => Ok(StoreStatus::Ready),
            "failed" => Ok(StoreStatus::Failed),
            "deleted" => Ok(StoreStatus::Deleted),
            _ => Err(format!("Invalid store status: {}", s)),
        }
    }
}

/// Last reported outcome of a release, as seen by the package manager.
///
/// Anything the package manager reports outside this set is folded into
/// `NotFound` so callers treat it as unresolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReleaseStatus {
    Deployed,
    Failed,
    PendingInstall,
    PendingUpgrade,
    NotFound,
}

impl ReleaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseStatus::Deployed => "deployed",
            ReleaseStatus::Failed => "failed",
            ReleaseStatus::PendingInstall => "pending-install",
            ReleaseStatus::PendingUpgrade => "pending-upgrade",
            ReleaseStatus::NotFound => "not-found",
        }
    }

    /// Parse a status string. Never fails.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "deployed" => ReleaseStatus::Deployed,
            "failed" => ReleaseStatus::Failed,
            "pending-install" => ReleaseStatus::PendingInstall,
            "pending-upgrade" => ReleaseStatus::PendingUpgrade,
            _ => ReleaseStatus::NotFound,
        }
    }

    /// The store status this release outcome settles on, if any.
    pub fn resolved_store_status(&self) -> Option<StoreStatus> {
        match self {
            ReleaseStatus::Deployed => Some(StoreStatus::Ready),
            ReleaseStatus::Failed => Some(StoreStatus::Failed),
            ReleaseStatus::PendingInstall
            | ReleaseStatus::PendingUpgrade
            | ReleaseStatus::NotFound => None,
        }
    }
}

impl std::fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Naming
// ─────────────────────────────────────────────────────────────────────────────

/// Namespace and release name for a store id.
pub fn resource_name(store_id: &str) -> String {
    format!("{}{}", STORE_PREFIX, store_id)
}

/// Externally reachable hostname for a store id.
pub fn store_hostname(store_id: &str, domain: &str) -> String {
    format!("{}.{}", resource_name(store_id), domain)
}

/// Public URL for a store id.
pub fn store_url(store_id: &str, domain: &str, port: Option<u16>) -> String {
    match port {
        Some(80) | None => format!("http://{}", store_hostname(store_id, domain)),
        Some(port) => format!("http://{}:{}", store_hostname(store_id, domain), port),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_status_round_trip() {
        for status in [
            StoreStatus::Provisioning,
            StoreStatus::Ready,
            StoreStatus::Failed,
            StoreStatus::Deleted,
        ] {
            assert_eq!(status.as_str().parse::<StoreStatus>().unwrap(), status);
        }
        assert!("running".parse::<StoreStatus>().is_err());
    }

    #[test]
    fn test_store_status_transitions() {
        use StoreStatus::*;

        assert!(Provisioning.can_transition_to(Ready));
        assert!(Provisioning.can_transition_to(Failed));
        assert!(Ready.can_transition_to(Deleted));
        assert!(Failed.can_transition_to(Deleted));

        assert!(!Ready.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Ready));
        assert!(!Ready.can_transition_to(Provisioning));
        for next in [Provisioning, Ready, Failed, Deleted] {
            assert!(!Deleted.can_transition_to(next));
        }
    }

    #[test]
    fn test_release_status_parse() {
        assert_eq!(ReleaseStatus::parse("deployed"), ReleaseStatus::Deployed);
        assert_eq!(ReleaseStatus::parse("FAILED"), ReleaseStatus::Failed);
        assert_eq!(ReleaseStatus::parse("pending-install"), ReleaseStatus::PendingInstall);
        assert_eq!(ReleaseStatus::parse("pending-upgrade"), ReleaseStatus::PendingUpgrade);
        assert_eq!(ReleaseStatus::parse("uninstalling"), ReleaseStatus::NotFound);
        assert_eq!(ReleaseStatus::parse(""), ReleaseStatus::NotFound);
    }

    #[test]
    fn test_release_status_resolution() {
        assert_eq!(
            ReleaseStatus::Deployed.resolved_store_status(),
            Some(StoreStatus::Ready)
        );
        assert_eq!(
            ReleaseStatus::Failed.resolved_store_status(),
            Some(StoreStatus::Failed)
        );
        assert_eq!(ReleaseStatus::PendingInstall.resolved_store_status(), None);
        assert_eq!(ReleaseStatus::NotFound.resolved_store_status(), None);
    }

    #[test]
    fn test_derived_names_are_stable() {
        assert_eq!(resource_name("abc123"), "store-abc123");
        assert_eq!(resource_name("abc123"), resource_name("abc123"));
        assert_eq!(store_hostname("abc123", "localhost"), "store-abc123.localhost");
        assert_eq!(
            store_url("abc123", "localhost", Some(8080)),
            "http://store-abc123.localhost:8080"
        );
        assert_eq!(
            store_url("abc123", "shops.example.com", None),
            "http://store-abc123.shops.example.com"
        );
    }

    #[test]
    fn test_store_serializes_camel_case() {
        let store = Store {
            store_id: "abc123".to_string(),
            store_name: "Acme Shop".to_string(),
            namespace: "store-abc123".to_string(),
            status: StoreStatus::Provisioning,
            url: "http://store-abc123.localhost:8080".to_string(),
            created_at: 1_700_000_000_000,
            deleted_at: None,
        };

        let json = serde_json::to_value(&store).unwrap();
        assert_eq!(json["storeId"], "abc123");
        assert_eq!(json["status"], "provisioning");
        assert!(json["deletedAt"].is_null());
        assert_eq!(store.release_name(), "store-abc123");
    }
}
