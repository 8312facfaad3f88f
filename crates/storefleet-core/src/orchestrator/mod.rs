//! Store provisioning orchestrator.
//!
//! Owns the store lifecycle:
//!
//! ```text
//! create ──► insert record (provisioning) ──► return to caller
//!              │
//!              └─► background task: namespace ─► values ─► install
//!                  (logs errors, never writes status)
//!
//! reconcile (every interval, non-overlapping)
//!   for each provisioning record:
//!     release deployed ─► ready
//!     release failed   ─► failed
//!     anything else    ─► leave as is
//!
//! delete ──► uninstall (best effort) ─► delete namespace ─► mark deleted
//! ```
//!
//! Status is decided by reconciliation only. An install call returning is not
//! proof of a healthy release, and an install call failing is not proof that
//! nothing got installed.

mod engine;
mod reconcile;

pub use reconcile::ReconcileReport;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::namespace::NamespaceManager;
use crate::release::ReleaseInstaller;
use crate::types::{Store, StoreStatus};
use crate::values::ValuesGenerator;
use engine::Engine;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::{error, info};

/// Longest accepted store display name, in characters.
pub const MAX_STORE_NAME_LEN: usize = 100;

/// Orchestrator settings
#[derive(Debug, Clone)]
pub struct ProvisionerConfig {
    /// Domain suffix for store URLs
    pub domain: String,
    /// Port in store URLs; `None` or 80 leaves it out
    pub public_port: Option<u16>,
    /// Value of the `managed-by` namespace label
    pub managed_by: String,
    /// Time between reconciliation passes
    pub reconcile_interval: Duration,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            domain: "localhost".to_string(),
            public_port: Some(8080),
            managed_by: "store-provisioning-platform".to_string(),
            reconcile_interval: Duration::from_secs(10),
        }
    }
}

/// Validate and normalize a caller-supplied store name.
pub fn validate_store_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("Store name is required"));
    }
    if name.chars().count() > MAX_STORE_NAME_LEN {
        return Err(Error::validation(format!(
            "Store name must be at most {} characters",
            MAX_STORE_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

/// Provisions, reconciles and tears down stores.
pub struct StoreOrchestrator {
    engine: Arc<Engine>,
    reconciler: Mutex<Option<AbortHandle>>,
}

impl StoreOrchestrator {
    /// Build an orchestrator without starting reconciliation.
    pub fn new(
        db: Arc<Database>,
        namespaces: Arc<dyn NamespaceManager>,
        releases: Arc<dyn ReleaseInstaller>,
        values: ValuesGenerator,
        config: ProvisionerConfig,
    ) -> Self {
        Self {
            engine: Arc::new(Engine {
                db,
                namespaces,
                releases,
                values,
                config,
                pass_lock: tokio::sync::Mutex::new(()),
            }),
            reconciler: Mutex::new(None),
        }
    }

    /// Build an orchestrator and start its reconciliation loop.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        db: Arc<Database>,
        namespaces: Arc<dyn NamespaceManager>,
        releases: Arc<dyn ReleaseInstaller>,
        values: ValuesGenerator,
        config: ProvisionerConfig,
    ) -> Self {
        let orchestrator = Self::new(db, namespaces, releases, values, config);
        orchestrator.start_reconciler();
        orchestrator
    }

    pub fn config(&self) -> &ProvisionerConfig {
        &self.engine.config
    }

    /// Start the reconciliation loop if it is not already running.
    pub fn start_reconciler(&self) {
        let mut slot = self.reconciler.lock().unwrap_or_else(|p| p.into_inner());
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        *slot = Some(reconcile::spawn_reconcile_loop(
            Arc::clone(&self.engine),
            self.engine.config.reconcile_interval,
        ));
    }

    /// Whether the reconciliation loop is running.
    pub fn is_reconciling(&self) -> bool {
        let slot = self.reconciler.lock().unwrap_or_else(|p| p.into_inner());
        slot.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the reconciliation loop. In-flight provisioning tasks keep running.
    pub fn shutdown(&self) {
        let mut slot = self.reconciler.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(handle) = slot.take() {
            handle.abort();
            info!("Stopped store reconciliation");
        }
    }

    /// Create a store record and start provisioning it in the background.
    ///
    /// Returns as soon as the record exists, in `provisioning` status.
    pub async fn create(&self, store_name: &str) -> Result<Store> {
        let store_name = validate_store_name(store_name)?;
        let store = self.engine.insert_new_store(&store_name)?;
        info!(store_id = %store.store_id, store_name = %store.store_name, "Store created");

        let engine = Arc::clone(&self.engine);
        let record = store.clone();
        tokio::spawn(async move {
            if let Err(e) = engine.provision(&record).await {
                // Left in provisioning on purpose; reconciliation decides.
                error!(store_id = %record.store_id, error = %e, "Provisioning failed");
            }
        });

        Ok(store)
    }

    /// Get a store by id, including deleted stores.
    pub fn get(&self, store_id: &str) -> Result<Store> {
        self.engine
            .db
            .get_store(store_id)?
            .ok_or_else(|| Error::StoreNotFound(store_id.to_string()))
    }

    /// List stores that are not deleted, newest first.
    pub fn list(&self) -> Result<Vec<Store>> {
        self.engine.db.list_active_stores()
    }

    /// Tear down a store and mark it deleted.
    ///
    /// Deleting an already deleted store returns it unchanged.
    pub async fn delete(&self, store_id: &str) -> Result<Store> {
        let store = self.get(store_id)?;
        if store.status == StoreStatus::Deleted {
            return Ok(store);
        }

        info!(store_id = %store.store_id, "Deleting store");
        self.engine
            .releases
            .uninstall(&store.release_name(), &store.namespace)
            .await;
        self.engine.namespaces.delete_namespace(&store.namespace).await?;
        self.engine.db.mark_deleted(&store.store_id)?;

        let store = self.get(store_id)?;
        info!(store_id = %store.store_id, "Store deleted");
        Ok(store)
    }

    /// Run one reconciliation pass now.
    pub async fn reconcile_once(&self) -> Result<ReconcileReport> {
        self.engine.reconcile_once().await
    }
}

impl Drop for StoreOrchestrator {
    fn drop(&mut self) {
        let slot = self.reconciler.get_mut().unwrap_or_else(|p| p.into_inner());
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }
}
