//! Shared provisioning state used by the orchestrator, its background
//! provisioning tasks and the reconciliation loop.

use super::reconcile::ReconcileReport;
use super::ProvisionerConfig;
use crate::db::{Database, NewStore};
use crate::error::{Error, Result};
use crate::namespace::{identity_labels, NamespaceManager};
use crate::release::ReleaseInstaller;
use crate::types::{resource_name, store_url, ReleaseStatus, Store, StoreStatus};
use crate::values::ValuesGenerator;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Attempts at finding an unused store id before giving up.
const MAX_ID_ATTEMPTS: u32 = 5;

pub(crate) struct Engine {
    pub(crate) db: Arc<Database>,
    pub(crate) namespaces: Arc<dyn NamespaceManager>,
    pub(crate) releases: Arc<dyn ReleaseInstaller>,
    pub(crate) values: ValuesGenerator,
    pub(crate) config: ProvisionerConfig,
    /// Held for a whole reconciliation pass; passes never overlap.
    pub(crate) pass_lock: Mutex<()>,
}

impl Engine {
    /// Insert a `provisioning` record under a fresh id.
    pub(crate) fn insert_new_store(&self, store_name: &str) -> Result<Store> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let store_id = generate_store_id();
            let new_store = NewStore {
                namespace: resource_name(&store_id),
                url: store_url(&store_id, &self.config.domain, self.config.public_port),
                store_name: store_name.to_string(),
                store_id,
            };

            match self.db.insert_store(&new_store)? {
                Some(store) => return Ok(store),
                None => debug!(store_id = %new_store.store_id, "Store id collision, retrying"),
            }
        }
        Err(Error::IdExhausted(MAX_ID_ATTEMPTS))
    }

    /// Whether the record was deleted (or vanished) since `store` was read.
    fn is_deleted(&self, store: &Store) -> Result<bool> {
        Ok(self
            .db
            .get_store(&store.store_id)?
            .is_none_or(|current| current.status == StoreStatus::Deleted))
    }

    /// Namespace, values, install. Never writes store status.
    ///
    /// The record is re-read before each cluster step. A store deleted while
    /// its install was running has whatever got installed torn down again.
    pub(crate) async fn provision(&self, store: &Store) -> Result<()> {
        if self.is_deleted(store)? {
            info!(store_id = %store.store_id, "Store deleted before provisioning started");
            return Ok(());
        }
        info!(store_id = %store.store_id, "Provisioning store");

        let labels = identity_labels(&store.store_id, &self.config.managed_by);
        match self.namespaces.ensure_namespace(&store.namespace, &labels).await {
            Ok(()) => {}
            Err(Error::AlreadyExists(_)) => {
                debug!(namespace = %store.namespace, "Reusing existing namespace");
            }
            Err(e) => return Err(e),
        }

        if self.is_deleted(store)? {
            info!(store_id = %store.store_id, "Store deleted during provisioning; removing namespace");
            self.namespaces.delete_namespace(&store.namespace).await?;
            return Ok(());
        }

        let values = self.values.generate(&store.store_id, &store.store_name);
        let installed = self
            .releases
            .install(&store.release_name(), &store.namespace, &values)
            .await;

        if self.is_deleted(store)? {
            info!(store_id = %store.store_id, "Store deleted during install; tearing down");
            self.releases
                .uninstall(&store.release_name(), &store.namespace)
                .await;
            self.namespaces.delete_namespace(&store.namespace).await?;
            return Ok(());
        }
        installed?;

        info!(
            store_id = %store.store_id,
            "Install returned; waiting for reconciliation to confirm"
        );
        Ok(())
    }

    /// Run one reconciliation pass over every `provisioning` store.
    pub(crate) async fn reconcile_once(self: &Arc<Self>) -> Result<ReconcileReport> {
        let _pass = self.pass_lock.lock().await;
        let pending = self.db.list_stores_by_status(StoreStatus::Provisioning)?;
        let mut report = ReconcileReport::default();

        for store in pending {
            report.checked += 1;

            // Each store runs in its own task so a panic in one probe only
            // costs that store.
            let engine = Arc::clone(self);
            let store_id = store.store_id.clone();
            let step = tokio::spawn(async move { engine.reconcile_store(&store).await }).await;

            match step {
                Ok(Ok(Some(StoreStatus::Ready))) => report.ready.push(store_id),
                Ok(Ok(Some(StoreStatus::Failed))) => report.failed.push(store_id),
                Ok(Ok(_)) => report.pending += 1,
                Ok(Err(e)) => {
                    error!(store_id = %store_id, error = %e, "Reconcile step failed");
                    report.errors.push(Error::ReconcileStep {
                        store_id,
                        message: e.to_string(),
                    });
                }
                Err(join_err) => {
                    error!(store_id = %store_id, error = %join_err, "Reconcile step aborted");
                    report.errors.push(Error::ReconcileStep {
                        store_id,
                        message: join_err.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    /// Probe one store's release and record a terminal outcome.
    ///
    /// Returns the status written, or `None` if the store is still converging
    /// or was changed by someone else in the meantime.
    async fn reconcile_store(&self, store: &Store) -> Result<Option<StoreStatus>> {
        let release_status = self
            .releases
            .status(&store.release_name(), &store.namespace)
            .await;

        let Some(next) = release_status.resolved_store_status() else {
            debug!(
                store_id = %store.store_id,
                release_status = %release_status,
                "Store still converging"
            );
            return Ok(None);
        };

        if !self
            .db
            .transition_status(&store.store_id, StoreStatus::Provisioning, next)?
        {
            debug!(store_id = %store.store_id, "Store left provisioning before update");
            return Ok(None);
        }

        match release_status {
            ReleaseStatus::Failed => warn!(store_id = %store.store_id, "Store release failed"),
            _ => info!(store_id = %store.store_id, status = %next, "Store reconciled"),
        }
        Ok(Some(next))
    }
}

/// Short opaque store id: the first 8 hex digits of a v4 UUID.
pub(crate) fn generate_store_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_store_id() {
        let id = generate_store_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(generate_store_id(), generate_store_id());
    }
}
