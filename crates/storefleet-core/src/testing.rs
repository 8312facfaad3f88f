//! In-process stand-ins for the cluster, for tests.
//!
//! [`FakeCluster`] implements both [`NamespaceManager`] and
//! [`ReleaseInstaller`] against in-memory state and counts every call.

use crate::error::{Error, Result};
use crate::namespace::NamespaceManager;
use crate::release::ReleaseInstaller;
use crate::types::ReleaseStatus;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

/// Call counters per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FakeCalls {
    pub ensure_namespace: u32,
    pub delete_namespace: u32,
    pub install: u32,
    pub uninstall: u32,
    pub status: u32,
}

#[derive(Default)]
struct FakeState {
    namespaces: BTreeMap<String, BTreeMap<String, String>>,
    releases: HashMap<String, ReleaseStatus>,
    last_values: HashMap<String, Value>,
    /// Status a release lands in after a successful install
    installed_status: Option<ReleaseStatus>,
    install_failure: Option<String>,
    namespace_failure: Option<String>,
    panic_on_status: HashSet<String>,
    install_delay: Option<Duration>,
    status_delay: Option<Duration>,
    status_in_flight: u32,
    max_status_in_flight: u32,
    calls: FakeCalls,
}

/// Fake cluster with namespaces and releases held in memory.
#[derive(Default)]
pub struct FakeCluster {
    state: Mutex<FakeState>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut FakeState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut state)
    }

    pub fn calls(&self) -> FakeCalls {
        self.with_state(|s| s.calls)
    }

    pub fn has_namespace(&self, name: &str) -> bool {
        self.with_state(|s| s.namespaces.contains_key(name))
    }

    pub fn namespace_labels(&self, name: &str) -> Option<BTreeMap<String, String>> {
        self.with_state(|s| s.namespaces.get(name).cloned())
    }

    pub fn add_namespace(&self, name: &str) {
        self.with_state(|s| {
            s.namespaces.insert(name.to_string(), BTreeMap::new());
        });
    }

    pub fn release_status(&self, release: &str) -> ReleaseStatus {
        self.with_state(|s| {
            s.releases
                .get(release)
                .copied()
                .unwrap_or(ReleaseStatus::NotFound)
        })
    }

    /// Force what `status` reports for a release.
    pub fn set_release_status(&self, release: &str, status: ReleaseStatus) {
        self.with_state(|s| {
            s.releases.insert(release.to_string(), status);
        });
    }

    /// Status a release reports right after a successful install
    /// (default `deployed`).
    pub fn set_installed_status(&self, status: ReleaseStatus) {
        self.with_state(|s| s.installed_status = Some(status));
    }

    /// Make every install fail with these diagnostics.
    pub fn fail_installs(&self, diagnostics: &str) {
        self.with_state(|s| s.install_failure = Some(diagnostics.to_string()));
    }

    /// Make namespace creation fail with this API reason.
    pub fn fail_namespaces(&self, reason: &str) {
        self.with_state(|s| s.namespace_failure = Some(reason.to_string()));
    }

    /// Panic when `status` is asked about this release.
    pub fn panic_on_status(&self, release: &str) {
        self.with_state(|s| {
            s.panic_on_status.insert(release.to_string());
        });
    }

    /// Make each install take this long after it has been counted.
    pub fn delay_installs(&self, delay: Duration) {
        self.with_state(|s| s.install_delay = Some(delay));
    }

    /// Make each status query take this long.
    pub fn delay_status(&self, delay: Duration) {
        self.with_state(|s| s.status_delay = Some(delay));
    }

    /// Most status queries ever seen running at the same time.
    pub fn max_concurrent_status(&self) -> u32 {
        self.with_state(|s| s.max_status_in_flight)
    }

    pub fn last_values(&self, release: &str) -> Option<Value> {
        self.with_state(|s| s.last_values.get(release).cloned())
    }

    /// Poll until `check` holds or `timeout` passes.
    pub async fn wait_for(&self, timeout: Duration, check: impl Fn(&FakeCluster) -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if check(self) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl NamespaceManager for FakeCluster {
    async fn ensure_namespace(&self, name: &str, labels: &BTreeMap<String, String>) -> Result<()> {
        self.with_state(|s| {
            s.calls.ensure_namespace += 1;
            if let Some(reason) = &s.namespace_failure {
                return Err(Error::Kubernetes {
                    reason: reason.clone(),
                    message: format!("cannot create namespace {}", name),
                });
            }
            if s.namespaces.contains_key(name) {
                return Err(Error::AlreadyExists(name.to_string()));
            }
            s.namespaces.insert(name.to_string(), labels.clone());
            Ok(())
        })
    }

    async fn delete_namespace(&self, name: &str) -> Result<()> {
        self.with_state(|s| {
            s.calls.delete_namespace += 1;
            s.namespaces.remove(name);
            // Releases live inside the namespace.
            s.releases.remove(name);
            Ok(())
        })
    }
}

#[async_trait]
impl ReleaseInstaller for FakeCluster {
    async fn install(&self, release: &str, namespace: &str, values: &Value) -> Result<()> {
        let delay = self.with_state(|s| {
            s.calls.install += 1;
            s.last_values.insert(release.to_string(), values.clone());
            if let Some(diagnostics) = &s.install_failure {
                s.releases.insert(release.to_string(), ReleaseStatus::Failed);
                return Err(Error::InstallFailed {
                    release: release.to_string(),
                    diagnostics: diagnostics.clone(),
                });
            }
            if !s.namespaces.contains_key(namespace) {
                return Err(Error::InstallFailed {
                    release: release.to_string(),
                    diagnostics: format!("namespaces \"{}\" not found", namespace),
                });
            }
            Ok(s.install_delay)
        })?;

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.with_state(|s| {
            let status = s.installed_status.unwrap_or(ReleaseStatus::Deployed);
            s.releases.insert(release.to_string(), status);
        });
        Ok(())
    }

    async fn uninstall(&self, release: &str, _namespace: &str) {
        self.with_state(|s| {
            s.calls.uninstall += 1;
            s.releases.remove(release);
        });
    }

    async fn status(&self, release: &str, _namespace: &str) -> ReleaseStatus {
        let (should_panic, delay) = self.with_state(|s| {
            s.calls.status += 1;
            s.status_in_flight += 1;
            s.max_status_in_flight = s.max_status_in_flight.max(s.status_in_flight);
            (s.panic_on_status.contains(release), s.status_delay)
        });

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let status = self.with_state(|s| {
            s.status_in_flight -= 1;
            s.releases.get(release).copied().unwrap_or(ReleaseStatus::NotFound)
        });
        if should_panic {
            panic!("status probe for {} blew up", release);
        }
        status
    }
}
