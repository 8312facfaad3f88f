//! Packaged application releases.
//!
//! A release is one installed instance of the store chart inside a store
//! namespace. `install` is not atomic: a timed-out or interrupted call may
//! still leave a working release behind, which is why the orchestrator
//! decides store health from `status` alone.

mod helm;

pub use helm::{parse_status_json, HelmConfig, HelmInstaller};

use crate::error::Result;
use crate::types::ReleaseStatus;
use async_trait::async_trait;
use serde_json::Value;

/// Package manager operations on a named release.
#[async_trait]
pub trait ReleaseInstaller: Send + Sync {
    /// Install `release` into `namespace` with the given values document.
    ///
    /// Blocks until the package manager reports completion or the install
    /// timeout passes. Fails with `InstallFailed` or `InstallTimedOut`.
    async fn install(&self, release: &str, namespace: &str, values: &Value) -> Result<()>;

    /// Remove a release. Failures are logged by the implementation and
    /// never returned; namespace deletion reclaims whatever is left.
    async fn uninstall(&self, release: &str, namespace: &str);

    /// Last reported outcome of a release. Query errors read as `NotFound`.
    async fn status(&self, release: &str, namespace: &str) -> ReleaseStatus;
}
