//! Isolated namespaces on the cluster.
//!
//! `ensure_namespace` reports an existing namespace as
//! [`Error::AlreadyExists`] so the caller decides whether that is fine;
//! `delete_namespace` treats an absent namespace as success. Deletion returns
//! as soon as the API server accepts it; sub-resources are reclaimed later.

use crate::error::{Error, Result};
use crate::exec;
use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Label carrying the store id on every store namespace.
pub const LABEL_STORE_ID: &str = "store-id";
/// Label naming the system that owns the namespace.
pub const LABEL_MANAGED_BY: &str = "managed-by";

/// Identity labels for a store namespace.
pub fn identity_labels(store_id: &str, managed_by: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_STORE_ID.to_string(), store_id.to_string()),
        (LABEL_MANAGED_BY.to_string(), managed_by.to_string()),
    ])
}

/// Cluster namespace operations.
#[async_trait]
pub trait NamespaceManager: Send + Sync {
    /// Create a labelled namespace. Fails with `AlreadyExists` if present.
    async fn ensure_namespace(&self, name: &str, labels: &BTreeMap<String, String>) -> Result<()>;

    /// Delete a namespace and everything in it. Absent is success.
    async fn delete_namespace(&self, name: &str) -> Result<()>;
}

/// [`NamespaceManager`] backed by the `kubectl` CLI.
#[derive(Debug, Clone)]
pub struct KubectlNamespaces {
    kubectl: String,
}

impl KubectlNamespaces {
    pub fn new(kubectl: impl Into<String>) -> Self {
        Self {
            kubectl: kubectl.into(),
        }
    }

    /// Check that kubectl is installed
    pub fn check(&self) -> Result<()> {
        exec::check_binary(&self.kubectl)
    }
}

impl Default for KubectlNamespaces {
    fn default() -> Self {
        Self::new("kubectl")
    }
}

#[async_trait]
impl NamespaceManager for KubectlNamespaces {
    async fn ensure_namespace(&self, name: &str, labels: &BTreeMap<String, String>) -> Result<()> {
        let manifest = namespace_manifest(name, labels);
        let payload = serde_json::to_vec(&manifest)?;
        let args = vec!["create".to_string(), "-f".to_string(), "-".to_string()];

        let output = exec::run(&self.kubectl, &args, Some(&payload)).await?;
        if output.success {
            info!(namespace = %name, "Created namespace");
            return Ok(());
        }

        match server_reason(&output.stderr) {
            Some(reason) if reason == "AlreadyExists" => {
                debug!(namespace = %name, "Namespace already exists");
                Err(Error::AlreadyExists(name.to_string()))
            }
            Some(reason) => Err(Error::Kubernetes {
                reason,
                message: output.diagnostics(),
            }),
            None => Err(Error::command_failed(
                exec::display_command(&self.kubectl, &args),
                output.diagnostics(),
            )),
        }
    }

    async fn delete_namespace(&self, name: &str) -> Result<()> {
        let args = vec![
            "delete".to_string(),
            "namespace".to_string(),
            name.to_string(),
            "--wait=false".to_string(),
        ];

        let output = exec::run(&self.kubectl, &args, None).await?;
        if output.success {
            info!(namespace = %name, "Namespace deletion requested");
            return Ok(());
        }

        match server_reason(&output.stderr) {
            Some(reason) if reason == "NotFound" => {
                debug!(namespace = %name, "Namespace already gone");
                Ok(())
            }
            Some(reason) => Err(Error::Kubernetes {
                reason,
                message: output.diagnostics(),
            }),
            None => Err(Error::command_failed(
                exec::display_command(&self.kubectl, &args),
                output.diagnostics(),
            )),
        }
    }
}

/// Namespace object as accepted by `kubectl create -f -`.
pub fn namespace_manifest(name: &str, labels: &BTreeMap<String, String>) -> serde_json::Value {
    json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": {
            "name": name,
            "labels": labels,
        }
    })
}

/// Extract the API status reason from kubectl stderr.
///
/// kubectl prints API failures as `Error from server (<Reason>): <message>`.
pub fn server_reason(stderr: &str) -> Option<String> {
    const MARKER: &str = "Error from server (";
    let start = stderr.find(MARKER)? + MARKER.len();
    let rest = &stderr[start..];
    let end = rest.find(')')?;
    let reason = rest[..end].trim();
    if reason.is_empty() {
        None
    } else {
        Some(reason.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_reason() {
        assert_eq!(
            server_reason(
                "Error from server (AlreadyExists): error when creating \"STDIN\": namespaces \"store-abc\" already exists\n"
            ),
            Some("AlreadyExists".to_string())
        );
        assert_eq!(
            server_reason("Error from server (NotFound): namespaces \"store-abc\" not found"),
            Some("NotFound".to_string())
        );
        assert_eq!(
            server_reason("The connection to the server localhost:8080 was refused"),
            None
        );
        assert_eq!(server_reason("Error from server (): odd"), None);
    }

    #[test]
    fn test_namespace_manifest_carries_labels() {
        let labels = identity_labels("abc123", "store-provisioning-platform");
        let manifest = namespace_manifest("store-abc123", &labels);

        assert_eq!(manifest["kind"], "Namespace");
        assert_eq!(manifest["metadata"]["name"], "store-abc123");
        assert_eq!(manifest["metadata"]["labels"]["store-id"], "abc123");
        assert_eq!(
            manifest["metadata"]["labels"]["managed-by"],
            "store-provisioning-platform"
        );
    }

    #[cfg(unix)]
    mod with_fake_kubectl {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        /// Write an executable shell script standing in for kubectl.
        fn fake_kubectl(dir: &std::path::Path, body: &str) -> String {
            let path = dir.join("kubectl");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path.to_string_lossy().to_string()
        }

        #[tokio::test]
        async fn test_ensure_namespace_created() {
            let dir = tempfile::tempdir().unwrap();
            let stdin_copy = dir.path().join("manifest.json");
            let kubectl = fake_kubectl(
                dir.path(),
                &format!("cat > {}\necho 'namespace/store-abc created'", stdin_copy.display()),
            );

            let namespaces = KubectlNamespaces::new(kubectl);
            let labels = identity_labels("abc", "test");
            namespaces.ensure_namespace("store-abc", &labels).await.unwrap();

            let manifest: serde_json::Value =
                serde_json::from_str(&std::fs::read_to_string(stdin_copy).unwrap()).unwrap();
            assert_eq!(manifest["metadata"]["labels"]["store-id"], "abc");
        }

        #[tokio::test]
        async fn test_ensure_namespace_already_exists() {
            let dir = tempfile::tempdir().unwrap();
            let kubectl = fake_kubectl(
                dir.path(),
                "cat > /dev/null\necho 'Error from server (AlreadyExists): namespaces \"store-abc\" already exists' >&2\nexit 1",
            );

            let namespaces = KubectlNamespaces::new(kubectl);
            let err = namespaces
                .ensure_namespace("store-abc", &BTreeMap::new())
                .await
                .unwrap_err();
            assert!(matches!(err, Error::AlreadyExists(name) if name == "store-abc"));
        }

        #[tokio::test]
        async fn test_ensure_namespace_other_failure_propagates() {
            let dir = tempfile::tempdir().unwrap();
            let kubectl = fake_kubectl(
                dir.path(),
                "cat > /dev/null\necho 'Error from server (Forbidden): namespaces is forbidden' >&2\nexit 1",
            );

            let namespaces = KubectlNamespaces::new(kubectl);
            let err = namespaces
                .ensure_namespace("store-abc", &BTreeMap::new())
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Kubernetes { reason, .. } if reason == "Forbidden"));
        }

        #[tokio::test]
        async fn test_delete_absent_namespace_is_success() {
            let dir = tempfile::tempdir().unwrap();
            let kubectl = fake_kubectl(
                dir.path(),
                "echo 'Error from server (NotFound): namespaces \"store-abc\" not found' >&2\nexit 1",
            );

            let namespaces = KubectlNamespaces::new(kubectl);
            namespaces.delete_namespace("store-abc").await.unwrap();
        }

        #[tokio::test]
        async fn test_delete_connection_failure_propagates() {
            let dir = tempfile::tempdir().unwrap();
            let kubectl = fake_kubectl(
                dir.path(),
                "echo 'The connection to the server was refused' >&2\nexit 1",
            );

            let namespaces = KubectlNamespaces::new(kubectl);
            let err = namespaces.delete_namespace("store-abc").await.unwrap_err();
            assert!(matches!(err, Error::CommandFailed { .. }));
        }
    }
}
