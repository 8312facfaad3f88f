//! `helm` CLI backed release installer.

use super::ReleaseInstaller;
use crate::error::{Error, Result};
use crate::exec::{self, RunOutcome};
use crate::types::ReleaseStatus;
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

/// Extra client-side time on top of helm's own `--timeout`.
const CLIENT_GRACE: Duration = Duration::from_secs(30);

/// Helm installer settings
#[derive(Debug, Clone)]
pub struct HelmConfig {
    /// helm binary
    pub helm: String,
    /// Chart reference, e.g. `bitnami/wordpress`
    pub chart: String,
    /// Chart repository name and URL added at startup
    pub repo_name: String,
    pub repo_url: String,
    /// Directory for per-release values files
    pub values_dir: PathBuf,
    /// Passed to `helm install --timeout`
    pub install_timeout: Duration,
}

impl Default for HelmConfig {
    fn default() -> Self {
        Self {
            helm: "helm".to_string(),
            chart: "bitnami/wordpress".to_string(),
            repo_name: "bitnami".to_string(),
            repo_url: "https://charts.bitnami.com/bitnami".to_string(),
            values_dir: std::env::temp_dir().join("storefleet-values"),
            install_timeout: Duration::from_secs(600),
        }
    }
}

/// [`ReleaseInstaller`] that shells out to `helm`.
#[derive(Debug, Clone)]
pub struct HelmInstaller {
    config: HelmConfig,
}

impl HelmInstaller {
    pub fn new(config: HelmConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HelmConfig {
        &self.config
    }

    /// Check that helm is installed
    pub fn check(&self) -> Result<()> {
        exec::check_binary(&self.config.helm)
    }

    /// Add the chart repository and refresh the index.
    ///
    /// An already-registered repository is not an error.
    pub async fn ensure_repository(&self) -> Result<()> {
        let add = vec![
            "repo".to_string(),
            "add".to_string(),
            self.config.repo_name.clone(),
            self.config.repo_url.clone(),
        ];
        let output = exec::run(&self.config.helm, &add, None).await?;
        if !output.success && !output.stderr.contains("already exists") {
            return Err(Error::command_failed(
                exec::display_command(&self.config.helm, &add),
                output.diagnostics(),
            ));
        }

        let update = vec!["repo".to_string(), "update".to_string()];
        let output = exec::run(&self.config.helm, &update, None).await?;
        if !output.success {
            return Err(Error::command_failed(
                exec::display_command(&self.config.helm, &update),
                output.diagnostics(),
            ));
        }

        info!(repo = %self.config.repo_name, "Chart repository ready");
        Ok(())
    }

    /// Create the values directory, readable by the owner only.
    async fn prepare_values_dir(&self) -> Result<()> {
        let dir = &self.config.values_dir;
        let mut builder = tokio::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(0o700);
        builder.create(dir).await?;

        // An existing directory keeps whatever mode it was created with.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700)).await?;
        }
        Ok(())
    }

    /// Write a values document to a fresh owner-only file.
    async fn write_values_file(&self, path: &std::path::Path, values: &Value) -> Result<()> {
        let payload = serde_json::to_vec_pretty(values)?;

        if let Err(e) = tokio::fs::remove_file(path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(e.into());
            }
        }

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(path).await?;
        file.write_all(&payload).await?;
        file.flush().await?;
        Ok(())
    }

    fn values_path(&self, release: &str) -> PathBuf {
        self.config.values_dir.join(format!("{}.json", release))
    }

    fn install_args(&self, release: &str, namespace: &str, values_path: &std::path::Path) -> Vec<String> {
        vec![
            "install".to_string(),
            release.to_string(),
            self.config.chart.clone(),
            "--namespace".to_string(),
            namespace.to_string(),
            "-f".to_string(),
            values_path.to_string_lossy().to_string(),
            "--wait".to_string(),
            "--timeout".to_string(),
            format!("{}s", self.config.install_timeout.as_secs()),
        ]
    }

    async fn run_install(&self, release: &str, namespace: &str, values: &Value) -> Result<()> {
        let values_path = self.values_path(release);
        // JSON is valid YAML, so helm reads this directly.
        self.write_values_file(&values_path, values).await?;

        let args = self.install_args(release, namespace, &values_path);
        let deadline = self.config.install_timeout + CLIENT_GRACE;

        info!(release = %release, namespace = %namespace, "Installing release");
        match exec::run_with_timeout(&self.config.helm, &args, None, deadline).await? {
            RunOutcome::Finished(output) if output.success => {
                debug!(release = %release, stdout = %output.stdout.trim(), "helm install output");
                info!(release = %release, "Release installed");
                Ok(())
            }
            RunOutcome::Finished(output) => {
                error!(release = %release, stderr = %output.stderr.trim(), "helm install failed");
                Err(Error::InstallFailed {
                    release: release.to_string(),
                    diagnostics: output.diagnostics(),
                })
            }
            RunOutcome::TimedOut => Err(Error::InstallTimedOut {
                release: release.to_string(),
                timeout_secs: deadline.as_secs(),
            }),
        }
    }
}

#[async_trait]
impl ReleaseInstaller for HelmInstaller {
    async fn install(&self, release: &str, namespace: &str, values: &Value) -> Result<()> {
        self.prepare_values_dir().await?;

        let result = self.run_install(release, namespace, values).await;

        // The values file holds generated secrets.
        if let Err(e) = tokio::fs::remove_file(self.values_path(release)).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(release = %release, error = %e, "Failed to remove values file");
            }
        }

        result
    }

    async fn uninstall(&self, release: &str, namespace: &str) {
        let args = vec![
            "uninstall".to_string(),
            release.to_string(),
            "-n".to_string(),
            namespace.to_string(),
        ];

        info!(release = %release, namespace = %namespace, "Uninstalling release");
        match exec::run(&self.config.helm, &args, None).await {
            Ok(output) if output.success => info!(release = %release, "Release uninstalled"),
            Ok(output) => warn!(
                release = %release,
                stderr = %output.diagnostics(),
                "helm uninstall failed (ignored)"
            ),
            Err(e) => warn!(release = %release, error = %e, "helm uninstall failed (ignored)"),
        }
    }

    async fn status(&self, release: &str, namespace: &str) -> ReleaseStatus {
        let args = vec![
            "status".to_string(),
            release.to_string(),
            "-n".to_string(),
            namespace.to_string(),
            "-o".to_string(),
            "json".to_string(),
        ];

        match exec::run(&self.config.helm, &args, None).await {
            Ok(output) if output.success => parse_status_json(&output.stdout),
            Ok(output) => {
                debug!(release = %release, stderr = %output.diagnostics(), "helm status unavailable");
                ReleaseStatus::NotFound
            }
            Err(e) => {
                debug!(release = %release, error = %e, "helm status query failed");
                ReleaseStatus::NotFound
            }
        }
    }
}

/// Read `info.status` from `helm status -o json` output.
pub fn parse_status_json(stdout: &str) -> ReleaseStatus {
    serde_json::from_str::<Value>(stdout)
        .ok()
        .and_then(|v| {
            v.get("info")
                .and_then(|info| info.get("status"))
                .and_then(Value::as_str)
                .map(ReleaseStatus::parse)
        })
        .unwrap_or(ReleaseStatus::NotFound)
}
