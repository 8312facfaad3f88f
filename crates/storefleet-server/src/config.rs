//! Server configuration.
//!
//! Configuration is loaded from multiple sources with precedence:
//! 1. Environment variables (STOREFLEET_*, plus PORT and DATABASE_PATH)
//! 2. Config file ($STOREFLEET_DIR/config.toml, default ~/.storefleet)
//! 3. Default values

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use storefleet_core::release::HelmConfig;
use storefleet_core::values::ValuesConfig;
use storefleet_core::ProvisionerConfig;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path the config file was read from (may not exist)
    #[serde(skip)]
    pub config_path: PathBuf,

    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub log_format: LogFormat,

    // Release installer
    pub helm_bin: String,
    pub kubectl_bin: String,
    pub chart: String,
    pub chart_repo_name: String,
    pub chart_repo_url: String,
    pub values_dir: PathBuf,
    pub install_timeout_secs: u64,

    // Orchestrator
    pub reconcile_interval_secs: u64,
    pub delete_timeout_secs: u64,
    pub managed_by: String,

    // Store values
    pub store_domain: String,
    pub public_port: u16,
    pub ingress_class: String,
    pub storage_class: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::with_base_dir(&default_base_dir())
    }
}

fn default_base_dir() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".storefleet")
}

impl Config {
    fn with_base_dir(base_dir: &Path) -> Self {
        Self {
            config_path: base_dir.join("config.toml"),
            host: "0.0.0.0".to_string(),
            port: 3001,
            database_path: base_dir.join("storefleet.db"),
            log_format: LogFormat::Text,
            helm_bin: "helm".to_string(),
            kubectl_bin: "kubectl".to_string(),
            chart: "bitnami/wordpress".to_string(),
            chart_repo_name: "bitnami".to_string(),
            chart_repo_url: "https://charts.bitnami.com/bitnami".to_string(),
            values_dir: std::env::temp_dir().join("storefleet-values"),
            install_timeout_secs: 600,
            reconcile_interval_secs: 10,
            delete_timeout_secs: 900,
            managed_by: "store-provisioning-platform".to_string(),
            store_domain: "localhost".to_string(),
            public_port: 8080,
            ingress_class: "traefik".to_string(),
            storage_class: "local-path".to_string(),
        }
    }

    /// Load configuration from the process environment
    pub fn load() -> Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load configuration, reading variables through `env`
    pub fn load_with(env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base_dir = env("STOREFLEET_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_base_dir);

        let defaults = Self::with_base_dir(&base_dir);
        let config_path = defaults.config_path.clone();

        let mut config = if config_path.exists() {
            let raw = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            Self::from_toml(&raw, &base_dir)
                .with_context(|| format!("Invalid config file {}", config_path.display()))?
        } else {
            defaults
        };
        config.config_path = config_path;

        config.apply_env(&env)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document on top of the defaults for `base_dir`
    fn from_toml(raw: &str, base_dir: &Path) -> Result<Self> {
        let partial: toml::Value = toml::from_str(raw)?;
        let mut merged = toml::Value::try_from(Self::with_base_dir(base_dir))?;
        if let (Some(target), toml::Value::Table(source)) = (merged.as_table_mut(), partial) {
            for (key, value) in source {
                target.insert(key, value);
            }
        }
        Ok(merged.try_into()?)
    }

    fn apply_env(&mut self, env: &impl Fn(&str) -> Option<String>) -> Result<()> {
        fn parse<T: std::str::FromStr>(key: &str, value: String) -> Result<T> {
            value
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid value for {}: {}", key, value))
        }

        if let Some(v) = env("STOREFLEET_HOST") {
            self.host = v;
        }
        if let Some(v) = env("STOREFLEET_PORT").or_else(|| env("PORT")) {
            self.port = parse("PORT", v)?;
        }
        if let Some(v) = env("STOREFLEET_DATABASE_PATH").or_else(|| env("DATABASE_PATH")) {
            self.database_path = PathBuf::from(v);
        }
        if let Some(v) = env("STOREFLEET_LOG_FORMAT") {
            self.log_format = match v.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "text" => LogFormat::Text,
                _ => bail!("Invalid value for STOREFLEET_LOG_FORMAT: {}", v),
            };
        }
        if let Some(v) = env("STOREFLEET_HELM") {
            self.helm_bin = v;
        }
        if let Some(v) = env("STOREFLEET_KUBECTL") {
            self.kubectl_bin = v;
        }
        if let Some(v) = env("STOREFLEET_CHART") {
            self.chart = v;
        }
        if let Some(v) = env("STOREFLEET_CHART_REPO_NAME") {
            self.chart_repo_name = v;
        }
        if let Some(v) = env("STOREFLEET_CHART_REPO_URL") {
            self.chart_repo_url = v;
        }
        if let Some(v) = env("STOREFLEET_VALUES_DIR") {
            self.values_dir = PathBuf::from(v);
        }
        if let Some(v) = env("STOREFLEET_INSTALL_TIMEOUT_SECS") {
            self.install_timeout_secs = parse("STOREFLEET_INSTALL_TIMEOUT_SECS", v)?;
        }
        if let Some(v) = env("STOREFLEET_RECONCILE_INTERVAL_SECS") {
            self.reconcile_interval_secs = parse("STOREFLEET_RECONCILE_INTERVAL_SECS", v)?;
        }
        if let Some(v) = env("STOREFLEET_DELETE_TIMEOUT_SECS") {
            self.delete_timeout_secs = parse("STOREFLEET_DELETE_TIMEOUT_SECS", v)?;
        }
        if let Some(v) = env("STOREFLEET_MANAGED_BY") {
            self.managed_by = v;
        }
        if let Some(v) = env("STOREFLEET_STORE_DOMAIN") {
            self.store_domain = v;
        }
        if let Some(v) = env("STOREFLEET_PUBLIC_PORT") {
            self.public_port = parse("STOREFLEET_PUBLIC_PORT", v)?;
        }
        if let Some(v) = env("STOREFLEET_INGRESS_CLASS") {
            self.ingress_class = v;
        }
        if let Some(v) = env("STOREFLEET_STORAGE_CLASS") {
            self.storage_class = v;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.reconcile_interval_secs == 0 {
            bail!("reconcile_interval_secs must be greater than zero");
        }
        if self.install_timeout_secs == 0 {
            bail!("install_timeout_secs must be greater than zero");
        }
        if self.store_domain.trim().is_empty() {
            bail!("store_domain must not be empty");
        }
        Ok(())
    }

    /// Address the HTTP server binds to
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn delete_timeout(&self) -> Duration {
        Duration::from_secs(self.delete_timeout_secs)
    }

    pub fn provisioner_config(&self) -> ProvisionerConfig {
        ProvisionerConfig {
            domain: self.store_domain.clone(),
            public_port: Some(self.public_port),
            managed_by: self.managed_by.clone(),
            reconcile_interval: Duration::from_secs(self.reconcile_interval_secs),
        }
    }

    pub fn values_config(&self) -> ValuesConfig {
        ValuesConfig {
            domain: self.store_domain.clone(),
            ingress_class: self.ingress_class.clone(),
            storage_class: self.storage_class.clone(),
            ..ValuesConfig::default()
        }
    }

    pub fn helm_config(&self) -> HelmConfig {
        HelmConfig {
            helm: self.helm_bin.clone(),
            chart: self.chart.clone(),
            repo_name: self.chart_repo_name.clone(),
            repo_url: self.chart_repo_url.clone(),
            values_dir: self.values_dir.clone(),
            install_timeout: Duration::from_secs(self.install_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.port, 3001);
        assert_eq!(config.reconcile_interval_secs, 10);
        assert_eq!(config.install_timeout_secs, 600);
        assert_eq!(config.chart, "bitnami/wordpress");
        assert!(config.config_path.ends_with("config.toml"));
        assert!(config.database_path.ends_with("storefleet.db"));
    }

    #[test]
    fn test_load_without_file_uses_defaults_under_base_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let base = temp_dir.path().to_string_lossy().to_string();

        let config = Config::load_with(env_from(&[("STOREFLEET_DIR", &base)])).unwrap();
        assert!(config.config_path.starts_with(temp_dir.path()));
        assert!(config.database_path.starts_with(temp_dir.path()));
        assert_eq!(config.listen_addr(), "0.0.0.0:3001");
    }

    #[test]
    fn test_config_file_then_env_precedence() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(
            temp_dir.path().join("config.toml"),
            "port = 4000\nstore_domain = \"shops.example.com\"\nreconcile_interval_secs = 5\n",
        )
        .unwrap();
        let base = temp_dir.path().to_string_lossy().to_string();

        let config = Config::load_with(env_from(&[
            ("STOREFLEET_DIR", &base),
            ("PORT", "5000"),
            ("STOREFLEET_LOG_FORMAT", "json"),
        ]))
        .unwrap();

        // Env beats file, file beats defaults.
        assert_eq!(config.port, 5000);
        assert_eq!(config.store_domain, "shops.example.com");
        assert_eq!(config.reconcile_interval_secs, 5);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.chart_repo_name, "bitnami");
        assert!(config.database_path.starts_with(temp_dir.path()));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let base = temp_dir.path().to_string_lossy().to_string();

        assert!(Config::load_with(env_from(&[("STOREFLEET_DIR", &base), ("PORT", "http")])).is_err());
        assert!(Config::load_with(env_from(&[
            ("STOREFLEET_DIR", &base),
            ("STOREFLEET_RECONCILE_INTERVAL_SECS", "0"),
        ]))
        .is_err());
        assert!(Config::load_with(env_from(&[
            ("STOREFLEET_DIR", &base),
            ("STOREFLEET_LOG_FORMAT", "xml"),
        ]))
        .is_err());
    }

    #[test]
    fn test_derived_component_configs() {
        let mut config = Config::default();
        config.store_domain = "shops.example.com".to_string();
        config.public_port = 443;
        config.install_timeout_secs = 120;

        let provisioner = config.provisioner_config();
        assert_eq!(provisioner.domain, "shops.example.com");
        assert_eq!(provisioner.public_port, Some(443));
        assert_eq!(provisioner.reconcile_interval, Duration::from_secs(10));

        assert_eq!(config.values_config().domain, "shops.example.com");
        assert_eq!(
            config.helm_config().install_timeout,
            Duration::from_secs(120)
        );
    }
}
