//! Deployment values for a store release.
//!
//! Pure function of the store identity plus a secure random source. Writing
//! the document somewhere the package manager can read it is the
//! installer's job.

use crate::types::{resource_name, store_hostname};
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use serde_json::{json, Value};

/// Length of the generated application admin password.
pub const ADMIN_PASSWORD_LEN: usize = 16;
/// Length of the generated database passwords.
pub const DATABASE_PASSWORD_LEN: usize = 20;

/// Knobs for the generated values document.
#[derive(Debug, Clone)]
pub struct ValuesConfig {
    /// Domain suffix for store hostnames (`store-<id>.<domain>`)
    pub domain: String,
    pub ingress_class: String,
    pub storage_class: String,
    pub app_storage_size: String,
    pub database_storage_size: String,
}

impl Default for ValuesConfig {
    fn default() -> Self {
        Self {
            domain: "localhost".to_string(),
            ingress_class: "traefik".to_string(),
            storage_class: "local-path".to_string(),
            app_storage_size: "5Gi".to_string(),
            database_storage_size: "10Gi".to_string(),
        }
    }
}

/// Generate a random printable password of `len` characters from the OS RNG.
pub fn generate_password(len: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Builds values documents for store releases.
#[derive(Debug, Clone, Default)]
pub struct ValuesGenerator {
    config: ValuesConfig,
}

impl ValuesGenerator {
    pub fn new(config: ValuesConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValuesConfig {
        &self.config
    }

    /// Values document for one store, with freshly generated secrets.
    pub fn generate(&self, store_id: &str, store_name: &str) -> Value {
        let cfg = &self.config;

        json!({
            "wordpressBlogName": store_name,
            "wordpressUsername": "admin",
            "wordpressPassword": generate_password(ADMIN_PASSWORD_LEN),
            "wordpressEmail": format!("admin@{}.local", resource_name(store_id)),

            "ingress": {
                "enabled": true,
                "ingressClassName": cfg.ingress_class,
                "hostname": store_hostname(store_id, &cfg.domain),
                "path": "/",
                "pathType": "Prefix",
            },

            "service": {
                "type": "ClusterIP",
            },

            "networkPolicy": { "enabled": false },

            "mariadb": {
                "networkPolicy": { "enabled": false },
                "auth": {
                    "rootPassword": generate_password(DATABASE_PASSWORD_LEN),
                    "database": "bitnami_wordpress",
                    "username": "bn_wordpress",
                    "password": generate_password(DATABASE_PASSWORD_LEN),
                },
                "primary": {
                    "persistence": {
                        "enabled": true,
                        "storageClass": cfg.storage_class,
                        "size": cfg.database_storage_size,
                    },
                },
            },

            "persistence": {
                "enabled": true,
                "storageClass": cfg.storage_class,
                "size": cfg.app_storage_size,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_password() {
        let password = generate_password(16);
        assert_eq!(password.len(), 16);
        assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(generate_password(16), generate_password(16));
    }

    #[test]
    fn test_generate_values_identity() {
        let values = ValuesGenerator::default().generate("abc123", "Acme Shop");

        assert_eq!(values["wordpressBlogName"], "Acme Shop");
        assert_eq!(values["wordpressUsername"], "admin");
        assert_eq!(values["wordpressEmail"], "admin@store-abc123.local");
        assert_eq!(values["ingress"]["hostname"], "store-abc123.localhost");
        assert_eq!(values["ingress"]["ingressClassName"], "traefik");
        assert_eq!(values["persistence"]["size"], "5Gi");
        assert_eq!(values["mariadb"]["primary"]["persistence"]["size"], "10Gi");
    }

    #[test]
    fn test_generate_values_secrets() {
        let values = ValuesGenerator::default().generate("abc123", "Acme Shop");

        let admin = values["wordpressPassword"].as_str().unwrap();
        let root = values["mariadb"]["auth"]["rootPassword"].as_str().unwrap();
        let app = values["mariadb"]["auth"]["password"].as_str().unwrap();

        assert_eq!(admin.len(), ADMIN_PASSWORD_LEN);
        assert_eq!(root.len(), DATABASE_PASSWORD_LEN);
        assert_eq!(app.len(), DATABASE_PASSWORD_LEN);
        assert_ne!(root, app);
    }

    #[test]
    fn test_generate_values_uses_config() {
        let generator = ValuesGenerator::new(ValuesConfig {
            domain: "shops.example.com".to_string(),
            ingress_class: "nginx".to_string(),
            storage_class: "gp3".to_string(),
            app_storage_size: "1Gi".to_string(),
            database_storage_size: "2Gi".to_string(),
        });
        let values = generator.generate("xyz", "Shop");

        assert_eq!(values["ingress"]["hostname"], "store-xyz.shops.example.com");
        assert_eq!(values["ingress"]["ingressClassName"], "nginx");
        assert_eq!(values["persistence"]["storageClass"], "gp3");
        assert_eq!(values["mariadb"]["primary"]["persistence"]["size"], "2Gi");
    }
}
