use std::path::{Path, PathBuf};

use anyhow::Result;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::domain::travel_order::WorkflowPolicy;

const CONFIG_FILE: &str = "travel-workflow.toml";
const ENV_PREFIX: &str = "TRAVEL_WORKFLOW";

/// Runtime configuration for the workflow service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub logging: LoggingConfig,
    pub workflow: WorkflowSection,
    pub store: StoreConfig,
    pub notifications: NotificationConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` wins when set
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,travel_order_workflow=debug".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowSection {
    pub order_number_prefix: String,
    /// Rejections allowed before one becomes final; unset means unlimited
    pub max_rounds: Option<u32>,
    /// JSON hierarchy table; the built-in table is used when unset
    pub hierarchy_path: Option<PathBuf>,
}

impl Default for WorkflowSection {
    fn default() -> Self {
        Self {
            order_number_prefix: "R1".to_string(),
            max_rounds: None,
            hierarchy_path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Scylla,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub known_nodes: Vec<String>,
    pub keyspace: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            known_nodes: vec!["127.0.0.1:9042".to_string()],
            keyspace: "travel_orders".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationBackend {
    #[default]
    Log,
    Redpanda,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub backend: NotificationBackend,
    pub brokers: String,
    pub topic: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            backend: NotificationBackend::Log,
            brokers: "127.0.0.1:9092".to_string(),
            topic: "travel-order-notifications".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 9090,
        }
    }
}

impl WorkflowConfig {
    /// Load configuration with precedence:
    /// 1. Default values
    /// 2. `travel-workflow.toml` in the working directory, if present
    /// 3. Environment variables, e.g. `TRAVEL_WORKFLOW_STORE__BACKEND=scylla`
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut builder = Config::builder();

        if path.exists() {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("store.known_nodes")
                .try_parsing(true),
        );

        let config: WorkflowConfig = builder.build()?.try_deserialize()?;
        tracing::debug!(?config, "Loaded workflow configuration");
        Ok(config)
    }

    /// Parse a TOML document layered over the defaults
    pub fn from_toml(toml: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    pub fn policy(&self) -> WorkflowPolicy {
        WorkflowPolicy {
            max_rounds: self.workflow.max_rounds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkflowConfig::default();
        assert_eq!(config.workflow.order_number_prefix, "R1");
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.notifications.backend, NotificationBackend::Log);
        assert!(config.metrics.enabled);
        assert_eq!(config.policy(), WorkflowPolicy::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = WorkflowConfig::from_toml(
            r#"
            [workflow]
            max_rounds = 3

            [store]
            backend = "scylla"
            keyspace = "to_prod"
            "#,
        )
        .unwrap();

        assert_eq!(config.policy().max_rounds, Some(3));
        assert_eq!(config.store.backend, StoreBackend::Scylla);
        assert_eq!(config.store.keyspace, "to_prod");
        assert_eq!(config.store.known_nodes, vec!["127.0.0.1:9042".to_string()]);
        assert_eq!(config.workflow.order_number_prefix, "R1");
        assert_eq!(config.metrics.port, 9090);
    }

    #[test]
    fn test_unknown_backend_is_an_error() {
        let result = WorkflowConfig::from_toml(
            r#"
            [notifications]
            backend = "carrier_pigeon"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = WorkflowConfig::load_from(Path::new("/nonexistent/travel-workflow.toml")).unwrap();
        assert_eq!(config.workflow, WorkflowSection::default());
    }
}
