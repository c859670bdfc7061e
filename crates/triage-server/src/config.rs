//! Service configuration
//!
//! Loaded from YAML; secrets and the listen address can be overridden from
//! the command line or environment (see [`Cli`]).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::warn;
use triage_classifiers::ClassifierConfig;
use triage_core::PriorityBand;
use triage_telemetry::StoreConfig;

use crate::cli::Cli;
use crate::security::{validate_outbound_url, OutboundUrlPolicy};

/// Service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Inbound webhook settings
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Classification settings
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Label application settings
    #[serde(default)]
    pub labels: LabelConfig,

    /// Audit store settings
    #[serde(default)]
    pub store: StoreConfig,
}

impl ServiceConfig {
    /// Load configuration from file and CLI overrides
    pub fn load(config_path: &str, cli: &Cli) -> anyhow::Result<Self> {
        let mut config = if Path::new(config_path).exists() {
            let content = std::fs::read_to_string(config_path)?;
            Self::from_yaml(&content)?
        } else {
            warn!("Config file {} not found, using defaults", config_path);
            Self::default()
        };

        config.apply_overrides(cli);
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from YAML
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Apply CLI and environment overrides
    pub fn apply_overrides(&mut self, cli: &Cli) {
        if let Some(listen) = &cli.listen {
            self.server.listen = listen.clone();
        }
        if let Some(port) = cli.port {
            self.server.port = port;
        }
        if let Some(mode) = cli.mode {
            self.classifier.mode = mode;
        }
        if let Some(secret) = &cli.webhook_secret {
            self.webhook.secret = Some(secret.clone());
        }
        if let Some(key) = &cli.support_api_key {
            self.labels.api_key = Some(key.clone());
        }
        if let Some(key) = &cli.model_api_key {
            self.classifier.model.api_key = Some(key.clone());
        }
    }

    /// Check outbound URLs and thresholds
    pub fn validate(&self) -> anyhow::Result<()> {
        let policy = if self.server.development {
            OutboundUrlPolicy::development()
        } else {
            OutboundUrlPolicy::default()
        };

        validate_outbound_url(&self.labels.endpoint, &policy)
            .map_err(|e| anyhow::anyhow!("labels.endpoint: {}", e))?;
        validate_outbound_url(&self.classifier.model.base_url, &policy)
            .map_err(|e| anyhow::anyhow!("classifier.model.base_url: {}", e))?;

        if !(0.0..=1.0).contains(&self.labels.auto_label_threshold) {
            anyhow::bail!(
                "labels.auto_label_threshold must be within 0..=1, got {}",
                self.labels.auto_label_threshold
            );
        }
        Ok(())
    }

    /// Socket address string for the listener
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.listen, self.server.port)
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum accepted request body
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Window for the priority stats endpoint
    #[serde(default = "default_stats_window_days")]
    pub stats_window_days: u32,

    /// Allow plain HTTP and local addresses for outbound calls
    #[serde(default)]
    pub development: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
            stats_window_days: default_stats_window_days(),
            development: false,
        }
    }
}

/// Inbound webhook settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// HMAC-SHA256 secret; signatures are not checked when unset
    #[serde(default, skip_serializing)]
    pub secret: Option<String>,

    /// Header carrying the hex signature
    #[serde(default = "default_signature_header")]
    pub signature_header: String,

    /// Event types that trigger classification
    #[serde(default = "default_handled_events")]
    pub handled_events: Vec<String>,
}

impl WebhookConfig {
    /// Configured secret, ignoring blank values
    pub fn secret(&self) -> Option<&str> {
        self.secret.as_deref().filter(|s| !s.trim().is_empty())
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret: None,
            signature_header: default_signature_header(),
            handled_events: default_handled_events(),
        }
    }
}

/// Label application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelConfig {
    /// Support platform GraphQL endpoint
    #[serde(default = "default_label_endpoint")]
    pub endpoint: String,

    /// API key for the support platform
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Label type id to apply per band
    #[serde(default)]
    pub label_type_ids: BTreeMap<PriorityBand, String>,

    /// Minimum normalized confidence for automatic labeling
    #[serde(default = "default_auto_label_threshold")]
    pub auto_label_threshold: f64,

    /// Request timeout in seconds
    #[serde(default = "default_label_timeout_secs")]
    pub timeout_secs: u64,
}

impl LabelConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            endpoint: default_label_endpoint(),
            api_key: None,
            label_type_ids: BTreeMap::new(),
            auto_label_threshold: default_auto_label_threshold(),
            timeout_secs: default_label_timeout_secs(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

fn default_stats_window_days() -> u32 {
    7
}

fn default_signature_header() -> String {
    "x-webhook-signature".to_string()
}

fn default_handled_events() -> Vec<String> {
    vec![
        "thread.created".to_string(),
        "thread.email_received".to_string(),
    ]
}

fn default_label_endpoint() -> String {
    "https://core-api.uk.plain.com/graphql/v1".to_string()
}

fn default_auto_label_threshold() -> f64 {
    0.7
}

fn default_label_timeout_secs() -> u64 {
    10
}
