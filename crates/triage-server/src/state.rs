//! Shared application state

use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tracing::{info, warn};
use triage_classifiers::{build_selector, HybridSelector};
use triage_core::ClassificationHistory;
use triage_telemetry::{ClassificationStore, MetricsCollector};

use crate::config::ServiceConfig;
use crate::labeler::{GraphQlLabeler, LabelApplier};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub selector: Arc<HybridSelector>,
    pub store: Arc<dyn ClassificationHistory>,
    pub labeler: Arc<dyn LabelApplier>,
    pub metrics: MetricsCollector,
    pub metrics_handle: PrometheusHandle,
}

impl AppState {
    /// Open the audit store and build the classifiers and labeler
    pub fn new(config: ServiceConfig, metrics_handle: PrometheusHandle) -> anyhow::Result<Self> {
        let store = Arc::new(ClassificationStore::from_config(&config.store)?);
        info!(
            "Audit store opened at {} ({} records)",
            store.path().display(),
            store.len()
        );

        let selector = build_selector(&config.classifier, store.clone())?;

        let labeler = GraphQlLabeler::new(&config.labels)?;
        if !labeler.has_credentials() {
            warn!("No support platform API key configured; labels will not be applied");
        }
        if config.webhook.secret().is_none() {
            warn!("No webhook secret configured; signature verification is disabled");
        }

        Ok(Self::from_parts(
            config,
            Arc::new(selector),
            store,
            Arc::new(labeler),
            metrics_handle,
        ))
    }

    /// Assemble state from prebuilt components
    pub fn from_parts(
        config: ServiceConfig,
        selector: Arc<HybridSelector>,
        store: Arc<dyn ClassificationHistory>,
        labeler: Arc<dyn LabelApplier>,
        metrics_handle: PrometheusHandle,
    ) -> Self {
        Self {
            config: Arc::new(config),
            selector,
            store,
            labeler,
            metrics: MetricsCollector::new(),
            metrics_handle,
        }
    }
}
