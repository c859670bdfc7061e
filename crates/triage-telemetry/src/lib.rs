//! Triage Telemetry
//!
//! Audit storage and metrics for the triage service.
//!
//! Provides:
//! - A JSON-lines classification store implementing the audit-store contract
//! - In-process counters for the stats endpoint, mirrored to Prometheus

pub mod metrics;
pub mod store;

pub use metrics::{MetricsCollector, MetricsSnapshot};
pub use store::{ClassificationStore, StoreConfig};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::metrics::MetricsCollector;
    pub use crate::store::ClassificationStore;
}
