//! Audit-store contract
//!
//! The historical context provider reads past classifications through this
//! trait and the webhook flow writes new ones. Implementations live outside
//! the classification core.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::types::{ClassificationResult, HistoricalExample, PriorityBand};

/// Persisted audit record for one ticket, keyed by ticket id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredClassification {
    /// Ticket id (unique key)
    pub id: String,

    /// Ticket text at classification time
    pub text: String,

    /// Priority score on the 0-1000 scale
    pub score: u32,

    /// Assigned band
    pub band: PriorityBand,

    /// Classifier reasoning
    pub reasoning: Option<String>,

    /// Method tag (e.g. "rules", "ai-openai", "rules-fallback")
    pub method: String,

    /// When the classification was stored
    pub processed_at: DateTime<Utc>,
}

impl StoredClassification {
    /// Build a record from a classification result
    pub fn from_result(
        id: impl Into<String>,
        text: impl Into<String>,
        result: &ClassificationResult,
        processed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            score: result.score,
            band: result.band,
            reasoning: result.reasoning.clone(),
            method: result.method.to_string(),
            processed_at,
        }
    }

    /// View this record as a few-shot example (text untruncated)
    pub fn to_example(&self) -> HistoricalExample {
        HistoricalExample {
            text: self.text.clone(),
            score: self.score,
            band: self.band,
            reasoning: self.reasoning.clone(),
        }
    }
}

/// Aggregate over recent classifications
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriorityStats {
    /// Window the aggregate covers
    pub window_days: u32,

    /// Number of classifications in the window
    pub total: usize,

    /// Count per band
    pub by_band: BTreeMap<PriorityBand, usize>,

    /// Mean priority score, if any records exist
    pub average_score: Option<f64>,
}

/// Backing store for audit records
#[async_trait]
pub trait ClassificationHistory: Send + Sync {
    /// Most recently processed records, newest first, at most `limit`
    async fn recent_tickets(&self, limit: usize) -> Result<Vec<StoredClassification>>;

    /// Aggregate over records processed in the last `window_days`
    async fn priority_stats(&self, window_days: u32) -> Result<PriorityStats>;

    /// Insert or overwrite the record for `record.id`
    async fn upsert(&self, record: StoredClassification) -> Result<()>;
}
