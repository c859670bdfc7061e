//! Webhook event handling
//!
//! A handled event is turned into a [`Ticket`], classified, labeled when the
//! confidence clears the auto-label threshold, and written to the audit
//! store. Labeling and persistence failures are reported in the outcome and
//! never fail the classification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use triage_core::{ClassificationResult, StoredClassification, Ticket};

use crate::state::AppState;

/// Inbound webhook event from the support platform
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    /// Delivery id, when the platform sends one
    #[serde(default)]
    pub id: Option<String>,

    /// Event type, e.g. `thread.created`
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,

    pub payload: EventPayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventPayload {
    pub thread: ThreadPayload,

    #[serde(default)]
    pub customer: CustomerPayload,

    /// Latest message, present on email events
    #[serde(default)]
    pub message: Option<MessagePayload>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadPayload {
    pub id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub preview_text: String,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerPayload {
    #[serde(default)]
    pub tier: String,

    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagePayload {
    #[serde(default)]
    pub text: String,
}

impl WebhookEvent {
    /// Build the ticket this event refers to.
    ///
    /// The message text wins over the thread preview; the creation time
    /// falls back to the event timestamp, then to `received_at`.
    pub fn to_ticket(&self, received_at: DateTime<Utc>) -> Ticket {
        let thread = &self.payload.thread;
        let body = self
            .payload
            .message
            .as_ref()
            .map(|m| m.text.as_str())
            .filter(|text| !text.trim().is_empty())
            .unwrap_or(&thread.preview_text);

        Ticket::new(thread.id.clone(), body)
            .with_title(thread.title.clone())
            .with_tier(self.payload.customer.tier.clone())
            .created_at(thread.created_at.or(self.timestamp).unwrap_or(received_at))
    }

    /// Delivery id, generated when missing
    pub fn delivery_id(&self) -> String {
        self.id
            .clone()
            .unwrap_or_else(|| format!("evt_{}", uuid::Uuid::new_v4()))
    }
}

/// What happened to the priority label
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LabelOutcome {
    Applied,
    /// Confidence below the auto-label threshold
    ManualTriage { threshold: f64 },
    Failed { error: String },
}

/// Result of processing one handled event
#[derive(Debug, Clone, Serialize)]
pub struct WebhookOutcome {
    pub event_id: String,
    pub ticket_id: String,
    pub classification: ClassificationResult,
    pub label: LabelOutcome,
    pub stored: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_error: Option<String>,
}

/// Classify, label and persist the ticket behind a handled event
pub async fn process_event(state: &AppState, event: &WebhookEvent) -> WebhookOutcome {
    let ticket = event.to_ticket(Utc::now());
    let text = ticket.text();

    // Empty tickets still classify (rules default to P2); the selector never fails
    let result = state.selector.classify(&ticket).await;
    state.metrics.record_classification(&result);

    let label = apply_label(state, &ticket.id, &result).await;

    let record = StoredClassification::from_result(ticket.id.as_str(), text, &result, Utc::now());
    let store_error = match state.store.upsert(record).await {
        Ok(()) => None,
        Err(e) => {
            warn!(ticket_id = %ticket.id, "Failed to persist classification: {}", e);
            state.metrics.record_store_failure();
            Some(e.to_string())
        }
    };

    WebhookOutcome {
        event_id: event.delivery_id(),
        ticket_id: ticket.id,
        classification: result,
        label,
        stored: store_error.is_none(),
        store_error,
    }
}

async fn apply_label(state: &AppState, ticket_id: &str, result: &ClassificationResult) -> LabelOutcome {
    let threshold = state.config.labels.auto_label_threshold;
    if !result.exceeds_threshold(threshold) {
        info!(
            ticket_id,
            confidence = result.normalized_confidence(),
            threshold,
            "Confidence below threshold, leaving for manual triage"
        );
        state.metrics.record_manual_triage();
        return LabelOutcome::ManualTriage { threshold };
    }

    match state.labeler.apply_label(ticket_id, result.band).await {
        Ok(()) => {
            state.metrics.record_label_applied();
            LabelOutcome::Applied
        }
        Err(e) => {
            warn!(ticket_id, band = %result.band, "Failed to apply label: {}", e);
            state.metrics.record_label_failure();
            LabelOutcome::Failed {
                error: e.to_string(),
            }
        }
    }
}
