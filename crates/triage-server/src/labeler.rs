//! Label application on the support platform
//!
//! The band is written back as a label through the platform's GraphQL
//! `addLabels` mutation, using the label type configured for that band.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{debug, info};
use triage_core::{Error, PriorityBand, Result};

use crate::config::LabelConfig;

const ADD_LABELS_MUTATION: &str = "\
mutation addLabels($input: AddLabelsInput!) {
  addLabels(input: $input) {
    labels { id }
    error { message code }
  }
}";

/// Applies a priority label to a ticket
#[async_trait]
pub trait LabelApplier: Send + Sync {
    /// Label the ticket with the band
    async fn apply_label(&self, ticket_id: &str, band: PriorityBand) -> Result<()>;
}

/// GraphQL client for the support platform
pub struct GraphQlLabeler {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    label_type_ids: BTreeMap<PriorityBand, String>,
}

impl GraphQlLabeler {
    /// Create a labeler from label settings
    pub fn new(config: &LabelConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            label_type_ids: config.label_type_ids.clone(),
        })
    }

    /// Whether an API key is configured
    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    fn request_body(&self, ticket_id: &str, label_type_id: &str) -> serde_json::Value {
        json!({
            "query": ADD_LABELS_MUTATION,
            "variables": {
                "input": {
                    "threadId": ticket_id,
                    "labelTypeIds": [label_type_id],
                }
            }
        })
    }
}

#[async_trait]
impl LabelApplier for GraphQlLabeler {
    async fn apply_label(&self, ticket_id: &str, band: PriorityBand) -> Result<()> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::config("no support platform API key configured"))?;
        let label_type_id = self
            .label_type_ids
            .get(&band)
            .ok_or_else(|| Error::config(format!("no label type configured for {}", band)))?;

        debug!(ticket_id, %band, %label_type_id, "Applying label");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&self.request_body(ticket_id, label_type_id))
            .send()
            .await
            .map_err(|e| Error::transport(format!("label request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::transport(format!("label response read failed: {}", e)))?;

        if !status.is_success() {
            return Err(Error::transport(format!(
                "support platform returned {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        check_mutation_response(&body)?;
        info!(ticket_id, %band, "Label applied");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<AddLabelsData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddLabelsData {
    add_labels: Option<AddLabelsOutput>,
}

#[derive(Debug, Deserialize)]
struct AddLabelsOutput {
    #[serde(default)]
    error: Option<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

/// Surface GraphQL-level and mutation-level errors
fn check_mutation_response(body: &str) -> Result<()> {
    let response: GraphQlResponse = serde_json::from_str(body)
        .map_err(|e| Error::transport(format!("invalid GraphQL response: {}", e)))?;

    if let Some(error) = response.errors.first() {
        return Err(Error::transport(format!("GraphQL error: {}", error.message)));
    }

    match response.data.and_then(|d| d.add_labels) {
        Some(AddLabelsOutput { error: Some(error) }) => Err(Error::transport(format!(
            "addLabels failed: {}",
            error.message
        ))),
        Some(_) => Ok(()),
        None => Err(Error::transport("addLabels returned no data")),
    }
}
