//! Classifier trait shared by the rule and language-model paths

use async_trait::async_trait;
use triage_core::{ClassificationResult, Result, Ticket};

/// Trait for all priority classifiers
#[async_trait]
pub trait PriorityClassifier: Send + Sync {
    /// Classify the given ticket
    async fn classify(&self, ticket: &Ticket) -> Result<ClassificationResult>;

    /// Get the classifier name
    fn name(&self) -> &str;

    /// Whether the classifier can run at all (e.g. has credentials)
    fn is_available(&self) -> bool {
        true
    }

    /// Network-free classification used when `classify` cannot be attempted
    fn offline_fallback(&self, _text: &str) -> Option<ClassificationResult> {
        None
    }
}
