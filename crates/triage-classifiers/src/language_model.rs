//! Language-model classifier
//!
//! Builds a few-shot prompt from recent classifications, calls the
//! text-generation API once (no retry), and validates the answer. Callers
//! own any fallback; this classifier only offers a network-free keyword
//! fallback for when the remote call cannot be attempted.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use triage_core::{
    ClassificationResult, Confidence, ConfidenceLevel, Error, Method, PriorityBand, Result, Ticket,
};

use crate::classifier::PriorityClassifier;
use crate::config::ModelConfig;
use crate::context::HistoricalContextProvider;
use crate::generator::{GenerationRequest, TextGenerator};
use crate::prompt::build_prompt;
use crate::response::parse_model_response;

/// Default number of few-shot examples
pub const DEFAULT_HISTORY_WINDOW: usize = 12;

const FALLBACK_KEYWORDS: [(PriorityBand, &[&str]); 4] = [
    (
        PriorityBand::P0,
        &["outage", "down", "data loss", "breach", "emergency"],
    ),
    (PriorityBand::P1, &["error", "broken", "bug", "payment", "crash"]),
    (PriorityBand::P2, &["how do", "how to", "question", "help"]),
    (
        PriorityBand::P3,
        &["feature request", "suggestion", "feedback", "thanks"],
    ),
];

/// Priority classifier backed by a text-generation API
pub struct LanguageModelClassifier {
    generator: Arc<dyn TextGenerator>,
    context: HistoricalContextProvider,
    config: ModelConfig,
    history_window: usize,
}

impl LanguageModelClassifier {
    /// Create a classifier
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        context: HistoricalContextProvider,
        config: ModelConfig,
    ) -> Self {
        Self {
            generator,
            context,
            config,
            history_window: DEFAULT_HISTORY_WINDOW,
        }
    }

    /// Set how many recent classifications feed the prompt
    pub fn with_history_window(mut self, history_window: usize) -> Self {
        self.history_window = history_window;
        self
    }

    /// Provider tag
    pub fn provider(&self) -> &str {
        self.generator.provider()
    }

    /// Classify free ticket text
    pub async fn classify_text(&self, ticket_text: &str) -> Result<ClassificationResult> {
        let start = Instant::now();

        if ticket_text.trim().is_empty() {
            return Err(Error::invalid_input("ticket text is empty"));
        }

        let examples = self.context.fetch(self.history_window).await;
        let prompt = build_prompt(ticket_text, &examples, self.config.structured_output);
        debug!(
            "Built prompt with {} historical examples ({} chars)",
            examples.len(),
            prompt.len()
        );

        let request = GenerationRequest {
            prompt,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            json_output: self.config.structured_output,
        };

        let timeout = self.config.timeout();
        let text = tokio::time::timeout(timeout, self.generator.generate(&request))
            .await
            .map_err(|_| Error::Timeout(timeout.as_millis() as u64))??;

        let parsed = parse_model_response(&text)?;

        let mut result = ClassificationResult::new(
            parsed.band,
            Confidence::Level(ConfidenceLevel::High),
            Method::ai(self.provider()),
            parsed.score,
        );
        result.reasoning = parsed.reasoning;
        result.latency_us = start.elapsed().as_micros() as u64;

        info!(
            band = %result.band,
            score = result.score,
            latency_ms = start.elapsed().as_millis() as u64,
            "Model classification complete"
        );
        Ok(result)
    }

    /// Network-free classification from a small curated keyword list
    pub fn keyword_fallback(&self, text: &str) -> ClassificationResult {
        keyword_fallback(text)
    }
}

/// Network-free classification from a small curated keyword list.
///
/// The first band (most urgent first) with a hit wins; no hit means P2.
pub fn keyword_fallback(text: &str) -> ClassificationResult {
    let content = text.to_lowercase();
    let hit = FALLBACK_KEYWORDS.iter().find_map(|(band, keywords)| {
        keywords
            .iter()
            .find(|keyword| content.contains(*keyword))
            .map(|keyword| (*band, *keyword))
    });

    let confidence = ConfidenceLevel::Low;
    let (band, reasoning) = match hit {
        Some((band, keyword)) => (band, format!("keyword fallback matched '{}'", keyword)),
        None => (
            PriorityBand::DEFAULT,
            "keyword fallback found no match".to_string(),
        ),
    };

    ClassificationResult::new(
        band,
        Confidence::Level(confidence),
        Method::KeywordFallback,
        band.score_for_confidence(confidence.as_f64()),
    )
    .with_reasoning(reasoning)
}

#[async_trait]
impl PriorityClassifier for LanguageModelClassifier {
    async fn classify(&self, ticket: &Ticket) -> Result<ClassificationResult> {
        self.classify_text(&ticket.text()).await
    }

    fn name(&self) -> &str {
        "language-model"
    }

    fn is_available(&self) -> bool {
        self.generator.has_credentials()
    }

    fn offline_fallback(&self, text: &str) -> Option<ClassificationResult> {
        Some(self.keyword_fallback(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use triage_core::{ClassificationHistory, PriorityStats, StoredClassification};

    struct ScriptedGenerator {
        reply: Result<String>,
        delay: Option<std::time::Duration>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                delay: None,
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        fn provider(&self) -> &str {
            "scripted"
        }

        fn has_credentials(&self) -> bool {
            true
        }

        async fn generate(&self, request: &GenerationRequest) -> Result<String> {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(Error::transport(e.to_string())),
            }
        }
    }

    struct OneRecordStore;

    #[async_trait]
    impl ClassificationHistory for OneRecordStore {
        async fn recent_tickets(&self, _limit: usize) -> Result<Vec<StoredClassification>> {
            Ok(vec![StoredClassification {
                id: "old-1".to_string(),
                text: "Invoices page crashes".to_string(),
                score: 250,
                band: PriorityBand::P1,
                reasoning: Some("billing broken".to_string()),
                method: "ai-scripted".to_string(),
                processed_at: chrono::Utc::now(),
            }])
        }

        async fn priority_stats(&self, _window_days: u32) -> Result<PriorityStats> {
            Ok(PriorityStats::default())
        }

        async fn upsert(&self, _record: StoredClassification) -> Result<()> {
            Ok(())
        }
    }

    fn classifier(generator: Arc<ScriptedGenerator>) -> LanguageModelClassifier {
        LanguageModelClassifier::new(
            generator,
            HistoricalContextProvider::new(Arc::new(OneRecordStore)),
            ModelConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_classify_text() {
        let generator = Arc::new(ScriptedGenerator::replying(
            "priority_score: 60\npriority_band: P0\nreasoning: Outage for all users.",
        ));
        let classifier = classifier(generator.clone());

        let result = classifier
            .classify_text("The site is completely down for everyone")
            .await
            .unwrap();

        assert_eq!(result.band, PriorityBand::P0);
        assert_eq!(result.score, 60);
        assert_eq!(result.confidence, Confidence::Level(ConfidenceLevel::High));
        assert_eq!(result.method.to_string(), "ai-scripted");
        assert_eq!(result.reasoning.as_deref(), Some("Outage for all users."));

        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].contains("Ticket: Invoices page crashes"));
        assert!(prompts[0].contains("The site is completely down for everyone"));
    }

    #[tokio::test]
    async fn test_score_clamped_to_band() {
        let generator = Arc::new(ScriptedGenerator::replying(
            "priority_score: 900\npriority_band: P1\nreasoning: Billing issue.",
        ));
        let result = classifier(generator)
            .classify_text("I was charged twice")
            .await
            .unwrap();

        assert_eq!(result.band, PriorityBand::P1);
        assert_eq!(result.score, 400);
    }

    #[tokio::test]
    async fn test_empty_text_is_invalid_input() {
        let generator = Arc::new(ScriptedGenerator::replying("unused"));
        let err = classifier(generator.clone())
            .classify_text("   ")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(generator.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unparsable_reply() {
        let generator = Arc::new(ScriptedGenerator::replying("This looks important!"));
        let err = classifier(generator).classify_text("help").await.unwrap_err();
        assert!(matches!(err, Error::UnparsableResponse(_)));
    }

    #[tokio::test]
    async fn test_transport_failure_is_not_retried() {
        let generator = Arc::new(ScriptedGenerator {
            reply: Err(Error::transport("connection reset")),
            delay: None,
            prompts: Mutex::new(Vec::new()),
        });
        let err = classifier(generator.clone())
            .classify_text("help")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(generator.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let generator = Arc::new(ScriptedGenerator {
            reply: Ok("priority_score: 60\npriority_band: P0".to_string()),
            delay: Some(std::time::Duration::from_secs(120)),
            prompts: Mutex::new(Vec::new()),
        });
        let err = classifier(generator).classify_text("help").await.unwrap_err();
        assert!(matches!(err, Error::Timeout(30_000)));
    }

    #[test]
    fn test_keyword_fallback() {
        let result = keyword_fallback("Our API is DOWN and we see errors");
        assert_eq!(result.band, PriorityBand::P0);
        assert_eq!(result.method, Method::KeywordFallback);
        assert_eq!(result.confidence, Confidence::Level(ConfidenceLevel::Low));

        assert_eq!(keyword_fallback("Got a bug in exports").band, PriorityBand::P1);
        assert_eq!(keyword_fallback("Feature request: dark mode").band, PriorityBand::P3);

        let none = keyword_fallback("");
        assert_eq!(none.band, PriorityBand::P2);
        assert!(PriorityBand::P2.score_range().contains(&none.score));
    }
}
