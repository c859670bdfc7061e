//! Hybrid strategy selection
//!
//! Picks the rule evaluator or the language model per ticket, runs it, and
//! walks a fallback chain when it fails. [`HybridSelector::classify`] always
//! produces a result; the error-fallback at the end of the chain is static.
//!
//! Fallback chain:
//! - model failed: rules, tagged `rules-fallback`
//! - rules failed: the model if available (`ai-fallback`), otherwise the
//!   model's offline keyword fallback (`keyword-fallback`)
//! - both failed: P2, score 550, low confidence (`error-fallback`)

use regex::Regex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use triage_core::{
    ClassificationResult, Confidence, ConfidenceLevel, Error, Method, PriorityBand, Result,
    Strategy, Ticket,
};

use crate::classifier::PriorityClassifier;
use crate::config::{ClassificationMode, HybridConfig};

/// Score used when every classification path failed
pub const ERROR_FALLBACK_SCORE: u32 = 550;

const GREETING_PATTERN: &str =
    r"(?i)^\s*(hi|hey|hello|thanks|thank you|thx|ty|cheers|good (morning|afternoon|evening))\b";

/// Cheap checks for tickets the rule evaluator handles well
#[derive(Debug, Clone)]
pub struct SimpleCaseHeuristics {
    max_chars: usize,
    single_question_max_words: usize,
    greeting: Regex,
}

impl SimpleCaseHeuristics {
    /// Build heuristics from hybrid settings
    pub fn new(config: &HybridConfig) -> Result<Self> {
        let greeting = Regex::new(GREETING_PATTERN)
            .map_err(|e| Error::config(format!("invalid greeting pattern: {}", e)))?;

        Ok(Self {
            max_chars: config.simple_max_chars,
            single_question_max_words: config.single_question_max_words,
            greeting,
        })
    }

    /// Short text, a greeting, or one short question
    pub fn is_simple(&self, text: &str) -> bool {
        let text = text.trim();
        if text.chars().count() < self.max_chars {
            return true;
        }
        if self.greeting.is_match(text) {
            return true;
        }
        text.matches('?').count() == 1
            && text.split_whitespace().count() <= self.single_question_max_words
    }
}

/// Outcome of one side of a comparison run
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SideOutcome {
    Classified { result: ClassificationResult },
    Failed { error: String },
    /// The classifier was not called (e.g. no credentials)
    Unavailable,
}

impl SideOutcome {
    fn from_result(outcome: Result<ClassificationResult>) -> Self {
        match outcome {
            Ok(result) => Self::Classified { result },
            Err(e) => Self::Failed {
                error: e.to_string(),
            },
        }
    }

    /// The classification, if this side produced one
    pub fn result(&self) -> Option<&ClassificationResult> {
        match self {
            Self::Classified { result } => Some(result),
            _ => None,
        }
    }
}

/// Side-by-side run of both classifiers
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub rules: SideOutcome,
    pub model: SideOutcome,
    /// Set only when both sides classified
    pub bands_agree: Option<bool>,
    /// Absolute score difference on the 0-1000 scale
    pub score_delta: Option<u32>,
    /// Combined answer, set only when both sides classified
    pub reconciled: Option<ClassificationResult>,
}

/// Chooses and runs a classification strategy per ticket
pub struct HybridSelector {
    rules: Arc<dyn PriorityClassifier>,
    model: Arc<dyn PriorityClassifier>,
    mode: ClassificationMode,
    heuristics: SimpleCaseHeuristics,
}

impl HybridSelector {
    /// Create a selector
    pub fn new(
        rules: Arc<dyn PriorityClassifier>,
        model: Arc<dyn PriorityClassifier>,
        mode: ClassificationMode,
        config: &HybridConfig,
    ) -> Result<Self> {
        Ok(Self {
            rules,
            model,
            mode,
            heuristics: SimpleCaseHeuristics::new(config)?,
        })
    }

    /// Configured mode
    pub fn mode(&self) -> ClassificationMode {
        self.mode
    }

    /// Whether the model path can be attempted
    pub fn model_available(&self) -> bool {
        self.model.is_available()
    }

    /// Decide which classifier handles the ticket
    pub fn choose_strategy(&self, ticket: &Ticket) -> Strategy {
        choose_strategy(
            self.mode,
            self.model.is_available(),
            self.heuristics.is_simple(&ticket.text()),
        )
    }

    /// Classify a ticket; never fails
    pub async fn classify(&self, ticket: &Ticket) -> ClassificationResult {
        let start = Instant::now();
        let strategy = self.choose_strategy(ticket);
        debug!(ticket_id = %ticket.id, %strategy, "Chose classification strategy");

        let primary = match strategy {
            Strategy::Rules => self.rules.classify(ticket).await,
            Strategy::Ai => self.model.classify(ticket).await,
        };

        let (mut result, fallback_used) = match primary {
            Ok(result) => (result, false),
            Err(primary_err) => {
                warn!(
                    ticket_id = %ticket.id,
                    %strategy,
                    error = %primary_err,
                    "Primary classifier failed, falling back"
                );
                let result = match self.fallback(strategy, ticket).await {
                    Ok(result) => result,
                    Err(fallback_err) => {
                        warn!(
                            ticket_id = %ticket.id,
                            error = %fallback_err,
                            "Fallback classifier failed, using static result"
                        );
                        error_fallback(&primary_err, &fallback_err)
                    }
                };
                (result, true)
            }
        };

        result.strategy = Some(strategy);
        result.fallback_used = fallback_used;
        result.latency_us = start.elapsed().as_micros() as u64;

        info!(
            ticket_id = %ticket.id,
            band = %result.band,
            score = result.score,
            method = %result.method,
            fallback_used,
            "Ticket classified"
        );
        result
    }

    async fn fallback(&self, failed: Strategy, ticket: &Ticket) -> Result<ClassificationResult> {
        match failed {
            Strategy::Ai => {
                let mut result = self.rules.classify(ticket).await?;
                result.method = Method::RulesFallback;
                Ok(result)
            }
            Strategy::Rules if self.model.is_available() => {
                let mut result = self.model.classify(ticket).await?;
                result.method = Method::AiFallback;
                Ok(result)
            }
            Strategy::Rules => self
                .model
                .offline_fallback(&ticket.text())
                .map(|mut result| {
                    result.method = Method::KeywordFallback;
                    result
                })
                .ok_or_else(|| Error::internal("no offline fallback available")),
        }
    }

    /// Run both classifiers concurrently and report how they differ
    pub async fn compare(&self, ticket: &Ticket) -> ComparisonReport {
        let model_available = self.model.is_available();
        let (rules, model) = tokio::join!(self.rules.classify(ticket), async {
            if model_available {
                Some(self.model.classify(ticket).await)
            } else {
                None
            }
        });

        let rules = SideOutcome::from_result(rules);
        let model = model.map_or(SideOutcome::Unavailable, SideOutcome::from_result);

        let (bands_agree, score_delta, reconciled) = match (rules.result(), model.result()) {
            (Some(r), Some(m)) => (
                Some(r.band == m.band),
                Some(r.score.abs_diff(m.score)),
                Some(reconcile(r, m)),
            ),
            _ => (None, None, None),
        };

        ComparisonReport {
            rules,
            model,
            bands_agree,
            score_delta,
            reconciled,
        }
    }
}

/// Strategy decision from mode, model availability and the simple-case check
pub fn choose_strategy(mode: ClassificationMode, model_available: bool, simple: bool) -> Strategy {
    match mode {
        ClassificationMode::RulesOnly => Strategy::Rules,
        ClassificationMode::AiOnly if model_available => Strategy::Ai,
        ClassificationMode::AiOnly => Strategy::Rules,
        ClassificationMode::Hybrid if !model_available || simple => Strategy::Rules,
        ClassificationMode::Hybrid => Strategy::Ai,
    }
}

/// Merge a rules result and a model result into one `combined` answer.
///
/// Agreeing bands keep the more urgent score and the higher confidence.
/// Disagreeing bands go to the more confident side, ties to the more urgent
/// band.
pub fn reconcile(rules: &ClassificationResult, model: &ClassificationResult) -> ClassificationResult {
    let rules_conf = rules.normalized_confidence();
    let model_conf = model.normalized_confidence();

    if rules.band == model.band {
        let mut result = ClassificationResult::new(
            rules.band,
            Confidence::Score(rules_conf.max(model_conf)),
            Method::Combined,
            rules.score.min(model.score),
        )
        .with_reasoning(format!("rules and model agree on {}", rules.band));
        result.raw_scores = rules.raw_scores.clone();
        return result;
    }

    let model_wins = model_conf > rules_conf || (model_conf == rules_conf && model.band < rules.band);
    let (winner, side) = if model_wins {
        (model, "model")
    } else {
        (rules, "rules")
    };

    let mut result = winner.clone();
    result.method = Method::Combined;
    result.strategy = None;
    result.fallback_used = false;
    result.reasoning = Some(format!(
        "{} preferred ({} at {:.2}) over {} ({} at {:.2})",
        side,
        winner.band,
        winner.normalized_confidence(),
        if model_wins { "rules" } else { "model" },
        if model_wins { rules.band } else { model.band },
        if model_wins { rules_conf } else { model_conf },
    ));
    result
}

/// Static result when every path failed
pub fn error_fallback(primary: &Error, fallback: &Error) -> ClassificationResult {
    ClassificationResult::new(
        PriorityBand::DEFAULT,
        Confidence::Level(ConfidenceLevel::Low),
        Method::ErrorFallback,
        ERROR_FALLBACK_SCORE,
    )
    .with_reasoning(format!(
        "classification failed (primary: {}; fallback: {})",
        primary, fallback
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heuristics() -> SimpleCaseHeuristics {
        SimpleCaseHeuristics::new(&HybridConfig::default()).unwrap()
    }

    #[test]
    fn test_strategy_table() {
        use ClassificationMode::*;

        assert_eq!(choose_strategy(RulesOnly, true, false), Strategy::Rules);
        assert_eq!(choose_strategy(AiOnly, true, true), Strategy::Ai);
        assert_eq!(choose_strategy(AiOnly, false, false), Strategy::Rules);
        assert_eq!(choose_strategy(Hybrid, true, true), Strategy::Rules);
        assert_eq!(choose_strategy(Hybrid, true, false), Strategy::Ai);
        assert_eq!(choose_strategy(Hybrid, false, false), Strategy::Rules);
    }

    #[test]
    fn test_short_text_is_simple() {
        assert!(heuristics().is_simple("hey thanks!"));
        assert!(heuristics().is_simple("Login broken"));
    }

    #[test]
    fn test_greeting_is_simple() {
        let text = "Hello team, I wanted to follow up on the migration we discussed last week with your engineers";
        assert!(heuristics().is_simple(text));
    }

    #[test]
    fn test_single_short_question_is_simple() {
        let text = "Where can I find the invoice settings for my workspace account?";
        assert!(text.chars().count() >= 50);
        assert!(heuristics().is_simple(text));
    }

    #[test]
    fn test_long_report_is_not_simple() {
        let text = "Since this morning every API call from our backend returns a 502 and our customers cannot check out. Is anything happening on your side? Also, is there a status page?";
        assert!(!heuristics().is_simple(text));
    }

    fn result(band: PriorityBand, confidence: Confidence, score: u32) -> ClassificationResult {
        ClassificationResult::new(band, confidence, Method::Rules, score)
    }

    #[test]
    fn test_reconcile_agreeing_bands() {
        let rules = result(PriorityBand::P1, Confidence::Score(0.5), 300);
        let model = result(PriorityBand::P1, Confidence::Level(ConfidenceLevel::High), 220);

        let combined = reconcile(&rules, &model);
        assert_eq!(combined.band, PriorityBand::P1);
        assert_eq!(combined.score, 220);
        assert_eq!(combined.confidence, Confidence::Score(0.9));
        assert_eq!(combined.method, Method::Combined);
    }

    #[test]
    fn test_reconcile_disagreeing_bands_prefers_confidence() {
        let rules = result(PriorityBand::P3, Confidence::Score(0.95), 715);
        let model = result(PriorityBand::P1, Confidence::Level(ConfidenceLevel::High), 220);

        let combined = reconcile(&rules, &model);
        assert_eq!(combined.band, PriorityBand::P3);
        assert_eq!(combined.score, 715);
        assert_eq!(combined.method, Method::Combined);
    }

    #[test]
    fn test_reconcile_tie_goes_to_more_urgent_band() {
        let rules = result(PriorityBand::P0, Confidence::Score(0.9), 15);
        let model = result(PriorityBand::P2, Confidence::Level(ConfidenceLevel::High), 500);
        assert_eq!(reconcile(&rules, &model).band, PriorityBand::P0);

        let rules = result(PriorityBand::P2, Confidence::Score(0.9), 431);
        let model = result(PriorityBand::P1, Confidence::Level(ConfidenceLevel::High), 200);
        assert_eq!(reconcile(&rules, &model).band, PriorityBand::P1);
    }

    #[test]
    fn test_error_fallback() {
        let result = error_fallback(
            &Error::transport("connection refused"),
            &Error::internal("rules unavailable"),
        );
        assert_eq!(result.band, PriorityBand::P2);
        assert_eq!(result.score, ERROR_FALLBACK_SCORE);
        assert!(result.method.is_fallback());
        let reasoning = result.reasoning.unwrap();
        assert!(reasoning.contains("connection refused"));
        assert!(reasoning.contains("rules unavailable"));
    }
}
