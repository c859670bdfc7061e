//! Triage Classifiers
//!
//! Priority classification for support tickets.
//!
//! Two classifiers sit behind the [`PriorityClassifier`] trait:
//! - [`RuleClassifier`]: deterministic keyword, tier and age scoring (microseconds)
//! - [`LanguageModelClassifier`]: few-shot prompt against a text-generation API
//!
//! The [`HybridSelector`] picks one per ticket and falls back to the other
//! when it fails, so callers always get a result.

pub mod classifier;
pub mod config;
pub mod context;
pub mod generator;
pub mod hybrid;
pub mod language_model;
pub mod prompt;
pub mod registry;
pub mod response;
pub mod rules;

pub use classifier::PriorityClassifier;
pub use config::{ClassificationMode, ClassifierConfig, HistoryConfig, HybridConfig, ModelConfig};
pub use context::HistoricalContextProvider;
pub use generator::{GenerationRequest, OpenAiCompatibleGenerator, TextGenerator};
pub use hybrid::{ComparisonReport, HybridSelector, SideOutcome, SimpleCaseHeuristics};
pub use language_model::{keyword_fallback, LanguageModelClassifier};
pub use registry::{build_selector, build_selector_with_generator, load_rule_table};
pub use response::{parse_model_response, ParsedResponse};
pub use rules::{BandRule, BandScore, RuleClassifier, RuleEvaluator, RuleTable};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classifier::PriorityClassifier;
    pub use crate::config::{ClassificationMode, ClassifierConfig};
    pub use crate::hybrid::{ComparisonReport, HybridSelector};
    pub use crate::language_model::LanguageModelClassifier;
    pub use crate::rules::{RuleClassifier, RuleEvaluator, RuleTable};
}
