//! Classifier construction from configuration

use std::sync::Arc;
use tracing::{info, warn};
use triage_core::{ClassificationHistory, Result};

use crate::config::ClassifierConfig;
use crate::context::HistoricalContextProvider;
use crate::generator::{OpenAiCompatibleGenerator, TextGenerator};
use crate::hybrid::HybridSelector;
use crate::language_model::LanguageModelClassifier;
use crate::rules::{RuleClassifier, RuleTable};

/// Load the configured rule table, or the built-in one
pub fn load_rule_table(config: &ClassifierConfig) -> Result<RuleTable> {
    match &config.rules_path {
        Some(path) => {
            info!("Loading rule table from {}", path.display());
            RuleTable::from_file(path)
        }
        None => Ok(RuleTable::builtin()),
    }
}

/// Build the selector with the OpenAI-compatible generator
pub fn build_selector(
    config: &ClassifierConfig,
    history: Arc<dyn ClassificationHistory>,
) -> Result<HybridSelector> {
    let generator = Arc::new(OpenAiCompatibleGenerator::new(&config.model)?);
    build_selector_with_generator(config, history, generator)
}

/// Build the selector around an arbitrary text generator
pub fn build_selector_with_generator(
    config: &ClassifierConfig,
    history: Arc<dyn ClassificationHistory>,
    generator: Arc<dyn TextGenerator>,
) -> Result<HybridSelector> {
    let rules = Arc::new(RuleClassifier::new(Arc::new(load_rule_table(config)?))?);

    if !generator.has_credentials() {
        warn!(
            "No API key configured for {}; the language model path is unavailable",
            generator.provider()
        );
    }

    let context = HistoricalContextProvider::new(history)
        .with_max_text_chars(config.history.max_text_chars)
        .with_timeout(config.history.timeout());
    let model = Arc::new(
        LanguageModelClassifier::new(generator, context, config.model.clone())
            .with_history_window(config.history.window),
    );

    info!(
        "Classifier ready (mode: {:?}, provider: {}, model: {})",
        config.mode, config.model.provider, config.model.model
    );

    HybridSelector::new(rules, model, config.mode, &config.hybrid)
}
