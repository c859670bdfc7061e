//! Configuration for the classification core

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::context::DEFAULT_MAX_TEXT_CHARS;

/// Configuration for all classifiers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Which classifier runs by default
    #[serde(default)]
    pub mode: ClassificationMode,

    /// Rule table file; the built-in table is used when unset
    #[serde(default)]
    pub rules_path: Option<PathBuf>,

    /// Simple-case heuristics for hybrid mode
    #[serde(default)]
    pub hybrid: HybridConfig,

    /// Language model settings
    #[serde(default)]
    pub model: ModelConfig,

    /// Historical context settings
    #[serde(default)]
    pub history: HistoryConfig,
}

/// Classifier selection mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClassificationMode {
    /// Only the rule evaluator
    RulesOnly,
    /// The language model when available, rules otherwise
    #[default]
    AiOnly,
    /// Rules for simple tickets, the language model for the rest
    Hybrid,
}

impl std::str::FromStr for ClassificationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rules-only" | "rules" => Ok(Self::RulesOnly),
            "ai-only" | "ai" => Ok(Self::AiOnly),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(format!(
                "unknown classification mode '{}' (expected rules-only, ai-only or hybrid)",
                other
            )),
        }
    }
}

/// Thresholds for the simple-case heuristics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridConfig {
    /// Messages shorter than this (in characters) are simple
    #[serde(default = "default_simple_max_chars")]
    pub simple_max_chars: usize,

    /// A single question with at most this many words is simple
    #[serde(default = "default_single_question_max_words")]
    pub single_question_max_words: usize,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            simple_max_chars: default_simple_max_chars(),
            single_question_max_words: default_single_question_max_words(),
        }
    }
}

/// Text-generation API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider tag used in `ai-<provider>` method names
    #[serde(default = "default_provider")]
    pub provider: String,

    /// OpenAI-compatible API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_model")]
    pub model: String,

    /// API key; the model path is unavailable without one
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Output token budget
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Ask the provider for a JSON object instead of labeled lines
    #[serde(default)]
    pub structured_output: bool,
}

impl ModelConfig {
    /// Request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            structured_output: false,
        }
    }
}

/// Sliding-window settings for few-shot examples
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Number of recent classifications to include
    #[serde(default = "default_window")]
    pub window: usize,

    /// Character budget per example
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,

    /// Store fetch timeout in milliseconds
    #[serde(default = "default_history_timeout_ms")]
    pub timeout_ms: u64,
}

impl HistoryConfig {
    /// Store fetch timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            max_text_chars: default_max_text_chars(),
            timeout_ms: default_history_timeout_ms(),
        }
    }
}

fn default_simple_max_chars() -> usize {
    50
}

fn default_single_question_max_words() -> usize {
    12
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    300
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_window() -> usize {
    12
}

fn default_max_text_chars() -> usize {
    DEFAULT_MAX_TEXT_CHARS
}

fn default_history_timeout_ms() -> u64 {
    5_000
}
