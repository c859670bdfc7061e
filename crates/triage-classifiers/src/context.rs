//! Historical context provider
//!
//! Pulls the most recent classifications from the audit store and turns them
//! into few-shot examples for the language model. Failures never propagate:
//! an unreachable store simply yields no examples.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use triage_core::{ClassificationHistory, HistoricalExample};

/// Default character budget per example
pub const DEFAULT_MAX_TEXT_CHARS: usize = 200;

/// Default bound on a store fetch
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

const TRUNCATION_MARKER: &str = "...";

/// Fetches recent classifications as few-shot examples
#[derive(Clone)]
pub struct HistoricalContextProvider {
    store: Arc<dyn ClassificationHistory>,
    max_text_chars: usize,
    timeout: Duration,
}

impl HistoricalContextProvider {
    /// Create a provider over an audit store
    pub fn new(store: Arc<dyn ClassificationHistory>) -> Self {
        Self {
            store,
            max_text_chars: DEFAULT_MAX_TEXT_CHARS,
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Set the per-example character budget
    pub fn with_max_text_chars(mut self, max_text_chars: usize) -> Self {
        self.max_text_chars = max_text_chars;
        self
    }

    /// Set the fetch timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Up to `limit` examples, newest first. Empty when the store fails.
    pub async fn fetch(&self, limit: usize) -> Vec<HistoricalExample> {
        if limit == 0 {
            return Vec::new();
        }

        let records = match tokio::time::timeout(self.timeout, self.store.recent_tickets(limit)).await
        {
            Ok(Ok(records)) => records,
            Ok(Err(e)) => {
                warn!("Historical context unavailable, continuing without examples: {}", e);
                return Vec::new();
            }
            Err(_) => {
                warn!(
                    "Historical context fetch timed out after {:?}, continuing without examples",
                    self.timeout
                );
                return Vec::new();
            }
        };

        let examples: Vec<_> = records
            .iter()
            .take(limit)
            .map(|record| {
                let mut example = record.to_example();
                example.text = truncate_chars(&example.text, self.max_text_chars);
                example
            })
            .collect();

        debug!("Loaded {} historical examples", examples.len());
        examples
    }
}

/// Cut `text` to `max_chars` characters, marking the cut
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", text[..byte_idx].trim_end(), TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

/// Render examples as worked examples for the prompt
pub fn format_examples(examples: &[HistoricalExample]) -> String {
    let mut out = String::new();
    for (i, example) in examples.iter().enumerate() {
        let _ = writeln!(out, "Example {}:", i + 1);
        let _ = writeln!(out, "Ticket: {}", example.text.replace('\n', " "));
        let _ = writeln!(out, "priority_score: {}", example.score);
        let _ = writeln!(out, "priority_band: {}", example.band);
        if let Some(ref reasoning) = example.reasoning {
            let _ = writeln!(out, "reasoning: {}", reasoning.replace('\n', " "));
        }
        out.push('\n');
    }
    out
}
