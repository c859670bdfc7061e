//! Core types for ticket triage

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::error::Error;

/// Priority band assigned to a ticket, ordered by urgency (P0 most urgent)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PriorityBand {
    P0,
    P1,
    P2,
    P3,
}

impl PriorityBand {
    /// All bands in declaration order
    pub const ALL: [PriorityBand; 4] = [Self::P0, Self::P1, Self::P2, Self::P3];

    /// Band used when nothing points anywhere else
    pub const DEFAULT: PriorityBand = Self::P2;

    /// Range of the 0-1000 priority scale owned by this band
    pub fn score_range(self) -> RangeInclusive<u32> {
        match self {
            Self::P0 => 0..=150,
            Self::P1 => 151..=400,
            Self::P2 => 401..=700,
            Self::P3 => 701..=1000,
        }
    }

    /// Clamp an arbitrary score into this band's range
    pub fn clamp_score(self, score: i64) -> u32 {
        let range = self.score_range();
        score.clamp(*range.start() as i64, *range.end() as i64) as u32
    }

    /// Position a [0,1] confidence inside this band's range.
    ///
    /// Higher confidence lands closer to the urgent end of the band.
    pub fn score_for_confidence(self, confidence: f64) -> u32 {
        let range = self.score_range();
        let (start, end) = (*range.start() as f64, *range.end() as f64);
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        (start + (1.0 - confidence) * (end - start)).round() as u32
    }

    /// Band label as sent to the support platform
    pub fn as_str(self) -> &'static str {
        match self {
            Self::P0 => "P0",
            Self::P1 => "P1",
            Self::P2 => "P2",
            Self::P3 => "P3",
        }
    }
}

impl fmt::Display for PriorityBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriorityBand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "P0" => Ok(Self::P0),
            "P1" => Ok(Self::P1),
            "P2" => Ok(Self::P2),
            "P3" => Ok(Self::P3),
            other => Err(Error::invalid_input(format!("unknown priority band '{}'", other))),
        }
    }
}

/// Coarse confidence reported by the language-model path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    /// Position on the shared [0,1] decision axis
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Low => 0.3,
            Self::Medium => 0.6,
            Self::High => 0.9,
        }
    }
}

/// Confidence of a classifier in its own answer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Confidence {
    /// Numeric score in [0,1] (rule path)
    Score(f64),
    /// Categorical level (model path)
    Level(ConfidenceLevel),
}

impl Confidence {
    /// Map either representation onto [0,1] so results can be compared
    pub fn normalized(&self) -> f64 {
        match self {
            Self::Score(score) if score.is_finite() => score.clamp(0.0, 1.0),
            Self::Score(_) => 0.0,
            Self::Level(level) => level.as_f64(),
        }
    }
}

/// Which classifier produced a result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Rules,
    Ai { provider: String },
    Combined,
    RulesFallback,
    AiFallback,
    KeywordFallback,
    ErrorFallback,
}

impl Method {
    /// Create a model method tagged with its provider
    pub fn ai(provider: impl Into<String>) -> Self {
        Self::Ai {
            provider: provider.into(),
        }
    }

    /// Whether this result came from a fallback path
    pub fn is_fallback(&self) -> bool {
        matches!(
            self,
            Self::RulesFallback | Self::AiFallback | Self::KeywordFallback | Self::ErrorFallback
        )
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rules => f.write_str("rules"),
            Self::Ai { provider } => write!(f, "ai-{}", provider),
            Self::Combined => f.write_str("combined"),
            Self::RulesFallback => f.write_str("rules-fallback"),
            Self::AiFallback => f.write_str("ai-fallback"),
            Self::KeywordFallback => f.write_str("keyword-fallback"),
            Self::ErrorFallback => f.write_str("error-fallback"),
        }
    }
}

impl Serialize for Method {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Classification strategy picked for a ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Rules,
    Ai,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rules => f.write_str("rules"),
            Self::Ai => f.write_str("ai"),
        }
    }
}

/// A support ticket as delivered by the event source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    /// Unique ticket (thread) id
    pub id: String,

    /// Ticket title
    #[serde(default)]
    pub title: String,

    /// Message body
    #[serde(default)]
    pub body: String,

    /// Customer tier label (e.g. "enterprise", "pro", "trial")
    #[serde(default)]
    pub customer_tier: String,

    /// When the ticket was created
    pub created_at: DateTime<Utc>,
}

impl Ticket {
    /// Create a new ticket created now
    pub fn new(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            body: body.into(),
            customer_tier: String::new(),
            created_at: Utc::now(),
        }
    }

    /// Set the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the customer tier
    pub fn with_tier(mut self, tier: impl Into<String>) -> Self {
        self.customer_tier = tier.into();
        self
    }

    /// Set the creation timestamp
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Text handed to the language model: title and body
    pub fn text(&self) -> String {
        let title = self.title.trim();
        let body = self.body.trim();
        match (title.is_empty(), body.is_empty()) {
            (true, _) => body.to_string(),
            (false, true) => title.to_string(),
            (false, false) => format!("{}\n\n{}", title, body),
        }
    }
}

/// Read-only view of one ticket, built fresh for each scoring call
#[derive(Debug, Clone, PartialEq)]
pub struct TicketFacts {
    content: String,
    customer_tier: String,
    age_secs: f64,
    content_length: usize,
}

impl TicketFacts {
    /// Build facts from already-extracted values.
    ///
    /// Content and tier are lower-cased; negative or non-finite ages
    /// (clock skew) clamp to zero.
    pub fn new(content: &str, customer_tier: &str, age_secs: f64) -> Self {
        let content = content.to_lowercase();
        let content_length = content.chars().count();
        Self {
            content,
            customer_tier: customer_tier.trim().to_lowercase(),
            age_secs: if age_secs.is_finite() && age_secs > 0.0 {
                age_secs
            } else {
                0.0
            },
            content_length,
        }
    }

    /// Derive facts from a ticket as of `now`
    pub fn from_ticket(ticket: &Ticket, now: DateTime<Utc>) -> Self {
        let content = format!("{} {}", ticket.body, ticket.title);
        let age_secs = (now - ticket.created_at).num_milliseconds() as f64 / 1000.0;
        Self::new(&content, &ticket.customer_tier, age_secs)
    }

    /// Lower-cased body and title
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Lower-cased customer tier
    pub fn customer_tier(&self) -> &str {
        &self.customer_tier
    }

    /// Seconds since creation, never negative
    pub fn age_secs(&self) -> f64 {
        self.age_secs
    }

    /// Length of the content in characters
    pub fn content_length(&self) -> usize {
        self.content_length
    }
}

/// Output of any classifier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    /// Winning band
    pub band: PriorityBand,

    /// Classifier confidence
    pub confidence: Confidence,

    /// Classifier that produced this result
    pub method: Method,

    /// Position on the 0-1000 priority scale (lower is more urgent)
    pub score: u32,

    /// Free-text explanation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,

    /// Per-band scores (rule path)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_scores: Option<BTreeMap<PriorityBand, f64>>,

    /// Strategy the hybrid selector picked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,

    /// Whether a fallback path produced this result
    pub fallback_used: bool,

    /// Latency in microseconds
    pub latency_us: u64,
}

impl ClassificationResult {
    /// Create a new classification result
    pub fn new(band: PriorityBand, confidence: Confidence, method: Method, score: u32) -> Self {
        Self {
            band,
            confidence,
            method,
            score,
            reasoning: None,
            raw_scores: None,
            strategy: None,
            fallback_used: false,
            latency_us: 0,
        }
    }

    /// Attach reasoning
    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    /// Attach per-band scores
    pub fn with_raw_scores(mut self, raw_scores: BTreeMap<PriorityBand, f64>) -> Self {
        self.raw_scores = Some(raw_scores);
        self
    }

    /// Confidence on the shared [0,1] axis
    pub fn normalized_confidence(&self) -> f64 {
        self.confidence.normalized()
    }

    /// Check if normalized confidence reaches the threshold
    pub fn exceeds_threshold(&self, threshold: f64) -> bool {
        self.normalized_confidence() >= threshold
    }
}

/// Snapshot of a past classification used as a few-shot example
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalExample {
    pub text: String,
    pub score: u32,
    pub band: PriorityBand,
    pub reasoning: Option<String>,
}
