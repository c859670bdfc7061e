//! Rule table and rule evaluator
//!
//! Every band is scored independently from three signals:
//!
//! ```text
//! keyword  = 0                        no keyword of the band occurs in the content
//!          = 0.5 + 0.1 * matches      otherwise (uncapped)
//! tier     = 0.3                      customer tier is eligible for the band
//! overdue  = 0.2                      age exceeds the band's response threshold
//! score    = min(1.0, keyword + tier + overdue)
//! ```
//!
//! Scores are kept in whole tenths so equal totals compare equal. The band
//! with the highest score wins, ties go to the more urgent band, and an
//! all-zero ticket lands on P2.

use aho_corasick::AhoCorasick;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;
use triage_core::{
    ClassificationResult, Confidence, Error, Method, PriorityBand, Result, Ticket, TicketFacts,
};

use crate::classifier::PriorityClassifier;

// Weights in tenths
const KEYWORD_BASE: u32 = 5;
const KEYWORD_STEP: u32 = 1;
const TIER_SCORE: u32 = 3;
const OVERDUE_SCORE: u32 = 2;
const MAX_SCORE: u32 = 10;

/// Rules for a single band
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandRule {
    /// Keywords matched as substrings of the ticket content
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Customer tiers that lean toward this band
    #[serde(default)]
    pub eligible_tiers: BTreeSet<String>,

    /// Age after which a ticket counts as overdue for this band
    pub response_threshold_secs: u64,
}

impl BandRule {
    fn normalized(self) -> Self {
        Self {
            keywords: self
                .keywords
                .into_iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            eligible_tiers: self
                .eligible_tiers
                .into_iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
            response_threshold_secs: self.response_threshold_secs,
        }
    }
}

/// Per-band rules, immutable after load
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawTable")]
pub struct RuleTable {
    bands: BTreeMap<PriorityBand, BandRule>,
}

/// Unvalidated table as written in YAML
#[derive(Deserialize)]
struct RawTable {
    bands: BTreeMap<PriorityBand, BandRule>,
}

impl TryFrom<RawTable> for RuleTable {
    type Error = Error;

    fn try_from(raw: RawTable) -> Result<Self> {
        Self::new(raw.bands)
    }
}

impl RuleTable {
    /// Build a table, requiring a rule for every band
    pub fn new(bands: BTreeMap<PriorityBand, BandRule>) -> Result<Self> {
        let missing: Vec<_> = PriorityBand::ALL
            .iter()
            .filter(|band| !bands.contains_key(band))
            .map(|band| band.as_str())
            .collect();

        if !missing.is_empty() {
            return Err(Error::config(format!(
                "rule table is missing bands: {}",
                missing.join(", ")
            )));
        }

        Ok(Self {
            bands: bands
                .into_iter()
                .map(|(band, rule)| (band, rule.normalized()))
                .collect(),
        })
    }

    /// Load a table from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let raw: RawTable = serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("invalid rule table: {}", e)))?;
        Self::new(raw.bands)
    }

    /// Load a table from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::config(format!(
                "failed to read rule table {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
    }

    /// Built-in table used when no file is configured
    pub fn builtin() -> Self {
        fn rule(keywords: &[&str], tiers: &[&str], threshold: u64) -> BandRule {
            BandRule {
                keywords: keywords.iter().map(|k| k.to_string()).collect(),
                eligible_tiers: tiers.iter().map(|t| t.to_string()).collect(),
                response_threshold_secs: threshold,
            }
        }

        let bands = BTreeMap::from([
            (
                PriorityBand::P0,
                rule(
                    &[
                        "down",
                        "outage",
                        "not working",
                        "broken",
                        "critical",
                        "urgent",
                        "emergency",
                        "data loss",
                        "security breach",
                        "hacked",
                        "cannot log in",
                        "can't log in",
                        "production",
                    ],
                    &["enterprise", "pro"],
                    15 * 60,
                ),
            ),
            (
                PriorityBand::P1,
                rule(
                    &[
                        "error",
                        "bug",
                        "failed",
                        "failing",
                        "crash",
                        "slow",
                        "not loading",
                        "payment",
                        "billing",
                        "charged",
                        "unable to",
                        "doesn't work",
                    ],
                    &["enterprise", "pro", "business"],
                    4 * 60 * 60,
                ),
            ),
            (
                PriorityBand::P2,
                rule(
                    &[
                        "how do i",
                        "how to",
                        "question",
                        "documentation",
                        "docs",
                        "export",
                        "import",
                        "integration",
                        "configure",
                        "setup",
                        "settings",
                    ],
                    &["business", "standard", "starter"],
                    24 * 60 * 60,
                ),
            ),
            (
                PriorityBand::P3,
                rule(
                    &[
                        "feature request",
                        "suggestion",
                        "would be nice",
                        "nice to have",
                        "feedback",
                        "thank",
                        "thanks",
                        "typo",
                        "cosmetic",
                    ],
                    &["free", "trial"],
                    72 * 60 * 60,
                ),
            ),
        ]);

        Self { bands }
    }

    /// Rule for a band
    pub fn band(&self, band: PriorityBand) -> &BandRule {
        &self.bands[&band]
    }

    /// Iterate rules in band declaration order
    pub fn iter(&self) -> impl Iterator<Item = (PriorityBand, &BandRule)> {
        self.bands.iter().map(|(band, rule)| (*band, rule))
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Breakdown of one band's score
#[derive(Debug, Clone, PartialEq)]
pub struct BandScore {
    pub band: PriorityBand,
    pub matched_keywords: Vec<String>,
    pub tier_eligible: bool,
    pub overdue: bool,
    /// Capped score in tenths
    pub points: u32,
    /// `points` on the 0-1 scale
    pub total: f64,
}

impl BandScore {
    fn keyword_points(&self) -> u32 {
        if self.matched_keywords.is_empty() {
            0
        } else {
            KEYWORD_BASE + KEYWORD_STEP * self.matched_keywords.len() as u32
        }
    }
}

struct BandMatcher {
    band: PriorityBand,
    automaton: Option<AhoCorasick>,
}

/// Scores tickets against a rule table
pub struct RuleEvaluator {
    rules: Arc<RuleTable>,
    matchers: Vec<BandMatcher>,
}

impl RuleEvaluator {
    /// Create an evaluator, compiling one keyword automaton per band
    pub fn new(rules: Arc<RuleTable>) -> Result<Self> {
        let matchers = rules
            .iter()
            .map(|(band, rule)| {
                let automaton = if rule.keywords.is_empty() {
                    None
                } else {
                    Some(AhoCorasick::new(&rule.keywords).map_err(|e| {
                        Error::config(format!("failed to build {} keyword matcher: {}", band, e))
                    })?)
                };
                Ok(BandMatcher { band, automaton })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules, matchers })
    }

    /// Rule table in use
    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Score every band, in declaration order
    pub fn band_scores(&self, facts: &TicketFacts) -> Vec<BandScore> {
        self.matchers
            .iter()
            .map(|matcher| self.score_band(matcher, facts))
            .collect()
    }

    fn score_band(&self, matcher: &BandMatcher, facts: &TicketFacts) -> BandScore {
        let rule = self.rules.band(matcher.band);

        let mut seen = vec![false; rule.keywords.len()];
        if let Some(ref automaton) = matcher.automaton {
            for m in automaton.find_overlapping_iter(facts.content()) {
                seen[m.pattern().as_usize()] = true;
            }
        }
        let matched_keywords: Vec<String> = rule
            .keywords
            .iter()
            .zip(seen)
            .filter(|(_, hit)| *hit)
            .map(|(keyword, _)| keyword.clone())
            .collect();

        let tier_eligible = rule.eligible_tiers.contains(facts.customer_tier());
        let overdue = facts.age_secs() > rule.response_threshold_secs as f64;

        let mut score = BandScore {
            band: matcher.band,
            matched_keywords,
            tier_eligible,
            overdue,
            points: 0,
            total: 0.0,
        };

        let tier = if tier_eligible { TIER_SCORE } else { 0 };
        let late = if overdue { OVERDUE_SCORE } else { 0 };
        score.points = (score.keyword_points() + tier + late).min(MAX_SCORE);
        score.total = f64::from(score.points) / f64::from(MAX_SCORE);
        score
    }

    /// Classify one ticket. Pure: identical facts give identical results.
    pub fn evaluate(&self, facts: &TicketFacts) -> ClassificationResult {
        let scores = self.band_scores(facts);

        // Strictly-greater comparison keeps the first band on ties.
        let mut winner: Option<&BandScore> = None;
        for score in &scores {
            if score.points > winner.map_or(0, |w| w.points) {
                winner = Some(score);
            }
        }

        let raw_scores: BTreeMap<PriorityBand, f64> =
            scores.iter().map(|s| (s.band, s.total)).collect();

        let (band, confidence, reasoning) = match winner {
            Some(w) => (w.band, w.total, describe(w)),
            None => (
                PriorityBand::DEFAULT,
                0.0,
                format!("no rule matched; defaulting to {}", PriorityBand::DEFAULT),
            ),
        };

        ClassificationResult::new(
            band,
            Confidence::Score(confidence),
            Method::Rules,
            band.score_for_confidence(confidence),
        )
        .with_reasoning(reasoning)
        .with_raw_scores(raw_scores)
    }
}

fn describe(score: &BandScore) -> String {
    let mut signals = Vec::new();
    if !score.matched_keywords.is_empty() {
        signals.push(format!("keywords: {}", score.matched_keywords.join(", ")));
    }
    if score.tier_eligible {
        signals.push("customer tier eligible".to_string());
    }
    if score.overdue {
        signals.push("response threshold exceeded".to_string());
    }
    format!(
        "{} scored {:.2} ({})",
        score.band,
        score.total,
        signals.join("; ")
    )
}

/// Rule evaluator exposed through the classifier trait
pub struct RuleClassifier {
    evaluator: RuleEvaluator,
}

impl RuleClassifier {
    /// Create a rule classifier over a table
    pub fn new(rules: Arc<RuleTable>) -> Result<Self> {
        Ok(Self {
            evaluator: RuleEvaluator::new(rules)?,
        })
    }

    /// Underlying evaluator
    pub fn evaluator(&self) -> &RuleEvaluator {
        &self.evaluator
    }
}

#[async_trait]
impl PriorityClassifier for RuleClassifier {
    async fn classify(&self, ticket: &Ticket) -> Result<ClassificationResult> {
        let start = Instant::now();
        let facts = TicketFacts::from_ticket(ticket, Utc::now());

        let mut result = self.evaluator.evaluate(&facts);
        result.latency_us = start.elapsed().as_micros() as u64;

        debug!(
            ticket_id = %ticket.id,
            band = %result.band,
            confidence = result.normalized_confidence(),
            "Rule evaluation complete"
        );
        Ok(result)
    }

    fn name(&self) -> &str {
        "rules"
    }
}
