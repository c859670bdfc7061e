//! Parser for language-model responses
//!
//! Two formats are accepted: a JSON object (when structured output was
//! requested) and labeled lines:
//!
//! ```text
//! priority_score: 230
//! priority_band: P1
//! reasoning: Payment failures for a single customer.
//! ```
//!
//! Score and band are required. The band is trusted over the score: an
//! out-of-range score is clamped into the band's range.

use serde::Deserialize;
use triage_core::{Error, PriorityBand, Result};

/// Validated model answer
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    pub score: u32,
    pub band: PriorityBand,
    pub reasoning: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StructuredResponse {
    priority_score: serde_json::Value,
    priority_band: String,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Parse and validate a model response
pub fn parse_model_response(text: &str) -> Result<ParsedResponse> {
    if let Some(parsed) = parse_structured(text)? {
        return Ok(parsed);
    }
    parse_labeled_lines(text)
}

fn parse_structured(text: &str) -> Result<Option<ParsedResponse>> {
    let trimmed = strip_code_fence(text.trim());
    if !trimmed.starts_with('{') {
        return Ok(None);
    }

    let structured: StructuredResponse = match serde_json::from_str(trimmed) {
        Ok(structured) => structured,
        // Not our JSON shape; let the line scanner have a go.
        Err(_) => return Ok(None),
    };

    let score = match &structured.priority_score {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64)),
        serde_json::Value::String(s) => parse_leading_integer(s),
        _ => None,
    }
    .ok_or_else(|| Error::unparsable("priority_score is not a number"))?;

    let band = parse_band(&structured.priority_band)?;
    Ok(Some(validate(score, band, structured.reasoning)))
}

fn parse_labeled_lines(text: &str) -> Result<ParsedResponse> {
    let mut score = None;
    let mut band = None;
    let mut reasoning = None;

    for line in text.lines() {
        let line = line.trim().trim_start_matches(&['-', '*', '#', ' '][..]);
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().trim_matches('*').trim().to_ascii_lowercase();
        let value = value.trim().trim_matches('*').trim();

        match key.as_str() {
            "priority_score" if score.is_none() => {
                score = Some(parse_leading_integer(value).ok_or_else(|| {
                    Error::unparsable(format!("priority_score '{}' is not a number", value))
                })?);
            }
            "priority_band" if band.is_none() => band = Some(parse_band(value)?),
            "reasoning" if reasoning.is_none() && !value.is_empty() => {
                reasoning = Some(value.to_string())
            }
            _ => {}
        }
    }

    let score = score.ok_or_else(|| Error::unparsable("response has no priority_score line"))?;
    let band = band.ok_or_else(|| Error::unparsable("response has no priority_band line"))?;
    Ok(validate(score, band, reasoning))
}

fn validate(score: i64, band: PriorityBand, reasoning: Option<String>) -> ParsedResponse {
    ParsedResponse {
        score: band.clamp_score(score),
        band,
        reasoning: reasoning
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty()),
    }
}

fn parse_band(value: &str) -> Result<PriorityBand> {
    let token = value
        .split(|c: char| !c.is_ascii_alphanumeric())
        .find(|t| !t.is_empty())
        .unwrap_or("");
    token
        .parse()
        .map_err(|_| Error::unparsable(format!("priority_band '{}' is not P0-P3", value)))
}

fn parse_leading_integer(value: &str) -> Option<i64> {
    let value = value.trim();
    let (negative, digits) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let number: i64 = digits[..end].parse().ok()?;
    Some(if negative { -number } else { number })
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.trim_start_matches("json");
    rest.trim().strip_suffix("```").unwrap_or(rest).trim()
}
