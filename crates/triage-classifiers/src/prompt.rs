//! Prompt construction for the language-model classifier
//!
//! The prompt is deterministic for a given ticket and example window:
//! fixed instructions, historical examples, fixed reference examples, the
//! ticket, and the output contract.

use triage_core::{HistoricalExample, PriorityBand};

use crate::context::format_examples;

const INSTRUCTIONS: &str = "\
You are a support triage assistant. Assign the ticket below a priority score \
from 0 (most urgent) to 1000 (least urgent) and the matching priority band.

Priority bands:
- P0 (score 0-150): outages, data loss, security incidents, or anything blocking many users.
- P1 (score 151-400): broken functionality, billing or payment failures, errors blocking one customer.
- P2 (score 401-700): how-to questions, configuration help, non-blocking issues.
- P3 (score 701-1000): feature requests, feedback, cosmetic issues, thank-you notes.
";

const REFERENCE_EXAMPLES: &str = "\
Reference example 1:
Ticket: Our production dashboard returns 500 for every user since the last deploy.
priority_score: 40
priority_band: P0
reasoning: Production outage affecting all users.

Reference example 2:
Ticket: It would be nice to have a dark mode in the settings page.
priority_score: 880
priority_band: P3
reasoning: Feature request with no impact on current usage.
";

const OUTPUT_FORMAT: &str = "\
Respond with exactly these three lines and nothing else:
priority_score: <integer 0-1000>
priority_band: <P0|P1|P2|P3>
reasoning: <one sentence>";

const STRUCTURED_OUTPUT_FORMAT: &str = "\
Respond with a single JSON object and nothing else, with the keys \
\"priority_score\" (integer 0-1000), \"priority_band\" (one of \"P0\", \"P1\", \"P2\", \"P3\") \
and \"reasoning\" (one sentence).";

/// Build the full prompt for one ticket
pub fn build_prompt(
    ticket_text: &str,
    examples: &[HistoricalExample],
    structured_output: bool,
) -> String {
    let mut prompt = String::with_capacity(2048);
    prompt.push_str(INSTRUCTIONS);
    prompt.push('\n');

    if !examples.is_empty() {
        prompt.push_str("Recently classified tickets (newest first):\n\n");
        prompt.push_str(&format_examples(examples));
    }

    prompt.push_str(REFERENCE_EXAMPLES);
    prompt.push('\n');

    prompt.push_str("Ticket to classify:\n");
    prompt.push_str(ticket_text.trim());
    prompt.push_str("\n\n");

    prompt.push_str(if structured_output {
        STRUCTURED_OUTPUT_FORMAT
    } else {
        OUTPUT_FORMAT
    });
    prompt
}

/// Score range text for a band, as quoted in the instructions
pub fn band_range_label(band: PriorityBand) -> String {
    let range = band.score_range();
    format!("{}-{}", range.start(), range.end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instructions_quote_band_ranges() {
        let prompt = build_prompt("Login page is blank", &[], false);
        for band in PriorityBand::ALL {
            assert!(
                prompt.contains(&format!("{} (score {})", band, band_range_label(band))),
                "missing range for {}",
                band
            );
        }
    }

    #[test]
    fn test_prompt_sections_in_order() {
        let examples = vec![HistoricalExample {
            text: "Invoices missing".to_string(),
            score: 320,
            band: PriorityBand::P1,
            reasoning: None,
        }];
        let prompt = build_prompt("Login page is blank", &examples, false);

        let history = prompt.find("Recently classified tickets").unwrap();
        let reference = prompt.find("Reference example 1").unwrap();
        let ticket = prompt.find("Ticket to classify:\nLogin page is blank").unwrap();
        let format = prompt.find("priority_score: <integer 0-1000>").unwrap();
        assert!(history < reference && reference < ticket && ticket < format);
    }

    #[test]
    fn test_prompt_without_history_skips_section() {
        let prompt = build_prompt("hello", &[], false);
        assert!(!prompt.contains("Recently classified tickets"));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        assert_eq!(build_prompt("a b c", &[], true), build_prompt("a b c", &[], true));
    }

    #[test]
    fn test_structured_output_instructions() {
        let prompt = build_prompt("hello", &[], true);
        assert!(prompt.ends_with("(one sentence)."));
        assert!(prompt.contains("single JSON object"));
    }
}
