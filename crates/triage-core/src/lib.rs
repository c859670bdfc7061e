//! Triage Core
//!
//! Core types, traits, and utilities shared across the triage components.
//!
//! This crate provides:
//! - Priority bands, tickets, and the read-only facts derived for scoring
//! - Classification results with a confidence axis shared by every classifier
//! - Error types and result handling
//! - The audit-store contract consumed by the historical context provider

pub mod error;
pub mod history;
pub mod types;

pub use error::{Error, Result};
pub use history::{ClassificationHistory, PriorityStats, StoredClassification};
pub use types::{
    ClassificationResult, Confidence, ConfidenceLevel, HistoricalExample, Method, PriorityBand,
    Strategy, Ticket, TicketFacts,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::history::{ClassificationHistory, StoredClassification};
    pub use crate::types::{
        ClassificationResult, Confidence, ConfidenceLevel, Method, PriorityBand, Strategy, Ticket,
        TicketFacts,
    };
}
