//! Triage Server
//!
//! Webhook service that scores the priority of incoming support tickets,
//! labels them on the support platform and keeps an audit trail of every
//! classification.

pub mod cli;
pub mod config;
pub mod labeler;
pub mod routes;
pub mod security;
pub mod state;
pub mod webhook;

pub use config::ServiceConfig;
pub use labeler::{GraphQlLabeler, LabelApplier};
pub use routes::create_router;
pub use state::AppState;
