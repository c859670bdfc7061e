//! Command-line interface

use clap::Parser;
use triage_classifiers::ClassificationMode;

#[derive(Parser, Debug, Default)]
#[command(name = "triage-server")]
#[command(about = "Support-ticket priority triage webhook service", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "triage.yaml")]
    pub config: String,

    /// Listen address (overrides the config file)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Listen port (overrides the config file)
    #[arg(short = 'P', long)]
    pub port: Option<u16>,

    /// Classification mode: rules-only, ai-only or hybrid
    #[arg(short, long, env = "TRIAGE_MODE")]
    pub mode: Option<ClassificationMode>,

    /// Shared secret for webhook signatures
    #[arg(long, env = "TRIAGE_WEBHOOK_SECRET", hide_env_values = true)]
    pub webhook_secret: Option<String>,

    /// Support platform API key used to apply labels
    #[arg(long, env = "TRIAGE_SUPPORT_API_KEY", hide_env_values = true)]
    pub support_api_key: Option<String>,

    /// Text-generation API key
    #[arg(long, env = "TRIAGE_MODEL_API_KEY", hide_env_values = true)]
    pub model_api_key: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
