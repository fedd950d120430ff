//! Command-line surface: `serve` (the default), plus two operator
//! conveniences that don't need the full HTTP stack running.

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "llm-security-gateway", version, about = "Security gateway for local LLM backends")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server. Default when no subcommand is given.
    Serve,
    /// Load and validate the configuration, printing every issue found.
    ValidateConfig,
    /// Re-read rule files from disk without restarting the server.
    ReloadRules,
}

/// Path to the TOML config file, overridable via `GATEWAY_CONFIG`.
pub fn config_path() -> String {
    std::env::var("GATEWAY_CONFIG").unwrap_or_else(|_| "config.toml".to_string())
}
