//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::config::ProviderKind;
use crate::security::Tier;
use clap::Parser;
use std::path::PathBuf;

/// TermScan - AI contract compliance API
///
/// Serves an HTTP API that scores contracts against Islamic finance,
/// artist-rights, privacy, legal and fair-terms checks using an LLM.
///
/// Examples:
///   termscan
///   termscan --provider openai --model gpt-4o-mini --port 8080
///   termscan --config ./prod.termscan.toml
///   termscan --generate-key "Acme Corp" --tier growth
///   termscan --init-config
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .termscan.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, value_name = "HOST", env = "TERMSCAN_HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long, value_name = "PORT", env = "TERMSCAN_PORT")]
    pub port: Option<u16>,

    /// LLM provider (openai, anthropic, gemini, groq)
    #[arg(long, value_name = "PROVIDER", env = "TERMSCAN_PROVIDER")]
    pub provider: Option<ProviderKind>,

    /// Model name passed to the provider
    #[arg(short, long, value_name = "MODEL", env = "TERMSCAN_MODEL")]
    pub model: Option<String>,

    /// Provider API key
    ///
    /// Falls back to OPENAI_API_KEY, ANTHROPIC_API_KEY, GEMINI_API_KEY or
    /// GROQ_API_KEY depending on the provider.
    #[arg(long, value_name = "KEY", env = "TERMSCAN_AI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Override the provider base URL
    #[arg(long, value_name = "URL", env = "TERMSCAN_AI_BASE_URL")]
    pub base_url: Option<String>,

    /// Temperature for LLM responses (0.0 - 1.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Maximum tokens in each LLM response
    #[arg(long, value_name = "TOKENS")]
    pub max_tokens: Option<u32>,

    /// Provider request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Enable debug mode (error details, development API key)
    #[arg(long, env = "TERMSCAN_DEBUG")]
    pub debug: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .termscan.toml configuration file
    #[arg(long)]
    pub init_config: bool,

    /// Generate an API key for the named client and print its config entry
    #[arg(long, value_name = "NAME")]
    pub generate_key: Option<String>,

    /// Tier for --generate-key (free, starter, growth, enterprise)
    #[arg(long, value_name = "TIER", default_value = "free", requires = "generate_key")]
    pub tier: String,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(ref base_url) = self.base_url {
            if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                return Err("Base URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 1.0".to_string());
            }
        }

        if self.max_tokens == Some(0) {
            return Err("Max tokens must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref name) = self.generate_key {
            if name.trim().is_empty() {
                return Err("Client name for --generate-key must not be empty".to_string());
            }
            if self.tier.parse::<Tier>().is_err() {
                return Err(format!(
                    "Unknown tier '{}'. Use free, starter, growth or enterprise",
                    self.tier
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings. `--quiet` wins
    /// over `general.verbose` from the config file.
    pub fn log_level(&self, verbose_by_default: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || verbose_by_default {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
