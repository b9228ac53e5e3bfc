//! Configuration file handling.
//!
//! This module handles loading `.termscan.toml` files and merging them with
//! command-line and environment overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".termscan.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// LLM provider settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// API key and access settings.
    #[serde(default)]
    pub security: SecurityConfig,

    /// Request and storage limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Report branding.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Free-form environment name reported by `/health`.
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Debug mode: verbose error details, development API key, optional
    /// anonymous access.
    #[serde(default)]
    pub debug: bool,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            environment: default_environment(),
            debug: false,
            verbose: false,
        }
    }
}

fn default_app_name() -> String {
    "TermScan API".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Value of `access-control-allow-origin`.
    #[serde(default = "default_cors_origin")]
    pub cors_allow_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_allow_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cors_origin() -> String {
    "*".to_string()
}

/// Supported LLM providers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[value(name = "openai")]
    OpenAi,
    Anthropic,
    #[default]
    Gemini,
    Groq,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Groq => "groq",
        }
    }

    /// Base URL used when none is configured.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com",
            ProviderKind::Anthropic => "https://api.anthropic.com",
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com",
            ProviderKind::Groq => "https://api.groq.com/openai",
        }
    }

    /// Provider-specific environment variable holding the API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
            ProviderKind::Groq => "GROQ_API_KEY",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// LLM model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub provider: ProviderKind,

    /// Model name passed to the provider.
    #[serde(default = "default_model")]
    pub name: String,

    /// API key. Falls back to the provider's environment variable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Override for the provider base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Maximum tokens in response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Number of retries on transient failure.
    #[serde(default = "default_retries")]
    pub retries: usize,

    /// Maximum provider calls in flight for one analysis.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            name: default_model(),
            api_key: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_seconds: default_timeout(),
            retries: default_retries(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.3
}

fn default_timeout() -> u64 {
    120
}

fn default_retries() -> usize {
    2
}

fn default_concurrency() -> usize {
    5
}

/// API key and access settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// In debug mode, requests without an API key run as the anonymous
    /// web UI client.
    #[serde(default = "default_true")]
    pub allow_anonymous_in_debug: bool,

    /// Pre-provisioned API keys, stored as sha256 hashes.
    #[serde(default)]
    pub api_keys: Vec<ApiKeyEntry>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allow_anonymous_in_debug: true,
            api_keys: Vec::new(),
        }
    }
}

/// A provisioned API key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyEntry {
    pub name: String,
    #[serde(default = "default_tier")]
    pub tier: String,
    /// Lowercase hex sha256 of the key.
    pub key_sha256: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_tier() -> String {
    "free".to_string()
}

fn default_true() -> bool {
    true
}

/// Request and storage limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Minimum contract length in characters.
    #[serde(default = "default_min_text_chars")]
    pub min_text_chars: usize,

    /// Maximum contract length in characters.
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,

    /// Characters sent to the model for a full analysis.
    #[serde(default = "default_analysis_max_chars")]
    pub analysis_max_chars: usize,

    /// Characters sent to the model for a quick score.
    #[serde(default = "default_quick_max_chars")]
    pub quick_max_chars: usize,

    /// Maximum JSON request body in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Maximum uploaded file size in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Analyses kept in memory before the oldest are evicted.
    #[serde(default = "default_max_stored_analyses")]
    pub max_stored_analyses: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            min_text_chars: default_min_text_chars(),
            max_text_chars: default_max_text_chars(),
            analysis_max_chars: default_analysis_max_chars(),
            quick_max_chars: default_quick_max_chars(),
            max_body_bytes: default_max_body_bytes(),
            max_upload_bytes: default_max_upload_bytes(),
            max_stored_analyses: default_max_stored_analyses(),
        }
    }
}

fn default_min_text_chars() -> usize {
    50
}

fn default_max_text_chars() -> usize {
    100_000
}

fn default_analysis_max_chars() -> usize {
    50_000
}

fn default_quick_max_chars() -> usize {
    20_000
}

fn default_max_body_bytes() -> usize {
    2 * 1024 * 1024
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_max_stored_analyses() -> usize {
    10_000
}

/// Report branding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_company_name")]
    pub company_name: String,

    #[serde(default = "default_company_website")]
    pub company_website: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            company_name: default_company_name(),
            company_website: default_company_website(),
        }
    }
}

fn default_company_name() -> String {
    "Halal Contract API".to_string()
}

fn default_company_website() -> String {
    "https://halalcontract.com".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only values given on the command line (or through their environment
    /// variables) override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref host) = args.host {
            self.server.host = host.clone();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }

        if let Some(provider) = args.provider {
            if provider != self.model.provider {
                // A base URL configured for another provider no longer applies.
                self.model.base_url = None;
            }
            self.model.provider = provider;
        }
        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref api_key) = args.api_key {
            self.model.api_key = Some(api_key.clone());
        }
        if let Some(ref base_url) = args.base_url {
            self.model.base_url = Some(base_url.clone());
        }
        if let Some(temperature) = args.temperature {
            self.model.temperature = temperature;
        }
        if let Some(max_tokens) = args.max_tokens {
            self.model.max_tokens = max_tokens;
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }

        if args.debug {
            self.general.debug = true;
        }
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// API key for the configured provider: the explicit setting first,
    /// then the provider's environment variable.
    pub fn provider_api_key(&self) -> Option<String> {
        self.model
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                std::env::var(self.model.provider.api_key_env())
                    .ok()
                    .filter(|k| !k.trim().is_empty())
            })
    }

    /// Effective provider base URL, without a trailing slash.
    pub fn provider_base_url(&self) -> String {
        self.model
            .base_url
            .as_deref()
            .unwrap_or(self.model.provider.default_base_url())
            .trim_end_matches('/')
            .to_string()
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
