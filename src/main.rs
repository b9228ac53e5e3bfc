//! TermScan - AI contract compliance API
//!
//! Serves an HTTP API that analyzes contract text with an LLM provider
//! and reports compliance scores, flags and downloadable reports.
//!
//! Exit codes:
//!   0 - Clean shutdown
//!   1 - Startup error (config, provider setup, bind failure, etc.)

mod analysis;
mod cli;
mod config;
mod extract;
mod models;
mod provider;
mod report;
mod security;
mod server;
mod store;

use anyhow::{Context, Result};
use cli::Args;
use config::Config;
use security::{generate_api_key, hash_api_key, ApiKeyStore, Tier};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Neither of these needs logging or a running server
    if args.init_config {
        return handle_init_config();
    }
    if let Some(ref name) = args.generate_key {
        return handle_generate_key(name, &args.tier);
    }

    // Config comes first so `general.verbose` can set the log level
    let (mut config, source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(&args, &config);

    info!("TermScan v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    source.log();

    if let Err(e) = run_server(config).await {
        error!("Server failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}

/// Handle --init-config: generate a default .termscan.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(config::DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            config::DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    std::fs::write(path, Config::default_toml())
        .with_context(|| format!("Failed to write {}", config::DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", config::DEFAULT_CONFIG_FILE);
    println!("   Edit it to choose a provider, model, API keys and limits.");
    Ok(())
}

/// Handle --generate-key: print a new key and the config entry for it.
fn handle_generate_key(name: &str, tier: &str) -> Result<()> {
    let tier: Tier = tier.parse().map_err(anyhow::Error::msg)?;
    let api_key = generate_api_key("ts");
    let key_sha256 = hash_api_key(&api_key);

    println!("🔑 API key for '{}' ({} tier):\n", name, tier);
    println!("   {}\n", api_key);
    println!("   The key is shown once. Add this entry to your config file:\n");
    println!("[[security.api_keys]]");
    println!("name = {:?}", name);
    println!("key_sha256 = \"{}\"", key_sha256);
    println!("tier = \"{}\"", tier);
    println!("active = true");
    Ok(())
}

/// Initialize logging. RUST_LOG overrides the verbosity settings.
fn init_logging(args: &Args, config: &Config) {
    let level = args.log_level(config.general.verbose);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Build the application state and serve until shutdown.
async fn run_server(config: Config) -> Result<()> {
    let provider = provider::HttpProvider::from_config(&config)
        .context("Failed to initialize the LLM provider")?;

    println!("🤖 LLM provider:");
    println!("   Provider: {}", config.model.provider);
    println!("   Model: {}", config.model.name);
    println!("   Endpoint: {}", config.provider_base_url());
    println!("   Timeout: {}s", config.model.timeout_seconds);

    let analyzer = analysis::ContractAnalyzer::new(
        Arc::new(provider),
        analysis::AnalyzerSettings::from_config(&config),
    );

    let keys = ApiKeyStore::from_entries(&config.security.api_keys);
    info!("Loaded {} API key(s)", keys.len().await);

    if config.general.debug {
        let issued = keys.create("Development", Tier::Enterprise).await;
        warn!("Debug mode is on; error details are exposed to clients");
        info!("Development API key ({} tier): {}", issued.tier, issued.api_key);
    }

    server::serve(server::AppState::new(config, analyzer, keys)).await
}

/// Where the configuration came from, reported once logging is up.
enum ConfigSource {
    File(PathBuf),
    Defaults,
    Unreadable(String),
}

impl ConfigSource {
    fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded config from {}", path.display()),
            ConfigSource::Defaults => debug!("No config file found, using defaults"),
            ConfigSource::Unreadable(e) => warn!("Failed to load config: {}", e),
        }
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<(Config, ConfigSource)> {
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, ConfigSource::File(config_path.clone())));
    }

    match Config::load_default() {
        Ok(Some(config)) => Ok((
            config,
            ConfigSource::File(PathBuf::from(config::DEFAULT_CONFIG_FILE)),
        )),
        Ok(None) => Ok((Config::default(), ConfigSource::Defaults)),
        Err(e) => Ok((Config::default(), ConfigSource::Unreadable(format!("{:#}", e)))),
    }
}
