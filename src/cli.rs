//! Command-line interface parsing for the Pokedex CLI
//!
//! This module handles parsing of CLI arguments using clap and validates them
//! into a [`StartupConfig`] used to wire the cache, HTTP client and REPL.

use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::cache::{CacheConfig, DEFAULT_INTERVAL};
use crate::data::pokeapi::DEFAULT_TIMEOUT;
use crate::data::POKEAPI_BASE_URL;

/// Error types for CLI argument validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CliError {
    /// The cache interval must be at least one second
    #[error("Invalid cache interval: {0}. The interval must be at least 1 second")]
    InvalidInterval(u64),

    /// The request timeout must be at least one second
    #[error("Invalid timeout: {0}. The timeout must be at least 1 second")]
    InvalidTimeout(u64),

    /// The base URL is not an http(s) URL
    #[error("Invalid base URL: '{0}'. Expected an http:// or https:// URL")]
    InvalidBaseUrl(String),
}

/// Pokedex - explore PokéAPI locations and catch Pokémon from your terminal
#[derive(Parser, Debug)]
#[command(name = "pokedex")]
#[command(about = "An interactive Pokédex backed by the PokéAPI")]
#[command(version)]
pub struct Cli {
    /// Seconds a cached API response is kept before the sweep evicts it
    #[arg(long, value_name = "SECONDS", default_value_t = DEFAULT_INTERVAL.as_secs())]
    pub cache_interval: u64,

    /// Seconds to wait for a single API request before giving up
    #[arg(long, value_name = "SECONDS", default_value_t = DEFAULT_TIMEOUT.as_secs())]
    pub timeout: u64,

    /// Root URL of the PokéAPI
    #[arg(long, value_name = "URL", default_value = POKEAPI_BASE_URL)]
    pub base_url: String,

    /// Log filter used when RUST_LOG is not set (e.g. "debug", "pokedex=trace")
    #[arg(long, value_name = "FILTER", default_value = "warn")]
    pub log_level: String,

    /// Do not load or save command history
    #[arg(long)]
    pub no_history: bool,
}

/// HTTP settings for the API client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout: Duration,
}

/// Configuration derived from CLI arguments for application startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupConfig {
    pub cache: CacheConfig,
    pub api: ApiConfig,
    pub log_level: String,
    /// Whether REPL history is read from and written to disk
    pub history: bool,
}

impl StartupConfig {
    /// Creates a StartupConfig from parsed CLI arguments.
    ///
    /// # Arguments
    /// * `cli` - The parsed CLI struct
    ///
    /// # Returns
    /// * `Ok(StartupConfig)` with validated settings
    /// * `Err(CliError)` if an interval, timeout or URL is invalid
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        if cli.cache_interval == 0 {
            return Err(CliError::InvalidInterval(cli.cache_interval));
        }
        if cli.timeout == 0 {
            return Err(CliError::InvalidTimeout(cli.timeout));
        }
        if !(cli.base_url.starts_with("http://") || cli.base_url.starts_with("https://")) {
            return Err(CliError::InvalidBaseUrl(cli.base_url.clone()));
        }

        Ok(StartupConfig {
            cache: CacheConfig {
                interval: Duration::from_secs(cli.cache_interval),
            },
            api: ApiConfig {
                base_url: cli.base_url.trim_end_matches('/').to_string(),
                timeout: Duration::from_secs(cli.timeout),
            },
            log_level: cli.log_level.clone(),
            history: !cli.no_history,
        })
    }
}
