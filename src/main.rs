//! Pokedex CLI - explore PokéAPI locations and catch Pokémon
//!
//! An interactive REPL that pages through location areas, explores them,
//! and keeps a session-local collection of caught Pokémon. API responses are
//! cached in memory and expire after a configurable interval.

use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pokedex::cache::Cache;
use pokedex::cli::{Cli, StartupConfig};
use pokedex::commands::Session;
use pokedex::data::{HttpTransport, PokeApiClient};
use pokedex::repl::{default_history_path, Repl};

/// Sends log output to stderr, filtered by RUST_LOG or the configured level
fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match StartupConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(2);
        }
    };

    init_tracing(&config.log_level);
    tracing::debug!(?config, "starting");

    let transport = HttpTransport::new(config.api.timeout)?;
    let cache = Cache::new(config.cache.clone());
    let api = PokeApiClient::new(transport, cache).with_base_url(config.api.base_url.clone());
    let session = Session::new(api, StdRng::from_entropy());

    let history_path = if config.history {
        default_history_path()
    } else {
        None
    };

    let mut repl = Repl::new(session, history_path)?;
    repl.run().await?;

    Ok(())
}
