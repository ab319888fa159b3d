//! Oxiroute CLI: entry point.
//!
//! # Commands
//!
//! - `oxiroute onboard`: write a default config
//! - `oxiroute status`: show configuration and key pools
//! - `oxiroute providers`: initialize every provider and report outcomes
//! - `oxiroute chat <provider> <model> -m MESSAGE`: one-shot request with key rotation

mod chat;
mod helpers;
mod onboard;
mod providers_cmd;
mod status;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use oxiroute_core::config::Config;
use oxiroute_core::utils::expand_home;
use oxiroute_providers::{KeyHealthManager, ProviderRegistry};

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// Oxiroute: multi-provider LLM router with API key rotation
#[derive(Parser)]
#[command(name = "oxiroute", version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.oxiroute/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Onboard,

    /// Show configuration and provider key pools
    Status,

    /// Initialize all providers and show which are live
    Providers {
        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Send one message to a provider model
    Chat {
        /// Provider id (e.g. "openai", "claude-code")
        provider: String,

        /// Model id; empty uses the provider default
        #[arg(default_value = "")]
        model: String,

        /// Message to send
        #[arg(short, long)]
        message: String,

        /// Agent session to resume (agent providers only)
        #[arg(short, long)]
        session: Option<String>,

        /// Tool the agent may use without asking (repeatable)
        #[arg(long = "allow-tool")]
        allowed_tools: Vec<String>,

        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.map(|p| expand_home(&p.to_string_lossy()));
    let config_path = config_path.as_deref();

    match cli.command {
        Commands::Onboard => onboard::run(config_path),
        Commands::Status => status::run(config_path),
        Commands::Providers { logs } => {
            init_logging(logs);
            providers_cmd::run(config_path).await
        }
        Commands::Chat {
            provider,
            model,
            message,
            session,
            allowed_tools,
            logs,
        } => {
            init_logging(logs);
            let request = chat::ChatRequest {
                provider,
                model,
                message,
                session,
                allowed_tools,
            };
            chat::run(config_path, request).await
        }
    }
}

/// Build a registry with every built-in provider from the loaded config.
pub fn build_registry(config: &Config) -> ProviderRegistry {
    let health = KeyHealthManager::new(config.health.clone());
    ProviderRegistry::with_builtins(health, config.registry.clone())
}

/// Initialize tracing/logging.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("oxiroute=debug,info")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
