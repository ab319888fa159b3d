//! `oxiroute providers`: initialize the registry and report what came up.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use oxiroute_core::config::load_config;

use crate::helpers::{format_outcome, print_title};

/// Run the providers command.
pub async fn run(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path);
    let mut registry = crate::build_registry(&config);

    print_title("Oxiroute Providers");

    let outcomes = registry.initialize(&config.providers).await;
    if outcomes.is_empty() {
        println!("  {}", "no providers initialized".dimmed());
    }
    for outcome in &outcomes {
        println!("  {}", format_outcome(outcome));
    }

    println!();
    let available = registry.available_providers();
    println!(
        "  {:<12} {}",
        "Available:".bold(),
        if available.is_empty() {
            "(none)".dimmed().to_string()
        } else {
            available.join(", ")
        }
    );

    // Live but not usable, e.g. an agent CLI missing from PATH.
    for outcome in outcomes.iter().filter(|o| o.success) {
        if !registry.has_provider(&outcome.provider_id) {
            println!(
                "  {} {} is live but unavailable",
                "!".yellow(),
                outcome.provider_id
            );
        }
    }

    let rotating: Vec<String> = registry
        .health()
        .registered_providers()
        .into_iter()
        .filter(|id| registry.health().has_multiple_keys(id))
        .collect();
    if !rotating.is_empty() {
        println!("  {:<12} {}", "Rotating:".bold(), rotating.join(", "));
    }
    println!();

    Ok(())
}
