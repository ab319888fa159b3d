//! `oxiroute status`: show configuration and provider key pools.
//!
//! Reads the config only; no provider is initialized.

use std::path::{Path, PathBuf};

use anyhow::Result;
use colored::Colorize;

use oxiroute_core::config::{get_config_path, load_config, ProviderConfig};
use oxiroute_providers::catalog::{ProviderSpec, PROVIDERS};

/// Run the status command.
pub fn run(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path);
    let path = config_path.map(PathBuf::from).unwrap_or_else(get_config_path);

    println!();
    println!("{}", "Oxiroute Status".cyan().bold());
    println!();

    println!(
        "  {:<18} {} {}",
        "Config:".bold(),
        path.display(),
        if path.exists() {
            "✓".green().to_string()
        } else {
            "(not found)".red().to_string()
        }
    );

    let health = &config.health;
    println!(
        "  {:<18} {}",
        "Key health:".bold(),
        format!(
            "disable after {} failures in {}s, for {}s",
            health.failure_threshold,
            health.failure_window_ms / 1000,
            health.disable_duration_ms / 1000
        )
        .dimmed()
    );

    if let Some(mock) = &config.registry.mock_provider {
        println!("  {:<18} {}", "Mock mode:".bold(), mock.yellow());
    }

    println!();
    println!("  {}", "Providers:".bold());
    for spec in PROVIDERS {
        println!(
            "    {:<14} {:<9} {}",
            spec.display_name,
            spec.category.to_string().dimmed(),
            key_status(spec, config.providers.get(spec.name))
        );
    }

    // Config entries for ids the catalogue does not know.
    let mut unknown: Vec<&String> = config
        .providers
        .keys()
        .filter(|id| PROVIDERS.iter().all(|s| s.name != id.as_str()))
        .collect();
    unknown.sort();
    if !unknown.is_empty() {
        println!();
        for id in unknown {
            println!("  {} unknown provider '{}' in config", "!".yellow(), id);
        }
    }

    println!();
    Ok(())
}

/// Key column for one catalogue provider.
fn key_status(spec: &ProviderSpec, config: Option<&ProviderConfig>) -> String {
    match config.map(|c| c.keys().len()).unwrap_or(0) {
        0 if spec.requires_api_key => format!("{}", "· not configured".dimmed()),
        0 => format!("{}", "· no key needed".dimmed()),
        1 => format!("{} (1 key)", "✓".green()),
        n => format!("{} ({} keys, rotating)", "✓".green(), n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxiroute_providers::find_by_name;

    #[test]
    fn key_status_variants() {
        colored::control::set_override(false);
        let openai = find_by_name("openai").unwrap();
        let ollama = find_by_name("ollama").unwrap();

        assert_eq!(key_status(openai, None), "· not configured");
        assert_eq!(key_status(ollama, None), "· no key needed");

        let one = ProviderConfig::with_keys("sk-1");
        assert_eq!(key_status(openai, Some(&one)), "✓ (1 key)");

        let many = ProviderConfig::with_keys(vec!["a", "b", ""]);
        assert_eq!(key_status(openai, Some(&many)), "✓ (2 keys, rotating)");
    }
}
