//! `oxiroute onboard`: write a default configuration.
//!
//! Creates `~/.oxiroute/config.json` with default health settings and an
//! empty key pool for every key-requiring catalogue provider.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;

use oxiroute_core::config::{get_config_path, save_config, Config, ProviderConfig};
use oxiroute_providers::catalog::PROVIDERS;

/// Run the onboard command.
pub fn run(config_path: Option<&Path>) -> Result<()> {
    println!();
    println!("{}", "Oxiroute Setup".cyan().bold());
    println!();

    let path = config_path.map(PathBuf::from).unwrap_or_else(get_config_path);

    if write_default_config(&path)? {
        println!("  {} created config at {}", "✓".green(), path.display());
    } else {
        println!(
            "  {} config already exists at {}",
            "✓".green(),
            path.display()
        );
    }

    println!();
    println!(
        "{}",
        "Next: add API keys under providers.<id>.apiKey (a string or a list).".dimmed()
    );
    println!();
    Ok(())
}

/// Template config with an entry for each provider that needs a key.
pub fn default_config() -> Config {
    let mut config = Config::default();
    for spec in PROVIDERS.iter().filter(|s| s.requires_api_key) {
        config
            .providers
            .insert(spec.name.to_string(), ProviderConfig::default());
    }
    config
}

/// Write [`default_config`] to `path` unless a file is already there.
///
/// Returns whether a file was written.
pub fn write_default_config(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    save_config(&default_config(), Some(path))
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(true)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use oxiroute_core::config::load_config;

    #[test]
    fn write_default_config_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        assert!(write_default_config(&path).unwrap());
        let loaded = load_config(Some(&path));
        assert!(loaded.providers.contains_key("openai"));
        assert!(!loaded.providers.contains_key("ollama"));
        assert_eq!(loaded.health.failure_threshold, 3);
    }

    #[test]
    fn write_default_config_keeps_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{\"providers\": {}}").unwrap();

        assert!(!write_default_config(&path).unwrap());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "{\"providers\": {}}"
        );
    }

    #[test]
    fn default_config_has_no_keys() {
        let config = default_config();
        assert!(config.providers.values().all(|p| !p.is_configured()));
    }
}
