//! Config loader: reads `~/.oxiroute/config.json`, merges env vars, and
//! applies legacy migrations.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.oxiroute/config.json`
//! 3. Environment variables `OXIROUTE_<SECTION>__<FIELD>` (override JSON)

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::schema::{ApiKeys, Config, ProviderConfig};

const PROVIDER_ENV_PREFIX: &str = "OXIROUTE_PROVIDERS__";

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from the given path (or the default one) + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't be parsed.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    load_config_from_path(&config_path)
}

fn load_config_from_path(path: &Path) -> Config {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return apply_env_overrides(Config::default());
    }

    debug!("Loading config from {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return apply_env_overrides(Config::default());
        }
    };

    let mut raw: serde_json::Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            warn!("Failed to parse config JSON: {}", e);
            return apply_env_overrides(Config::default());
        }
    };

    migrate_config(&mut raw);

    let config: Config = match serde_json::from_value(raw) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to deserialize config: {}", e);
            return apply_env_overrides(Config::default());
        }
    };

    apply_env_overrides(config)
}

/// Save configuration to disk (pretty-printed JSON with camelCase keys).
pub fn save_config(config: &Config, path: Option<&Path>) -> std::io::Result<()> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    std::fs::write(&config_path, json)?;
    debug!("Config saved to {}", config_path.display());
    Ok(())
}

/// Apply legacy config migrations.
///
/// Folds `providers.<id>.apiKeys` (old list field) into `providers.<id>.apiKey`.
fn migrate_config(raw: &mut serde_json::Value) {
    let Some(providers) = raw.get_mut("providers").and_then(|p| p.as_object_mut()) else {
        return;
    };

    for (id, entry) in providers.iter_mut() {
        let Some(obj) = entry.as_object_mut() else {
            continue;
        };
        if let Some(keys) = obj.remove("apiKeys") {
            if obj.get("apiKey").is_none() {
                obj.insert("apiKey".to_string(), keys);
                debug!(provider = %id, "Migrated providers.apiKeys → providers.apiKey");
            }
        }
    }
}

/// Apply environment variable overrides on top of a loaded config.
///
/// Env var format: `OXIROUTE_<SECTION>__<FIELD>` (double underscore as delimiter).
///
/// Supported overrides:
/// - `OXIROUTE_PROVIDERS__<ID>__API_KEY` → `providers.<id>.api_key` (comma-separated pool)
/// - `OXIROUTE_PROVIDERS__<ID>__API_BASE` → `providers.<id>.api_base`
/// - `OXIROUTE_HEALTH__FAILURE_WINDOW_MS` → `health.failure_window_ms`
/// - `OXIROUTE_HEALTH__FAILURE_THRESHOLD` → `health.failure_threshold`
/// - `OXIROUTE_HEALTH__DISABLE_DURATION_MS` → `health.disable_duration_ms`
/// - `OXIROUTE_MOCK_PROVIDER` → `registry.mock_provider`
///
/// `<ID>` is lowercased and `_` becomes `-`, so `CLAUDE_CODE` targets `claude-code`.
fn apply_env_overrides(mut config: Config) -> Config {
    for (name, val) in std::env::vars() {
        let Some(rest) = name.strip_prefix(PROVIDER_ENV_PREFIX) else {
            continue;
        };
        let Some((id, field)) = rest.split_once("__") else {
            continue;
        };
        let id = id.to_lowercase().replace('_', "-");
        apply_provider_env(config.providers.entry(id).or_default(), field, val);
    }

    if let Ok(val) = std::env::var("OXIROUTE_HEALTH__FAILURE_WINDOW_MS") {
        if let Ok(n) = val.parse::<u64>() {
            config.health.failure_window_ms = n;
        }
    }
    if let Ok(val) = std::env::var("OXIROUTE_HEALTH__FAILURE_THRESHOLD") {
        if let Ok(n) = val.parse::<u32>() {
            config.health.failure_threshold = n;
        }
    }
    if let Ok(val) = std::env::var("OXIROUTE_HEALTH__DISABLE_DURATION_MS") {
        if let Ok(n) = val.parse::<u64>() {
            config.health.disable_duration_ms = n;
        }
    }

    if let Ok(val) = std::env::var("OXIROUTE_MOCK_PROVIDER") {
        config.registry.mock_provider = if val.is_empty() { None } else { Some(val) };
    }

    config
}

/// Apply one env var override to a single provider.
fn apply_provider_env(provider: &mut ProviderConfig, field: &str, val: String) {
    match field {
        "API_KEY" => {
            let keys: Vec<String> = val.split(',').map(|k| k.trim().to_string()).collect();
            provider.api_key = if keys.len() == 1 {
                ApiKeys::Single(val.trim().to_string())
            } else {
                ApiKeys::Many(keys)
            };
        }
        "API_BASE" => provider.api_base = Some(val),
        other => debug!(field = other, "Ignoring unknown provider env override"),
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
