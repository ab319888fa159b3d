//! Configuration schema.
//!
//! Hierarchy: `Config` → `providers` (one `ProviderConfig` per provider id),
//! `KeyHealthConfig`, `RegistryConfig`.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration: loaded from `~/.oxiroute/config.json` + env vars.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Provider configs keyed by provider id (e.g. `"openai"`).
    pub providers: HashMap<String, ProviderConfig>,
    pub health: KeyHealthConfig,
    pub registry: RegistryConfig,
}

// ─────────────────────────────────────────────
// Providers
// ─────────────────────────────────────────────

/// One API key or a pool of interchangeable keys.
///
/// Accepts either `"apiKey": "sk-1"` or `"apiKey": ["sk-1", "sk-2"]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiKeys {
    Single(String),
    Many(Vec<String>),
}

impl ApiKeys {
    /// Normalize to a list, dropping empty and whitespace-only entries.
    pub fn to_vec(&self) -> Vec<String> {
        let raw: Vec<&String> = match self {
            ApiKeys::Single(key) => vec![key],
            ApiKeys::Many(keys) => keys.iter().collect(),
        };
        raw.into_iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(String::from)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.to_vec().is_empty()
    }

    pub fn len(&self) -> usize {
        self.to_vec().len()
    }
}

impl Default for ApiKeys {
    fn default() -> Self {
        ApiKeys::Many(Vec::new())
    }
}

impl From<&str> for ApiKeys {
    fn from(key: &str) -> Self {
        ApiKeys::Single(key.to_string())
    }
}

impl From<String> for ApiKeys {
    fn from(key: String) -> Self {
        ApiKeys::Single(key)
    }
}

impl From<Vec<String>> for ApiKeys {
    fn from(keys: Vec<String>) -> Self {
        ApiKeys::Many(keys)
    }
}

impl From<Vec<&str>> for ApiKeys {
    fn from(keys: Vec<&str>) -> Self {
        ApiKeys::Many(keys.into_iter().map(String::from).collect())
    }
}

impl<const N: usize> From<[&str; N]> for ApiKeys {
    fn from(keys: [&str; N]) -> Self {
        ApiKeys::Many(keys.iter().map(|k| k.to_string()).collect())
    }
}

/// Configuration for a single provider (keys, base URL, headers, options).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    /// API key or key pool.
    pub api_key: ApiKeys,
    /// Custom API base URL (overrides the provider default).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Extra HTTP headers to send with each request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_headers: Option<HashMap<String, String>>,
    /// Free-form provider options, passed through to the plugin untouched.
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl ProviderConfig {
    /// Config with the given key(s) and nothing else.
    pub fn with_keys(keys: impl Into<ApiKeys>) -> Self {
        Self {
            api_key: keys.into(),
            ..Default::default()
        }
    }

    /// Whether at least one non-empty API key is configured.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Configured keys, normalized.
    pub fn keys(&self) -> Vec<String> {
        self.api_key.to_vec()
    }
}

// ─────────────────────────────────────────────
// Key health
// ─────────────────────────────────────────────

/// Tuning for per-key failure tracking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyHealthConfig {
    /// Failures older than this are ignored when counting toward the threshold.
    pub failure_window_ms: u64,
    /// Failures inside the window that disable a key.
    pub failure_threshold: u32,
    /// How long a key stays disabled once the threshold is reached.
    pub disable_duration_ms: u64,
}

impl Default for KeyHealthConfig {
    fn default() -> Self {
        Self {
            failure_window_ms: 60_000,
            failure_threshold: 3,
            disable_duration_ms: 300_000,
        }
    }
}

// ─────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────

/// Provider registry settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistryConfig {
    /// When set, every model request is served by this provider id instead
    /// of the requested one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mock_provider: Option<String>,
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
