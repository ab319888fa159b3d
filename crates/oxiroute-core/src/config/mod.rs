//! Configuration system: schema, loading, and env var overrides.
//!
//! # Usage
//! ```no_run
//! use oxiroute_core::config;
//!
//! let cfg = config::load_config(None);
//! println!("Providers: {}", cfg.providers.len());
//! ```

pub mod loader;
pub mod schema;

// Re-export key types
pub use loader::{get_config_path, load_config, save_config};
pub use schema::{ApiKeys, Config, KeyHealthConfig, ProviderConfig, RegistryConfig};
