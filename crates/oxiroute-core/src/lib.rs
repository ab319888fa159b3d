//! Core types, configuration, and utilities shared by the Oxiroute crates.
//!
//! - [`types`]: OpenAI-format chat messages and responses
//! - [`config`]: on-disk configuration, env overrides, key lists
//! - [`utils`]: data directory, key masking

pub mod config;
pub mod types;
pub mod utils;
