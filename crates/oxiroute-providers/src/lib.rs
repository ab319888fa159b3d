//! Provider registry with per-key health tracking and rotation.
//!
//! # Architecture
//!
//! - [`key_health::KeyHealthManager`]: per-provider key pools, sliding-window
//!   failure counting, lazy re-enabling
//! - [`registry::ProviderRegistry`]: plugin registrations, live instances,
//!   key rotation via `reinitialize_provider`
//! - [`plugin::ProviderPlugin`]: contract every provider plugin implements
//! - [`dispatch::DispatchView`]: `"provider:model"` lookup over live standard providers
//! - [`catalog`]: built-in provider specs and their registrations
//! - [`plugins`]: OpenAI-compatible, CLI agent, and mock plugins

pub mod catalog;
pub mod dispatch;
pub mod error;
pub mod http_provider;
pub mod key_health;
pub mod plugin;
pub mod plugins;
pub mod registry;
pub mod traits;

// Re-export main types for convenience
pub use catalog::{builtin_registrations, find_by_name, ProviderSpec, PROVIDERS};
pub use dispatch::{DispatchView, LanguageModel};
pub use error::RegistryError;
pub use http_provider::HttpProvider;
pub use key_health::{Clock, KeyHealthManager, ManualClock, SystemClock};
pub use plugin::{
    AgentModel, AgentSettings, ModelHandle, PluginInitConfig, ProviderCapabilities,
    ProviderCategory, ProviderMetadata, ProviderPlugin, ProviderRegistration, RuntimeContext,
};
pub use registry::{InitOutcome, ProviderRegistry};
pub use traits::{LlmProvider, LlmRequestConfig};
