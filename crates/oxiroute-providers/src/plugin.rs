//! Provider plugin contract.
//!
//! A plugin is registered as a [`ProviderRegistration`]: static
//! [`ProviderMetadata`] plus a factory. The registry calls the factory to
//! build an instance, then `initialize` with the selected API key. Live
//! instances hand out [`ModelHandle`]s.
//!
//! Two categories exist. `Standard` plugins expose an [`LlmProvider`] client
//! and take part in the aggregated dispatch view. `Agent` plugins wrap an
//! external coding-agent CLI, expose no client, and build an [`AgentModel`]
//! per call from the caller's [`RuntimeContext`].

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use oxiroute_core::config::ProviderConfig;

use crate::dispatch::LanguageModel;
use crate::traits::LlmProvider;

// ─────────────────────────────────────────────
// Metadata
// ─────────────────────────────────────────────

/// How a provider is dispatched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProviderCategory {
    /// SDK-style client, reachable through the dispatch view.
    Standard,
    /// External agent CLI with per-call settings; bypasses the dispatch view.
    Agent,
}

impl fmt::Display for ProviderCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderCategory::Standard => f.write_str("standard"),
            ProviderCategory::Agent => f.write_str("agent"),
        }
    }
}

/// Static capability flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProviderCapabilities {
    pub streaming: bool,
    pub tool_calling: bool,
    /// Ships its own tools (file edits, shell) instead of caller-defined ones.
    pub builtin_tools: bool,
    pub session_resume: bool,
    /// Skipped at initialization when no key is configured.
    pub requires_api_key: bool,
    pub mcp: bool,
}

/// Static description of a provider plugin.
#[derive(Clone, Debug)]
pub struct ProviderMetadata {
    /// Stable provider id (e.g. `"openai"`).
    pub id: String,
    pub display_name: String,
    pub category: ProviderCategory,
    pub capabilities: ProviderCapabilities,
    /// Used when a model request leaves the model id empty.
    pub default_model: String,
}

// ─────────────────────────────────────────────
// Init + runtime context
// ─────────────────────────────────────────────

/// Everything a plugin receives at initialization.
#[derive(Clone, Debug, Default)]
pub struct PluginInitConfig {
    /// Key selected from the provider's pool, if any.
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub extra_headers: HashMap<String, String>,
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl PluginInitConfig {
    /// Build from the provider's config and the key chosen for this instance.
    pub fn from_provider_config(config: &ProviderConfig, api_key: Option<String>) -> Self {
        Self {
            api_key,
            api_base: config.api_base.clone(),
            extra_headers: config.extra_headers.clone().unwrap_or_default(),
            options: config.options.clone(),
        }
    }

    pub fn option_bool(&self, key: &str) -> bool {
        self.options
            .get(key)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(|v| v.as_str())
    }

    pub fn option_u64(&self, key: &str) -> Option<u64> {
        self.options.get(key).and_then(|v| v.as_u64())
    }
}

/// Per-request context. Standard providers ignore it; agent providers turn
/// it into [`AgentSettings`].
#[derive(Clone, Debug, Default)]
pub struct RuntimeContext {
    pub working_dir: Option<PathBuf>,
    /// Agent session to resume.
    pub session_id: Option<String>,
    /// Tools the agent may use without asking.
    pub allowed_tools: Vec<String>,
}

// ─────────────────────────────────────────────
// Model handles
// ─────────────────────────────────────────────

/// Per-call settings for an agent-category model.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AgentSettings {
    pub working_dir: Option<PathBuf>,
    pub session_id: Option<String>,
    pub allowed_tools: Vec<String>,
}

impl From<&RuntimeContext> for AgentSettings {
    fn from(ctx: &RuntimeContext) -> Self {
        Self {
            working_dir: ctx.working_dir.clone(),
            session_id: ctx.session_id.clone(),
            allowed_tools: ctx.allowed_tools.clone(),
        }
    }
}

/// Executes a prompt against an agent CLI.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn run(
        &self,
        model_id: &str,
        settings: &AgentSettings,
        prompt: &str,
    ) -> anyhow::Result<String>;
}

/// An agent-category model bound to its per-call settings.
#[derive(Clone)]
pub struct AgentModel {
    provider_id: String,
    model_id: String,
    settings: AgentSettings,
    runner: Arc<dyn AgentRunner>,
}

impl AgentModel {
    pub fn new(
        provider_id: impl Into<String>,
        model_id: impl Into<String>,
        settings: AgentSettings,
        runner: Arc<dyn AgentRunner>,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            model_id: model_id.into(),
            settings,
            runner,
        }
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    /// Run one prompt through the agent.
    pub async fn run(&self, prompt: &str) -> anyhow::Result<String> {
        self.runner.run(&self.model_id, &self.settings, prompt).await
    }
}

impl fmt::Debug for AgentModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentModel")
            .field("provider_id", &self.provider_id)
            .field("model_id", &self.model_id)
            .field("settings", &self.settings)
            .finish()
    }
}

/// What `create_model` hands back.
#[derive(Clone, Debug)]
pub enum ModelHandle {
    /// Standard provider model. The registry resolves it through the
    /// dispatch view.
    Language(LanguageModel),
    /// Agent provider model with its own settings.
    Agent(AgentModel),
}

impl ModelHandle {
    /// Agent models are built directly by their plugin and never go through
    /// the dispatch view.
    pub fn bypasses_registry(&self) -> bool {
        matches!(self, ModelHandle::Agent(_))
    }

    pub fn provider_id(&self) -> &str {
        match self {
            ModelHandle::Language(m) => m.provider_id(),
            ModelHandle::Agent(m) => m.provider_id(),
        }
    }

    pub fn model_id(&self) -> &str {
        match self {
            ModelHandle::Language(m) => m.model_id(),
            ModelHandle::Agent(m) => m.model_id(),
        }
    }

    pub fn as_language(&self) -> Option<&LanguageModel> {
        match self {
            ModelHandle::Language(m) => Some(m),
            ModelHandle::Agent(_) => None,
        }
    }

    pub fn as_agent(&self) -> Option<&AgentModel> {
        match self {
            ModelHandle::Agent(m) => Some(m),
            ModelHandle::Language(_) => None,
        }
    }
}

// ─────────────────────────────────────────────
// Plugin trait
// ─────────────────────────────────────────────

/// Trait every provider plugin implements.
#[async_trait]
pub trait ProviderPlugin: Send + Sync {
    fn metadata(&self) -> &ProviderMetadata;

    /// Set up the instance (build clients, validate the key).
    ///
    /// Errors are caught by the registry and reported as a failed outcome.
    async fn initialize(&mut self, config: PluginInitConfig) -> anyhow::Result<()>;

    fn is_initialized(&self) -> bool;

    /// Whether the instance can actually serve requests right now.
    fn is_available(&self) -> bool {
        self.is_initialized()
    }

    /// Client shared with the dispatch view. `None` for agent plugins and
    /// uninitialized instances.
    fn underlying_client(&self) -> Option<Arc<dyn LlmProvider>>;

    /// Build a model handle. An empty `model_id` means the default model.
    ///
    /// The default implementation serves standard plugins from
    /// [`ProviderPlugin::underlying_client`].
    fn create_model(&self, model_id: &str, _ctx: &RuntimeContext) -> anyhow::Result<ModelHandle> {
        let meta = self.metadata();
        let client = self
            .underlying_client()
            .ok_or_else(|| anyhow::anyhow!("provider '{}' is not initialized", meta.id))?;
        let model = if model_id.is_empty() {
            meta.default_model.as_str()
        } else {
            model_id
        };
        Ok(ModelHandle::Language(LanguageModel::new(
            meta.id.clone(),
            model,
            client,
        )))
    }

    /// Key this instance was initialized with.
    fn active_api_key(&self) -> Option<&str>;

    /// Release clients and return to the uninitialized state.
    fn reset(&mut self);
}

// ─────────────────────────────────────────────
// Registration
// ─────────────────────────────────────────────

/// Builds a fresh, uninitialized plugin instance.
pub type ProviderFactory =
    Arc<dyn Fn() -> anyhow::Result<Box<dyn ProviderPlugin>> + Send + Sync>;

/// A plugin as known to the registry before initialization.
#[derive(Clone)]
pub struct ProviderRegistration {
    pub metadata: ProviderMetadata,
    pub factory: ProviderFactory,
}

impl ProviderRegistration {
    pub fn new<F>(metadata: ProviderMetadata, factory: F) -> Self
    where
        F: Fn() -> anyhow::Result<Box<dyn ProviderPlugin>> + Send + Sync + 'static,
    {
        Self {
            metadata,
            factory: Arc::new(factory),
        }
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }
}

impl fmt::Debug for ProviderRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistration")
            .field("metadata", &self.metadata)
            .finish()
    }
}
