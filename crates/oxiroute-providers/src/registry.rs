//! Provider registry: plugin registrations, live instances, key rotation.
//!
//! The registry owns a [`KeyHealthManager`]. `initialize` picks a key for
//! every registered plugin and brings it up; `reinitialize_provider` reports
//! a failed key and swaps the live instance for one built with a healthy
//! key. Standard instances are also indexed in a [`DispatchView`].

use std::collections::HashMap;
use tracing::{debug, info, warn};

use oxiroute_core::config::{ProviderConfig, RegistryConfig};
use oxiroute_core::utils::mask_key;

use crate::catalog::builtin_registrations;
use crate::dispatch::{DispatchView, LanguageModel};
use crate::error::RegistryError;
use crate::key_health::KeyHealthManager;
use crate::plugin::{
    ModelHandle, PluginInitConfig, ProviderCategory, ProviderPlugin, ProviderRegistration,
    RuntimeContext,
};
// ─────────────────────────────────────────────
// InitOutcome
// ─────────────────────────────────────────────

/// Result of bringing up one provider during [`ProviderRegistry::initialize`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitOutcome {
    pub provider_id: String,
    pub success: bool,
    pub error: Option<String>,
}

impl InitOutcome {
    pub fn ok(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            success: true,
            error: None,
        }
    }

    pub fn failed(provider_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            success: false,
            error: Some(error.into()),
        }
    }
}

// ─────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────

/// Registered plugins plus their live instances.
pub struct ProviderRegistry {
    health: KeyHealthManager,
    config: RegistryConfig,
    /// Registration order is initialization order.
    registrations: Vec<ProviderRegistration>,
    live: HashMap<String, Box<dyn ProviderPlugin>>,
    view: DispatchView,
    /// Configs from the last `initialize`, reused on rotation.
    configs: HashMap<String, ProviderConfig>,
    initialized: bool,
}

impl ProviderRegistry {
    pub fn new(health: KeyHealthManager, config: RegistryConfig) -> Self {
        Self {
            health,
            config,
            registrations: Vec::new(),
            live: HashMap::new(),
            view: DispatchView::default(),
            configs: HashMap::new(),
            initialized: false,
        }
    }

    /// Registry with every catalogue provider registered.
    pub fn with_builtins(health: KeyHealthManager, config: RegistryConfig) -> Self {
        let mut registry = Self::new(health, config);
        registry.register_all(builtin_registrations());
        registry
    }

    // ── Registration ──

    /// Register a plugin. The first registration for an id wins.
    pub fn register(&mut self, registration: ProviderRegistration) {
        if self.registration(registration.id()).is_some() {
            warn!(provider = registration.id(), "Duplicate provider registration ignored");
            return;
        }
        debug!(
            provider = registration.id(),
            category = %registration.metadata.category,
            "Registered provider"
        );
        self.registrations.push(registration);
    }

    pub fn register_all(&mut self, registrations: impl IntoIterator<Item = ProviderRegistration>) {
        for registration in registrations {
            self.register(registration);
        }
    }

    fn registration(&self, provider_id: &str) -> Option<&ProviderRegistration> {
        self.registrations.iter().find(|r| r.id() == provider_id)
    }

    /// Registered ids, in registration order.
    pub fn registered_providers(&self) -> Vec<String> {
        self.registrations.iter().map(|r| r.id().to_string()).collect()
    }

    // ── Lifecycle ──

    /// Bring up every registered plugin that can run with `configs`.
    ///
    /// Key-requiring providers without configured keys are skipped and
    /// produce no outcome. A failing plugin yields a failed outcome and does
    /// not affect the others.
    pub async fn initialize(
        &mut self,
        configs: &HashMap<String, ProviderConfig>,
    ) -> Vec<InitOutcome> {
        if !self.live.is_empty() {
            debug!(count = self.live.len(), "Resetting live providers before re-initialization");
            self.reset_instances();
        }
        self.configs = configs.clone();

        let registrations = self.registrations.clone();
        let mut outcomes = Vec::new();

        for registration in &registrations {
            let id = registration.id();
            let config = configs.get(id);
            let configured = config.is_some_and(ProviderConfig::is_configured);

            if let Some(config) = config.filter(|c| c.is_configured()) {
                self.health.register_keys(id, config.api_key.clone());
            }
            if registration.metadata.capabilities.requires_api_key && !configured {
                debug!(provider = id, "No API key configured, skipping");
                continue;
            }

            let key = self.health.select_key(id);
            match build_instance(registration, config, key).await {
                Ok(plugin) => {
                    let masked = plugin
                        .active_api_key()
                        .map(mask_key)
                        .unwrap_or_else(|| "-".to_string());
                    info!(provider = id, key = %masked, "Provider live");
                    self.live.insert(id.to_string(), plugin);
                    outcomes.push(InitOutcome::ok(id));
                }
                Err(e) => {
                    warn!(provider = id, error = %e, "Provider failed to initialize");
                    outcomes.push(InitOutcome::failed(id, format!("{e:#}")));
                }
            }
        }

        self.rebuild_view();
        self.initialized = true;
        info!(
            live = self.live.len(),
            failed = outcomes.iter().filter(|o| !o.success).count(),
            "Provider registry initialized"
        );
        outcomes
    }

    /// Rotate `provider_id` away from `failed_key`.
    ///
    /// Returns `true` only when a new instance with a different key is live.
    /// On any failure the previous instance stays in place.
    pub async fn reinitialize_provider(&mut self, provider_id: &str, failed_key: &str) -> bool {
        if !self.health.has_multiple_keys(provider_id) {
            debug!(provider = provider_id, "Single key pool, nothing to rotate to");
            return false;
        }

        self.health.report_failure(provider_id, failed_key);

        let new_key = match self.health.select_key(provider_id) {
            Some(key) if key != failed_key => key,
            _ => {
                warn!(provider = provider_id, "No alternative key available");
                return false;
            }
        };

        let Some(registration) = self.registration(provider_id).cloned() else {
            warn!(provider = provider_id, "Rotation requested for unregistered provider");
            return false;
        };

        let config = self.configs.get(provider_id);
        let plugin = match build_instance(&registration, config, Some(new_key.clone())).await {
            Ok(plugin) => plugin,
            Err(e) => {
                warn!(provider = provider_id, error = %e, "Re-initialization failed, keeping current instance");
                return false;
            }
        };

        if let Some(mut old) = self.live.insert(provider_id.to_string(), plugin) {
            old.reset();
        }
        self.rebuild_view();
        info!(
            provider = provider_id,
            from = %mask_key(failed_key),
            to = %mask_key(&new_key),
            "Rotated API key"
        );
        true
    }

    /// Reset every live instance and forget all key health. Registrations
    /// are kept.
    pub fn reset(&mut self) {
        self.reset_instances();
        self.configs.clear();
        self.initialized = false;
        self.health.reset();
        debug!("Provider registry reset");
    }

    fn reset_instances(&mut self) {
        for plugin in self.live.values_mut() {
            plugin.reset();
        }
        self.live.clear();
        self.view = DispatchView::default();
    }

    fn rebuild_view(&mut self) {
        self.view = DispatchView::build(self.live.iter().filter_map(|(id, plugin)| {
            if plugin.metadata().category != ProviderCategory::Standard {
                return None;
            }
            plugin
                .underlying_client()
                .map(|client| (id.clone(), client))
        }));
    }

    // ── Dispatch ──

    /// Provider that actually serves `provider_id`, honoring mock mode.
    fn route<'a>(&'a self, provider_id: &'a str) -> &'a str {
        match self.config.mock_provider.as_deref() {
            Some(mock) if mock != provider_id => {
                debug!(requested = provider_id, serving = mock, "Mock mode redirect");
                mock
            }
            _ => provider_id,
        }
    }

    /// Build a model from the live instance for `provider_id`.
    ///
    /// Standard providers resolve through the dispatch view; agent plugins
    /// build their own handle. An empty `model_id` means the provider's
    /// default model.
    pub fn create_model(
        &self,
        provider_id: &str,
        model_id: &str,
        ctx: &RuntimeContext,
    ) -> Result<ModelHandle, RegistryError> {
        let target = self.route(provider_id);
        let plugin = self
            .live
            .get(target)
            .ok_or_else(|| RegistryError::ProviderNotAvailable {
                provider_id: target.to_string(),
                available: self.available_providers(),
            })?;

        let creation_error = |source: anyhow::Error| RegistryError::ModelCreation {
            provider_id: target.to_string(),
            model_id: model_id.to_string(),
            source,
        };

        match plugin.metadata().category {
            ProviderCategory::Standard => {
                let model = if model_id.is_empty() {
                    plugin.metadata().default_model.as_str()
                } else {
                    model_id
                };
                self.view
                    .resolve(target, model)
                    .map(ModelHandle::Language)
                    .ok_or_else(|| {
                        creation_error(anyhow::anyhow!(
                            "provider '{target}' has no client in the dispatch view"
                        ))
                    })
            }
            ProviderCategory::Agent => plugin.create_model(model_id, ctx).map_err(creation_error),
        }
    }

    /// Resolve a `"provider:model"` id through the dispatch view.
    pub fn language_model(&self, qualified_id: &str) -> Result<LanguageModel, RegistryError> {
        let (provider, model) = DispatchView::split_id(qualified_id)?;
        let target = self.route(provider);
        self.view
            .resolve(target, model)
            .ok_or_else(|| RegistryError::ProviderNotAvailable {
                provider_id: target.to_string(),
                available: self.view.provider_ids(),
            })
    }

    // ── Reads ──

    pub fn active_api_key(&self, provider_id: &str) -> Option<String> {
        self.live
            .get(provider_id)
            .and_then(|p| p.active_api_key())
            .map(String::from)
    }

    pub fn provider(&self, provider_id: &str) -> Option<&dyn ProviderPlugin> {
        self.live.get(provider_id).map(|p| p.as_ref())
    }

    /// Live and able to serve.
    pub fn has_provider(&self, provider_id: &str) -> bool {
        self.live
            .get(provider_id)
            .is_some_and(|p| p.is_available())
    }

    /// Ids of live, available providers, sorted.
    pub fn available_providers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .live
            .iter()
            .filter(|(_, p)| p.is_available())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn dispatch_view(&self) -> &DispatchView {
        &self.view
    }

    pub fn health(&self) -> &KeyHealthManager {
        &self.health
    }

    pub fn health_mut(&mut self) -> &mut KeyHealthManager {
        &mut self.health
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("registered", &self.registered_providers())
            .field("live", &self.available_providers())
            .field("initialized", &self.initialized)
            .finish()
    }
}

/// Construct and initialize one plugin instance.
async fn build_instance(
    registration: &ProviderRegistration,
    config: Option<&ProviderConfig>,
    api_key: Option<String>,
) -> anyhow::Result<Box<dyn ProviderPlugin>> {
    let mut plugin = (registration.factory)()?;
    let init = match config {
        Some(config) => PluginInitConfig::from_provider_config(config, api_key),
        None => PluginInitConfig {
            api_key,
            ..Default::default()
        },
    };
    plugin.initialize(init).await?;
    Ok(plugin)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_health::ManualClock;
    use crate::plugin::{ProviderCapabilities, ProviderMetadata};
    use crate::plugins::MockPlugin;
    use crate::traits::LlmProvider;
    use std::sync::Arc;
    use async_trait::async_trait;
    use oxiroute_core::config::KeyHealthConfig;
    use oxiroute_core::types::Message;
    use serde_json::json;

    fn meta(id: &str, requires_key: bool) -> ProviderMetadata {
        ProviderMetadata {
            id: id.to_string(),
            display_name: id.to_uppercase(),
            category: ProviderCategory::Standard,
            capabilities: ProviderCapabilities {
                requires_api_key: requires_key,
                ..Default::default()
            },
            default_model: format!("{id}-default"),
        }
    }

    fn mock_registration(id: &str, requires_key: bool) -> ProviderRegistration {
        let metadata = meta(id, requires_key);
        ProviderRegistration::new(metadata.clone(), move || {
            Ok(Box::new(MockPlugin::new(metadata.clone())) as Box<dyn ProviderPlugin>)
        })
    }

    /// Plugin that refuses keys listed in `options.rejectKeys`.
    struct PickyPlugin {
        metadata: ProviderMetadata,
        key: Option<String>,
        ready: bool,
    }

    #[async_trait]
    impl ProviderPlugin for PickyPlugin {
        fn metadata(&self) -> &ProviderMetadata {
            &self.metadata
        }

        async fn initialize(&mut self, config: PluginInitConfig) -> anyhow::Result<()> {
            let key = config.api_key.as_deref();
            let rejected = config
                .options
                .get("rejectKeys")
                .and_then(|v| v.as_array())
                .is_some_and(|keys| keys.iter().any(|k| k.as_str() == key));
            if rejected {
                anyhow::bail!("key rejected");
            }
            self.key = config.api_key;
            self.ready = true;
            Ok(())
        }

        fn is_initialized(&self) -> bool {
            self.ready
        }

        fn underlying_client(&self) -> Option<Arc<dyn LlmProvider>> {
            None
        }

        fn active_api_key(&self) -> Option<&str> {
            self.key.as_deref()
        }

        fn reset(&mut self) {
            self.ready = false;
            self.key = None;
        }
    }

    fn picky_registration(id: &str) -> ProviderRegistration {
        let metadata = meta(id, true);
        ProviderRegistration::new(metadata.clone(), move || {
            Ok(Box::new(PickyPlugin {
                metadata: metadata.clone(),
                key: None,
                ready: false,
            }) as Box<dyn ProviderPlugin>)
        })
    }

    fn registry() -> ProviderRegistry {
        let clock = Arc::new(ManualClock::default());
        let health = KeyHealthManager::with_clock(KeyHealthConfig::default(), clock);
        let mut registry = ProviderRegistry::new(health, RegistryConfig::default());
        registry.register_all([
            mock_registration("alpha", true),
            mock_registration("local", false),
            picky_registration("picky"),
        ]);
        registry
    }

    fn configs(entries: &[(&str, ProviderConfig)]) -> HashMap<String, ProviderConfig> {
        entries
            .iter()
            .map(|(id, c)| (id.to_string(), c.clone()))
            .collect()
    }

    #[test]
    fn test_duplicate_registration_first_wins() {
        let mut reg = registry();
        let mut other = meta("alpha", false);
        other.display_name = "Other".into();
        reg.register(ProviderRegistration::new(other, || anyhow::bail!("unused")));

        assert_eq!(reg.registered_providers(), vec!["alpha", "local", "picky"]);
        assert_eq!(reg.registration("alpha").unwrap().metadata.display_name, "ALPHA");
    }

    #[tokio::test]
    async fn test_initialize_skips_unconfigured_key_providers() {
        let mut reg = registry();
        let outcomes = reg.initialize(&HashMap::new()).await;

        assert_eq!(outcomes, vec![InitOutcome::ok("local")]);
        assert!(reg.is_initialized());
        assert!(!reg.has_provider("alpha"));
        assert_eq!(reg.available_providers(), vec!["local"]);
        assert!(reg.active_api_key("local").is_none());
    }

    #[tokio::test]
    async fn test_initialize_outcomes_in_registration_order() {
        let mut reg = registry();
        let mut picky = ProviderConfig::with_keys("bad");
        picky.options.insert("rejectKeys".into(), json!(["bad"]));

        let outcomes = reg
            .initialize(&configs(&[
                ("picky", picky),
                ("alpha", ProviderConfig::with_keys("a1")),
            ]))
            .await;

        let ids: Vec<&str> = outcomes.iter().map(|o| o.provider_id.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "local", "picky"]);
        assert!(outcomes[0].success);
        assert!(!outcomes[2].success);
        assert!(outcomes[2].error.as_deref().unwrap().contains("key rejected"));
        assert!(reg.provider("picky").is_none());
        assert_eq!(reg.active_api_key("alpha").as_deref(), Some("a1"));
    }

    #[tokio::test]
    async fn test_failed_init_option_reports_failure() {
        let mut reg = registry();
        let mut local = ProviderConfig::default();
        local.options.insert("failInit".into(), json!(true));

        let outcomes = reg.initialize(&configs(&[("local", local)])).await;
        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].success);
        assert!(reg.available_providers().is_empty());
    }

    #[tokio::test]
    async fn test_reinitialize_rotates_key() {
        let mut reg = registry();
        reg.initialize(&configs(&[(
            "alpha",
            ProviderConfig::with_keys(vec!["k1", "k2", "k3"]),
        )]))
        .await;

        let first = reg.active_api_key("alpha").unwrap();
        for _ in 0..2 {
            reg.health_mut().report_failure("alpha", &first);
        }
        assert!(reg.reinitialize_provider("alpha", &first).await);

        let second = reg.active_api_key("alpha").unwrap();
        assert_ne!(second, first);
        assert_eq!(reg.health().healthy_key_count("alpha"), 2);
        assert!(reg.has_provider("alpha"));
        assert!(reg.dispatch_view().contains("alpha"));
    }

    #[tokio::test]
    async fn test_reinitialize_single_key_is_false() {
        let mut reg = registry();
        reg.initialize(&configs(&[("alpha", ProviderConfig::with_keys("only"))]))
            .await;

        assert!(!reg.reinitialize_provider("alpha", "only").await);
        assert_eq!(reg.active_api_key("alpha").as_deref(), Some("only"));
    }

    #[tokio::test]
    async fn test_reinitialize_unknown_provider_is_false() {
        let mut reg = registry();
        reg.initialize(&HashMap::new()).await;
        assert!(!reg.reinitialize_provider("ghost", "k").await);
    }

    #[tokio::test]
    async fn test_failed_rotation_keeps_old_instance() {
        let mut reg = registry();
        let mut picky = ProviderConfig::with_keys(vec!["good", "bad"]);
        picky.options.insert("rejectKeys".into(), json!(["bad"]));
        let cfg = configs(&[("picky", picky)]);

        // Retry until the initial pick lands on the accepted key.
        loop {
            reg.initialize(&cfg).await;
            if reg.active_api_key("picky").as_deref() == Some("good") {
                break;
            }
        }

        // Disable "good" so the only alternative is the rejected key.
        for _ in 0..2 {
            reg.health_mut().report_failure("picky", "good");
        }
        assert!(!reg.reinitialize_provider("picky", "good").await);
        assert_eq!(reg.active_api_key("picky").as_deref(), Some("good"));
        assert!(reg.provider("picky").unwrap().is_initialized());
    }

    #[tokio::test]
    async fn test_create_model_and_missing_provider() {
        let mut reg = registry();
        reg.initialize(&configs(&[("alpha", ProviderConfig::with_keys("a"))]))
            .await;

        let handle = reg
            .create_model("alpha", "", &RuntimeContext::default())
            .unwrap();
        assert_eq!(handle.model_id(), "alpha-default");

        let err = reg
            .create_model("nonexistent", "m1", &RuntimeContext::default())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "provider 'nonexistent' is not available. Currently available: [alpha, local]"
        );
    }

    #[tokio::test]
    async fn test_create_model_error_is_wrapped() {
        let mut reg = registry();
        reg.initialize(&configs(&[("picky", ProviderConfig::with_keys("p"))]))
            .await;

        // Picky exposes no client, so the view has nothing to resolve.
        let err = reg
            .create_model("picky", "m", &RuntimeContext::default())
            .unwrap_err();
        assert!(matches!(err, RegistryError::ModelCreation { .. }));
    }

    #[tokio::test]
    async fn test_create_model_resolves_through_view() {
        let mut reg = registry();
        reg.initialize(&configs(&[("alpha", ProviderConfig::with_keys(vec!["a1", "a2"]))]))
            .await;

        let handle = reg
            .create_model("alpha", "m", &RuntimeContext::default())
            .unwrap();
        let model = handle.as_language().unwrap();
        let in_view = reg.dispatch_view().resolve("alpha", "m").unwrap();
        assert!(Arc::ptr_eq(model.client(), in_view.client()));

        let old_key = reg.active_api_key("alpha").unwrap();
        for _ in 0..2 {
            reg.health_mut().report_failure("alpha", &old_key);
        }
        assert!(reg.reinitialize_provider("alpha", &old_key).await);
        let rotated = reg
            .create_model("alpha", "m", &RuntimeContext::default())
            .unwrap();
        let in_view = reg.dispatch_view().resolve("alpha", "m").unwrap();
        assert!(Arc::ptr_eq(rotated.as_language().unwrap().client(), in_view.client()));
        assert!(!Arc::ptr_eq(model.client(), in_view.client()));
    }

    #[tokio::test]
    async fn test_language_model_through_view() {
        let mut reg = registry();
        reg.initialize(&HashMap::new()).await;

        let model = reg.language_model("local:tiny").unwrap();
        let resp = model
            .chat(&[Message::user("hello")], &Default::default())
            .await;
        assert_eq!(resp.content.as_deref(), Some("[mock:tiny] hello"));

        assert!(matches!(
            reg.language_model("alpha:x"),
            Err(RegistryError::ProviderNotAvailable { .. })
        ));
        assert!(matches!(
            reg.language_model("bogus"),
            Err(RegistryError::InvalidModelId(_))
        ));
    }

    #[tokio::test]
    async fn test_mock_mode_redirects() {
        let health = KeyHealthManager::new(KeyHealthConfig::default());
        let mut reg = ProviderRegistry::new(
            health,
            RegistryConfig {
                mock_provider: Some("local".into()),
            },
        );
        reg.register_all([mock_registration("alpha", true), mock_registration("local", false)]);
        reg.initialize(&HashMap::new()).await;

        let handle = reg
            .create_model("alpha", "gpt", &RuntimeContext::default())
            .unwrap();
        assert_eq!(handle.provider_id(), "local");
        assert_eq!(handle.model_id(), "gpt");
        assert_eq!(reg.language_model("alpha:gpt").unwrap().provider_id(), "local");
    }

    #[tokio::test]
    async fn test_initialize_twice_replaces_instances() {
        let mut reg = registry();
        reg.initialize(&configs(&[("alpha", ProviderConfig::with_keys("a"))]))
            .await;
        let outcomes = reg.initialize(&HashMap::new()).await;

        assert_eq!(outcomes, vec![InitOutcome::ok("local")]);
        assert!(!reg.has_provider("alpha"));
    }

    #[tokio::test]
    async fn test_reset_keeps_registrations() {
        let mut reg = registry();
        reg.initialize(&configs(&[("alpha", ProviderConfig::with_keys(vec!["a", "b"]))]))
            .await;
        reg.reset();

        assert!(!reg.is_initialized());
        assert!(reg.available_providers().is_empty());
        assert!(reg.dispatch_view().is_empty());
        assert!(reg.health_mut().select_key("alpha").is_none());
        assert_eq!(reg.registered_providers().len(), 3);
    }

    #[test]
    fn test_with_builtins_registers_catalogue() {
        let reg = ProviderRegistry::with_builtins(
            KeyHealthManager::default(),
            RegistryConfig::default(),
        );
        let ids = reg.registered_providers();
        assert!(ids.contains(&"openai".to_string()));
        assert!(ids.contains(&"codex".to_string()));
        assert!(!reg.is_initialized());
    }
}
