//! Deterministic local provider.
//!
//! Answers `[mock:<model>] <last user text>` without touching the network.
//! Backs mock mode and most registry tests.

use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use oxiroute_core::types::{LlmResponse, Message};
use tracing::debug;

use crate::plugin::{PluginInitConfig, ProviderMetadata, ProviderPlugin};
use crate::traits::{LlmProvider, LlmRequestConfig};

// ─────────────────────────────────────────────
// MockClient
// ─────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct MockClient {
    default_model: String,
}

impl MockClient {
    pub fn new(default_model: impl Into<String>) -> Self {
        Self {
            default_model: default_model.into(),
        }
    }
}

#[async_trait]
impl LlmProvider for MockClient {
    async fn chat(
        &self,
        messages: &[Message],
        model: &str,
        _config: &LlmRequestConfig,
    ) -> LlmResponse {
        let last = messages
            .iter()
            .rev()
            .find_map(Message::user_text)
            .unwrap_or_default();
        LlmResponse {
            content: Some(format!("[mock:{}] {}", model, last)),
            finish_reason: Some("stop".into()),
            ..Default::default()
        }
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn display_name(&self) -> &str {
        "Mock"
    }
}

// ─────────────────────────────────────────────
// MockPlugin
// ─────────────────────────────────────────────

/// Keyless standard plugin serving a [`MockClient`].
///
/// Setting `options.failInit = true` makes `initialize` fail, which lets
/// callers exercise failed outcomes without a broken endpoint.
pub struct MockPlugin {
    metadata: ProviderMetadata,
    client: Option<Arc<MockClient>>,
    api_key: Option<String>,
}

impl MockPlugin {
    pub fn new(metadata: ProviderMetadata) -> Self {
        Self {
            metadata,
            client: None,
            api_key: None,
        }
    }
}

#[async_trait]
impl ProviderPlugin for MockPlugin {
    fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    async fn initialize(&mut self, config: PluginInitConfig) -> anyhow::Result<()> {
        if config.option_bool("failInit") {
            bail!("mock provider '{}' configured to fail", self.metadata.id);
        }
        let model = config
            .option_str("defaultModel")
            .unwrap_or(&self.metadata.default_model);
        self.client = Some(Arc::new(MockClient::new(model)));
        self.api_key = config.api_key;
        debug!(provider = %self.metadata.id, "Mock provider ready");
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.client.is_some()
    }

    fn underlying_client(&self) -> Option<Arc<dyn LlmProvider>> {
        self.client
            .as_ref()
            .map(|c| Arc::clone(c) as Arc<dyn LlmProvider>)
    }

    fn active_api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    fn reset(&mut self) {
        self.client = None;
        self.api_key = None;
    }
}
