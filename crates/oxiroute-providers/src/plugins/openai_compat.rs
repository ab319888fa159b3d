//! Standard plugin for OpenAI-compatible endpoints.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::catalog::ProviderSpec;
use crate::http_provider::HttpProvider;
use crate::plugin::{PluginInitConfig, ProviderMetadata, ProviderPlugin};
use crate::traits::LlmProvider;

/// Wraps an [`HttpProvider`] built from a catalogue spec.
///
/// With `options.validateKey = true` the key is checked against
/// `GET {base}/models` during `initialize`.
pub struct OpenAiCompatPlugin {
    spec: &'static ProviderSpec,
    metadata: ProviderMetadata,
    client: Option<Arc<HttpProvider>>,
    api_key: Option<String>,
}

impl OpenAiCompatPlugin {
    pub fn new(spec: &'static ProviderSpec) -> Self {
        Self {
            spec,
            metadata: spec.metadata(),
            client: None,
            api_key: None,
        }
    }

    pub fn api_base(&self) -> Option<&str> {
        self.client.as_deref().map(HttpProvider::api_base)
    }
}

#[async_trait]
impl ProviderPlugin for OpenAiCompatPlugin {
    fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    async fn initialize(&mut self, config: PluginInitConfig) -> anyhow::Result<()> {
        let client = HttpProvider::new(self.spec, &config)?;

        if config.option_bool("validateKey") {
            client.validate_key().await?;
        }

        info!(
            provider = self.spec.name,
            api_base = client.api_base(),
            "Provider initialized"
        );
        self.client = Some(Arc::new(client));
        self.api_key = config.api_key;
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
        if self.client.take().is_some() {
            debug!(provider = self.spec.name, "Provider reset");
        }
        self.api_key = None;
    }
}
