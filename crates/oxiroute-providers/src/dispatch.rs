//! Aggregated dispatch view over live standard-category providers.
//!
//! The registry rebuilds this view whenever its set of live standard
//! instances changes. Callers resolve `"provider:model"` ids (or a
//! provider/model pair) to a [`LanguageModel`] without provider-specific
//! branching.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use oxiroute_core::types::{LlmResponse, Message};

use crate::error::RegistryError;
use crate::traits::{LlmProvider, LlmRequestConfig};

/// Separator between provider id and model id in qualified model ids.
pub const MODEL_ID_SEPARATOR: char = ':';

// ─────────────────────────────────────────────
// LanguageModel
// ─────────────────────────────────────────────

/// A provider client bound to one model id.
#[derive(Clone)]
pub struct LanguageModel {
    provider_id: String,
    model_id: String,
    client: Arc<dyn LlmProvider>,
}

impl LanguageModel {
    pub fn new(
        provider_id: impl Into<String>,
        model_id: impl Into<String>,
        client: Arc<dyn LlmProvider>,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            model_id: model_id.into(),
            client,
        }
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn client(&self) -> &Arc<dyn LlmProvider> {
        &self.client
    }

    /// Send a chat completion with this model.
    pub async fn chat(&self, messages: &[Message], config: &LlmRequestConfig) -> LlmResponse {
        self.client.chat(messages, &self.model_id, config).await
    }
}

impl fmt::Debug for LanguageModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LanguageModel")
            .field("provider_id", &self.provider_id)
            .field("model_id", &self.model_id)
            .field("client", &self.client.display_name())
            .finish()
    }
}

// ─────────────────────────────────────────────
// DispatchView
// ─────────────────────────────────────────────

/// Read-only index of standard provider clients keyed by provider id.
#[derive(Clone, Default)]
pub struct DispatchView {
    clients: BTreeMap<String, Arc<dyn LlmProvider>>,
}

impl DispatchView {
    /// Build a view from `(provider id, client)` pairs.
    pub fn build<I>(clients: I) -> Self
    where
        I: IntoIterator<Item = (String, Arc<dyn LlmProvider>)>,
    {
        Self {
            clients: clients.into_iter().collect(),
        }
    }

    /// Split `"provider:model"` into its two halves.
    ///
    /// Only the first separator splits, so model ids may contain `:`
    /// (e.g. `"ollama:llama3:8b"`).
    pub fn split_id(id: &str) -> Result<(&str, &str), RegistryError> {
        match id.split_once(MODEL_ID_SEPARATOR) {
            Some((provider, model)) if !provider.is_empty() && !model.is_empty() => {
                Ok((provider, model))
            }
            _ => Err(RegistryError::InvalidModelId(id.to_string())),
        }
    }

    /// Resolve a qualified `"provider:model"` id.
    pub fn language_model(&self, id: &str) -> Result<LanguageModel, RegistryError> {
        let (provider, model) = Self::split_id(id)?;
        self.resolve(provider, model)
            .ok_or_else(|| RegistryError::ProviderNotAvailable {
                provider_id: provider.to_string(),
                available: self.provider_ids(),
            })
    }

    /// Resolve a provider/model pair, if the provider is in the view.
    pub fn resolve(&self, provider_id: &str, model_id: &str) -> Option<LanguageModel> {
        self.clients
            .get(provider_id)
            .map(|client| LanguageModel::new(provider_id, model_id, Arc::clone(client)))
    }

    /// Provider ids in the view, sorted.
    pub fn provider_ids(&self) -> Vec<String> {
        self.clients.keys().cloned().collect()
    }

    pub fn contains(&self, provider_id: &str) -> bool {
        self.clients.contains_key(provider_id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl fmt::Debug for DispatchView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchView")
            .field("providers", &self.provider_ids())
            .finish()
    }
}
