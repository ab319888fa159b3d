//! Chat client trait implemented by every standard-category provider client.
//!
//! `HttpProvider` covers all OpenAI-compatible APIs; `MockClient` answers
//! locally. Agent-category providers do not implement this trait.

use async_trait::async_trait;
use oxiroute_core::types::{LlmResponse, Message};

/// Configuration passed to each LLM call.
#[derive(Clone, Debug)]
pub struct LlmRequestConfig {
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature (0.0 to 2.0).
    pub temperature: f64,
}

impl Default for LlmRequestConfig {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: 0.7,
        }
    }
}

/// The underlying client a standard provider exposes to the dispatch view.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a chat completion request.
    ///
    /// # Arguments
    /// * `messages`: Conversation history in OpenAI format.
    /// * `model`   : Model identifier (e.g. `"gpt-4o"`).
    /// * `config`  : Temperature, max_tokens, etc.
    ///
    /// # Returns
    /// An `LlmResponse` with the assistant's content.
    /// On API errors, returns `LlmResponse::error(...)` instead of propagating,
    /// so callers check [`LlmResponse::is_error`] before rotating keys.
    async fn chat(
        &self,
        messages: &[Message],
        model: &str,
        config: &LlmRequestConfig,
    ) -> LlmResponse;

    /// The default model for this client.
    fn default_model(&self) -> &str;

    /// Display name for logging.
    fn display_name(&self) -> &str;
}
