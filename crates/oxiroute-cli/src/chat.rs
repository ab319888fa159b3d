//! `oxiroute chat`: send one message, rotating keys on provider errors.

use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use oxiroute_core::config::load_config;
use oxiroute_core::types::Message;
use oxiroute_providers::{LlmRequestConfig, ModelHandle, ProviderRegistry, RuntimeContext};

use crate::helpers::{model_label, print_response};

/// Arguments of one chat invocation.
#[derive(Clone, Debug, Default)]
pub struct ChatRequest {
    pub provider: String,
    pub model: String,
    pub message: String,
    pub session: Option<String>,
    pub allowed_tools: Vec<String>,
}

/// Run the chat command.
pub async fn run(config_path: Option<&Path>, request: ChatRequest) -> Result<()> {
    let config = load_config(config_path);
    let mut registry = crate::build_registry(&config);
    registry.initialize(&config.providers).await;

    let ctx = RuntimeContext {
        working_dir: std::env::current_dir().ok(),
        session_id: request.session.clone(),
        allowed_tools: request.allowed_tools.clone(),
    };

    let (label, reply) = send(&mut registry, &request, &ctx).await?;
    print_response(&label, &reply);
    Ok(())
}

/// Send `request.message` and return `(label, reply)`.
///
/// Standard providers that answer with an error get their active key
/// reported and rotated. The request is retried while another healthy key
/// remains, up to [`max_attempts`].
pub async fn send(
    registry: &mut ProviderRegistry,
    request: &ChatRequest,
    ctx: &RuntimeContext,
) -> Result<(String, String)> {
    let handle = registry.create_model(&request.provider, &request.model, ctx)?;
    let label = model_label(handle.provider_id(), handle.model_id());

    let provider_id = match handle {
        ModelHandle::Agent(agent) => {
            let reply = agent
                .run(&request.message)
                .await
                .with_context(|| format!("{label} failed"))?;
            return Ok((label, reply));
        }
        ModelHandle::Language(model) => model.provider_id().to_string(),
    };
    let messages = vec![Message::user(request.message.clone())];
    let max_attempts = max_attempts(registry, &provider_id);

    for attempt in 1..=max_attempts {
        let handle = registry.create_model(&provider_id, &request.model, ctx)?;
        let Some(model) = handle.as_language() else {
            bail!("{label} is not a language model");
        };

        let resp = model
            .chat(&messages, &LlmRequestConfig::default())
            .await;
        if !resp.is_error() {
            info!(provider = %provider_id, attempt, "chat completed");
            return Ok((label, resp.content.unwrap_or_default()));
        }

        let error = resp.content.unwrap_or_default();
        let Some(key) = registry.active_api_key(&provider_id) else {
            bail!("{label}: {error}");
        };
        if !registry.health().has_multiple_keys(&provider_id) {
            bail!("{label}: {error}");
        }
        if registry.reinitialize_provider(&provider_id, &key).await {
            warn!(provider = %provider_id, attempt, error = %error, "request failed, retrying with rotated key");
            continue;
        }
        // The failure was reported but the key is still below the
        // threshold, so selection may land on it again.
        if registry.health().healthy_key_count(&provider_id) > 1 {
            warn!(provider = %provider_id, attempt, error = %error, "request failed, retrying with current key");
            continue;
        }
        bail!("{label}: {error}");
    }

    bail!("{label}: all {max_attempts} attempts failed")
}

/// Every key may fail up to the threshold before the pool is exhausted.
fn max_attempts(registry: &ProviderRegistry, provider_id: &str) -> usize {
    let keys = registry
        .health()
        .keys(provider_id)
        .map_or(1, |keys| keys.len());
    let threshold = registry.health().config().failure_threshold.max(1) as usize;
    keys * threshold
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
