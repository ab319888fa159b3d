//! Generic HTTP client for OpenAI-compatible APIs.
//!
//! Talks directly to any `/chat/completions` endpoint. Every standard
//! catalogue provider except `mock` is served by this client.

use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, error, warn};

use oxiroute_core::types::{ChatCompletionRequest, ChatCompletionResponse, LlmResponse, Message};

use crate::catalog::{apply_model_overrides, ProviderSpec};
use crate::plugin::PluginInitConfig;
use crate::traits::{LlmProvider, LlmRequestConfig};

/// Request timeout when the config sets no `timeoutSecs` option.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

// ─────────────────────────────────────────────
// HttpProvider
// ─────────────────────────────────────────────

/// An LLM client that talks to any OpenAI-compatible HTTP API.
pub struct HttpProvider {
    /// HTTP client (shared, connection-pooled).
    client: reqwest::Client,
    /// API base URL (e.g. `"https://api.openai.com/v1"`).
    api_base: String,
    /// Bearer key. Keyless local servers leave it unset.
    api_key: Option<String>,
    default_model: String,
    /// Extra headers to send with each request.
    extra_headers: HeaderMap,
    spec: &'static ProviderSpec,
}

impl std::fmt::Debug for HttpProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProvider")
            .field("api_base", &self.api_base)
            .field("default_model", &self.default_model)
            .field("provider", &self.spec.display_name)
            .finish()
    }
}

impl HttpProvider {
    /// Build a client for `spec` from the plugin's init config.
    ///
    /// The API base comes from the config, then the spec default. Providers
    /// without a default (self-hosted vLLM) fail here when none is configured.
    pub fn new(spec: &'static ProviderSpec, init: &PluginInitConfig) -> anyhow::Result<Self> {
        let api_base = match init.api_base.clone().or_else(|| spec.default_api_base.map(String::from)) {
            Some(base) => base,
            None => bail!("{} requires apiBase to be configured", spec.display_name),
        };

        let mut extra_headers = HeaderMap::new();
        for (key, value) in &init.extra_headers {
            if let (Ok(name), Ok(val)) = (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                extra_headers.insert(name, val);
            } else {
                warn!(provider = spec.name, header = %key, "Invalid header, skipping");
            }
        }

        let timeout = init.option_u64("timeoutSecs").unwrap_or(DEFAULT_TIMEOUT_SECS);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .context("failed to build HTTP client")?;

        let default_model = init
            .option_str("defaultModel")
            .unwrap_or(spec.default_model)
            .to_string();

        Ok(HttpProvider {
            client,
            api_base,
            api_key: init.api_key.clone(),
            default_model,
            extra_headers,
            spec,
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn endpoint(&self, suffix: &str) -> String {
        format!("{}/{}", self.api_base.trim_end_matches('/'), suffix)
    }

    fn completions_url(&self) -> String {
        self.endpoint("chat/completions")
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let req = req.headers(self.extra_headers.clone());
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    /// Check the key against `GET {base}/models`.
    ///
    /// Any non-2xx status is an error, so a revoked key fails
    /// initialization instead of the first chat call.
    pub async fn validate_key(&self) -> anyhow::Result<()> {
        let url = self.endpoint("models");
        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .with_context(|| format!("{}: key validation request failed", self.spec.display_name))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!(
                "{}: key validation failed with {}: {}",
                self.spec.display_name,
                status,
                body
            );
        }
        debug!(provider = self.spec.name, "API key validated");
        Ok(())
    }
}

#[async_trait]
impl LlmProvider for HttpProvider {
    async fn chat(
        &self,
        messages: &[Message],
        model: &str,
        config: &LlmRequestConfig,
    ) -> LlmResponse {
        let temperature = apply_model_overrides(model, self.spec, config.temperature);

        debug!(
            provider = self.spec.display_name,
            model = %model,
            messages = messages.len(),
            "Calling LLM"
        );

        let request_body = ChatCompletionRequest {
            model: model.to_string(),
            messages: messages.to_vec(),
            max_tokens: Some(config.max_tokens),
            temperature: Some(temperature),
        };

        let result = self
            .authorized(self.client.post(self.completions_url()))
            .json(&request_body)
            .send()
            .await;

        let response = match result {
            Ok(resp) => resp,
            Err(e) => {
                error!(provider = self.spec.display_name, error = %e, "HTTP request failed");
                return LlmResponse::error(format!("Error calling LLM: {}", e));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(
                provider = self.spec.display_name,
                status = %status,
                body = %error_text,
                "API error"
            );
            return LlmResponse::error(format!("Error calling LLM: {}: {}", status, error_text));
        }

        match response.json::<ChatCompletionResponse>().await {
            Ok(chat_resp) => {
                let llm_resp: LlmResponse = chat_resp.into();
                debug!(
                    provider = self.spec.display_name,
                    has_content = llm_resp.content.is_some(),
                    finish_reason = llm_resp.finish_reason.as_deref().unwrap_or("?"),
                    "LLM response received"
                );
                llm_resp
            }
            Err(e) => {
                error!(
                    provider = self.spec.display_name,
                    error = %e,
                    "Failed to parse LLM response"
                );
                LlmResponse::error(format!("Error parsing LLM response: {}", e))
            }
        }
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn display_name(&self) -> &str {
        self.spec.display_name
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::find_by_name;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_init(api_key: Option<&str>, api_base: Option<&str>) -> PluginInitConfig {
        PluginInitConfig {
            api_key: api_key.map(String::from),
            api_base: api_base.map(String::from),
            ..Default::default()
        }
    }

    fn provider(name: &str, init: &PluginInitConfig) -> HttpProvider {
        HttpProvider::new(find_by_name(name).unwrap(), init).unwrap()
    }

    // ── Unit tests ──

    #[test]
    fn test_completions_url_trailing_slash() {
        let p = provider("openai", &make_init(Some("key"), Some("https://api.openai.com/v1/")));
        assert_eq!(p.completions_url(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_completions_url_no_trailing_slash() {
        let p = provider("openai", &make_init(Some("key"), Some("https://api.openai.com/v1")));
        assert_eq!(p.completions_url(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_default_api_base_for_gateway() {
        let p = provider("openrouter", &make_init(Some("sk-or-abc"), None));
        assert_eq!(p.api_base(), "https://openrouter.ai/api/v1");
    }

    #[test]
    fn test_config_overrides_default_base() {
        let p = provider(
            "openrouter",
            &make_init(Some("sk-or-abc"), Some("https://custom.proxy.com/v1")),
        );
        assert_eq!(p.api_base(), "https://custom.proxy.com/v1");
    }

    #[test]
    fn test_missing_base_is_error() {
        let spec = find_by_name("vllm").unwrap();
        let err = HttpProvider::new(spec, &make_init(None, None)).unwrap_err();
        assert!(err.to_string().contains("apiBase"));
    }

    #[test]
    fn test_display_and_default_model() {
        let p = provider("groq", &make_init(Some("key"), None));
        assert_eq!(p.display_name(), "Groq");
        assert_eq!(p.default_model(), "llama-3.3-70b-versatile");
    }

    #[test]
    fn test_default_model_option() {
        let mut init = make_init(Some("key"), None);
        init.options
            .insert("defaultModel".into(), serde_json::json!("gpt-4o-mini"));
        assert_eq!(provider("openai", &init).default_model(), "gpt-4o-mini");
    }

    #[test]
    fn test_extra_headers() {
        let mut init = make_init(Some("key"), None);
        init.extra_headers
            .insert("X-App-Code".to_string(), "my-app-code".to_string());
        init.extra_headers
            .insert("bad header".to_string(), "v".to_string());
        let p = provider("openrouter", &init);
        assert!(p.extra_headers.contains_key("x-app-code"));
        assert_eq!(p.extra_headers.len(), 1);
    }

    // ── Integration tests with mock server ──

    #[tokio::test]
    async fn test_chat_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer test-key-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "chatcmpl-test",
                "choices": [{
                    "message": { "content": "Hello from the router." },
                    "finish_reason": "stop"
                }],
                "usage": {
                    "prompt_tokens": 10,
                    "completion_tokens": 5,
                    "total_tokens": 15
                }
            })))
            .mount(&mock_server)
            .await;

        let p = provider("openai", &make_init(Some("test-key-123"), Some(&mock_server.uri())));
        let messages = vec![Message::system("Be brief."), Message::user("Hello")];

        let resp = p
            .chat(&messages, "gpt-4o", &LlmRequestConfig::default())
            .await;

        assert_eq!(resp.content.as_deref(), Some("Hello from the router."));
        assert!(!resp.is_error());
        assert_eq!(resp.finish_reason.as_deref(), Some("stop"));
        assert_eq!(resp.usage.as_ref().unwrap().total_tokens, 15);
    }

    #[tokio::test]
    async fn test_chat_api_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": { "message": "Rate limit exceeded", "type": "rate_limit_error" }
            })))
            .mount(&mock_server)
            .await;

        let p = provider("openai", &make_init(Some("key"), Some(&mock_server.uri())));
        let resp = p
            .chat(&[Message::user("Hello")], "gpt-4o", &LlmRequestConfig::default())
            .await;

        assert!(resp.is_error());
        let content = resp.content.unwrap();
        assert!(content.contains("Error calling LLM"));
        assert!(content.contains("429"));
    }

    #[tokio::test]
    async fn test_chat_network_error() {
        let p = provider("openai", &make_init(Some("key"), Some("http://127.0.0.1:1")));
        let resp = p
            .chat(&[Message::user("Hello")], "gpt-4o", &LlmRequestConfig::default())
            .await;

        assert!(resp.is_error());
        assert!(resp.content.unwrap().contains("Error calling LLM"));
    }

    #[tokio::test]
    async fn test_chat_sends_model_and_override() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "model": "kimi-k2.5",
                "max_tokens": 4096,
                "temperature": 1.0
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "chatcmpl-body",
                "choices": [{ "message": { "content": "ok" }, "finish_reason": "stop" }],
                "usage": null
            })))
            .mount(&mock_server)
            .await;

        let p = provider("moonshot", &make_init(Some("ms-key"), Some(&mock_server.uri())));
        let resp = p
            .chat(&[Message::user("test")], "kimi-k2.5", &LlmRequestConfig::default())
            .await;

        // A body mismatch makes wiremock answer 404.
        assert_eq!(resp.content.as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn test_keyless_request_has_no_auth_header() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer "))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "content": "local" }, "finish_reason": "stop" }]
            })))
            .mount(&mock_server)
            .await;

        let p = provider("ollama", &make_init(None, Some(&mock_server.uri())));
        let resp = p
            .chat(&[Message::user("hi")], "llama3.2", &LlmRequestConfig::default())
            .await;
        assert_eq!(resp.content.as_deref(), Some("local"));
    }

    #[tokio::test]
    async fn test_chat_with_reasoning_content() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "chatcmpl-reasoning",
                "choices": [{
                    "message": {
                        "content": "The answer is 42.",
                        "reasoning_content": "Let me think step by step..."
                    },
                    "finish_reason": "stop"
                }],
                "usage": null
            })))
            .mount(&mock_server)
            .await;

        let p = provider("deepseek", &make_init(Some("key"), Some(&mock_server.uri())));
        let resp = p
            .chat(
                &[Message::user("What is the meaning of life?")],
                "deepseek-reasoner",
                &LlmRequestConfig::default(),
            )
            .await;

        assert_eq!(resp.content.as_deref(), Some("The answer is 42."));
        assert_eq!(
            resp.reasoning_content.as_deref(),
            Some("Let me think step by step...")
        );
    }

    // ── validate_key ──

    #[tokio::test]
    async fn test_validate_key_ok() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .and(header("Authorization", "Bearer good"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
            .mount(&mock_server)
            .await;

        let p = provider("openai", &make_init(Some("good"), Some(&mock_server.uri())));
        assert!(p.validate_key().await.is_ok());
    }

    #[tokio::test]
    async fn test_validate_key_rejected() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&mock_server)
            .await;

        let p = provider("openai", &make_init(Some("bad"), Some(&mock_server.uri())));
        let err = p.validate_key().await.unwrap_err();
        assert!(err.to_string().contains("401"));
    }
}
