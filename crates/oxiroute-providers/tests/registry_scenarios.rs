//! End-to-end registry scenarios through the public API.

use std::collections::HashMap;
use std::sync::Arc;

use oxiroute_core::config::{KeyHealthConfig, ProviderConfig, RegistryConfig};
use oxiroute_core::types::Message;
use oxiroute_providers::{
    find_by_name, KeyHealthManager, LlmRequestConfig, ManualClock, ProviderRegistry,
    RegistryError, RuntimeContext,
};

fn registry_for(ids: &[&str]) -> (ProviderRegistry, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::default());
    let health = KeyHealthManager::with_clock(KeyHealthConfig::default(), clock.clone());
    let mut registry = ProviderRegistry::new(health, RegistryConfig::default());
    registry.register_all(
        ids.iter()
            .map(|id| find_by_name(id).expect("catalogue id").registration()),
    );
    (registry, clock)
}

fn configs(entries: Vec<(&str, ProviderConfig)>) -> HashMap<String, ProviderConfig> {
    entries
        .into_iter()
        .map(|(id, c)| (id.to_string(), c))
        .collect()
}

#[tokio::test]
async fn openai_rotates_across_key_pool() {
    let (mut registry, _clock) = registry_for(&["openai", "ollama"]);
    let outcomes = registry
        .initialize(&configs(vec![(
            "openai",
            ProviderConfig::with_keys(vec!["k1", "k2", "k3"]),
        )]))
        .await;
    assert!(outcomes.iter().all(|o| o.success));

    let failed = registry.active_api_key("openai").unwrap();
    for _ in 0..2 {
        registry.health_mut().report_failure("openai", &failed);
    }

    assert!(registry.reinitialize_provider("openai", &failed).await);
    let active = registry.active_api_key("openai").unwrap();
    assert_ne!(active, failed);
    assert!(["k1", "k2", "k3"].contains(&active.as_str()));
    assert!(registry.has_provider("openai"));
}

#[tokio::test]
async fn key_disabled_at_threshold_is_skipped_then_rotated_away() {
    let (mut registry, _clock) = registry_for(&["openai"]);
    registry
        .initialize(&configs(vec![(
            "openai",
            ProviderConfig::with_keys(vec!["k1", "k2", "k3"]),
        )]))
        .await;

    let failed = registry.active_api_key("openai").unwrap();
    for _ in 0..3 {
        registry.health_mut().report_failure("openai", &failed);
    }
    assert_eq!(registry.health().healthy_key_count("openai"), 2);
    for _ in 0..50 {
        let picked = registry.health_mut().select_key("openai").unwrap();
        assert_ne!(picked, failed);
    }

    assert!(registry.reinitialize_provider("openai", &failed).await);
    let active = registry.active_api_key("openai").unwrap();
    assert_ne!(active, failed);
    assert!(registry.create_model("openai", "", &RuntimeContext::default()).is_ok());
}

#[tokio::test]
async fn disabled_key_returns_after_disable_duration() {
    let (mut registry, clock) = registry_for(&["openai"]);
    registry
        .initialize(&configs(vec![(
            "openai",
            ProviderConfig::with_keys(vec!["k1", "k2"]),
        )]))
        .await;

    for _ in 0..3 {
        registry.health_mut().report_failure("openai", "k1");
    }
    assert_eq!(registry.health().healthy_key_count("openai"), 1);

    clock.advance_ms(300_000);
    assert_eq!(registry.health().healthy_key_count("openai"), 2);
}

#[tokio::test]
async fn keyless_ollama_comes_up_without_config() {
    let (mut registry, _clock) = registry_for(&["openai", "ollama"]);
    let outcomes = registry.initialize(&HashMap::new()).await;

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].provider_id, "ollama");
    assert!(outcomes[0].success);
    assert!(registry.active_api_key("ollama").is_none());
    assert!(!registry.has_provider("openai"));
    assert_eq!(registry.available_providers(), vec!["ollama"]);
}

#[tokio::test]
async fn missing_provider_lists_live_ids() {
    let (mut registry, _clock) = registry_for(&["openai", "ollama"]);
    registry
        .initialize(&configs(vec![("openai", ProviderConfig::with_keys("sk-1"))]))
        .await;

    let err = registry
        .create_model("nonexistent", "m1", &RuntimeContext::default())
        .unwrap_err();
    assert!(matches!(err, RegistryError::ProviderNotAvailable { .. }));
    assert!(err.to_string().contains("[ollama, openai]"));
}

#[tokio::test]
async fn single_key_pool_never_rotates() {
    let (mut registry, _clock) = registry_for(&["openai"]);
    registry
        .initialize(&configs(vec![("openai", ProviderConfig::with_keys("solo"))]))
        .await;

    assert!(!registry.reinitialize_provider("openai", "solo").await);
    assert_eq!(registry.active_api_key("openai").as_deref(), Some("solo"));
}

#[tokio::test]
async fn vllm_without_base_fails_but_others_survive() {
    let (mut registry, _clock) = registry_for(&["vllm", "ollama"]);
    let outcomes = registry.initialize(&HashMap::new()).await;

    assert_eq!(outcomes.len(), 2);
    assert!(!outcomes[0].success);
    assert!(outcomes[0].error.as_deref().unwrap().contains("apiBase"));
    assert!(outcomes[1].success);
}

#[tokio::test]
async fn mock_provider_answers_through_dispatch_view() {
    let (mut registry, _clock) = registry_for(&["mock"]);
    registry.initialize(&HashMap::new()).await;

    let model = registry.language_model("mock:tiny").unwrap();
    let resp = model
        .chat(&[Message::user("ping")], &LlmRequestConfig::default())
        .await;
    assert_eq!(resp.content.as_deref(), Some("[mock:tiny] ping"));
}

#[tokio::test]
async fn agent_models_bypass_dispatch_view() {
    let (mut registry, _clock) = registry_for(&["codex", "mock"]);
    let mut codex = ProviderConfig::default();
    codex
        .options
        .insert("binary".into(), serde_json::json!("echo"));
    registry.initialize(&configs(vec![("codex", codex)])).await;

    assert!(!registry.dispatch_view().contains("codex"));
    let handle = registry
        .create_model("codex", "", &RuntimeContext::default())
        .unwrap();
    assert!(handle.bypasses_registry());
    assert_eq!(handle.model_id(), "gpt-5-codex");
}

#[tokio::test]
async fn reset_clears_live_state_but_keeps_registrations() {
    let (mut registry, _clock) = registry_for(&["openai", "ollama"]);
    registry
        .initialize(&configs(vec![(
            "openai",
            ProviderConfig::with_keys(vec!["a", "b"]),
        )]))
        .await;
    registry.reset();

    assert!(!registry.is_initialized());
    assert!(registry.available_providers().is_empty());
    assert!(registry.health().registered_providers().is_empty());
    assert_eq!(registry.registered_providers(), vec!["openai", "ollama"]);

    let outcomes = registry.initialize(&HashMap::new()).await;
    assert_eq!(outcomes.len(), 1);
}
