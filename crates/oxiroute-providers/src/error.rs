//! Error types for provider dispatch.

use thiserror::Error;

/// Errors surfaced to callers of the provider registry.
///
/// Initialization and key-rotation failures never appear here: they are
/// reported as [`crate::InitOutcome`]s and booleans.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No live instance for the requested provider id.
    #[error("provider '{provider_id}' is not available. Currently available: [{}]", available.join(", "))]
    ProviderNotAvailable {
        provider_id: String,
        available: Vec<String>,
    },

    /// A qualified model id that is not `provider:model`.
    #[error("invalid model id '{0}' (expected 'provider:model')")]
    InvalidModelId(String),

    /// The live instance refused to build a model.
    #[error("provider '{provider_id}' failed to create model '{model_id}': {source}")]
    ModelCreation {
        provider_id: String,
        model_id: String,
        #[source]
        source: anyhow::Error,
    },
}
