//! Built-in provider catalogue.
//!
//! Each `ProviderSpec` describes one provider the workspace ships a plugin
//! for: its id, env var, default endpoint and model, capabilities, and (for
//! agent providers) how to drive the CLI. [`builtin_registrations`] turns the
//! table into registry registrations.

use crate::plugin::{
    ProviderCapabilities, ProviderCategory, ProviderMetadata, ProviderPlugin,
    ProviderRegistration,
};
use crate::plugins::{CliAgentPlugin, MockPlugin, OpenAiCompatPlugin};

// ─────────────────────────────────────────────
// ProviderSpec: static metadata for one provider
// ─────────────────────────────────────────────

/// Static specification describing one built-in provider.
#[derive(Clone, Debug)]
pub struct ProviderSpec {
    /// Provider id (e.g. `"openrouter"`).
    pub name: &'static str,
    /// Human-readable name for logs. E.g. `"OpenRouter"`.
    pub display_name: &'static str,
    /// Environment variable conventionally holding the key. Agent CLIs
    /// receive the selected key through it.
    pub env_key: &'static str,
    pub category: ProviderCategory,
    /// Default API base URL. `None` means the config must supply one.
    pub default_api_base: Option<&'static str>,
    pub default_model: &'static str,
    pub requires_api_key: bool,
    pub streaming: bool,
    pub tool_calling: bool,
    pub builtin_tools: bool,
    pub session_resume: bool,
    pub mcp: bool,
    /// Per-model overrides. If `pattern` appears in the lowercase model name,
    /// the field is forced to `value`. E.g. Kimi K2.5 requires `temperature >= 1.0`.
    pub model_overrides: &'static [ModelOverride],
    /// How to invoke the CLI, for agent providers.
    pub agent_cli: Option<AgentCliSpec>,
}

/// Command-line shape of an external coding-agent CLI.
#[derive(Clone, Debug)]
pub struct AgentCliSpec {
    /// Executable looked up on `PATH`.
    pub binary: &'static str,
    /// Arguments placed before everything else (non-interactive mode).
    pub base_args: &'static [&'static str],
    pub model_flag: Option<&'static str>,
    pub resume_flag: Option<&'static str>,
    /// Takes a comma-separated tool list.
    pub tools_flag: Option<&'static str>,
}

/// A per-model parameter override.
#[derive(Clone, Debug)]
pub struct ModelOverride {
    /// Substring to match in the lowercase model name.
    pub pattern: &'static str,
    pub field: OverrideField,
    pub value: f64,
}

/// Fields that can be overridden per model.
#[derive(Clone, Debug)]
pub enum OverrideField {
    Temperature,
}

impl ProviderSpec {
    /// Registry metadata for this spec.
    pub fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            id: self.name.to_string(),
            display_name: self.display_name.to_string(),
            category: self.category,
            capabilities: ProviderCapabilities {
                streaming: self.streaming,
                tool_calling: self.tool_calling,
                builtin_tools: self.builtin_tools,
                session_resume: self.session_resume,
                requires_api_key: self.requires_api_key,
                mcp: self.mcp,
            },
            default_model: self.default_model.to_string(),
        }
    }

    /// Registration whose factory builds the matching plugin.
    pub fn registration(&'static self) -> ProviderRegistration {
        ProviderRegistration::new(self.metadata(), move || {
            let plugin: Box<dyn ProviderPlugin> = match (self.category, self.name) {
                (ProviderCategory::Agent, _) => Box::new(CliAgentPlugin::new(self)?),
                (ProviderCategory::Standard, MOCK_PROVIDER_ID) => {
                    Box::new(MockPlugin::new(self.metadata()))
                }
                (ProviderCategory::Standard, _) => Box::new(OpenAiCompatPlugin::new(self)),
            };
            Ok(plugin)
        })
    }
}

/// Id of the built-in mock provider.
pub const MOCK_PROVIDER_ID: &str = "mock";

const CHAT_SPEC: ProviderSpec = ProviderSpec {
    name: "",
    display_name: "",
    env_key: "",
    category: ProviderCategory::Standard,
    default_api_base: None,
    default_model: "",
    requires_api_key: true,
    streaming: true,
    tool_calling: true,
    builtin_tools: false,
    session_resume: false,
    mcp: false,
    model_overrides: &[],
    agent_cli: None,
};

// ─────────────────────────────────────────────
// All built-in providers (registration order)
// ─────────────────────────────────────────────

/// Complete list of built-in provider specifications, in registration order.
pub static PROVIDERS: &[ProviderSpec] = &[
    ProviderSpec {
        name: "openai",
        display_name: "OpenAI",
        env_key: "OPENAI_API_KEY",
        default_api_base: Some("https://api.openai.com/v1"),
        default_model: "gpt-4o",
        ..CHAT_SPEC
    },
    ProviderSpec {
        name: "anthropic",
        display_name: "Anthropic",
        env_key: "ANTHROPIC_API_KEY",
        default_api_base: Some("https://api.anthropic.com/v1"),
        default_model: "claude-sonnet-4-20250514",
        ..CHAT_SPEC
    },
    ProviderSpec {
        name: "openrouter",
        display_name: "OpenRouter",
        env_key: "OPENROUTER_API_KEY",
        default_api_base: Some("https://openrouter.ai/api/v1"),
        default_model: "anthropic/claude-sonnet-4",
        ..CHAT_SPEC
    },
    ProviderSpec {
        name: "deepseek",
        display_name: "DeepSeek",
        env_key: "DEEPSEEK_API_KEY",
        default_api_base: Some("https://api.deepseek.com/v1"),
        default_model: "deepseek-chat",
        ..CHAT_SPEC
    },
    ProviderSpec {
        name: "groq",
        display_name: "Groq",
        env_key: "GROQ_API_KEY",
        default_api_base: Some("https://api.groq.com/openai/v1"),
        default_model: "llama-3.3-70b-versatile",
        ..CHAT_SPEC
    },
    ProviderSpec {
        name: "gemini",
        display_name: "Gemini",
        env_key: "GEMINI_API_KEY",
        default_api_base: Some("https://generativelanguage.googleapis.com/v1beta/openai"),
        default_model: "gemini-2.0-flash",
        ..CHAT_SPEC
    },
    // Kimi K2.5 forces temperature=1.0
    ProviderSpec {
        name: "moonshot",
        display_name: "Moonshot",
        env_key: "MOONSHOT_API_KEY",
        default_api_base: Some("https://api.moonshot.ai/v1"),
        default_model: "kimi-k2.5",
        model_overrides: &[ModelOverride {
            pattern: "kimi-k2.5",
            field: OverrideField::Temperature,
            value: 1.0,
        }],
        ..CHAT_SPEC
    },
    ProviderSpec {
        name: "dashscope",
        display_name: "DashScope",
        env_key: "DASHSCOPE_API_KEY",
        default_api_base: Some("https://dashscope.aliyuncs.com/compatible-mode/v1"),
        default_model: "qwen-plus",
        ..CHAT_SPEC
    },
    ProviderSpec {
        name: "ollama",
        display_name: "Ollama",
        env_key: "OLLAMA_API_KEY",
        default_api_base: Some("http://localhost:11434/v1"),
        default_model: "llama3.2",
        requires_api_key: false,
        ..CHAT_SPEC
    },
    // Self-hosted; the config must provide apiBase.
    ProviderSpec {
        name: "vllm",
        display_name: "vLLM",
        env_key: "HOSTED_VLLM_API_KEY",
        default_api_base: None,
        default_model: "default",
        requires_api_key: false,
        ..CHAT_SPEC
    },
    ProviderSpec {
        name: MOCK_PROVIDER_ID,
        display_name: "Mock",
        env_key: "",
        default_model: "mock-1",
        requires_api_key: false,
        streaming: false,
        tool_calling: false,
        ..CHAT_SPEC
    },
    ProviderSpec {
        name: "claude-code",
        display_name: "Claude Code",
        env_key: "ANTHROPIC_API_KEY",
        category: ProviderCategory::Agent,
        default_model: "sonnet",
        requires_api_key: false,
        builtin_tools: true,
        session_resume: true,
        mcp: true,
        agent_cli: Some(AgentCliSpec {
            binary: "claude",
            base_args: &["-p", "--output-format", "text"],
            model_flag: Some("--model"),
            resume_flag: Some("--resume"),
            tools_flag: Some("--allowedTools"),
        }),
        ..CHAT_SPEC
    },
    ProviderSpec {
        name: "codex",
        display_name: "Codex CLI",
        env_key: "OPENAI_API_KEY",
        category: ProviderCategory::Agent,
        default_model: "gpt-5-codex",
        requires_api_key: false,
        builtin_tools: true,
        mcp: true,
        agent_cli: Some(AgentCliSpec {
            binary: "codex",
            base_args: &["exec"],
            model_flag: Some("--model"),
            resume_flag: None,
            tools_flag: None,
        }),
        ..CHAT_SPEC
    },
];

// ─────────────────────────────────────────────
// Lookup
// ─────────────────────────────────────────────

/// Find a provider spec by exact id.
pub fn find_by_name(name: &str) -> Option<&'static ProviderSpec> {
    PROVIDERS.iter().find(|spec| spec.name == name)
}

/// Registrations for every built-in provider, in catalogue order.
pub fn builtin_registrations() -> Vec<ProviderRegistration> {
    PROVIDERS.iter().map(ProviderSpec::registration).collect()
}

/// Apply per-model overrides to request parameters.
///
/// Returns the overridden temperature. E.g. Kimi K2.5 forces `temperature = 1.0`.
pub fn apply_model_overrides(model: &str, spec: &ProviderSpec, temperature: f64) -> f64 {
    let model_lower = model.to_lowercase();
    let mut temp = temperature;

    for ovr in spec.model_overrides {
        if model_lower.contains(ovr.pattern) {
            match ovr.field {
                OverrideField::Temperature => temp = ovr.value,
            }
        }
    }

    temp
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
