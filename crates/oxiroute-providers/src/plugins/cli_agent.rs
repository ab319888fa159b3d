//! Agent plugin driving an external coding-agent CLI (`claude`, `codex`).
//!
//! The plugin exposes no chat client. Each `create_model` call binds the
//! caller's runtime context into an [`AgentModel`], and running it spawns the
//! CLI once per prompt.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::catalog::{AgentCliSpec, ProviderSpec};
use crate::plugin::{
    AgentModel, AgentRunner, AgentSettings, ModelHandle, PluginInitConfig, ProviderMetadata,
    ProviderPlugin, RuntimeContext,
};
use crate::traits::LlmProvider;

/// Default per-prompt timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 600;

// ─────────────────────────────────────────────
// Binary lookup
// ─────────────────────────────────────────────

/// Resolve a binary name (or explicit path) to an executable file.
pub fn resolve_binary(name: &str) -> Option<PathBuf> {
    let direct = Path::new(name);
    if direct.components().count() > 1 {
        return direct.is_file().then(|| direct.to_path_buf());
    }
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

// ─────────────────────────────────────────────
// CliAgentRunner
// ─────────────────────────────────────────────

/// Spawns the agent CLI for one prompt and returns its stdout.
#[derive(Debug, Clone)]
pub struct CliAgentRunner {
    binary: PathBuf,
    cli: AgentCliSpec,
    /// Env var receiving the API key.
    env_key: &'static str,
    api_key: Option<String>,
    timeout: Duration,
}

impl CliAgentRunner {
    pub fn new(
        binary: impl Into<PathBuf>,
        cli: AgentCliSpec,
        env_key: &'static str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            binary: binary.into(),
            cli,
            env_key,
            api_key,
            timeout,
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Argument vector for one invocation. The prompt always goes last.
    pub fn build_args(&self, model_id: &str, settings: &AgentSettings, prompt: &str) -> Vec<String> {
        let mut args: Vec<String> = self.cli.base_args.iter().map(|a| a.to_string()).collect();

        if let (Some(flag), false) = (self.cli.model_flag, model_id.is_empty()) {
            args.push(flag.to_string());
            args.push(model_id.to_string());
        }
        match (self.cli.resume_flag, &settings.session_id) {
            (Some(flag), Some(session)) => {
                args.push(flag.to_string());
                args.push(session.clone());
            }
            (None, Some(_)) => {
                warn!(binary = %self.binary.display(), "CLI cannot resume sessions, starting fresh");
            }
            _ => {}
        }
        if let (Some(flag), false) = (self.cli.tools_flag, settings.allowed_tools.is_empty()) {
            args.push(flag.to_string());
            args.push(settings.allowed_tools.join(","));
        }

        args.push(prompt.to_string());
        args
    }
}

#[async_trait]
impl AgentRunner for CliAgentRunner {
    async fn run(
        &self,
        model_id: &str,
        settings: &AgentSettings,
        prompt: &str,
    ) -> anyhow::Result<String> {
        let args = self.build_args(model_id, settings, prompt);
        let mut cmd = Command::new(&self.binary);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &settings.working_dir {
            cmd.current_dir(dir);
        }
        if let (Some(key), false) = (&self.api_key, self.env_key.is_empty()) {
            cmd.env(self.env_key, key);
        }

        info!(binary = %self.binary.display(), model = model_id, "Running agent CLI");

        let child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn {}", self.binary.display()))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.context("agent CLI failed")?,
            Err(_) => bail!(
                "{} timed out after {} seconds",
                self.binary.display(),
                self.timeout.as_secs()
            ),
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "{} exited with code {}: {}",
                self.binary.display(),
                output.status.code().unwrap_or(-1),
                stderr.trim()
            );
        }
        debug!(binary = %self.binary.display(), bytes = stdout.len(), "Agent CLI finished");
        Ok(stdout)
    }
}

// ─────────────────────────────────────────────
// CliAgentPlugin
// ─────────────────────────────────────────────

/// Agent-category plugin for one catalogue CLI spec.
///
/// `options.binary` overrides the executable, `options.timeoutSecs` the
/// per-prompt timeout.
pub struct CliAgentPlugin {
    spec: &'static ProviderSpec,
    cli: &'static AgentCliSpec,
    metadata: ProviderMetadata,
    runner: Option<Arc<CliAgentRunner>>,
    api_key: Option<String>,
}

impl CliAgentPlugin {
    pub fn new(spec: &'static ProviderSpec) -> anyhow::Result<Self> {
        let cli = spec
            .agent_cli
            .as_ref()
            .ok_or_else(|| anyhow!("provider '{}' has no agent CLI definition", spec.name))?;
        Ok(Self {
            spec,
            cli,
            metadata: spec.metadata(),
            runner: None,
            api_key: None,
        })
    }
}

#[async_trait]
impl ProviderPlugin for CliAgentPlugin {
    fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    async fn initialize(&mut self, config: PluginInitConfig) -> anyhow::Result<()> {
        let name = config.option_str("binary").unwrap_or(self.cli.binary);
        let binary = match resolve_binary(name) {
            Some(path) => path,
            None => {
                warn!(provider = self.spec.name, binary = name, "Agent CLI not found on PATH");
                PathBuf::from(name)
            }
        };
        let timeout = Duration::from_secs(
            config
                .option_u64("timeoutSecs")
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        );

        self.runner = Some(Arc::new(CliAgentRunner::new(
            binary,
            self.cli.clone(),
            self.spec.env_key,
            config.api_key.clone(),
            timeout,
        )));
        self.api_key = config.api_key;
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.runner.is_some()
    }

    fn is_available(&self) -> bool {
        self.runner
            .as_ref()
            .is_some_and(|r| resolve_binary(&r.binary().to_string_lossy()).is_some())
    }

    fn underlying_client(&self) -> Option<Arc<dyn LlmProvider>> {
        None
    }

    fn create_model(&self, model_id: &str, ctx: &RuntimeContext) -> anyhow::Result<ModelHandle> {
        let runner = self
            .runner
            .as_ref()
            .ok_or_else(|| anyhow!("provider '{}' is not initialized", self.spec.name))?;
        let model = if model_id.is_empty() {
            self.metadata.default_model.as_str()
        } else {
            model_id
        };
        Ok(ModelHandle::Agent(AgentModel::new(
            self.spec.name,
            model,
            AgentSettings::from(ctx),
            Arc::clone(runner) as Arc<dyn AgentRunner>,
        )))
    }

    fn active_api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    fn reset(&mut self) {
        self.runner = None;
        self.api_key = None;
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
