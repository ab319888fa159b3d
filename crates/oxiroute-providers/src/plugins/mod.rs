//! Built-in provider plugins.

pub mod cli_agent;
pub mod mock;
pub mod openai_compat;

pub use cli_agent::{CliAgentPlugin, CliAgentRunner};
pub use mock::{MockClient, MockPlugin};
pub use openai_compat::OpenAiCompatPlugin;
