pub mod config;
pub mod domain;
pub mod errors;
pub mod prompts;
pub mod roles;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use domain::{AgentReply, CompressedRequest, UsageRecord, Verdict};
pub use errors::{BoardError, UpstreamError};
pub use roles::{AgentRole, AgentSpec};
