pub mod compressor;
pub mod expander;
pub mod orchestrator;
pub mod token;
pub mod transport;

pub use compressor::{compress_history, Compressor};
pub use expander::Expander;
pub use orchestrator::{
    AgentFailure, Board, BoardMode, BoardOutcome, BoardRequest,
};
pub use token::ProviderTokens;
pub use transport::{ChatBackend, LlmClient};
