//! LLM provider implementations used by the LLM-backed recommendation generator.
//!
//! - **Anthropic** (`AnthropicProvider`): Messages API
//! - **OpenAI** (`OpenAiProvider`): chat completions API
//! - **ProviderRouter**: primary provider with a fallback chain

pub mod anthropic;
pub mod openai;
pub mod router;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;
pub use router::{ProviderRoute, ProviderRouter};
