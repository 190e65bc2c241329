mod anthropic;
mod cache;
mod openai;
mod orchestrator;
mod prompts;
mod provider;
mod registry;
mod usage;

pub use anthropic::AnthropicProvider;
pub use cache::{content_hash, ContentCache};
pub use openai::OpenAiProvider;
pub use orchestrator::AiOrchestrator;
pub use provider::{AiError, AiErrorKind, AiProvider};
pub use registry::ProviderRegistry;
pub use usage::{cost_for, format_usage_report, UsageTracker};
