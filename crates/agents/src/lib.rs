pub mod model;
pub mod providers;

pub use {
    model::{CompletionResponse, LlmProvider, Usage, user_message},
    providers::{ModelInfo, ProviderRegistry, parse_model, qwen_models},
};
