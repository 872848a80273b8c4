use async_trait::async_trait;

/// Token counts reported by the API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub text: Option<String>,
    pub usage: Usage,
}

/// A chat-completion backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Model this provider sends requests for.
    fn id(&self) -> &str;

    async fn complete(
        &self,
        messages: &[serde_json::Value],
        tools: &[serde_json::Value],
    ) -> anyhow::Result<CompletionResponse>;
}

/// Single user message in the chat format every provider accepts.
pub fn user_message(content: &str) -> serde_json::Value {
    serde_json::json!({ "role": "user", "content": content })
}
