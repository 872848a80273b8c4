use std::sync::Arc;

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    tracing::debug,
};

use qrgate_oauth::{CredentialStore, Provider, require_usable, unix_now};

use crate::model::{CompletionResponse, LlmProvider, Usage};

/// Where the bearer token comes from.
#[derive(Clone)]
pub enum QwenAuth {
    ApiKey(Arc<Secret<String>>),
    /// Stored QR-login credential, re-read before every request.
    OAuth(Arc<dyn CredentialStore>),
}

impl std::fmt::Debug for QwenAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKey(_) => f.write_str("ApiKey([REDACTED])"),
            Self::OAuth(_) => f.write_str("OAuth"),
        }
    }
}

/// OpenAI-compatible chat completions against DashScope.
pub struct QwenProvider {
    auth: QwenAuth,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl QwenProvider {
    pub fn new(auth: QwenAuth, model: String, base_url: String) -> Self {
        Self {
            auth,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn bearer(&self) -> anyhow::Result<Secret<String>> {
        match &self.auth {
            QwenAuth::ApiKey(key) => Ok(Secret::new(key.expose_secret().clone())),
            QwenAuth::OAuth(store) => {
                let stored = store.load(Provider::Qwen)?;
                let credential = require_usable(stored, Provider::Qwen, unix_now())?;
                debug!(
                    account = credential.account_id.as_deref().unwrap_or("unknown"),
                    "using stored qwen credential"
                );
                Ok(credential.access_token)
            },
        }
    }
}

#[async_trait]
impl LlmProvider for QwenProvider {
    fn name(&self) -> &str {
        "qwen"
    }

    fn id(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[serde_json::Value],
        tools: &[serde_json::Value],
    ) -> anyhow::Result<CompletionResponse> {
        let token = self.bearer()?;

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });
        if !tools.is_empty() {
            body["tools"] = serde_json::Value::from(tools.to_vec());
        }

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header(
                "Authorization",
                format!("Bearer {}", token.expose_secret()),
            )
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            anyhow::bail!("qwen API error (HTTP {}): {body_text}", status.as_u16());
        }
        let resp = resp.json::<serde_json::Value>().await?;

        let text = resp["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string());

        let usage = Usage {
            input_tokens: resp["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            output_tokens: resp["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
        };

        Ok(CompletionResponse { text, usage })
    }
}
