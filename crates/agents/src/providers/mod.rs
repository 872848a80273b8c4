pub mod qwen;

use std::{collections::HashMap, sync::Arc};

use {
    qrgate_config::QrgateConfig,
    qrgate_oauth::{AuthMethod, CredentialStore},
    tracing::warn,
};

use crate::model::LlmProvider;

/// Models served by the Qwen compatible-mode endpoint.
pub fn qwen_models() -> &'static [&'static str] {
    &[
        "qwen-turbo",
        "qwen-plus",
        "qwen-max",
        "qwen-max-longcontext",
        "qwen-vl-max",
        "qwen-vl-plus",
        "qwen-audio-turbo",
    ]
}

/// Strip a `qwen/` or `dashscope/` routing prefix from a model name.
pub fn parse_model(model: &str) -> &str {
    model
        .strip_prefix("qwen/")
        .or_else(|| model.strip_prefix("dashscope/"))
        .unwrap_or(model)
}

/// Info about an available model.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub provider: String,
    pub auth_method: AuthMethod,
}

/// Registry of available LLM providers, keyed by model ID.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    models: Vec<ModelInfo>,
}

impl ProviderRegistry {
    /// Register a provider manually.
    pub fn register(&mut self, info: ModelInfo, provider: Arc<dyn LlmProvider>) {
        self.providers.insert(info.id.clone(), provider);
        self.models.push(info);
    }

    /// Build providers from the config file and environment.
    ///
    /// The configured model is registered first so [`Self::first`] returns it.
    pub fn from_config(config: &QrgateConfig, store: Arc<dyn CredentialStore>) -> Self {
        let mut reg = Self::default();
        reg.register_qwen(config, store);
        reg
    }

    fn register_qwen(&mut self, config: &QrgateConfig, store: Arc<dyn CredentialStore>) {
        let settings = &config.providers.qwen;
        let api_key = settings.api_key();
        let method = settings.auth_method_with(api_key.as_ref());

        let auth = match (method, api_key) {
            (AuthMethod::ApiKey, Some(key)) => qwen::QwenAuth::ApiKey(Arc::new(key)),
            (AuthMethod::ApiKey, None) => {
                warn!("qwen auth_method is api-key but no API key is configured");
                return;
            },
            (AuthMethod::OAuth, _) => qwen::QwenAuth::OAuth(store),
        };

        let preferred = parse_model(settings.model()).to_string();
        let ids = std::iter::once(preferred.as_str())
            .chain(qwen_models().iter().copied().filter(|m| *m != preferred));
        for model_id in ids {
            let provider = Arc::new(qwen::QwenProvider::new(
                auth.clone(),
                model_id.into(),
                settings.base_url().into(),
            ));
            self.register(
                ModelInfo {
                    id: model_id.into(),
                    provider: "qwen".into(),
                    auth_method: method,
                },
                provider,
            );
        }
    }

    /// Look up a model, accepting `qwen/` and `dashscope/` prefixed names.
    pub fn get(&self, model_id: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers.get(parse_model(model_id)).cloned()
    }

    pub fn first(&self) -> Option<Arc<dyn LlmProvider>> {
        self.models
            .first()
            .and_then(|m| self.providers.get(&m.id))
            .cloned()
    }

    pub fn list_models(&self) -> &[ModelInfo] {
        &self.models
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn provider_summary(&self) -> String {
        if self.models.is_empty() {
            return "no LLM providers configured".into();
        }
        self.models
            .iter()
            .map(|m| format!("{}: {} ({})", m.provider, m.id, m.auth_method))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use {qrgate_config::QwenSettings, qrgate_oauth::FileCredentialStore, secrecy::Secret};

    use super::*;

    fn registry(qwen: QwenSettings) -> ProviderRegistry {
        let dir = tempfile::tempdir().unwrap();
        let mut config = QrgateConfig::default();
        config.providers.qwen = qwen;
        ProviderRegistry::from_config(&config, Arc::new(FileCredentialStore::in_dir(dir.path())))
    }

    #[test]
    fn parse_model_strips_prefixes() {
        assert_eq!(parse_model("qwen/qwen-max"), "qwen-max");
        assert_eq!(parse_model("dashscope/qwen-turbo"), "qwen-turbo");
        assert_eq!(parse_model("qwen-plus"), "qwen-plus");
        assert_eq!(parse_model("openai/gpt-4o"), "openai/gpt-4o");
    }

    #[test]
    fn oauth_registry_lists_all_models_with_default_first() {
        let reg = registry(QwenSettings {
            auth_method: Some(AuthMethod::OAuth),
            ..Default::default()
        });
        assert!(!reg.is_empty());
        assert_eq!(reg.list_models().len(), qwen_models().len());
        assert_eq!(reg.first().unwrap().id(), "qwen-plus");
        assert_eq!(reg.get("dashscope/qwen-max").unwrap().id(), "qwen-max");
        assert!(reg.get("gpt-4o").is_none());
        assert!(reg.provider_summary().starts_with("qwen: qwen-plus (oauth)"));
    }

    #[test]
    fn configured_model_comes_first() {
        let reg = registry(QwenSettings {
            auth_method: Some(AuthMethod::OAuth),
            model: Some("qwen/qwen-turbo".into()),
            ..Default::default()
        });
        assert_eq!(reg.first().unwrap().id(), "qwen-turbo");
        assert_eq!(reg.list_models().len(), qwen_models().len());
    }

    #[test]
    fn custom_model_is_registered() {
        let reg = registry(QwenSettings {
            auth_method: Some(AuthMethod::OAuth),
            model: Some("qwen3-coder-plus".into()),
            ..Default::default()
        });
        assert_eq!(reg.first().unwrap().id(), "qwen3-coder-plus");
        assert_eq!(reg.list_models().len(), qwen_models().len() + 1);
    }

    #[test]
    fn api_key_method_uses_configured_key() {
        let reg = registry(QwenSettings {
            auth_method: Some(AuthMethod::ApiKey),
            api_key: Some(Secret::new("sk-config".into())),
            ..Default::default()
        });
        assert_eq!(reg.list_models()[0].auth_method, AuthMethod::ApiKey);
    }

    #[test]
    fn empty_registry_summary() {
        let reg = ProviderRegistry::default();
        assert!(reg.is_empty());
        assert!(reg.first().is_none());
        assert_eq!(reg.provider_summary(), "no LLM providers configured");
    }
}
