use std::{path::PathBuf, time::Duration};

use {
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
};

use qrgate_oauth::{AuthMethod, PollSchedule, Provider, QrOAuthConfig, defaults, oauth_config_for};

pub const QWEN_API_BASE: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";
pub const QWEN_DEFAULT_MODEL: &str = "qwen-plus";

/// Environment variables checked, in order, for a Qwen API key.
pub const QWEN_API_KEY_VARS: &[&str] = &["DASHSCOPE_API_KEY", "QWEN_API_KEY"];

/// Root configuration (`qrgate.toml`).
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct QrgateConfig {
    /// Directory holding `credentials.json`. Defaults to the platform data dir.
    pub data_dir: Option<PathBuf>,
    pub oauth: OAuthSettings,
    pub providers: ProvidersConfig,
}

/// Overrides for the QR-code login.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OAuthSettings {
    pub client_id: Option<String>,
    pub grant_url: Option<String>,
    pub status_url: Option<String>,
    pub token_url: Option<String>,
    pub redirect_uri: Option<String>,
    pub scopes: Option<Vec<String>>,
    pub poll_interval_secs: u64,
    pub login_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Try to open the QR code URL in the default viewer.
    pub open_browser: bool,
}

impl Default for OAuthSettings {
    fn default() -> Self {
        Self {
            client_id: None,
            grant_url: None,
            status_url: None,
            token_url: None,
            redirect_uri: None,
            scopes: None,
            poll_interval_secs: defaults::POLL_INTERVAL.as_secs(),
            login_timeout_secs: defaults::LOGIN_TIMEOUT.as_secs(),
            request_timeout_secs: defaults::REQUEST_TIMEOUT.as_secs(),
            open_browser: true,
        }
    }
}

impl OAuthSettings {
    /// Built-in grant configuration for `provider` with these overrides applied.
    pub fn grant_config(&self, provider: Provider) -> QrOAuthConfig {
        let mut config = oauth_config_for(provider);
        if let Some(client_id) = &self.client_id {
            config.client_id = client_id.clone();
        }
        if let Some(url) = &self.grant_url {
            config.grant_url = url.clone();
        }
        if let Some(url) = &self.status_url {
            config.status_url = url.clone();
        }
        if let Some(url) = &self.token_url {
            config.token_url = url.clone();
        }
        if let Some(uri) = &self.redirect_uri {
            config.redirect_uri = uri.clone();
        }
        if let Some(scopes) = &self.scopes {
            config.scopes = scopes.clone();
        }
        config.request_timeout = Duration::from_secs(self.request_timeout_secs);
        config
    }

    pub fn poll_schedule(&self) -> PollSchedule {
        PollSchedule {
            interval: Duration::from_secs(self.poll_interval_secs),
            timeout: Duration::from_secs(self.login_timeout_secs),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub qwen: QwenSettings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct QwenSettings {
    pub auth_method: Option<AuthMethod>,
    pub api_key: Option<Secret<String>>,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

impl QwenSettings {
    /// API key from the config file, else from the environment.
    pub fn api_key(&self) -> Option<Secret<String>> {
        self.api_key_with(|name| std::env::var(name).ok())
    }

    pub fn api_key_with(&self, env: impl Fn(&str) -> Option<String>) -> Option<Secret<String>> {
        self.api_key
            .as_ref()
            .map(|key| key.expose_secret().trim().to_string())
            .filter(|key| !key.is_empty())
            .or_else(|| {
                QWEN_API_KEY_VARS
                    .iter()
                    .filter_map(|name| env(name))
                    .map(|key| key.trim().to_string())
                    .find(|key| !key.is_empty())
            })
            .map(Secret::new)
    }

    /// Explicit method, else API key when one is available, else OAuth.
    pub fn auth_method_with(&self, api_key: Option<&Secret<String>>) -> AuthMethod {
        match (self.auth_method, api_key) {
            (Some(method), _) => method,
            (None, Some(_)) => AuthMethod::ApiKey,
            (None, None) => AuthMethod::OAuth,
        }
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
            .unwrap_or(QWEN_API_BASE)
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(QWEN_DEFAULT_MODEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oauth_defaults_match_builtin_provider() {
        let settings = OAuthSettings::default();
        let config = settings.grant_config(Provider::Qwen);
        assert_eq!(config.client_id, "qwen_cli_app");
        assert_eq!(config.redirect_uri, "oob");
        assert_eq!(config.scopes, vec!["openid", "profile", "email"]);
        assert_eq!(config.request_timeout, defaults::REQUEST_TIMEOUT);
        assert_eq!(settings.poll_schedule(), PollSchedule::default());
        assert_eq!(settings.poll_interval_secs, 3);
        assert_eq!(settings.login_timeout_secs, 600);
    }

    #[test]
    fn oauth_overrides_apply() {
        let settings = OAuthSettings {
            token_url: Some("http://127.0.0.1:9/token".into()),
            scopes: Some(vec!["openid".into()]),
            request_timeout_secs: 5,
            ..Default::default()
        };
        let config = settings.grant_config(Provider::Qwen);
        assert_eq!(config.token_url, "http://127.0.0.1:9/token");
        assert_eq!(config.grant_url, defaults::QWEN_GRANT_URL);
        assert_eq!(config.scopes, vec!["openid"]);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn api_key_prefers_config_then_env() {
        let from_config = QwenSettings {
            api_key: Some(Secret::new("sk-config".into())),
            ..Default::default()
        };
        let key = from_config.api_key_with(|_| Some("sk-env".into())).unwrap();
        assert_eq!(key.expose_secret(), "sk-config");

        let from_env = QwenSettings::default();
        let key = from_env
            .api_key_with(|name| (name == "QWEN_API_KEY").then(|| "sk-env".to_string()))
            .unwrap();
        assert_eq!(key.expose_secret(), "sk-env");

        assert!(from_env.api_key_with(|_| Some("   ".into())).is_none());
    }

    #[test]
    fn auth_method_resolution() {
        let key = Secret::new("sk".to_string());
        let settings = QwenSettings::default();
        assert_eq!(settings.auth_method_with(Some(&key)), AuthMethod::ApiKey);
        assert_eq!(settings.auth_method_with(None), AuthMethod::OAuth);

        let forced = QwenSettings {
            auth_method: Some(AuthMethod::OAuth),
            ..Default::default()
        };
        assert_eq!(forced.auth_method_with(Some(&key)), AuthMethod::OAuth);
    }

    #[test]
    fn qwen_defaults() {
        let settings = QwenSettings::default();
        assert_eq!(settings.base_url(), QWEN_API_BASE);
        assert_eq!(settings.model(), "qwen-plus");

        let custom = QwenSettings {
            base_url: Some("http://localhost:8080/v1/".into()),
            ..Default::default()
        };
        assert_eq!(custom.base_url(), "http://localhost:8080/v1");
    }
}
