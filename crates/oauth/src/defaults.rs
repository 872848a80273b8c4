use std::time::Duration;

use crate::types::{Provider, QrOAuthConfig};

pub const QWEN_CLIENT_ID: &str = "qwen_cli_app";
pub const QWEN_GRANT_URL: &str = "https://oauth.aliyun.com/v1/oauth/qrcode";
pub const QWEN_STATUS_URL: &str = "https://oauth.aliyun.com/v1/oauth/qrcode/status";
pub const QWEN_TOKEN_URL: &str = "https://oauth.aliyun.com/v1/oauth/token";
/// Out-of-band redirect: the code arrives through grant polling, not a browser redirect.
pub const OOB_REDIRECT_URI: &str = "oob";

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const POLL_INTERVAL: Duration = Duration::from_secs(3);
pub const LOGIN_TIMEOUT: Duration = Duration::from_secs(10 * 60);

pub fn qwen_oauth_config() -> QrOAuthConfig {
    QrOAuthConfig {
        client_id: QWEN_CLIENT_ID.into(),
        grant_url: QWEN_GRANT_URL.into(),
        status_url: QWEN_STATUS_URL.into(),
        token_url: QWEN_TOKEN_URL.into(),
        redirect_uri: OOB_REDIRECT_URI.into(),
        scopes: vec!["openid".into(), "profile".into(), "email".into()],
        request_timeout: REQUEST_TIMEOUT,
    }
}

/// Built-in grant configuration for a provider.
pub fn oauth_config_for(provider: Provider) -> QrOAuthConfig {
    match provider {
        Provider::Qwen => qwen_oauth_config(),
    }
}
