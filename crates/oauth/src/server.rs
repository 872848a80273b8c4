use {async_trait::async_trait, url::Url};

use crate::{
    error::{Error, Result},
    exchange, grant,
    types::{GrantTicket, IssuedTokens, QrOAuthConfig, StatusReport},
};

/// The three authorization server calls the login flow is built on.
#[async_trait]
pub trait AuthServer: Send + Sync {
    async fn request_grant(&self, state: &str, code_challenge: &str) -> Result<GrantTicket>;

    async fn grant_status(&self, qr_code_id: &str) -> Result<StatusReport>;

    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        state: &str,
    ) -> Result<IssuedTokens>;
}

/// [`AuthServer`] speaking HTTP to a real authorization server.
pub struct HttpAuthServer {
    config: QrOAuthConfig,
    client: reqwest::Client,
}

impl HttpAuthServer {
    pub fn new(config: QrOAuthConfig) -> Result<Self> {
        for (name, value) in [
            ("grant_url", &config.grant_url),
            ("status_url", &config.status_url),
            ("token_url", &config.token_url),
        ] {
            Url::parse(value).map_err(|e| Error::Config(format!("{name} {value:?}: {e}")))?;
        }
        if config.client_id.trim().is_empty() {
            return Err(Error::Config("client_id must not be empty".into()));
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("qrgate/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &QrOAuthConfig {
        &self.config
    }
}

#[async_trait]
impl AuthServer for HttpAuthServer {
    async fn request_grant(&self, state: &str, code_challenge: &str) -> Result<GrantTicket> {
        grant::request_grant(&self.client, &self.config, state, code_challenge).await
    }

    async fn grant_status(&self, qr_code_id: &str) -> Result<StatusReport> {
        grant::grant_status(&self.client, &self.config, qr_code_id).await
    }

    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        state: &str,
    ) -> Result<IssuedTokens> {
        exchange::exchange_code(&self.client, &self.config, code, code_verifier, state).await
    }
}
