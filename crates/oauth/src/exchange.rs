//! Authorization code to token exchange.

use {
    reqwest::header::ACCEPT,
    secrecy::Secret,
    serde::Deserialize,
    tracing::{debug, warn},
};

use crate::{
    credential::unix_now,
    error::{Error, Result},
    grant::snippet,
    types::{IssuedTokens, QrOAuthConfig},
};

/// Raw token endpoint response.
#[derive(Debug, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Exchange an approved authorization code for tokens.
///
/// `code_verifier` must be the verifier whose challenge went out with the
/// grant request, otherwise the server rejects the exchange.
pub async fn exchange_code(
    client: &reqwest::Client,
    config: &QrOAuthConfig,
    code: &str,
    code_verifier: &str,
    state: &str,
) -> Result<IssuedTokens> {
    let resp = client
        .post(&config.token_url)
        .header(ACCEPT, "application/json")
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("client_id", config.client_id.as_str()),
            ("code_verifier", code_verifier),
            ("state", state),
        ])
        .timeout(config.request_timeout)
        .send()
        .await?;

    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        warn!(status = status.as_u16(), "token exchange rejected");
        return Err(Error::Http {
            status: status.as_u16(),
            body,
        });
    }

    let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| {
        Error::Protocol(format!(
            "token response is not valid JSON ({e}): {}",
            snippet(&body)
        ))
    })?;

    let tokens = issued_tokens(parsed, unix_now())?;
    debug!(expires_at = ?tokens.expires_at, "token exchange succeeded");
    Ok(tokens)
}

/// Validate a token response and resolve its expiry relative to `now`.
pub fn issued_tokens(resp: TokenResponse, now: u64) -> Result<IssuedTokens> {
    if resp.access_token.trim().is_empty() {
        return Err(Error::Protocol(
            "token response did not include an access_token".into(),
        ));
    }

    let expires_at = resp
        .expires_in
        .filter(|secs| *secs > 0)
        .map(|secs| now.saturating_add(secs.unsigned_abs()));

    Ok(IssuedTokens {
        access_token: Secret::new(resp.access_token),
        refresh_token: resp
            .refresh_token
            .filter(|t| !t.trim().is_empty())
            .map(Secret::new),
        expires_at,
        token_type: resp.token_type,
    })
}
