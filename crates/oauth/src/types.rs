use std::{fmt, str::FromStr, time::Duration};

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize, Serializer},
};

use crate::{error::Error, pkce::PkceChallenge};

/// Configuration for a QR-code bound authorization grant.
#[derive(Debug, Clone)]
pub struct QrOAuthConfig {
    pub client_id: String,
    /// Grant issuance endpoint; answers with the QR code to display.
    pub grant_url: String,
    /// Grant status endpoint, queried with `?id=<qrCodeId>`.
    pub status_url: String,
    pub token_url: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    /// Timeout applied to every individual request.
    pub request_timeout: Duration,
}

/// Service a credential belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provider {
    Qwen,
}

impl Provider {
    pub const ALL: &'static [Provider] = &[Provider::Qwen];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Qwen => "qwen",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::Config(format!("unknown provider: {s}")))
    }
}

/// How a credential was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthMethod {
    #[serde(rename = "oauth")]
    OAuth,
    #[serde(rename = "api-key")]
    ApiKey,
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::OAuth => "oauth",
            Self::ApiKey => "api-key",
        })
    }
}

/// Status of a grant as reported by the authorization server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GrantStatus {
    Pending,
    #[serde(alias = "QR_CODE_SCANNED")]
    Scanned,
    Authorized,
    Expired,
    #[serde(alias = "CANCELLED")]
    Canceled,
    /// Any status this client does not know about; treated as still waiting.
    #[serde(other)]
    Unknown,
}

impl GrantStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Authorized | Self::Expired | Self::Canceled)
    }
}

impl fmt::Display for GrantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "PENDING",
            Self::Scanned => "SCANNED",
            Self::Authorized => "AUTHORIZED",
            Self::Expired => "EXPIRED",
            Self::Canceled => "CANCELED",
            Self::Unknown => "UNKNOWN",
        })
    }
}

/// What the grant issuance endpoint hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantTicket {
    pub qr_code_id: String,
    pub qr_code_url: String,
    pub redirect_uri: Option<String>,
}

/// One login attempt. Lives in memory only and is dropped on any terminal outcome.
#[derive(Debug)]
pub struct GrantSession {
    /// CSRF correlation token, hex encoded.
    pub state: String,
    pub pkce: PkceChallenge,
    pub qr_code_id: String,
    pub qr_code_url: String,
    pub redirect_uri: Option<String>,
}

impl GrantSession {
    pub fn new(state: String, pkce: PkceChallenge, ticket: GrantTicket) -> Self {
        Self {
            state,
            pkce,
            qr_code_id: ticket.qr_code_id,
            qr_code_url: ticket.qr_code_url,
            redirect_uri: ticket.redirect_uri,
        }
    }
}

/// A single answer from the grant status endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub status: GrantStatus,
    /// Authorization code, only meaningful once `status` is `AUTHORIZED`.
    pub code: Option<String>,
    pub message: Option<String>,
}

/// Tokens issued by the token endpoint, with the expiry already resolved.
#[derive(Debug)]
pub struct IssuedTokens {
    pub access_token: Secret<String>,
    pub refresh_token: Option<Secret<String>>,
    /// Unix timestamp when the access token expires. `None` means it does not.
    pub expires_at: Option<u64>,
    pub token_type: Option<String>,
}

pub fn serialize_secret<S: Serializer>(secret: &Secret<String>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(secret.expose_secret())
}

pub fn serialize_option_secret<S: Serializer>(
    secret: &Option<Secret<String>>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(secret) => s.serialize_some(secret.expose_secret()),
        None => s.serialize_none(),
    }
}
