use std::time::Duration;

use crate::types::{GrantStatus, Provider};

/// Errors produced by the QR-code login flow and the credential store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("secure random source unavailable: {0}")]
    Entropy(String),

    #[error("network error talking to the authorization server: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected response from the authorization server: {0}")]
    Protocol(String),

    #[error("token endpoint returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("authorization grant {status}{}", message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    GrantTerminated {
        status: GrantStatus,
        message: Option<String>,
    },

    #[error("timed out after {}s waiting for the QR code to be scanned and approved", waited.as_secs())]
    Timeout { waited: Duration },

    #[error("login cancelled")]
    Cancelled,

    #[error("no {provider} credential on file; run `qrgate auth login --provider {provider}`")]
    MissingCredential { provider: Provider },

    #[error(
        "{provider} access token has expired; log in again with `qrgate auth login --provider {provider}`"
    )]
    ExpiredCredential { provider: Provider },

    #[error("credential store error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Whether a failed grant status check may be retried on the next tick.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Protocol(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
