//! QR-code OAuth login with PKCE.
//!
//! The operator scans a QR code with the provider's app instead of being
//! redirected back to a local callback. The client polls the grant until it is
//! approved, exchanges the authorization code and returns a [`Credential`].

pub mod credential;
pub mod defaults;
pub mod error;
pub mod exchange;
pub mod flow;
pub mod grant;
pub mod pkce;
pub mod poller;
pub mod random;
pub mod server;
pub mod storage;
pub mod types;

pub use {
    credential::{Credential, extract_account_id, require_usable, unix_now},
    defaults::oauth_config_for,
    flow::{LoginEvents, QrLoginFlow, SilentEvents},
    pkce::PkceChallenge,
    poller::{GrantPhase, GrantPoller, PollOutcome, PollSchedule},
    server::{AuthServer, HttpAuthServer},
    storage::{CredentialStore, FileCredentialStore},
    types::{
        AuthMethod, GrantSession, GrantStatus, GrantTicket, IssuedTokens, Provider,
        QrOAuthConfig, StatusReport,
    },
};

pub use error::{Error, Result};
