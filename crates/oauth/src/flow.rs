use std::future::Future;

use {
    secrecy::ExposeSecret,
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
};

use crate::{
    credential::{self, Credential},
    error::{Error, Result},
    pkce,
    poller::{GrantPoller, PollSchedule},
    random,
    server::{AuthServer, HttpAuthServer},
    types::{GrantSession, Provider, QrOAuthConfig},
};

/// Progress hooks for a login, so the caller decides how to talk to the operator.
pub trait LoginEvents: Send + Sync {
    /// The grant exists; its QR code URL should be shown now.
    fn grant_ready(&self, _session: &GrantSession) {}

    /// The URL could not be opened automatically.
    fn browser_unavailable(&self, _url: &str) {}

    /// The QR code was scanned but not yet approved.
    fn scanned(&self) {}

    /// The grant was approved; tokens are being fetched.
    fn exchanging(&self) {}
}

/// Ignores every event.
pub struct SilentEvents;

impl LoginEvents for SilentEvents {}

/// QR-code login: grant request, polling, code exchange, credential assembly.
///
/// Does not persist anything; hand the returned [`Credential`] to a
/// [`CredentialStore`](crate::storage::CredentialStore).
pub struct QrLoginFlow<S> {
    server: S,
    provider: Provider,
    schedule: PollSchedule,
    open_browser: bool,
}

impl QrLoginFlow<HttpAuthServer> {
    pub fn from_config(config: QrOAuthConfig, provider: Provider) -> Result<Self> {
        Ok(Self::new(HttpAuthServer::new(config)?, provider))
    }
}

impl<S: AuthServer> QrLoginFlow<S> {
    pub fn new(server: S, provider: Provider) -> Self {
        Self {
            server,
            provider,
            schedule: PollSchedule::default(),
            open_browser: true,
        }
    }

    pub fn with_schedule(mut self, schedule: PollSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_open_browser(mut self, open_browser: bool) -> Self {
        self.open_browser = open_browser;
        self
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub async fn login(
        &self,
        events: &dyn LoginEvents,
        cancel: &CancellationToken,
    ) -> Result<Credential> {
        let state = random::generate_state()?;
        let pkce = pkce::generate()?;

        let ticket = cancellable(
            cancel,
            self.server.request_grant(&state, &pkce.challenge),
        )
        .await?;
        let session = GrantSession::new(state, pkce, ticket);
        info!(provider = %self.provider, qr_code_id = %session.qr_code_id, "waiting for QR code approval");
        events.grant_ready(&session);

        if self.open_browser
            && let Err(e) = open::that(&session.qr_code_url)
        {
            warn!(error = %e, "could not open the QR code URL automatically");
            events.browser_unavailable(&session.qr_code_url);
        }

        let code = GrantPoller::new(&self.server, self.schedule)
            .wait_for_code(&session.qr_code_id, events, cancel)
            .await?;

        events.exchanging();
        let tokens = cancellable(
            cancel,
            self.server.exchange_code(
                &code,
                session.pkce.verifier.expose_secret(),
                &session.state,
            ),
        )
        .await?;

        let credential = credential::assemble(self.provider, tokens);
        if credential.account_id.is_none() {
            warn!(provider = %self.provider, "access token carries no account id");
        }
        info!(
            provider = %self.provider,
            account_id = credential.account_id.as_deref().unwrap_or(""),
            expires_at = ?credential.expires_at,
            "login succeeded"
        );
        Ok(credential)
    }
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}
