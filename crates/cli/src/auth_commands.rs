use std::sync::Arc;

use {
    anyhow::Result,
    clap::Subcommand,
    qrgate_config::{QrgateConfig, credential_store, parse_provider},
    qrgate_oauth::{
        Credential, CredentialStore, Error, GrantSession, LoginEvents, Provider, QrLoginFlow,
        unix_now,
    },
    tokio_util::sync::CancellationToken,
    tracing::warn,
};

#[derive(Subcommand)]
pub enum AuthAction {
    /// Log in to a provider by scanning a QR code.
    Login {
        /// Provider name (e.g. "qwen").
        #[arg(long, default_value = "qwen")]
        provider: String,
    },
    /// Show authentication status for all providers.
    Status,
    /// Log out from a provider.
    Logout {
        /// Provider name (e.g. "qwen").
        #[arg(long, default_value = "qwen")]
        provider: String,
    },
}

pub async fn handle_auth(action: AuthAction, config: &QrgateConfig) -> Result<()> {
    let store = Arc::new(credential_store(config)?);
    match action {
        AuthAction::Login { provider } => login(parse_provider(&provider)?, config, store).await,
        AuthAction::Status => status(store.as_ref()),
        AuthAction::Logout { provider } => logout(parse_provider(&provider)?, store.as_ref()),
    }
}

/// Prints login progress for the operator.
struct ConsoleEvents;

impl LoginEvents for ConsoleEvents {
    fn grant_ready(&self, session: &GrantSession) {
        println!("Scan the QR code with the Qwen / Alibaba Cloud app to log in:");
        println!("\n  {}\n", session.qr_code_url);
        println!("Waiting for approval (Ctrl-C to cancel)...");
    }

    fn browser_unavailable(&self, url: &str) {
        println!("Could not open a viewer. Open this URL manually:\n{url}");
    }

    fn scanned(&self) {
        println!("QR code scanned, confirm the login in the app...");
    }

    fn exchanging(&self) {
        println!("Exchanging code for tokens...");
    }
}

async fn login(
    provider: Provider,
    config: &QrgateConfig,
    store: Arc<dyn CredentialStore>,
) -> Result<()> {
    let flow = QrLoginFlow::from_config(config.oauth.grant_config(provider), provider)?
        .with_schedule(config.oauth.poll_schedule())
        .with_open_browser(config.oauth.open_browser);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let result = flow.login(&ConsoleEvents, &cancel).await;
    interrupt.abort();

    let credential = match result {
        Ok(credential) => credential,
        Err(Error::Cancelled) => {
            println!("Login cancelled.");
            return Ok(());
        },
        Err(e) => return Err(e.into()),
    };

    store.save(provider, &credential)?;

    match &credential.account_id {
        Some(account) => println!("Successfully logged in to {provider} as {account}"),
        None => println!("Successfully logged in to {provider}"),
    }
    if credential.refresh_token.is_some() {
        warn!("refresh token stored but not used; run login again when the token expires");
    }
    Ok(())
}

/// Human-readable validity of `credential` at `now`.
fn describe_expiry(credential: &Credential, now: u64) -> String {
    if credential.is_expired_at(now) {
        return "expired, run `qrgate auth login` again".to_string();
    }
    match credential.remaining_secs(now) {
        None => "valid (no expiry)".to_string(),
        Some(remaining) => {
            let hours = remaining / 3600;
            let mins = (remaining % 3600) / 60;
            format!("valid ({hours}h {mins}m remaining)")
        },
    }
}

fn status(store: &dyn CredentialStore) -> Result<()> {
    let providers = store.list()?;
    if providers.is_empty() {
        println!("No authenticated providers.");
        return Ok(());
    }
    let now = unix_now();
    for provider in providers {
        if let Some(credential) = store.load(provider)? {
            let expiry = describe_expiry(&credential, now);
            match &credential.account_id {
                Some(account) => println!("{provider} ({account}) [{expiry}]"),
                None => println!("{provider} [{expiry}]"),
            }
        }
    }
    Ok(())
}

fn logout(provider: Provider, store: &dyn CredentialStore) -> Result<()> {
    store.delete(provider)?;
    println!("Logged out from {provider}");
    Ok(())
}
