mod auth_commands;

use std::{path::PathBuf, sync::Arc};

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    qrgate_agents::{ProviderRegistry, user_message},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "qrgate", about = "qrgate: QR-code login for LLM APIs", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (defaults to qrgate.toml in the user config dir).
    #[arg(long, global = true, env = "QRGATE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Authentication management.
    Auth {
        #[command(subcommand)]
        action: auth_commands::AuthAction,
    },
    /// List available models.
    Models,
    /// Send a single message to a model.
    Agent {
        #[arg(short, long)]
        message: String,
        /// Model to use (e.g. "qwen-max" or "qwen/qwen-max").
        #[arg(long)]
        model: Option<String>,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "qrgate starting");

    let config = qrgate_config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Auth { action } => auth_commands::handle_auth(action, &config).await,
        Commands::Models => {
            let registry = registry(&config)?;
            if registry.is_empty() {
                println!("{}", registry.provider_summary());
            }
            for model in registry.list_models() {
                println!("  {} [{}, {}]", model.id, model.provider, model.auth_method);
            }
            Ok(())
        },
        Commands::Agent { message, model } => {
            let registry = registry(&config)?;
            let provider = match model.as_deref() {
                Some(id) => registry
                    .get(id)
                    .with_context(|| format!("unknown model: {id}"))?,
                None => registry
                    .first()
                    .with_context(|| registry.provider_summary())?,
            };
            info!(provider = provider.name(), model = provider.id(), "sending message");
            let resp = provider.complete(&[user_message(&message)], &[]).await?;
            println!("{}", resp.text.unwrap_or_default());
            info!(
                input_tokens = resp.usage.input_tokens,
                output_tokens = resp.usage.output_tokens,
                "completion finished"
            );
            Ok(())
        },
    }
}

fn registry(config: &qrgate_config::QrgateConfig) -> anyhow::Result<ProviderRegistry> {
    let store = Arc::new(qrgate_config::credential_store(config)?);
    Ok(ProviderRegistry::from_config(config, store))
}
