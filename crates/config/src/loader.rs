use std::path::{Path, PathBuf};

use {
    anyhow::{Context, bail},
    directories::ProjectDirs,
    tracing::debug,
};

use qrgate_oauth::{FileCredentialStore, Provider};

use crate::schema::QrgateConfig;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "QRGATE_CONFIG";

const CONFIG_FILES: &[&str] = &["qrgate.toml", "qrgate.yaml", "qrgate.yml", "qrgate.json"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("yaml" | "yml") => Ok(Self::Yaml),
            Some("json") => Ok(Self::Json),
            _ => bail!(
                "unsupported config file extension: {} (expected .toml, .yaml, .yml or .json)",
                path.display()
            ),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "qrgate", "qrgate")
}

pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// First known config file name present in `dir`.
pub fn find_config_file(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Load the config from `explicit`, `$QRGATE_CONFIG`, or the config dir.
///
/// A missing default file yields the defaults; a missing explicit file is an error.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<QrgateConfig> {
    let requested = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
    if let Some(path) = requested {
        return load_from(&path);
    }

    match config_dir().and_then(|dir| find_config_file(&dir)) {
        Some(path) => load_from(&path),
        None => {
            debug!("no config file found, using defaults");
            Ok(QrgateConfig::default())
        },
    }
}

pub fn load_from(path: &Path) -> anyhow::Result<QrgateConfig> {
    let format = ConfigFormat::from_path(path)?;
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config = parse_config(&content, format)
        .with_context(|| format!("invalid config file {}", path.display()))?;
    debug!(path = %path.display(), "loaded config");
    Ok(config)
}

pub fn parse_config(content: &str, format: ConfigFormat) -> anyhow::Result<QrgateConfig> {
    let config: QrgateConfig = match format {
        ConfigFormat::Toml => toml::from_str(content)?,
        ConfigFormat::Yaml => serde_yaml::from_str(content)?,
        ConfigFormat::Json => serde_json::from_str(content)?,
    };
    validate(&config)?;
    Ok(config)
}

fn validate(config: &QrgateConfig) -> anyhow::Result<()> {
    let oauth = &config.oauth;
    if oauth.poll_interval_secs == 0 {
        bail!("oauth.poll_interval_secs must be greater than zero");
    }
    if oauth.login_timeout_secs <= oauth.poll_interval_secs {
        bail!("oauth.login_timeout_secs must be greater than oauth.poll_interval_secs");
    }
    if oauth.request_timeout_secs == 0 {
        bail!("oauth.request_timeout_secs must be greater than zero");
    }
    for (name, value) in [
        ("oauth.grant_url", &oauth.grant_url),
        ("oauth.status_url", &oauth.status_url),
        ("oauth.token_url", &oauth.token_url),
        ("providers.qwen.base_url", &config.providers.qwen.base_url),
    ] {
        if let Some(value) = value {
            url::Url::parse(value).with_context(|| format!("{name} is not a valid URL"))?;
        }
    }
    Ok(())
}

/// Directory for persistent state such as stored credentials.
pub fn data_dir(config: &QrgateConfig) -> anyhow::Result<PathBuf> {
    if let Some(dir) = &config.data_dir {
        return Ok(dir.clone());
    }
    project_dirs()
        .map(|dirs| dirs.data_dir().to_path_buf())
        .context("could not determine a data directory; set data_dir in the config")
}

pub fn credential_store(config: &QrgateConfig) -> anyhow::Result<FileCredentialStore> {
    Ok(FileCredentialStore::in_dir(&data_dir(config)?))
}

/// Parse a `--provider` argument.
pub fn parse_provider(name: &str) -> anyhow::Result<Provider> {
    Ok(name.parse::<Provider>()?)
}
