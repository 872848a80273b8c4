pub mod loader;
pub mod schema;

pub use {
    loader::{credential_store, data_dir, load_config, parse_provider},
    schema::{OAuthSettings, ProvidersConfig, QrgateConfig, QwenSettings},
};
