use config::{Config, ConfigError, Environment, File};
use filehub_common::StorageConfig;
use serde::Deserialize;

const DEFAULT_CONFIG_PATH: &str = "config/config";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CorsConfig {
    #[serde(default)]
    pub allow_origins: Vec<String>,
    #[serde(default = "default_cors_max_age")]
    pub max_age: u64,
}

fn default_cors_max_age() -> u64 {
    3600
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    /// Pool size. Must be 1 for `sqlite::memory:`. Default: 10.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Load from `$FILEHUB_CONFIG` (default `config/config.toml`), then the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let path =
            std::env::var("FILEHUB_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path)
    }

    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8000)?
            .set_default("database.url", "sqlite://filehub.db?mode=rwc")?
            .add_source(File::with_name(path).required(false))
            // Override from environment (e.g., FILEHUB__DATABASE__URL)
            .add_source(Environment::with_prefix("FILEHUB").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
