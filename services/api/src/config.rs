//! Service configuration
//!
//! Values are layered: built-in defaults, then `config/default.*` if present,
//! then the file named by `APP_CONFIG`, then `APP_`-prefixed environment
//! variables using `__` between sections (`APP_SERVER__PORT=8080`).

use config::{Config, ConfigError, Environment, File};
use recipe_common::database::DatabaseConfig;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

/// Environment variable naming an extra configuration file
pub const CONFIG_FILE_VAR: &str = "APP_CONFIG";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseConfig,
    pub store: StoreSettings,
    pub auth: AuthSettings,
    pub media: MediaSettings,
    pub log: LogSettings,
}

impl Settings {
    /// Load settings from every configured source
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder =
            Config::builder().add_source(File::with_name("config/default").required(false));

        if let Ok(path) = env::var(CONFIG_FILE_VAR) {
            builder = builder.add_source(File::with_name(&path));
        }

        builder
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
        }
    }
}

impl ServerSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub password: PasswordSettings,
}

/// Argon2id cost parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PasswordSettings {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordSettings {
    fn default() -> Self {
        Self {
            memory_kib: 19456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaBackend {
    #[default]
    Local,
    S3,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MediaSettings {
    pub backend: MediaBackend,
    /// Directory of the local backend
    pub root: PathBuf,
    /// Prefix of image URLs; also the mount point of the local backend
    pub public_url: String,
    pub bucket: Option<String>,
    pub max_upload_bytes: usize,
    /// Largest accepted width or height of an uploaded image
    pub max_image_dimension: u32,
    /// Ceiling on memory allocated while decoding an upload
    pub max_decode_bytes: u64,
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            backend: MediaBackend::Local,
            root: PathBuf::from("media"),
            public_url: "/media".to_string(),
            bucket: None,
            max_upload_bytes: 10 * 1024 * 1024,
            max_image_dimension: 4096,
            max_decode_bytes: 64 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub filter: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}
