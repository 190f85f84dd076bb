use anyhow::{Context, Result};
use chat_hub::HubConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

// =============================================================================
// Tunable config (figment-deserialized from defaults / config.toml / env vars)
// =============================================================================
//
// Three equivalent ways to configure:
//
//   config.toml:     [chat]
//                    announce_join = false
//
//   env var:         PARLEY_CHAT__ANNOUNCE_JOIN=false   (double underscore = nesting)
//
//   (single underscore stays within field names: PARLEY_CHAT__RECONNECT_POLICY)

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    /// Routing and presence behaviour, handed to the hub as-is
    #[serde(default)]
    pub chat: HubConfig,
    #[serde(default)]
    pub storage: StorageFileConfig,
}

/// Listener settings (lives under `[server]` in config.toml).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Database location (lives under `[storage]` in config.toml).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StorageFileConfig {
    /// Relative paths resolve against the data directory
    #[serde(default = "default_db_file")]
    pub db_file: String,
}

impl Default for StorageFileConfig {
    fn default() -> Self {
        Self {
            db_file: default_db_file(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_db_file() -> String {
    "chat.db".to_string()
}

/// Build a figment that layers: defaults → config.toml → PARLEY_* env vars.
///
/// Env vars use double-underscore for nesting into sections:
///   `PARLEY_SERVER__PORT=9000`  →  `server.port = 9000`
///   `PARLEY_CHAT__REPORT_PROTOCOL_ERRORS=true`  →  `chat.report_protocol_errors = true`
pub fn load_config(data_dir: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(data_dir.join("config.toml")))
        .merge(Env::prefixed("PARLEY_").split("__"))
}

/// Command-line overrides, the last layer.
#[derive(Clone, Debug, Default)]
pub struct CliOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl FileConfig {
    /// Load every layer for `data_dir` and apply CLI overrides on top.
    pub fn resolve(data_dir: &Path, overrides: &CliOverrides) -> Result<Self> {
        let mut config: FileConfig = load_config(data_dir)
            .extract()
            .context("Invalid configuration")?;

        if let Some(host) = &overrides.host {
            config.server.host = host.clone();
        }
        if let Some(port) = overrides.port {
            config.server.port = port;
        }
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to render configuration")
    }
}

// =============================================================================
// Directory layout config (not tunable via figment, derived from --data-dir)
// =============================================================================

#[derive(Clone, Debug)]
pub struct ParleyConfig {
    pub data_dir: PathBuf,
}

impl ParleyConfig {
    pub fn new(custom_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = match custom_dir {
            Some(dir) => dir,
            None => dirs::home_dir()
                .context("Could not find home directory")?
                .join(".parley"),
        };

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

        info!("Data directory: {}", data_dir.display());

        Ok(Self { data_dir })
    }

    pub fn db_path(&self, storage: &StorageFileConfig) -> PathBuf {
        self.data_dir.join(&storage.db_file)
    }

    pub fn db_url(&self, storage: &StorageFileConfig) -> String {
        format!("sqlite://{}?mode=rwc", self.db_path(storage).display())
    }

    pub fn config_toml_path(&self) -> PathBuf {
        self.data_dir.join("config.toml")
    }
}
