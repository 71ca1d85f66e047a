use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub objects: ObjectsConfig,
    #[serde(default)]
    pub intake: IntakeConfig,
    #[serde(default)]
    pub extractors: ExtractorsConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ObjectsConfig {
    /// Root directory of the content-addressed raw object store.
    pub root: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IntakeConfig {
    /// Submissions larger than this are rejected before a record is created.
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: default_max_payload_bytes(),
        }
    }
}

fn default_max_payload_bytes() -> usize {
    16 * 1024 * 1024
}

/// Toggles for the built-in extractors. All enabled by default; disabling
/// one removes it from the registry entirely.
#[derive(Debug, Deserialize, Clone)]
pub struct ExtractorsConfig {
    #[serde(default = "default_true")]
    pub text: bool,
    #[serde(default = "default_true")]
    pub markdown: bool,
    #[serde(default = "default_true")]
    pub json: bool,
    #[serde(default = "default_true")]
    pub pdf: bool,
}

impl Default for ExtractorsConfig {
    fn default() -> Self {
        Self {
            text: true,
            markdown: true,
            json: true,
            pdf: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.intake.max_payload_bytes == 0 {
        anyhow::bail!("intake.max_payload_bytes must be > 0");
    }

    if config.server.bind.parse::<std::net::SocketAddr>().is_err() {
        anyhow::bail!(
            "server.bind must be a socket address (host:port), got '{}'",
            config.server.bind
        );
    }

    Ok(config)
}

impl Config {
    /// Minimal in-memory config for tests and tooling that does not touch
    /// the database or object store paths.
    pub fn minimal() -> Config {
        Config {
            db: DbConfig {
                path: PathBuf::from("./data/intake.sqlite"),
            },
            objects: ObjectsConfig {
                root: PathBuf::from("./data/objects"),
            },
            intake: IntakeConfig::default(),
            extractors: ExtractorsConfig::default(),
            server: ServerConfig {
                bind: "127.0.0.1:7431".to_string(),
            },
        }
    }
}
