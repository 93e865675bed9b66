// Copyright (c) bs-node contributors
// SPDX-License-Identifier: Apache-2.0

//! Configuration record (§3) and CLI surface (§6): a `Config` loaded once
//! at startup with precedence command-line > file > environment, plus
//! the run-mode flags the executor's `dispatch()` inspects first.

mod cli;
mod env;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use cli::Opt;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid hash argument {0:?}: expected 64 hex characters")]
    InvalidHash(String),
}

/// A 32-byte hash CLI/config argument. Defaults to all-zero, meaning
/// "no hash supplied".
pub type Hash32 = [u8; 32];

fn parse_hash(text: &str) -> Result<Hash32, ConfigError> {
    let bytes = hex::decode(text).map_err(|_| ConfigError::InvalidHash(text.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| ConfigError::InvalidHash(text.to_string()))
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub directory: PathBuf,
    pub map_size_header: u64,
    pub map_size_point: u64,
    pub map_size_transaction: u64,
    pub map_size_block: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            directory: PathBuf::from("bitcoin"),
            map_size_header: 1 << 30,
            map_size_point: 1 << 33,
            map_size_transaction: 1 << 35,
            map_size_block: 1 << 36,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct NodeConfig {
    pub threads_validation: usize,
    pub threads_priority: usize,
    pub concurrent_connections: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            threads_validation: 4,
            threads_priority: 1,
            concurrent_connections: 8,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    pub inbound_connections: usize,
    pub outbound_connections: usize,
    pub host_pool_capacity: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            inbound_connections: 8,
            outbound_connections: 10,
            host_pool_capacity: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    pub directory: PathBuf,
    pub log_file1: String,
    pub log_file2: String,
    pub events_file: String,
    pub maximum_size: u64,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            directory: PathBuf::from("logs"),
            log_file1: "node_end.log".to_string(),
            log_file2: "node_begin.log".to_string(),
            events_file: "events.log".to_string(),
            maximum_size: 1_000_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub http_bind: String,
    pub http_port: u16,
    pub html_bind: String,
    pub html_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            http_bind: "0.0.0.0".to_string(),
            http_port: 8080,
            html_bind: "0.0.0.0".to_string(),
            html_port: 8081,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BitcoinConfig {
    pub identifier: u32,
    pub checkpoints: Vec<String>,
    pub retargeting_seconds: u32,
}

impl Default for BitcoinConfig {
    fn default() -> Self {
        BitcoinConfig {
            identifier: 0,
            checkpoints: Vec::new(),
            retargeting_seconds: 2 * 7 * 24 * 60 * 60,
        }
    }
}

/// Configuration record (§3): constructed once at startup, immutable
/// thereafter.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub help: bool,
    pub version: bool,
    pub hardware: bool,
    pub settings: bool,
    pub newstore: bool,
    pub backup: bool,
    pub restore: bool,
    pub flags: bool,
    pub information: bool,
    pub slabs: bool,
    pub buckets: bool,
    pub collisions: bool,

    #[serde(skip)]
    pub test: Hash32,
    #[serde(skip)]
    pub write: Hash32,

    pub database: DatabaseConfig,
    pub node: NodeConfig,
    pub network: NetworkConfig,
    pub log: LogConfig,
    pub server: ServerConfig,
    pub bitcoin: BitcoinConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            help: false,
            version: false,
            hardware: false,
            settings: false,
            newstore: false,
            backup: false,
            restore: false,
            flags: false,
            information: false,
            slabs: false,
            buckets: false,
            collisions: false,
            test: Hash32::default(),
            write: Hash32::default(),
            database: DatabaseConfig::default(),
            node: NodeConfig::default(),
            network: NetworkConfig::default(),
            log: LogConfig::default(),
            server: ServerConfig::default(),
            bitcoin: BitcoinConfig::default(),
        }
    }
}

/// A run-mode flag (§4.9 subcommand mode), in the fixed alphabetical
/// (by short CLI form) precedence order `dispatch()` must honor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Slabs,
    Backup,
    Hardware,
    Flags,
    Help,
    Information,
    Buckets,
    Collisions,
    Newstore,
    Restore,
    Settings,
    Version,
}

impl RunMode {
    /// `-a -b -d -f -h -i -k -l -n -r -s -v`: alphabetical by short form.
    const PRECEDENCE: [RunMode; 12] = [
        RunMode::Slabs,
        RunMode::Backup,
        RunMode::Hardware,
        RunMode::Flags,
        RunMode::Help,
        RunMode::Information,
        RunMode::Buckets,
        RunMode::Collisions,
        RunMode::Newstore,
        RunMode::Restore,
        RunMode::Settings,
        RunMode::Version,
    ];

    fn is_set(self, config: &Config) -> bool {
        match self {
            RunMode::Slabs => config.slabs,
            RunMode::Backup => config.backup,
            RunMode::Hardware => config.hardware,
            RunMode::Flags => config.flags,
            RunMode::Help => config.help,
            RunMode::Information => config.information,
            RunMode::Buckets => config.buckets,
            RunMode::Collisions => config.collisions,
            RunMode::Newstore => config.newstore,
            RunMode::Restore => config.restore,
            RunMode::Settings => config.settings,
            RunMode::Version => config.version,
        }
    }
}

impl Config {
    /// The first run-mode flag set, in precedence order, or `None` if
    /// none are set (meaning test mode or run mode applies instead).
    pub fn run_mode(&self) -> Option<RunMode> {
        RunMode::PRECEDENCE.into_iter().find(|mode| mode.is_set(self))
    }

    /// Whether test mode (§4.9.2) applies: a nonzero `test` or `write`
    /// hash and no run-mode flag set.
    pub fn test_mode(&self) -> Option<(Hash32, bool)> {
        if self.run_mode().is_some() {
            return None;
        }
        if self.write != Hash32::default() {
            Some((self.write, true))
        } else if self.test != Hash32::default() {
            Some((self.test, false))
        } else {
            None
        }
    }

    /// Load with precedence command-line > file > environment. `prefix`
    /// is the environment-variable prefix (conventionally `BS_`).
    pub fn load(opt: &Opt, prefix: &str) -> Result<Config, ConfigError> {
        let mut config = Config::default();
        env::overlay(&mut config, prefix);

        if let Some(path) = opt.config_path() {
            let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            // A field the file sets takes precedence over the environment
            // layer beneath it; a field the file omits keeps whatever the
            // environment overlay above already gave it (`#[serde(default)]`
            // alone can't express that, so deserialize against the
            // env-derived record rather than a fresh default).
            config = merge_toml(&config, &text).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?;
        }

        opt.apply(&mut config)?;
        Ok(config)
    }
}

/// Deserialize `text` as TOML and merge it over `base` field-by-field
/// (table values merge recursively; any other value the file sets
/// replaces `base`'s), then deserialize the merged table back into a
/// `Config`. This is what lets a file that only sets `[server]` still
/// inherit `base`'s `[database]` (here, the environment-overlaid one)
/// instead of silently resetting it to `Default::default()`.
fn merge_toml(base: &Config, text: &str) -> Result<Config, toml::de::Error> {
    let base_value = toml::Value::try_from(base).expect("Config always serializes to TOML");
    let file_value: toml::Value = toml::from_str(text)?;
    let merged = merge_toml_values(base_value, file_value);
    merged.try_into()
}

fn merge_toml_values(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_value) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_value) => merge_toml_values(base_value, overlay_value),
                    None => overlay_value,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}
