//! Service configuration with override support
//!
//! Values are resolved in three tiers, later tiers winning:
//! 1. TOML file (`kartscan.toml`), or built-in defaults when none is found
//! 2. Environment variables
//! 3. Command line flags

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use kartscan_core::SourceId;
use kartscan_core::constants::{DEFAULT_BAUD_RATE, DEFAULT_SERIAL_TIMEOUT_MS};
use kartscan_hardware::SerialSettings;
use kartscan_reader::PollerConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::{LogFormat, LogLevel};

/// File name searched for in the working directory.
pub const CONFIG_FILE_NAME: &str = "kartscan.toml";

/// Environment variable naming an explicit configuration file.
pub const CONFIG_PATH_ENV: &str = "KARTSCAN_CONFIG_PATH";

pub const CART_ID_ENV: &str = "KARTSCAN_CART_ID";
pub const LOG_LEVEL_ENV: &str = "KARTSCAN_LOG_LEVEL";
pub const READER1_PORT_ENV: &str = "KARTSCAN_READER1_PORT";
pub const READER2_PORT_ENV: &str = "KARTSCAN_READER2_PORT";

/// Ids of the two readers a cart carries.
pub const READER1_ID: &str = "reader1";
pub const READER2_ID: &str = "reader2";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML syntax: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {0}")]
    Validation(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KartscanConfig {
    /// Identifier of the cart stamped on every emitted scan.
    pub cart_id: String,
    pub logging: LoggingConfig,
    pub poller: PollerConfig,
    /// Readers in polling order.
    pub readers: Vec<ReaderConfig>,
}

impl Default for KartscanConfig {
    fn default() -> Self {
        Self {
            cart_id: "1234".to_string(),
            logging: LoggingConfig::default(),
            poller: PollerConfig::default(),
            readers: vec![
                ReaderConfig::new(READER1_ID, "/dev/ttyUSB0"),
                ReaderConfig::new(READER2_ID, "/dev/serial0"),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
}

/// One serial reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderConfig {
    pub id: String,
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_timeout_ms() -> u64 {
    DEFAULT_SERIAL_TIMEOUT_MS
}

impl ReaderConfig {
    pub fn new(id: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: DEFAULT_SERIAL_TIMEOUT_MS,
        }
    }

    /// Validated source id for this reader.
    pub fn source_id(&self) -> ConfigResult<SourceId> {
        SourceId::new(&self.id).map_err(|e| ConfigError::Validation(e.to_string()))
    }

    /// Settings used to open the serial port.
    pub fn serial_settings(&self) -> SerialSettings {
        SerialSettings::new(&self.port)
            .with_baud_rate(self.baud_rate)
            .with_timeout_ms(self.timeout_ms)
    }
}

/// Values that replace file settings, from the environment or the CLI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub cart_id: Option<String>,
    pub log_level: Option<LogLevel>,
    pub log_format: Option<LogFormat>,
    pub reader1_port: Option<String>,
    pub reader2_port: Option<String>,
}

impl ConfigOverrides {
    /// Read overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read overrides through `lookup`, keyed by environment variable name.
    ///
    /// Empty values are ignored, as is an unrecognised log level.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let log_level =
            get(LOG_LEVEL_ENV).and_then(|level| LogLevel::from_str(level.trim(), true).ok());

        Self {
            cart_id: get(CART_ID_ENV),
            log_level,
            log_format: None,
            reader1_port: get(READER1_PORT_ENV),
            reader2_port: get(READER2_PORT_ENV),
        }
    }
}

impl KartscanConfig {
    /// Replace every setting present in `overrides`.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(cart_id) = &overrides.cart_id {
            self.cart_id = cart_id.clone();
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        if let Some(format) = overrides.log_format {
            self.logging.format = format;
        }
        if let Some(port) = &overrides.reader1_port {
            self.set_reader_port(READER1_ID, port);
        }
        if let Some(port) = &overrides.reader2_port {
            self.set_reader_port(READER2_ID, port);
        }
    }

    /// Point reader `id` at `port`, adding the reader if it is not listed.
    pub fn set_reader_port(&mut self, id: &str, port: &str) {
        match self.readers.iter_mut().find(|r| r.id == id) {
            Some(reader) => reader.port = port.to_string(),
            None => self.readers.push(ReaderConfig::new(id, port)),
        }
    }

    /// Check the whole configuration before anything is opened.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` naming the first offending setting.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.cart_id.trim().is_empty() {
            return Err(ConfigError::Validation("cart_id must not be empty".into()));
        }

        let mut seen = HashSet::new();
        for reader in &self.readers {
            let id = reader.source_id()?;
            if !seen.insert(id.clone()) {
                return Err(ConfigError::Validation(format!(
                    "reader id {id} is listed more than once"
                )));
            }
            if reader.port.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "reader {id} has an empty port"
                )));
            }
            if reader.baud_rate == 0 {
                return Err(ConfigError::Validation(format!(
                    "reader {id} has a zero baud rate"
                )));
            }
        }

        self.poller
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))
    }
}

/// Locate the configuration file.
///
/// Search order:
/// 1. `explicit` (the `--config` flag)
/// 2. `KARTSCAN_CONFIG_PATH`
/// 3. `./kartscan.toml`
///
/// Returns `Ok(None)` when nothing was requested and the working directory
/// has no file, so the service runs on defaults.
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if an explicitly named file is missing.
pub fn find_config_file(explicit: Option<&Path>) -> ConfigResult<Option<PathBuf>> {
    let requested = explicit
        .map(Path::to_path_buf)
        .or_else(|| env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));

    if let Some(path) = requested {
        if path.exists() {
            return Ok(Some(path));
        }
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let local = env::current_dir()?.join(CONFIG_FILE_NAME);
    Ok(local.exists().then_some(local))
}

/// Parse a configuration file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid TOML.
pub fn load_config(path: &Path) -> ConfigResult<KartscanConfig> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }
    let contents = fs::read_to_string(path)?;
    Ok(toml::from_str(&contents)?)
}

/// Resolve the effective configuration: file or defaults, then the
/// environment, then `cli`, then validation.
///
/// # Errors
///
/// Returns the first loading or validation failure.
pub fn resolve(explicit: Option<&Path>, cli: &ConfigOverrides) -> ConfigResult<KartscanConfig> {
    let mut config = match find_config_file(explicit)? {
        Some(path) => load_config(&path)?,
        None => KartscanConfig::default(),
    };

    config.apply_overrides(&ConfigOverrides::from_env());
    config.apply_overrides(cli);
    config.validate()?;
    Ok(config)
}
