//! Startup configuration, read once from a TOML file.
//!
//! A missing file is created with defaults so the user has something to edit.

use crate::controller::axis::DEFAULT_ANALOG_THRESHOLD;
use crate::controller::transducer::{DirectionSource, TransducerSettings};
use crate::mapping::{
    CommandKeySender, InjectionError, KeySender, LogKeySender, DEFAULT_INJECTION_TIMEOUT,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = "padkeys";
const CONFIG_FILE: &str = "config.toml";
const CONFIG_PATH_ENV: &str = "PADKEYS_CONFIG";
const DEFAULT_TARGET_APPLICATION: &str = "ZwiftAppSilicon";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum KeySenderBackend {
    /// Log presses without sending anything
    Log,
    /// Run an external command per press
    #[default]
    Command,
    /// Win32 SendInput to the foreground window
    #[cfg(windows)]
    SendInput,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct KeySenderConfig {
    pub backend: KeySenderBackend,
    /// argv template; `{key}` and `{target}` are substituted
    pub command: Vec<String>,
    /// Deadline for one key press, in milliseconds
    pub timeout_ms: u64,
}

impl Default for KeySenderConfig {
    fn default() -> Self {
        Self {
            backend: KeySenderBackend::default(),
            command: CommandKeySender::default_template(),
            timeout_ms: DEFAULT_INJECTION_TIMEOUT.as_millis() as u64,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Application that receives the key presses
    pub target_application: String,
    /// Stick deflection that counts as a directional press
    pub analog_threshold: f32,
    pub direction_source: DirectionSource,
    pub key_sender: KeySenderConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            target_application: DEFAULT_TARGET_APPLICATION.to_string(),
            analog_threshold: DEFAULT_ANALOG_THRESHOLD,
            direction_source: DirectionSource::default(),
            key_sender: KeySenderConfig::default(),
        }
    }
}

impl AppConfig {
    /// `$PADKEYS_CONFIG`, or `<config dir>/padkeys/config.toml`
    pub fn resolve_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return PathBuf::from(path);
        }

        let mut path = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| {
                warn!("Could not determine config directory, using current directory");
                PathBuf::from(".")
            });
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }

    /// Reads the config at `path`, writing the defaults there first if it does not exist
    pub async fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|source| io_error(path, source))?;

        if !exists {
            info!("No config at {}, writing defaults", path.display());
            let config = Self::default();
            config.save(path).await?;
            return Ok(config);
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| io_error(path, source))?;
        let config: Self = toml::from_str(&content)?;
        debug!("Loaded config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| io_error(parent, source))?;
        }
        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(path, content)
            .await
            .map_err(|source| io_error(path, source))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.analog_threshold > 0.0 && self.analog_threshold < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "analog_threshold must be between 0 and 1 (exclusive), got {}",
                self.analog_threshold
            )));
        }
        if self.target_application.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "target_application must not be empty".to_string(),
            ));
        }
        if self.key_sender.backend == KeySenderBackend::Command
            && self
                .key_sender
                .command
                .first()
                .map_or(true, |program| program.trim().is_empty())
        {
            return Err(ConfigError::Invalid(
                "key_sender.command must name a program".to_string(),
            ));
        }
        if self.key_sender.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "key_sender.timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn transducer_settings(&self) -> TransducerSettings {
        TransducerSettings {
            analog_threshold: self.analog_threshold,
            direction_source: self.direction_source,
        }
    }

    pub fn build_key_sender(&self) -> Result<Arc<dyn KeySender>, InjectionError> {
        match self.key_sender.backend {
            KeySenderBackend::Log => Ok(Arc::new(LogKeySender)),
            KeySenderBackend::Command => {
                Ok(Arc::new(CommandKeySender::new(&self.key_sender.command)?))
            }
            #[cfg(windows)]
            KeySenderBackend::SendInput => Ok(Arc::new(crate::mapping::SendInputKeySender)),
        }
    }

    pub fn injection_timeout(&self) -> Duration {
        Duration::from_millis(self.key_sender.timeout_ms)
    }
}

fn io_error(path: &Path, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let config = AppConfig::load_or_create(&path).await.unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(path.exists());

        let reloaded = AppConfig::load_or_create(&path).await.unwrap();
        assert_eq!(reloaded, config);
    }

    #[tokio::test]
    async fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        tokio::fs::write(
            &path,
            "target_application = \"Zwift\"\ndirection_source = \"stick\"\n\n[key_sender]\nbackend = \"log\"\ntimeout_ms = 750\n",
        )
        .await
        .unwrap();

        let config = AppConfig::load_or_create(&path).await.unwrap();
        assert_eq!(config.target_application, "Zwift");
        assert_eq!(config.direction_source, DirectionSource::Stick);
        assert_eq!(config.analog_threshold, DEFAULT_ANALOG_THRESHOLD);
        assert_eq!(config.key_sender.backend, KeySenderBackend::Log);
        assert_eq!(config.key_sender.command, CommandKeySender::default_template());
        assert_eq!(config.injection_timeout(), Duration::from_millis(750));
    }

    #[tokio::test]
    async fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        tokio::fs::write(&path, "analog_threshold = \"high\"").await.unwrap();

        assert!(matches!(
            AppConfig::load_or_create(&path).await,
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn validation_rejects_bad_values() {
        assert!(AppConfig::default().validate().is_ok());

        for threshold in [0.0, 1.0, -0.5, f32::NAN] {
            let config = AppConfig {
                analog_threshold: threshold,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "accepted {}", threshold);
        }

        let config = AppConfig {
            target_application: "  ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.key_sender.command.clear();
        assert!(config.validate().is_err());
        config.key_sender.backend = KeySenderBackend::Log;
        assert!(config.validate().is_ok());

        config.key_sender.timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn settings_and_sender_follow_config() {
        let config = AppConfig {
            analog_threshold: 0.3,
            direction_source: DirectionSource::DPad,
            ..Default::default()
        };
        assert_eq!(
            config.transducer_settings(),
            TransducerSettings {
                analog_threshold: 0.3,
                direction_source: DirectionSource::DPad,
            }
        );
        assert_eq!(config.build_key_sender().unwrap().name(), "xdotool");
        assert_eq!(config.injection_timeout(), DEFAULT_INJECTION_TIMEOUT);

        let mut config = AppConfig::default();
        config.key_sender.backend = KeySenderBackend::Log;
        assert_eq!(config.build_key_sender().unwrap().name(), "log");
    }
}
