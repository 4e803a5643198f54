use crate::defaults;
use crate::error::{Result, StreamscribeError};
use crate::stream::SessionConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub audio: AudioConfig,
    pub stream: StreamConfig,
}

/// Transcription server endpoints
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// WebSocket base URL, e.g. `ws://127.0.0.1:8000`
    pub url: String,
    /// HTTP base URL for the REST endpoints, e.g. `http://127.0.0.1:8000`
    pub http_url: String,
}

/// Audio capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub device: Option<String>,
    pub block_size: usize,
}

/// Streaming session configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamConfig {
    /// Bounded wait for the final result during the stop handshake.
    pub handshake_timeout_ms: u64,
    /// Capture thread idle poll interval.
    pub poll_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: defaults::SERVER_URL.to_string(),
            http_url: defaults::HTTP_URL.to_string(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            block_size: defaults::BLOCK_SIZE,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_ms: defaults::HANDSHAKE_TIMEOUT_MS,
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values.
    ///
    /// # Errors
    /// `ConfigFileNotFound` if the file is missing, `Config` on invalid TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StreamscribeError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                StreamscribeError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only falls back to defaults when the file is missing; invalid TOML
    /// is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(StreamscribeError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - STREAMSCRIBE_SERVER_URL → server.url
    /// - STREAMSCRIBE_HTTP_URL → server.http_url
    /// - STREAMSCRIBE_AUDIO_DEVICE → audio.device
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("STREAMSCRIBE_SERVER_URL")
            && !url.is_empty()
        {
            self.server.url = url;
        }

        if let Ok(url) = std::env::var("STREAMSCRIBE_HTTP_URL")
            && !url.is_empty()
        {
            self.server.http_url = url;
        }

        if let Ok(device) = std::env::var("STREAMSCRIBE_AUDIO_DEVICE")
            && !device.is_empty()
        {
            self.audio.device = Some(device);
        }

        self
    }

    /// Check field values that serde cannot reject on its own.
    pub fn validate(&self) -> Result<()> {
        if !self.server.url.starts_with("ws://") && !self.server.url.starts_with("wss://") {
            return Err(StreamscribeError::ConfigInvalidValue {
                key: "server.url".to_string(),
                message: format!("must start with ws:// or wss://, got {:?}", self.server.url),
            });
        }
        if self.audio.block_size == 0 {
            return Err(StreamscribeError::ConfigInvalidValue {
                key: "audio.block_size".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.stream.handshake_timeout_ms == 0 {
            return Err(StreamscribeError::ConfigInvalidValue {
                key: "stream.handshake_timeout_ms".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Input device to capture from.
    ///
    /// An explicit override (the `--device` flag) wins over `audio.device`
    /// from the file or the `STREAMSCRIBE_AUDIO_DEVICE` environment
    /// variable; `None` means the platform default device.
    pub fn input_device<'a>(&'a self, cli_override: Option<&'a str>) -> Option<&'a str> {
        cli_override.or(self.audio.device.as_deref())
    }

    /// Full URL of the streaming endpoint.
    pub fn stream_url(&self) -> String {
        format!(
            "{}{}",
            self.server.url.trim_end_matches('/'),
            defaults::STREAM_PATH
        )
    }

    /// Session parameters derived from the `[stream]` section.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new()
            .with_handshake_timeout(Duration::from_millis(self.stream.handshake_timeout_ms))
            .with_poll_interval(Duration::from_millis(self.stream.poll_interval_ms))
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/streamscribe/config.toml on Linux
    #[cfg(feature = "cli")]
    pub fn default_path() -> Option<std::path::PathBuf> {
        dirs::config_dir().map(|dir| dir.join("streamscribe").join("config.toml"))
    }
}
