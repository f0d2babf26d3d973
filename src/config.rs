//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, RoverLinkError};
use crate::link::ChannelRole;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    pub link: LinkConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Rover endpoint configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_video_port")]
    pub video_port: u16,

    #[serde(default = "default_audio_port")]
    pub audio_port: u16,

    #[serde(default = "default_command_port")]
    pub command_port: u16,

    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

/// Microphone streaming configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AudioConfig {
    #[serde(default = "default_chunk_bytes")]
    pub chunk_bytes: usize,

    #[serde(default = "default_audio_device")]
    pub device: String,
}

/// Gamepad configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ControllerConfig {
    #[serde(default)]
    pub device_path: String,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub log_dir: String,
}

// Default value functions
fn default_host() -> String { "192.168.1.50".to_string() }
fn default_video_port() -> u16 { 8080 }
fn default_audio_port() -> u16 { 8081 }
fn default_command_port() -> u16 { 8082 }
fn default_reconnect_delay_ms() -> u64 { 2000 }

fn default_chunk_bytes() -> usize { 1280 }
fn default_audio_device() -> String { "/dev/stdin".to_string() }

fn default_log_level() -> String { "info".to_string() }

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            video_port: default_video_port(),
            audio_port: default_audio_port(),
            command_port: default_command_port(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            chunk_bytes: default_chunk_bytes(),
            device: default_audio_device(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: String::new(),
        }
    }
}

impl LinkConfig {
    /// Port the rover listens on for the given channel
    pub fn port(&self, role: ChannelRole) -> u16 {
        match role {
            ChannelRole::Video => self.video_port,
            ChannelRole::Audio => self.audio_port,
            ChannelRole::Command => self.command_port,
        }
    }

    /// WebSocket URL for the given channel
    ///
    /// # Examples
    ///
    /// ```
    /// use rover_link::config::LinkConfig;
    /// use rover_link::link::ChannelRole;
    ///
    /// let link = LinkConfig::default();
    /// assert_eq!(link.endpoint(ChannelRole::Command), "ws://192.168.1.50:8082");
    /// ```
    pub fn endpoint(&self, role: ChannelRole) -> String {
        format!("ws://{}:{}", self.host, self.port(role))
    }

    /// Delay between a connection failure and the next attempt
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rover_link::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.link.host.trim().is_empty() {
            return Err(config_error("link host cannot be empty"));
        }

        let ports = [
            ("video_port", self.link.video_port),
            ("audio_port", self.link.audio_port),
            ("command_port", self.link.command_port),
        ];
        for (name, port) in ports {
            if port == 0 {
                return Err(config_error(format!("{} must be non-zero", name)));
            }
        }
        if self.link.video_port == self.link.audio_port
            || self.link.video_port == self.link.command_port
            || self.link.audio_port == self.link.command_port
        {
            return Err(config_error("video, audio and command ports must be distinct"));
        }

        if self.link.reconnect_delay_ms == 0 || self.link.reconnect_delay_ms > 60000 {
            return Err(config_error("reconnect_delay_ms must be between 1 and 60000"));
        }

        // PCM16 chunks must hold whole samples
        if self.audio.chunk_bytes < 2
            || self.audio.chunk_bytes > 65536
            || self.audio.chunk_bytes % 2 != 0
        {
            return Err(config_error("chunk_bytes must be an even number between 2 and 65536"));
        }

        if self.audio.device.is_empty() {
            return Err(config_error("audio device cannot be empty"));
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(config_error("log level must be one of: trace, debug, info, warn, error"));
        }

        Ok(())
    }
}

fn config_error(msg: impl std::fmt::Display) -> RoverLinkError {
    RoverLinkError::Config(toml::de::Error::custom(msg))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_valid_config() -> Config {
        Config::default()
    }

    #[test]
    fn test_default_config() {
        assert!(create_valid_config().validate().is_ok());
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[link]
host = "10.0.0.7"

[audio]
chunk_bytes = 2048

[controller]

[logging]
level = "debug"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.link.host, "10.0.0.7");
        assert_eq!(config.link.video_port, 8080);
        assert_eq!(config.audio.chunk_bytes, 2048);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_toml("[link]\n").unwrap();
        assert_eq!(config.link.host, "192.168.1.50");
        assert_eq!(config.link.reconnect_delay_ms, 2000);
        assert_eq!(config.audio.chunk_bytes, 1280);
        assert!(config.controller.device_path.is_empty());
        assert!(config.logging.log_dir.is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/rover-link.toml");
        assert!(matches!(result, Err(RoverLinkError::Io(_))));
    }

    #[test]
    fn test_malformed_toml() {
        let result = Config::from_toml("[link\nhost = ");
        assert!(matches!(result, Err(RoverLinkError::Config(_))));
    }

    #[test]
    fn test_endpoints() {
        let link = LinkConfig::default();
        assert_eq!(link.endpoint(ChannelRole::Video), "ws://192.168.1.50:8080");
        assert_eq!(link.endpoint(ChannelRole::Audio), "ws://192.168.1.50:8081");
        assert_eq!(link.endpoint(ChannelRole::Command), "ws://192.168.1.50:8082");
        assert_eq!(link.reconnect_delay(), Duration::from_millis(2000));
    }

    #[test]
    fn test_empty_host() {
        let mut config = create_valid_config();
        config.link.host = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_port() {
        let mut config = create_valid_config();
        config.link.audio_port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_ports() {
        let mut config = create_valid_config();
        config.link.command_port = config.link.video_port;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reconnect_delay_zero() {
        let mut config = create_valid_config();
        config.link.reconnect_delay_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reconnect_delay_too_high() {
        let mut config = create_valid_config();
        config.link.reconnect_delay_ms = 60001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_chunk_bytes_odd() {
        let mut config = create_valid_config();
        config.audio.chunk_bytes = 1281;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_chunk_bytes_out_of_range() {
        let mut config = create_valid_config();
        config.audio.chunk_bytes = 0;
        assert!(config.validate().is_err());

        config.audio.chunk_bytes = 65538;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_audio_device() {
        let mut config = create_valid_config();
        config.audio.device = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = create_valid_config();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_log_levels() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            let mut config = create_valid_config();
            config.logging.level = level.to_string();
            assert!(config.validate().is_ok(), "Log level {} should be valid", level);
        }
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_host(), "192.168.1.50");
        assert_eq!(default_video_port(), 8080);
        assert_eq!(default_audio_port(), 8081);
        assert_eq!(default_command_port(), 8082);
        assert_eq!(default_reconnect_delay_ms(), 2000);
        assert_eq!(default_chunk_bytes(), 1280);
        assert_eq!(default_audio_device(), "/dev/stdin");
        assert_eq!(default_log_level(), "info");
    }

    #[test]
    fn test_shipped_default_file_matches_defaults() {
        let config = Config::from_toml(include_str!("../config/default.toml")).unwrap();
        let defaults = Config::default();
        assert_eq!(config.link.endpoint(ChannelRole::Video), defaults.link.endpoint(ChannelRole::Video));
        assert_eq!(config.link.endpoint(ChannelRole::Command), "ws://192.168.1.50:8082");
        assert_eq!(config.audio.chunk_bytes, defaults.audio.chunk_bytes);
        assert!(config.controller.device_path.is_empty());
    }
}
