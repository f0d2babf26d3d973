//! # Error Types
//!
//! Custom error types for Rover Link using `thiserror`.

use thiserror::Error;

/// Main error type for Rover Link
#[derive(Debug, Error)]
pub enum RoverLinkError {
    /// Connection refused, dropped or otherwise unusable
    #[error("Transport error: {0}")]
    Transport(String),

    /// WebSocket protocol errors
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Malformed base64 in a video or audio payload
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Frame bytes that are not a decodable image
    #[error("Image decode error: {0}")]
    Image(#[from] image::ImageError),

    /// Payload that does not carry the expected marker
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Microphone source could not be opened or read
    #[error("Microphone error: {0}")]
    Microphone(String),

    /// Input device errors
    #[error("Controller error: {0}")]
    Controller(String),

    /// No gamepad found on the system
    #[error("No gamepad found")]
    ControllerNotFound,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Rover Link
pub type Result<T> = std::result::Result<T, RoverLinkError>;
