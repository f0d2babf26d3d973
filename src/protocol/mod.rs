//! # Rover Wire Protocol
//!
//! Text message formats exchanged with the rover over the three channels.
//!
//! | Channel | Direction | Payload |
//! |---------|-----------|---------|
//! | Video | inbound | `IMAGE:<base64 image bytes>` |
//! | Command | outbound | `forward`, `backward`, `left`, `right`, `cam_up`, `cam_down`, `cam_left`, `cam_right`, `stop` |
//! | Command | inbound | `angel_<up\|down\|left\|right>:<integer>` |
//! | Audio | outbound | `AUDIO:<base64 PCM16 mono 16 kHz>` |
//!
//! This module handles:
//! - The command vocabulary and telemetry types
//! - Encoding outbound command and audio payloads
//! - Classifying and decoding inbound video and telemetry payloads

pub mod messages;
pub mod encoder;
pub mod decoder;

pub use messages::*;
