//! # Protocol Constants and Types
//!
//! Core definitions shared by the encoder and decoder.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, RoverLinkError};

/// Marker in front of every video frame payload
pub const IMAGE_PREFIX: &str = "IMAGE:";

/// Marker in front of every audio chunk payload
pub const AUDIO_PREFIX: &str = "AUDIO:";

/// Marker in front of every gimbal telemetry payload
pub const TELEMETRY_PREFIX: &str = "angel_";

/// Separator between telemetry direction and value
pub const TELEMETRY_SEPARATOR: char = ':';

/// Microphone sample rate expected by the rover
pub const AUDIO_SAMPLE_RATE_HZ: u32 = 16_000;

/// Microphone channel count (mono)
pub const AUDIO_CHANNELS: u16 = 1;

/// Bytes per PCM16 sample
pub const AUDIO_BYTES_PER_SAMPLE: usize = 2;

/// Discrete command sent on the command channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Forward,
    Backward,
    Left,
    Right,
    CamUp,
    CamDown,
    CamLeft,
    CamRight,
    Stop,
}

impl Command {
    /// Every command in the vocabulary
    pub const ALL: [Command; 9] = [
        Command::Forward,
        Command::Backward,
        Command::Left,
        Command::Right,
        Command::CamUp,
        Command::CamDown,
        Command::CamLeft,
        Command::CamRight,
        Command::Stop,
    ];

    /// Literal wire token for this command
    ///
    /// # Examples
    ///
    /// ```
    /// use rover_link::protocol::Command;
    ///
    /// assert_eq!(Command::CamLeft.token(), "cam_left");
    /// ```
    pub const fn token(self) -> &'static str {
        match self {
            Command::Forward => "forward",
            Command::Backward => "backward",
            Command::Left => "left",
            Command::Right => "right",
            Command::CamUp => "cam_up",
            Command::CamDown => "cam_down",
            Command::CamLeft => "cam_left",
            Command::CamRight => "cam_right",
            Command::Stop => "stop",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Command {
    type Err = RoverLinkError;

    fn from_str(s: &str) -> Result<Self> {
        Command::ALL
            .into_iter()
            .find(|command| command.token() == s)
            .ok_or_else(|| RoverLinkError::Protocol(format!("Unknown command token: {}", s)))
    }
}

/// Gimbal axis shown on the HUD
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Camera tilt (servo angle)
    Vertical,
    /// Camera pan (servo angle)
    Horizontal,
}

impl Axis {
    /// Servo angle the rover parks the axis at on startup
    pub const fn default_value(self) -> i32 {
        match self {
            Axis::Vertical => 150,
            Axis::Horizontal => 90,
        }
    }
}

/// Direction field of a telemetry payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryDirection {
    Up,
    Down,
    Left,
    Right,
}

impl TelemetryDirection {
    /// Parse the direction field (`up`, `down`, `left`, `right`)
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "up" => Some(TelemetryDirection::Up),
            "down" => Some(TelemetryDirection::Down),
            "left" => Some(TelemetryDirection::Left),
            "right" => Some(TelemetryDirection::Right),
            _ => None,
        }
    }

    /// Wire form of the direction
    pub const fn as_str(self) -> &'static str {
        match self {
            TelemetryDirection::Up => "up",
            TelemetryDirection::Down => "down",
            TelemetryDirection::Left => "left",
            TelemetryDirection::Right => "right",
        }
    }

    /// HUD axis this direction reports on
    pub const fn axis(self) -> Axis {
        match self {
            TelemetryDirection::Up | TelemetryDirection::Down => Axis::Vertical,
            TelemetryDirection::Left | TelemetryDirection::Right => Axis::Horizontal,
        }
    }
}

/// One gimbal position report from the rover
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryUpdate {
    /// Direction the gimbal was moving when the report was sent
    pub direction: TelemetryDirection,
    /// Reported servo angle (not clamped)
    pub value: i32,
}

impl TelemetryUpdate {
    /// HUD axis this update applies to
    pub const fn axis(&self) -> Axis {
        self.direction.axis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes() {
        assert_eq!(IMAGE_PREFIX, "IMAGE:");
        assert_eq!(AUDIO_PREFIX, "AUDIO:");
        assert_eq!(TELEMETRY_PREFIX, "angel_");
    }

    #[test]
    fn test_audio_format_constants() {
        assert_eq!(AUDIO_SAMPLE_RATE_HZ, 16_000);
        assert_eq!(AUDIO_CHANNELS, 1);
        assert_eq!(AUDIO_BYTES_PER_SAMPLE, 2);
    }

    #[test]
    fn test_command_tokens() {
        let tokens: Vec<&str> = Command::ALL.iter().map(|c| c.token()).collect();
        assert_eq!(
            tokens,
            vec![
                "forward", "backward", "left", "right", "cam_up", "cam_down", "cam_left",
                "cam_right", "stop"
            ]
        );
    }

    #[test]
    fn test_command_from_str() {
        for command in Command::ALL {
            assert_eq!(command.token().parse::<Command>().unwrap(), command);
        }
        assert!("stop_cam".parse::<Command>().is_err());
        assert!("FORWARD".parse::<Command>().is_err());
    }

    #[test]
    fn test_command_display() {
        assert_eq!(Command::CamDown.to_string(), "cam_down");
    }

    #[test]
    fn test_axis_defaults() {
        assert_eq!(Axis::Vertical.default_value(), 150);
        assert_eq!(Axis::Horizontal.default_value(), 90);
    }

    #[test]
    fn test_direction_axis() {
        assert_eq!(TelemetryDirection::Up.axis(), Axis::Vertical);
        assert_eq!(TelemetryDirection::Down.axis(), Axis::Vertical);
        assert_eq!(TelemetryDirection::Left.axis(), Axis::Horizontal);
        assert_eq!(TelemetryDirection::Right.axis(), Axis::Horizontal);
    }

    #[test]
    fn test_direction_parse() {
        for direction in [
            TelemetryDirection::Up,
            TelemetryDirection::Down,
            TelemetryDirection::Left,
            TelemetryDirection::Right,
        ] {
            assert_eq!(TelemetryDirection::parse(direction.as_str()), Some(direction));
        }
        assert_eq!(TelemetryDirection::parse("foo"), None);
        assert_eq!(TelemetryDirection::parse(""), None);
    }
}
