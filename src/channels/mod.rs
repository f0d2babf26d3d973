//! # Channels Module
//!
//! Per-channel protocols built on [`crate::link::ChannelConnection`].
//!
//! This module handles:
//! - Discrete commands out, gimbal telemetry in (command connection)
//! - Frame decoding (video connection)
//! - Microphone capture and streaming (audio connection)
//!
//! Rendering, HUD widgets and permission prompts are collaborators reached
//! through the sink and gate traits defined here and in [`audio`].

pub mod audio;
pub mod command;
pub mod telemetry;
pub mod video;

use crate::protocol::decoder::VideoFrame;
use crate::protocol::Axis;

pub use audio::{AlwaysGranted, AudioStreamChannel, MicrophoneSource, PcmFileSource, PermissionGate, RecordingState};
pub use command::{CommandChannel, CommandSink};
pub use telemetry::{HudState, TelemetryChannel};
pub use video::{FrameHandler, VideoChannel};

/// Receives gimbal positions for the HUD
#[cfg_attr(test, mockall::automock)]
pub trait HudSink: Send + Sync {
    fn set_axis(&self, axis: Axis, value: i32);
}

/// Receives decoded video frames; each frame replaces the previous one
#[cfg_attr(test, mockall::automock)]
pub trait FrameSink: Send + Sync {
    fn display(&self, frame: VideoFrame);
}
