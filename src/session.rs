//! # Control Link Session
//!
//! Owns the three channels, the input edge tracker and the recorder, and
//! tears them down in order.

use std::sync::Arc;

use tracing::info;

use crate::channels::{
    AudioStreamChannel, CommandChannel, CommandSink, FrameSink, HudSink, MicrophoneSource, PermissionGate,
    RecordingState, VideoChannel,
};
use crate::config::Config;
use crate::controller::{Control, Edge, InputEdgeTracker};
use crate::link::transport::Connector;
use crate::link::{ChannelRole, ConnectionState};
use crate::protocol::Command;

/// Snapshot of every connection's state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkStates {
    pub video: ConnectionState,
    pub audio: ConnectionState,
    pub command: ConnectionState,
}

impl LinkStates {
    pub fn get(&self, role: ChannelRole) -> ConnectionState {
        match role {
            ChannelRole::Video => self.video,
            ChannelRole::Audio => self.audio,
            ChannelRole::Command => self.command,
        }
    }

    pub fn all_connected(&self) -> bool {
        [self.video, self.audio, self.command]
            .iter()
            .all(|s| *s == ConnectionState::Connected)
    }
}

/// Running control link to one rover
#[derive(Debug)]
pub struct ControlLink {
    video: VideoChannel,
    command: CommandChannel,
    audio: AudioStreamChannel,
    tracker: InputEdgeTracker,
}

impl ControlLink {
    /// Open all three connections
    ///
    /// Must be called inside a Tokio runtime. Connections come up in the
    /// background; nothing here waits for the peer.
    pub fn start(
        config: &Config,
        connector: Arc<dyn Connector>,
        frame_sink: Arc<dyn FrameSink>,
        hud_sink: Arc<dyn HudSink>,
        microphone: Box<dyn MicrophoneSource>,
    ) -> Self {
        let link = &config.link;
        let delay = link.reconnect_delay();

        info!(
            "Starting control link to {} (video {}, audio {}, command {})",
            link.host, link.video_port, link.audio_port, link.command_port
        );

        let video = VideoChannel::open(
            link.endpoint(ChannelRole::Video),
            connector.clone(),
            frame_sink,
            delay,
        );
        let command = CommandChannel::open(
            link.endpoint(ChannelRole::Command),
            connector.clone(),
            hud_sink,
            delay,
        );
        let audio = AudioStreamChannel::open(
            link.endpoint(ChannelRole::Audio),
            connector,
            microphone,
            config.audio.chunk_bytes,
            delay,
        );

        Self {
            video,
            command,
            audio,
            tracker: InputEdgeTracker::new(),
        }
    }

    pub fn press(&mut self, control: Control) -> Option<Command> {
        self.tracker.handle(control, Edge::Press, &self.command)
    }

    pub fn release(&mut self, control: Control) -> Option<Command> {
        self.tracker.handle(control, Edge::Release, &self.command)
    }

    pub fn cancel(&mut self, control: Control) -> Option<Command> {
        self.tracker.handle(control, Edge::Cancel, &self.command)
    }

    /// Apply an arbitrary edge
    pub fn apply(&mut self, control: Control, edge: Edge) -> Option<Command> {
        self.tracker.handle(control, edge, &self.command)
    }

    /// Send `stop` if anything is held
    pub fn release_all(&mut self) -> Option<Command> {
        self.tracker.release_all(&self.command)
    }

    /// Send a command directly, bypassing edge tracking
    pub fn send_command(&self, command: Command) -> bool {
        self.command.send_command(command)
    }

    /// Toggle recording; never waits longer than the recorder's bounded waits
    pub async fn toggle_mic(&mut self, gate: &dyn PermissionGate) -> RecordingState {
        self.audio.toggle(gate).await
    }

    pub async fn on_mic_permission(&mut self, granted: bool) -> RecordingState {
        self.audio.on_permission_result(granted).await
    }

    pub fn is_recording(&self) -> bool {
        self.audio.is_recording()
    }

    pub fn connection_states(&self) -> LinkStates {
        LinkStates {
            video: self.video.state(),
            audio: self.audio.connection_state(),
            command: self.command.state(),
        }
    }

    /// Frames displayed and frames dropped on the video connection
    pub fn frame_counts(&self) -> (u64, u64) {
        (self.video.decoded_frames(), self.video.dropped_frames())
    }

    /// Release held controls, stop recording, close every connection
    ///
    /// No reconnect is attempted on any channel once this returns.
    pub async fn shutdown(mut self) {
        info!("Shutting down control link");

        if self.tracker.release_all(&self.command).is_some() {
            info!("Released held controls");
        }
        self.audio.stop_recording().await;

        self.command.close().await;
        self.audio.close().await;
        self.video.close().await;

        info!("Control link closed");
    }
}
