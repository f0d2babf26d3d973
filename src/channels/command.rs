//! # Command Channel
//!
//! Fire-and-forget discrete commands to the rover. The same connection
//! carries gimbal telemetry back, handled by [`TelemetryChannel`].

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::telemetry::TelemetryChannel;
use super::HudSink;
use crate::link::transport::Connector;
use crate::link::{ChannelConnection, ChannelRole, ChannelSender, ConnectionState};
use crate::protocol::encoder::encode_command;
use crate::protocol::Command;

/// Anything that can deliver a command to the rover
pub trait CommandSink {
    /// Send one command
    ///
    /// # Returns
    ///
    /// * `bool` - `true` if the command was handed to the transport
    fn send_command(&self, command: Command) -> bool;
}

/// Command connection with telemetry decoding on its inbound side
#[derive(Debug)]
pub struct CommandChannel {
    connection: ChannelConnection,
    sender: ChannelSender,
}

impl CommandChannel {
    /// Open the command connection
    ///
    /// # Arguments
    ///
    /// * `url` - Command endpoint, e.g. `ws://192.168.1.50:8082`
    /// * `connector` - Transport
    /// * `hud` - Receives telemetry updates
    /// * `reconnect_delay` - Fixed wait after each failure
    pub fn open(
        url: impl Into<String>,
        connector: Arc<dyn Connector>,
        hud: Arc<dyn HudSink>,
        reconnect_delay: Duration,
    ) -> Self {
        let connection = ChannelConnection::open(
            ChannelRole::Command,
            url,
            connector,
            Arc::new(TelemetryChannel::new(hud)),
            reconnect_delay,
        );
        let sender = connection.sender();
        Self { connection, sender }
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn sender(&self) -> ChannelSender {
        self.sender.clone()
    }

    /// Close the connection and stop reconnecting
    pub async fn close(&mut self) {
        self.connection.close().await;
    }
}

impl CommandSink for CommandChannel {
    fn send_command(&self, command: Command) -> bool {
        let sent = self.sender.send(encode_command(command));
        if sent {
            debug!("Sent command: {}", command);
        } else {
            debug!("Dropped command {} (command channel down)", command);
        }
        sent
    }
}
