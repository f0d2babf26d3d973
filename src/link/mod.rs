//! # Channel Connection Module
//!
//! One self-healing socket connection per channel role.
//!
//! This module handles:
//! - Opening the connection for a role (video, audio, command)
//! - Publishing connection state
//! - Lossy sends: payloads are only written while connected
//! - Dispatching inbound payloads, in arrival order, to a [`ChannelEvents`] handler
//! - Reconnecting after a fixed delay, forever, until shut down
//!
//! Each connection runs on its own tokio task. A failure on one channel
//! never touches the others.

pub mod transport;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::error::RoverLinkError;
use transport::{Connector, Link};

/// Default delay between a connection failure and the next attempt
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(2000);

/// Outbound payloads buffered between a send call and the socket write
const OUTBOUND_QUEUE_DEPTH: usize = 64;

/// Logical role of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelRole {
    Video,
    Audio,
    Command,
}

impl ChannelRole {
    pub const fn as_str(self) -> &'static str {
        match self {
            ChannelRole::Video => "video",
            ChannelRole::Audio => "audio",
            ChannelRole::Command => "command",
        }
    }
}

impl fmt::Display for ChannelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

/// Callbacks for one connection
///
/// `on_message` is called from the connection task, one payload at a time,
/// in arrival order. Lifecycle callbacks default to no-ops; the connection
/// logs every transition itself.
pub trait ChannelEvents: Send + Sync {
    fn on_open(&self) {}

    fn on_message(&self, text: &str);

    fn on_close(&self) {}

    fn on_error(&self, _error: &RoverLinkError) {}
}

/// Handler for channels that expect no inbound traffic
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardInbound;

impl ChannelEvents for DiscardInbound {
    fn on_message(&self, text: &str) {
        debug!("Discarding unexpected inbound payload ({} bytes)", text.len());
    }
}

/// Cloneable send handle for a connection
#[derive(Debug, Clone)]
pub struct ChannelSender {
    role: ChannelRole,
    state: watch::Receiver<ConnectionState>,
    outbound: mpsc::Sender<String>,
}

impl ChannelSender {
    /// Role of the underlying connection
    pub fn role(&self) -> ChannelRole {
        self.role
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Queue a text payload for the socket
    ///
    /// The payload is dropped unless the connection is up. Nothing is
    /// buffered across reconnects.
    ///
    /// # Returns
    ///
    /// * `bool` - `true` if the payload was accepted for writing
    pub fn send(&self, payload: impl Into<String>) -> bool {
        if !self.is_connected() {
            trace!(channel = %self.role, "Dropping payload, not connected");
            return false;
        }

        match self.outbound.try_send(payload.into()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(channel = %self.role, "Outbound queue full, dropping payload");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Wait until the connection reaches `state`
    ///
    /// Returns immediately if it is already there.
    pub async fn wait_for_state(&self, state: ConnectionState) {
        let mut rx = self.state.clone();
        // Err only if the connection task is gone
        let _ = rx.wait_for(|current| *current == state).await;
    }
}

/// A supervised connection for one channel role
///
/// Created once per role at startup; lives until [`ChannelConnection::close`].
#[derive(Debug)]
pub struct ChannelConnection {
    sender: ChannelSender,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ChannelConnection {
    /// Start connecting to `url` on a new task
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Arguments
    ///
    /// * `role` - Channel this connection serves (used for logging)
    /// * `url` - Peer endpoint, e.g. `ws://192.168.1.50:8082`
    /// * `connector` - Transport used for every attempt
    /// * `events` - Inbound payload handler
    /// * `reconnect_delay` - Fixed wait after each failure
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::sync::Arc;
    /// use rover_link::link::{ChannelConnection, ChannelRole, DiscardInbound, DEFAULT_RECONNECT_DELAY};
    /// use rover_link::link::transport::WsConnector;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let mut audio = ChannelConnection::open(
    ///         ChannelRole::Audio,
    ///         "ws://192.168.1.50:8081",
    ///         Arc::new(WsConnector),
    ///         Arc::new(DiscardInbound),
    ///         DEFAULT_RECONNECT_DELAY,
    ///     );
    ///     audio.sender().send("AUDIO:AAAA");
    ///     audio.close().await;
    /// }
    /// ```
    pub fn open(
        role: ChannelRole,
        url: impl Into<String>,
        connector: Arc<dyn Connector>,
        events: Arc<dyn ChannelEvents>,
        reconnect_delay: Duration,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);
        let cancel = CancellationToken::new();

        let supervisor = Supervisor {
            role,
            url: url.into(),
            connector,
            events,
            reconnect_delay,
            state: state_tx,
            outbound: outbound_rx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(supervisor.run());

        Self {
            sender: ChannelSender {
                role,
                state: state_rx,
                outbound: outbound_tx,
            },
            cancel,
            task: Some(task),
        }
    }

    pub fn role(&self) -> ChannelRole {
        self.sender.role
    }

    pub fn state(&self) -> ConnectionState {
        self.sender.state()
    }

    /// Send handle for this connection
    pub fn sender(&self) -> ChannelSender {
        self.sender.clone()
    }

    /// Request shutdown without waiting
    ///
    /// Cancels any pending reconnect; no further attempts are made.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Shut down and wait for the connection task to finish
    ///
    /// An open socket is closed gracefully. Safe to call more than once.
    pub async fn close(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!(channel = %self.sender.role, "Connection task failed: {}", e);
            }
        }
    }
}

impl Drop for ChannelConnection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// How a connected session ended
enum SessionEnd {
    Shutdown,
    PeerClosed,
    Failed(RoverLinkError),
}

/// State owned by the connection task
struct Supervisor {
    role: ChannelRole,
    url: String,
    connector: Arc<dyn Connector>,
    events: Arc<dyn ChannelEvents>,
    reconnect_delay: Duration,
    state: watch::Sender<ConnectionState>,
    outbound: mpsc::Receiver<String>,
    cancel: CancellationToken,
}

impl Supervisor {
    async fn run(mut self) {
        loop {
            self.set_state(ConnectionState::Connecting);
            debug!(channel = %self.role, "Connecting to {}", self.url);

            let attempt = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = self.connector.connect(&self.url) => result,
            };

            match attempt {
                Ok(mut link) => {
                    self.set_state(ConnectionState::Connected);
                    info!(channel = %self.role, "Connected to {}", self.url);
                    self.events.on_open();

                    match self.pump(link.as_mut()).await {
                        SessionEnd::Shutdown => {
                            self.set_state(ConnectionState::Closing);
                            self.flush_outbound(link.as_mut()).await;
                            link.close().await;
                            info!(channel = %self.role, "Connection closed");
                            break;
                        }
                        SessionEnd::PeerClosed => {
                            warn!(channel = %self.role, "Connection closed by peer");
                        }
                        SessionEnd::Failed(e) => {
                            error!(channel = %self.role, "Connection error: {}", e);
                            self.events.on_error(&e);
                        }
                    }
                }
                Err(e) => {
                    error!(channel = %self.role, "Failed to connect to {}: {}", self.url, e);
                    self.events.on_error(&e);
                }
            }

            self.set_state(ConnectionState::Disconnected);
            self.discard_outbound();
            self.events.on_close();

            warn!(
                channel = %self.role,
                "Reconnecting in {} ms",
                self.reconnect_delay.as_millis()
            );
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }

        self.set_state(ConnectionState::Disconnected);
        debug!(channel = %self.role, "Connection task stopped");
    }

    /// Move payloads both ways until the session ends
    async fn pump(&mut self, link: &mut dyn Link) -> SessionEnd {
        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => return SessionEnd::Shutdown,

                Some(payload) = self.outbound.recv() => {
                    trace!(channel = %self.role, "Sending {} bytes", payload.len());
                    if let Err(e) = link.send(payload).await {
                        return SessionEnd::Failed(e);
                    }
                }

                inbound = link.recv() => match inbound {
                    Some(Ok(text)) => self.events.on_message(&text),
                    Some(Err(e)) => return SessionEnd::Failed(e),
                    None => return SessionEnd::PeerClosed,
                },
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    /// Write whatever was queued before shutdown was requested
    async fn flush_outbound(&mut self, link: &mut dyn Link) {
        while let Ok(payload) = self.outbound.try_recv() {
            if let Err(e) = link.send(payload).await {
                debug!(channel = %self.role, "Flush on close failed: {}", e);
                break;
            }
        }
    }

    /// Drop payloads queued for a session that no longer exists
    fn discard_outbound(&mut self) {
        let mut dropped = 0usize;
        while self.outbound.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!(channel = %self.role, "Discarded {} stale payloads", dropped);
        }
    }
}
