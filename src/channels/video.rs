//! # Video Channel
//!
//! Decodes `IMAGE:` payloads into frames for the renderer. Latest frame
//! wins: nothing is queued, a bad frame is logged and skipped.
//!
//! Image decoding is CPU-bound, so it runs on the blocking pool, one frame
//! at a time. The connection task only parks the newest payload in a watch
//! slot; a payload that is replaced before the decoder gets to it is skipped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::FrameSink;
use crate::link::transport::Connector;
use crate::link::{ChannelConnection, ChannelEvents, ChannelRole, ConnectionState};
use crate::protocol::decoder::{classify, decode_frame, Inbound};

/// Decodes video payloads and forwards frames to the sink
pub struct FrameHandler {
    sink: Arc<dyn FrameSink>,
    decoded: AtomicU64,
    dropped: AtomicU64,
}

impl FrameHandler {
    pub fn new(sink: Arc<dyn FrameSink>) -> Self {
        Self {
            sink,
            decoded: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Decode one payload and forward it to the sink
    ///
    /// # Returns
    ///
    /// * `bool` - `true` if a frame was displayed
    pub fn handle(&self, text: &str) -> bool {
        let body = match classify(text) {
            Inbound::Frame(body) => body,
            _ => {
                debug!("Ignoring non-frame payload on video connection");
                return false;
            }
        };

        match decode_frame(body) {
            Ok(frame) => {
                self.decoded.fetch_add(1, Ordering::Relaxed);
                self.sink.display(frame);
                true
            }
            Err(e) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Image decoding error: {}", e);
                false
            }
        }
    }

    /// Frames forwarded to the sink so far
    pub fn decoded_frames(&self) -> u64 {
        self.decoded.load(Ordering::Relaxed)
    }

    /// Frames that failed to decode so far
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Inbound side of the video connection: hands payloads to the decoder
struct LatestFrame {
    slot: watch::Sender<Option<Arc<str>>>,
}

impl ChannelEvents for LatestFrame {
    fn on_message(&self, text: &str) {
        self.slot.send_replace(Some(Arc::from(text)));
    }
}

/// Decode the newest parked payload until the connection side goes away
async fn decode_frames(handler: Arc<FrameHandler>, mut latest: watch::Receiver<Option<Arc<str>>>) {
    while latest.changed().await.is_ok() {
        let Some(text) = latest.borrow_and_update().clone() else {
            continue;
        };

        let worker = handler.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || worker.handle(&text)).await {
            error!("Frame decoder failed: {}", e);
        }
    }
    debug!("Frame decoder stopped");
}

/// Video connection plus its frame decoder
#[derive(Debug)]
pub struct VideoChannel {
    connection: ChannelConnection,
    handler: Arc<FrameHandler>,
    decoder: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for FrameHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameHandler")
            .field("decoded", &self.decoded_frames())
            .field("dropped", &self.dropped_frames())
            .finish_non_exhaustive()
    }
}

impl VideoChannel {
    /// Open the video connection
    ///
    /// # Arguments
    ///
    /// * `url` - Video endpoint, e.g. `ws://192.168.1.50:8080`
    /// * `connector` - Transport
    /// * `sink` - Receives every decoded frame
    /// * `reconnect_delay` - Fixed wait after each failure
    pub fn open(
        url: impl Into<String>,
        connector: Arc<dyn Connector>,
        sink: Arc<dyn FrameSink>,
        reconnect_delay: Duration,
    ) -> Self {
        let handler = Arc::new(FrameHandler::new(sink));
        let (slot, latest) = watch::channel(None);
        let decoder = tokio::spawn(decode_frames(handler.clone(), latest));
        let connection = ChannelConnection::open(
            ChannelRole::Video,
            url,
            connector,
            Arc::new(LatestFrame { slot }),
            reconnect_delay,
        );
        Self {
            connection,
            handler,
            decoder: Some(decoder),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn decoded_frames(&self) -> u64 {
        self.handler.decoded_frames()
    }

    pub fn dropped_frames(&self) -> u64 {
        self.handler.dropped_frames()
    }

    /// Close the connection and stop reconnecting
    ///
    /// The decoder finishes the frame it is working on, then stops.
    pub async fn close(&mut self) {
        self.connection.close().await;
        if let Some(decoder) = self.decoder.take() {
            if let Err(e) = decoder.await {
                error!("Frame decoder task failed: {}", e);
            }
        }
    }
}
