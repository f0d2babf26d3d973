//! # Audio Stream Channel
//!
//! Streams microphone PCM to the rover while recording is on.
//!
//! Recording is `Idle -> Recording -> Idle`. Capture runs on its own OS
//! thread because microphone opens and reads block. The thread takes the
//! [`MicrophoneSource`] by value, opens it, and on exit closes it and hands it
//! back over a oneshot channel. A new session starts only once the previous
//! one has handed the source back, so two sessions never hold it at once.
//! The async side never blocks on the thread: every wait is bounded.

use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, error, info, trace, warn};

use crate::error::{Result, RoverLinkError};
use crate::link::transport::Connector;
use crate::link::{ChannelConnection, ChannelRole, ChannelSender, ConnectionState, DiscardInbound};
use crate::protocol::encoder::encode_audio_chunk;

/// How long `start_recording` waits for the microphone to open
pub const OPEN_WAIT: Duration = Duration::from_millis(500);

/// How long stopping waits for the capture thread to hand the source back
pub const RELEASE_WAIT: Duration = Duration::from_millis(200);

/// Pause after a read that produced no bytes
const EMPTY_READ_BACKOFF: Duration = Duration::from_millis(5);

/// Blocking PCM16 mono 16 kHz capture device
pub trait MicrophoneSource: Send {
    /// Acquire the device
    ///
    /// # Errors
    ///
    /// Returns error if the device is busy or cannot be initialized
    fn open(&mut self) -> Result<()>;

    /// Fill `buf` with captured bytes, blocking until some are available
    ///
    /// May return fewer bytes than `buf.len()`, including zero.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Release the device
    fn close(&mut self);
}

/// Host permission check for the microphone
#[cfg_attr(test, mockall::automock)]
pub trait PermissionGate {
    fn has_mic_permission(&self) -> bool;

    /// Ask the user; the answer comes back through
    /// [`AudioStreamChannel::on_permission_result`]
    fn request_mic_permission(&self);
}

/// Permission gate for hosts without a permission model
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysGranted;

impl PermissionGate for AlwaysGranted {
    fn has_mic_permission(&self) -> bool {
        true
    }

    fn request_mic_permission(&self) {}
}

/// Recorder state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Recording,
}

type SourceReturn = oneshot::Receiver<Box<dyn MicrophoneSource>>;

/// A running capture thread
struct CaptureSession {
    running: Arc<AtomicBool>,
    released: SourceReturn,
}

/// Audio connection plus the microphone recorder
pub struct AudioStreamChannel {
    connection: ChannelConnection,
    sender: ChannelSender,
    chunk_bytes: usize,
    /// Present while idle; owned by the capture thread while recording
    source: Option<Box<dyn MicrophoneSource>>,
    session: Option<CaptureSession>,
    /// Stopped session that has not handed the source back yet
    releasing: Option<SourceReturn>,
}

impl std::fmt::Debug for AudioStreamChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioStreamChannel")
            .field("connection", &self.connection)
            .field("chunk_bytes", &self.chunk_bytes)
            .field("state", &self.state())
            .field("releasing", &self.releasing.is_some())
            .finish_non_exhaustive()
    }
}

impl AudioStreamChannel {
    /// Open the audio connection
    ///
    /// # Arguments
    ///
    /// * `url` - Audio endpoint, e.g. `ws://192.168.1.50:8081`
    /// * `connector` - Transport
    /// * `source` - Microphone, owned exclusively by this channel
    /// * `chunk_bytes` - Capture buffer size in bytes
    /// * `reconnect_delay` - Fixed wait after each failure
    pub fn open(
        url: impl Into<String>,
        connector: Arc<dyn Connector>,
        source: Box<dyn MicrophoneSource>,
        chunk_bytes: usize,
        reconnect_delay: Duration,
    ) -> Self {
        let connection = ChannelConnection::open(
            ChannelRole::Audio,
            url,
            connector,
            Arc::new(DiscardInbound),
            reconnect_delay,
        );
        let sender = connection.sender();
        Self {
            connection,
            sender,
            chunk_bytes: chunk_bytes.max(1),
            source: Some(source),
            session: None,
            releasing: None,
        }
    }

    pub fn state(&self) -> RecordingState {
        match &self.session {
            Some(session) if session.running.load(Ordering::Acquire) => RecordingState::Recording,
            _ => RecordingState::Idle,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.state() == RecordingState::Recording
    }

    /// `true` while a stopped session still holds the microphone
    pub fn is_releasing(&self) -> bool {
        self.releasing.is_some()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn sender(&self) -> ChannelSender {
        self.sender.clone()
    }

    /// Handle the microphone button
    ///
    /// Stops if recording. Otherwise starts when permission is held, or asks
    /// the gate for permission and stays idle.
    ///
    /// # Returns
    ///
    /// * `RecordingState` - State after the toggle
    pub async fn toggle(&mut self, gate: &dyn PermissionGate) -> RecordingState {
        if self.is_recording() {
            self.stop_recording().await;
        } else if gate.has_mic_permission() {
            self.start_recording().await;
        } else {
            info!("Requesting microphone permission");
            gate.request_mic_permission();
        }
        self.state()
    }

    /// Handle the answer to a permission request
    pub async fn on_permission_result(&mut self, granted: bool) -> RecordingState {
        if granted {
            self.start_recording().await;
        } else {
            info!("Microphone permission denied");
        }
        self.state()
    }

    /// Start capturing and streaming
    ///
    /// A previous session must have handed the microphone back first; if it
    /// is still stuck in a read after [`RELEASE_WAIT`], nothing starts. The
    /// microphone is opened on the capture thread. If it reports failure
    /// within [`OPEN_WAIT`] the recorder stays idle; a slower open leaves the
    /// recorder in `Recording` until the thread reports back.
    ///
    /// # Returns
    ///
    /// * `bool` - `true` if recording is on afterwards
    pub async fn start_recording(&mut self) -> bool {
        if self.is_recording() {
            return true;
        }
        // A session that ended on its own still owes us the source
        self.detach_session();
        if !self.reclaim_source(RELEASE_WAIT).await {
            warn!("Previous capture still holds the microphone, not recording");
            return false;
        }

        let Some(source) = self.source.take() else {
            warn!("Microphone unavailable, not recording");
            return false;
        };

        let running = Arc::new(AtomicBool::new(true));
        let (opened_tx, opened_rx) = oneshot::channel();
        let (released_tx, released_rx) = oneshot::channel();
        let capture = CaptureLoop {
            sender: self.sender.clone(),
            chunk_bytes: self.chunk_bytes,
            running: running.clone(),
        };

        let spawned = spawn_with_source(
            source,
            |job| {
                thread::Builder::new()
                    .name("audio-capture".to_string())
                    .spawn(job)
                    .map(|_| ())
            },
            move |source| capture.run(source, opened_tx, released_tx),
        );

        if let Err((e, source)) = spawned {
            error!("Failed to spawn audio capture thread: {}", e);
            self.source = source;
            return false;
        }
        self.session = Some(CaptureSession {
            running,
            released: released_rx,
        });

        match tokio::time::timeout(OPEN_WAIT, opened_rx).await {
            Ok(Ok(Ok(()))) => {
                info!("Recording started ({} byte chunks)", self.chunk_bytes);
                true
            }
            Ok(Ok(Err(e))) => {
                warn!("Microphone failed to initialize: {}", e);
                self.detach_session();
                self.reclaim_source(RELEASE_WAIT).await;
                false
            }
            Ok(Err(_)) => {
                error!("Audio capture thread exited before opening the microphone");
                self.detach_session();
                self.reclaim_source(RELEASE_WAIT).await;
                false
            }
            Err(_) => {
                info!("Microphone still opening; capture begins once it is ready");
                true
            }
        }
    }

    /// Stop capturing and release the microphone
    ///
    /// No partial chunk is flushed. Safe to call when not recording. Waits at
    /// most [`RELEASE_WAIT`] for the capture thread; a source blocked in a
    /// read is closed by the thread itself once the read returns.
    pub async fn stop_recording(&mut self) {
        if !self.detach_session() {
            debug!("Stop requested while not recording");
            return;
        }
        info!("Recording stopped");
        self.reclaim_source(RELEASE_WAIT).await;
    }

    /// Stop recording and close the audio connection
    pub async fn close(&mut self) {
        self.stop_recording().await;
        if self.releasing.is_some() {
            self.reclaim_source(RELEASE_WAIT).await;
        }
        self.connection.close().await;
    }

    /// Signal the capture thread to exit and remember where the source comes back
    ///
    /// # Returns
    ///
    /// * `bool` - `true` if there was a session
    fn detach_session(&mut self) -> bool {
        let Some(session) = self.session.take() else {
            return false;
        };
        session.running.store(false, Ordering::Release);
        self.releasing = Some(session.released);
        true
    }

    /// Wait up to `limit` for a stopped session to hand the source back
    ///
    /// # Returns
    ///
    /// * `bool` - `true` if no stopped session still holds the source
    async fn reclaim_source(&mut self, limit: Duration) -> bool {
        let Some(mut released) = self.releasing.take() else {
            return true;
        };

        match tokio::time::timeout(limit, &mut released).await {
            Ok(Ok(source)) => {
                self.source = Some(source);
                true
            }
            Ok(Err(_)) => {
                error!("Audio capture thread died, microphone lost");
                true
            }
            Err(_) => {
                warn!(
                    "Microphone still busy after {} ms; it is released when the pending read returns",
                    limit.as_millis()
                );
                self.releasing = Some(released);
                false
            }
        }
    }
}

impl Drop for AudioStreamChannel {
    fn drop(&mut self) {
        // The thread closes the source on its way out
        if let Some(session) = &self.session {
            session.running.store(false, Ordering::Release);
        }
    }
}

type SpawnJob = Box<dyn FnOnce() + Send + 'static>;

/// Run `body` with `source` on whatever `spawn` starts
///
/// The source travels through a shared slot, so when `spawn` fails it is
/// handed back instead of being dropped with the job.
fn spawn_with_source<S, B>(
    source: Box<dyn MicrophoneSource>,
    spawn: S,
    body: B,
) -> std::result::Result<(), (std::io::Error, Option<Box<dyn MicrophoneSource>>)>
where
    S: FnOnce(SpawnJob) -> std::io::Result<()>,
    B: FnOnce(Box<dyn MicrophoneSource>) + Send + 'static,
{
    let slot = Arc::new(Mutex::new(Some(source)));
    let job_slot = slot.clone();
    let job: SpawnJob = Box::new(move || {
        let source = job_slot.lock().ok().and_then(|mut slot| slot.take());
        if let Some(source) = source {
            body(source);
        }
    });

    spawn(job).map_err(|e| {
        let source = slot.lock().ok().and_then(|mut slot| slot.take());
        (e, source)
    })
}

/// Body of the capture thread
struct CaptureLoop {
    sender: ChannelSender,
    chunk_bytes: usize,
    running: Arc<AtomicBool>,
}

impl CaptureLoop {
    fn run(
        self,
        mut source: Box<dyn MicrophoneSource>,
        opened: oneshot::Sender<Result<()>>,
        released: oneshot::Sender<Box<dyn MicrophoneSource>>,
    ) {
        if let Err(e) = source.open() {
            self.running.store(false, Ordering::Release);
            let _ = opened.send(Err(e));
            let _ = released.send(source);
            return;
        }
        let _ = opened.send(Ok(()));

        let mut buffer = vec![0u8; self.chunk_bytes];
        let mut chunks: u64 = 0;

        while self.running.load(Ordering::Acquire) {
            match source.read(&mut buffer) {
                Ok(0) => thread::sleep(EMPTY_READ_BACKOFF),
                Ok(n) => {
                    let valid = &buffer[..n.min(buffer.len())];
                    if self.sender.send(encode_audio_chunk(valid)) {
                        chunks += 1;
                    } else {
                        trace!("Audio chunk dropped ({} bytes)", valid.len());
                    }
                }
                Err(e) => {
                    warn!("Microphone read failed, ending capture: {}", e);
                    break;
                }
            }
        }

        self.running.store(false, Ordering::Release);
        source.close();
        debug!("Capture thread exiting after {} chunks", chunks);
        if released.send(source).is_err() {
            debug!("Recorder gone, microphone dropped");
        }
    }
}

/// Raw PCM16 mono 16 kHz from a file or FIFO
///
/// For example the output of `arecord -t raw -f S16_LE -r 16000 -c 1`.
/// End of stream is reported as a read error, which ends the session.
#[derive(Debug)]
pub struct PcmFileSource {
    path: PathBuf,
    file: Option<File>,
}

impl PcmFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }
}

impl MicrophoneSource for PcmFileSource {
    fn open(&mut self) -> Result<()> {
        let file = File::open(&self.path).map_err(|e| {
            RoverLinkError::Microphone(format!("Failed to open {}: {}", self.path.display(), e))
        })?;
        self.file = Some(file);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| RoverLinkError::Microphone("Source not open".to_string()))?;

        match file.read(buf)? {
            0 if !buf.is_empty() => Err(RoverLinkError::Microphone(format!(
                "End of stream on {}",
                self.path.display()
            ))),
            n => Ok(n),
        }
    }

    fn close(&mut self) {
        self.file = None;
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    /// One scripted read result
    #[derive(Debug, Clone)]
    pub enum MockRead {
        Data(Vec<u8>),
        Fail,
        /// Block inside `read` for this long, then return zero bytes
        Stall(Duration),
    }

    /// Shared counters for a [`MockMicrophone`]
    #[derive(Debug, Default)]
    pub struct MicStats {
        pub opens: AtomicUsize,
        pub closes: AtomicUsize,
        pub reads: AtomicUsize,
        pub in_use: AtomicBool,
        pub overlapping_opens: AtomicUsize,
    }

    /// Scripted microphone; idles with zero-byte reads once the script runs out
    pub struct MockMicrophone {
        pub script: Arc<Mutex<VecDeque<MockRead>>>,
        pub stats: Arc<MicStats>,
        pub fail_open: bool,
    }

    impl MockMicrophone {
        pub fn new(script: Vec<MockRead>) -> Self {
            Self {
                script: Arc::new(Mutex::new(script.into())),
                stats: Arc::new(MicStats::default()),
                fail_open: false,
            }
        }

        pub fn failing() -> Self {
            Self {
                fail_open: true,
                ..Self::new(Vec::new())
            }
        }
    }

    impl MicrophoneSource for MockMicrophone {
        fn open(&mut self) -> Result<()> {
            if self.fail_open {
                return Err(RoverLinkError::Microphone("Device busy".to_string()));
            }
            if self.stats.in_use.swap(true, Ordering::SeqCst) {
                self.stats.overlapping_opens.fetch_add(1, Ordering::SeqCst);
            }
            self.stats.opens.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            self.stats.reads.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(MockRead::Data(data)) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    Ok(n)
                }
                Some(MockRead::Fail) => Err(RoverLinkError::Microphone("Read failed".to_string())),
                Some(MockRead::Stall(duration)) => {
                    thread::sleep(duration);
                    Ok(0)
                }
                None => {
                    thread::sleep(Duration::from_millis(1));
                    Ok(0)
                }
            }
        }

        fn close(&mut self) {
            self.stats.in_use.store(false, Ordering::SeqCst);
            self.stats.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}
