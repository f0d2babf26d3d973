//! # Rover Link
//!
//! Drive a rover from a gamepad: video, audio and command channels over
//! WebSocket.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Load configuration (first argument, or `config/default.toml`)
//!    - Set up logging with tracing subscriber, plus a daily log file when
//!      `logging.log_dir` is set
//!    - Open the three rover connections
//!    - Open the gamepad (the link runs without one if none is found)
//!
//! 2. **Main Loop**
//!    - Gamepad events are read on a dedicated thread and mapped to edges
//!    - Edges become commands; Share toggles the microphone
//!    - Handle Ctrl+C for graceful shutdown
//!
//! 3. **Graceful Shutdown**
//!    - Send `stop` for any held control
//!    - Stop recording and release the microphone
//!    - Close all connections
//!
//! ```bash
//! arecord -t raw -f S16_LE -r 16000 -c 1 > /tmp/mic.fifo &
//! cargo run --release -- config/default.toml
//! ```

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use rover_link::channels::{AlwaysGranted, FrameSink, HudSink, HudState, PcmFileSource};
use rover_link::config::{Config, LoggingConfig};
use rover_link::controller::gamepad::Gamepad;
use rover_link::controller::{ControlEvent, GamepadMapper};
use rover_link::link::transport::WsConnector;
use rover_link::protocol::decoder::VideoFrame;
use rover_link::protocol::Axis;
use rover_link::session::ControlLink;

/// Configuration file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Capacity of the gamepad event queue
const INPUT_QUEUE_DEPTH: usize = 64;

/// Number of frames between status log messages
const LOG_INTERVAL_FRAMES: u64 = 300;

/// Log file name prefix inside `logging.log_dir`
const LOG_FILE_PREFIX: &str = "rover-link.log";

/// Counts frames; the actual display surface lives outside this binary
#[derive(Debug, Default)]
struct LoggingFrameSink {
    frames: AtomicU64,
}

impl FrameSink for LoggingFrameSink {
    fn display(&self, frame: VideoFrame) {
        let count = self.frames.fetch_add(1, Ordering::Relaxed) + 1;
        if count % LOG_INTERVAL_FRAMES == 0 {
            info!(
                "Received {} frames (latest {}x{}, {} bytes)",
                count,
                frame.width(),
                frame.height(),
                frame.encoded.len()
            );
        }
    }
}

/// HUD that keeps the gimbal state and logs every change
#[derive(Debug, Default)]
struct LoggingHud {
    state: HudState,
}

impl HudSink for LoggingHud {
    fn set_axis(&self, axis: Axis, value: i32) {
        if self.state.get(axis) != value {
            info!("Gimbal {:?}: {}", axis, value);
        }
        self.state.set_axis(axis, value);
    }
}

/// Main entry point for Rover Link
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let (config, loaded) = load_config(&config_path)?;

    let _log_guard = init_logging(&config.logging)?;

    info!("Rover Link v{} starting...", env!("CARGO_PKG_VERSION"));
    if loaded {
        info!("Loaded configuration from {}", config_path);
    } else {
        warn!("{} not found, using built-in defaults", config_path);
    }

    let mut link = ControlLink::start(
        &config,
        Arc::new(WsConnector),
        Arc::new(LoggingFrameSink::default()),
        Arc::new(LoggingHud::default()),
        Box::new(PcmFileSource::new(&config.audio.device)),
    );

    let (input_tx, mut input_rx) = mpsc::channel(INPUT_QUEUE_DEPTH);
    let mut input_open = match Gamepad::from_config(&config.controller.device_path) {
        Ok(pad) => {
            info!(
                "Gamepad: {} ({})",
                pad.name().unwrap_or("unnamed"),
                pad.device_path()
            );
            spawn_input_reader(pad, input_tx)?;
            true
        }
        Err(e) => {
            warn!("No gamepad available, running without input: {}", e);
            false
        }
    };

    info!("Press Ctrl+C to exit");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            event = input_rx.recv(), if input_open => match event {
                Some(ControlEvent::Edge(control, edge)) => {
                    link.apply(control, edge);
                }
                Some(ControlEvent::ToggleMic) => {
                    let state = link.toggle_mic(&AlwaysGranted).await;
                    info!("Microphone: {:?}", state);
                }
                None => {
                    warn!("Gamepad disconnected");
                    link.release_all();
                    input_open = false;
                }
            },

            result = &mut ctrl_c => {
                if let Err(e) = result {
                    error!("Failed to listen for Ctrl+C: {}", e);
                }
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    let (frames, dropped) = link.frame_counts();
    info!("Frames displayed: {}, dropped: {}", frames, dropped);
    link.shutdown().await;

    Ok(())
}

/// Read the config file, falling back to defaults when it does not exist
///
/// # Returns
///
/// * `(Config, bool)` - Configuration and whether it came from the file
fn load_config(path: &str) -> Result<(Config, bool)> {
    if !Path::new(path).exists() {
        return Ok((Config::default(), false));
    }
    let config = Config::load(path).with_context(|| format!("Invalid configuration in {}", path))?;
    Ok((config, true))
}

/// Install the tracing subscriber
///
/// `RUST_LOG` overrides the configured level. The returned guard must stay
/// alive for the file writer to flush.
fn init_logging(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    if logging.log_dir.is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return Ok(None);
    }

    std::fs::create_dir_all(&logging.log_dir)
        .with_context(|| format!("Failed to create log directory {}", logging.log_dir))?;
    let file_appender = tracing_appender::rolling::daily(&logging.log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(Some(guard))
}

/// Read gamepad events on a dedicated thread and forward mapped events
///
/// The thread ends when the device goes away or the receiver is dropped;
/// either way held hat directions are released first.
fn spawn_input_reader(mut pad: Gamepad, tx: mpsc::Sender<ControlEvent>) -> Result<()> {
    thread::Builder::new()
        .name("gamepad-input".to_string())
        .spawn(move || {
            let mut mapper = GamepadMapper::new();
            'read: loop {
                let events = match pad.fetch_events() {
                    Ok(events) => events.collect::<Vec<_>>(),
                    Err(e) => {
                        error!("Gamepad read failed: {}", e);
                        break;
                    }
                };

                for event in events {
                    for control_event in mapper.process_event(&event) {
                        debug!("Input: {:?}", control_event);
                        if tx.blocking_send(control_event).is_err() {
                            break 'read;
                        }
                    }
                }
            }

            for control_event in mapper.reset() {
                if tx.blocking_send(control_event).is_err() {
                    break;
                }
            }
        })
        .context("Failed to spawn gamepad thread")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_path() {
        assert_eq!(DEFAULT_CONFIG_PATH, "config/default.toml");
    }

    #[test]
    fn test_log_interval_constant() {
        // At ~10 fps from the rover camera this is about 30 seconds
        assert_eq!(LOG_INTERVAL_FRAMES, 300);
    }

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        let (config, loaded) = load_config("/nonexistent/rover-link.toml").unwrap();
        assert!(!loaded);
        assert_eq!(config.link.host, "192.168.1.50");
    }

    #[test]
    fn test_load_config_invalid_file_fails() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[link]\nvideo_port = 0\n").unwrap();
        file.flush().unwrap();

        assert!(load_config(file.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn test_hud_tracks_latest_value() {
        let hud = LoggingHud::default();
        hud.set_axis(Axis::Vertical, 45);
        hud.set_axis(Axis::Vertical, 45);
        assert_eq!(hud.state.get(Axis::Vertical), 45);
        assert_eq!(hud.state.get(Axis::Horizontal), 90);
    }
}
