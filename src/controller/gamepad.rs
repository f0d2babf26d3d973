//! # Gamepad Module
//!
//! Gamepad detection, connection, and input reading using the Linux evdev
//! interface.
//!
//! ## Detection
//!
//! Any event device that reports `BTN_SOUTH` counts as a gamepad. Devices are
//! scanned in path order so the choice is stable when several are plugged in.

use evdev::{Device, InputEvent, Key};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{Result, RoverLinkError};

const INPUT_DIR: &str = "/dev/input";

/// Key every supported gamepad reports
const GAMEPAD_MARKER_KEY: Key = Key::BTN_SOUTH;

/// Open gamepad handle
pub struct Gamepad {
    device: Device,
    device_path: String,
}

impl Gamepad {
    /// Detect and open the first gamepad under `/dev/input`
    ///
    /// # Errors
    ///
    /// - `ControllerNotFound`: No event device reports gamepad buttons
    /// - `Controller`: `/dev/input` is missing or unreadable
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rover_link::controller::gamepad::Gamepad;
    ///
    /// let pad = Gamepad::open()?;
    /// println!("Connected to gamepad at: {}", pad.device_path());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open() -> Result<Self> {
        let input_dir = Path::new(INPUT_DIR);

        if !input_dir.exists() {
            return Err(RoverLinkError::Controller(format!("{} directory not found", INPUT_DIR)));
        }

        let mut entries: Vec<_> = std::fs::read_dir(input_dir)
            .map_err(|e| RoverLinkError::Controller(format!("Failed to read {}: {}", INPUT_DIR, e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| RoverLinkError::Controller(format!("Failed to read directory entry: {}", e)))?;

        entries.sort_by_key(|entry| entry.path());

        for entry in entries {
            let path = entry.path();

            let is_event_node = path
                .file_name()
                .map(|name| name.to_string_lossy().starts_with("event"))
                .unwrap_or(false);
            if !is_event_node {
                continue;
            }

            match Device::open(&path) {
                Ok(device) => {
                    debug!(
                        "Found input device: {} ({})",
                        path.display(),
                        device.name().unwrap_or("unnamed")
                    );

                    if is_gamepad(&device) {
                        let device_path = path.to_string_lossy().to_string();
                        info!("Found gamepad at: {}", device_path);
                        return Ok(Self { device, device_path });
                    }
                }
                Err(e) => {
                    debug!("Could not open {}: {}", path.display(), e);
                }
            }
        }

        Err(RoverLinkError::ControllerNotFound)
    }

    /// Open a specific event device
    ///
    /// # Errors
    ///
    /// Returns `Controller` if the device cannot be opened or has no gamepad
    /// buttons.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let device = Device::open(path)
            .map_err(|e| RoverLinkError::Controller(format!("Failed to open {}: {}", path.display(), e)))?;

        if !is_gamepad(&device) {
            return Err(RoverLinkError::Controller(format!(
                "{} does not report gamepad buttons",
                path.display()
            )));
        }

        let device_path = path.to_string_lossy().to_string();
        info!("Opened gamepad at: {}", device_path);
        Ok(Self { device, device_path })
    }

    /// Open `path` if set, otherwise auto-detect
    pub fn from_config(path: &str) -> Result<Self> {
        if path.is_empty() {
            Self::open()
        } else {
            Self::open_path(path)
        }
    }

    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    pub fn name(&self) -> Option<&str> {
        self.device.name()
    }

    /// Fetch pending events, blocking until at least one arrives
    ///
    /// # Errors
    ///
    /// Returns `Controller` if the device went away.
    pub fn fetch_events(&mut self) -> Result<impl Iterator<Item = InputEvent> + '_> {
        self.device
            .fetch_events()
            .map_err(|e| RoverLinkError::Controller(format!("Failed to fetch events: {}", e)))
    }
}

fn is_gamepad(device: &Device) -> bool {
    device
        .supported_keys()
        .map(|keys| keys.contains(GAMEPAD_MARKER_KEY))
        .unwrap_or(false)
}
