//! # Telemetry Channel
//!
//! Gimbal position reports arriving on the command connection.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use tracing::debug;

use super::HudSink;
use crate::link::ChannelEvents;
use crate::protocol::decoder::{classify, Inbound};
use crate::protocol::Axis;

/// Inbound handler for the command connection
///
/// Forwards every `angel_<direction>:<value>` report to the HUD sink as it
/// arrives. Nothing is stored here.
pub struct TelemetryChannel {
    hud: Arc<dyn HudSink>,
}

impl TelemetryChannel {
    pub fn new(hud: Arc<dyn HudSink>) -> Self {
        Self { hud }
    }

    /// Handle one inbound payload
    ///
    /// # Returns
    ///
    /// * `bool` - `true` if the payload updated an axis
    pub fn handle(&self, text: &str) -> bool {
        match classify(text) {
            Inbound::Telemetry(update) => {
                debug!(
                    "Gimbal {} -> {:?} = {}",
                    update.direction.as_str(),
                    update.axis(),
                    update.value
                );
                self.hud.set_axis(update.axis(), update.value);
                true
            }
            Inbound::Frame(_) => {
                debug!("Ignoring video frame on command connection");
                false
            }
            Inbound::Unrecognized => {
                debug!("Unrecognized message: {}", text);
                false
            }
        }
    }
}

impl ChannelEvents for TelemetryChannel {
    fn on_message(&self, text: &str) {
        self.handle(text);
    }
}

/// Latest gimbal position per axis
///
/// A ready-made [`HudSink`] for collaborators that poll instead of
/// reacting to every update. Starts at the rover's parking angles.
///
/// # Examples
///
/// ```
/// use rover_link::channels::{HudState, HudSink};
/// use rover_link::protocol::Axis;
///
/// let hud = HudState::new();
/// assert_eq!(hud.get(Axis::Vertical), 150);
///
/// hud.set_axis(Axis::Vertical, 120);
/// assert_eq!(hud.get(Axis::Vertical), 120);
/// ```
#[derive(Debug)]
pub struct HudState {
    vertical: AtomicI32,
    horizontal: AtomicI32,
}

impl Default for HudState {
    fn default() -> Self {
        Self::new()
    }
}

impl HudState {
    pub fn new() -> Self {
        Self {
            vertical: AtomicI32::new(Axis::Vertical.default_value()),
            horizontal: AtomicI32::new(Axis::Horizontal.default_value()),
        }
    }

    pub fn get(&self, axis: Axis) -> i32 {
        self.slot(axis).load(Ordering::Relaxed)
    }

    fn slot(&self, axis: Axis) -> &AtomicI32 {
        match axis {
            Axis::Vertical => &self.vertical,
            Axis::Horizontal => &self.horizontal,
        }
    }
}

impl HudSink for HudState {
    fn set_axis(&self, axis: Axis, value: i32) {
        self.slot(axis).store(value, Ordering::Relaxed);
    }
}
