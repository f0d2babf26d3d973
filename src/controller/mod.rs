//! # Controller Module
//!
//! Gamepad input handling.
//!
//! - [`gamepad`]: device detection and event reading via evdev
//! - [`mapper`]: evdev events to control edges
//! - [`edge`]: control edges to commands

pub mod edge;
pub mod gamepad;
pub mod mapper;

pub use edge::{Control, Edge, InputEdgeTracker};
pub use mapper::{ControlEvent, GamepadMapper};
