//! # Rover Link Library
//!
//! Drive a remote rover from a handheld controller over three WebSocket
//! channels: video frames in, microphone audio out, and discrete commands out
//! with gimbal telemetry coming back on the same connection.
//!
//! Every connection reconnects on its own after a fixed delay, and a failure on
//! one channel never touches the others. [`session::ControlLink`] wires the
//! channels together with the gamepad edge tracker and the recorder.

pub mod config;
pub mod error;
pub mod protocol;
pub mod link;
pub mod channels;
pub mod controller;
pub mod session;
