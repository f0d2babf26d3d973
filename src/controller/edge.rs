//! # Input Edge Tracker
//!
//! Turns press/release edges on the eight direction buttons into commands.
//!
//! | Control | Press | Release / Cancel |
//! |---------|-------|------------------|
//! | Forward | `forward` | `stop` |
//! | Backward | `backward` | `stop` |
//! | Left | `left` | `stop` |
//! | Right | `right` | `stop` |
//! | CamUp | `cam_up` | `stop` |
//! | CamDown | `cam_down` | `stop` |
//! | CamLeft | `cam_left` | `stop` |
//! | CamRight | `cam_right` | `stop` |
//!
//! Controls are independent. Concurrent presses are not merged into
//! combined commands: releasing any held control sends `stop`.

use tracing::debug;

use crate::channels::CommandSink;
use crate::protocol::Command;

/// One of the eight direction buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    Forward,
    Backward,
    Left,
    Right,
    CamUp,
    CamDown,
    CamLeft,
    CamRight,
}

impl Control {
    pub const ALL: [Control; 8] = [
        Control::Forward,
        Control::Backward,
        Control::Left,
        Control::Right,
        Control::CamUp,
        Control::CamDown,
        Control::CamLeft,
        Control::CamRight,
    ];

    /// Command sent when this control is pressed
    pub const fn command(self) -> Command {
        match self {
            Control::Forward => Command::Forward,
            Control::Backward => Command::Backward,
            Control::Left => Command::Left,
            Control::Right => Command::Right,
            Control::CamUp => Command::CamUp,
            Control::CamDown => Command::CamDown,
            Control::CamLeft => Command::CamLeft,
            Control::CamRight => Command::CamRight,
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// Raw input transition on a control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Press,
    Release,
    /// Gesture aborted by the input system; treated like a release
    Cancel,
}

/// Per-control pressed flags
///
/// # Examples
///
/// ```
/// use std::cell::RefCell;
/// use rover_link::channels::CommandSink;
/// use rover_link::controller::edge::{Control, Edge, InputEdgeTracker};
/// use rover_link::protocol::Command;
///
/// struct Log(RefCell<Vec<Command>>);
///
/// impl CommandSink for Log {
///     fn send_command(&self, command: Command) -> bool {
///         self.0.borrow_mut().push(command);
///         true
///     }
/// }
///
/// let log = Log(RefCell::new(Vec::new()));
/// let mut tracker = InputEdgeTracker::new();
/// tracker.handle(Control::Forward, Edge::Press, &log);
/// tracker.handle(Control::Forward, Edge::Release, &log);
/// assert_eq!(*log.0.borrow(), vec![Command::Forward, Command::Stop]);
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InputEdgeTracker {
    pressed: [bool; 8],
}

impl InputEdgeTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pressed(&self, control: Control) -> bool {
        self.pressed[control.index()]
    }

    pub fn any_pressed(&self) -> bool {
        self.pressed.iter().any(|&p| p)
    }

    /// Apply one edge and send the resulting command, if any
    ///
    /// A press on a control that is already down, or a release of a control
    /// that is not down, is not an edge and sends nothing.
    ///
    /// # Returns
    ///
    /// * `Option<Command>` - Command that was emitted
    pub fn handle<S: CommandSink + ?Sized>(
        &mut self,
        control: Control,
        edge: Edge,
        sink: &S,
    ) -> Option<Command> {
        let slot = &mut self.pressed[control.index()];
        let command = match (edge, *slot) {
            (Edge::Press, false) => {
                *slot = true;
                control.command()
            }
            (Edge::Release | Edge::Cancel, true) => {
                *slot = false;
                Command::Stop
            }
            _ => {
                debug!("Ignoring repeated {:?} on {:?}", edge, control);
                return None;
            }
        };

        sink.send_command(command);
        Some(command)
    }

    /// Release every held control with a single `stop`
    ///
    /// Used at shutdown and when the input device goes away.
    pub fn release_all<S: CommandSink + ?Sized>(&mut self, sink: &S) -> Option<Command> {
        if !self.any_pressed() {
            return None;
        }
        self.pressed = [false; 8];
        sink.send_command(Command::Stop);
        Some(Command::Stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingSink {
        sent: RefCell<Vec<Command>>,
    }

    impl CommandSink for RecordingSink {
        fn send_command(&self, command: Command) -> bool {
            self.sent.borrow_mut().push(command);
            true
        }
    }

    impl RecordingSink {
        fn tokens(&self) -> Vec<&'static str> {
            self.sent.borrow().iter().map(|c| c.token()).collect()
        }
    }

    #[test]
    fn test_control_commands() {
        let tokens: Vec<&str> = Control::ALL.iter().map(|c| c.command().token()).collect();
        assert_eq!(
            tokens,
            vec!["forward", "backward", "left", "right", "cam_up", "cam_down", "cam_left", "cam_right"]
        );
    }

    #[test]
    fn test_press_then_release_every_control() {
        for control in Control::ALL {
            let sink = RecordingSink::default();
            let mut tracker = InputEdgeTracker::new();

            assert_eq!(tracker.handle(control, Edge::Press, &sink), Some(control.command()));
            assert!(tracker.is_pressed(control));
            assert_eq!(tracker.handle(control, Edge::Release, &sink), Some(Command::Stop));
            assert!(!tracker.is_pressed(control));

            assert_eq!(sink.tokens(), vec![control.command().token(), "stop"]);
        }
    }

    #[test]
    fn test_cancel_sends_stop() {
        let sink = RecordingSink::default();
        let mut tracker = InputEdgeTracker::new();

        tracker.handle(Control::CamLeft, Edge::Press, &sink);
        tracker.handle(Control::CamLeft, Edge::Cancel, &sink);

        assert_eq!(sink.tokens(), vec!["cam_left", "stop"]);
    }

    #[test]
    fn test_release_without_press_sends_nothing() {
        let sink = RecordingSink::default();
        let mut tracker = InputEdgeTracker::new();

        assert_eq!(tracker.handle(Control::Left, Edge::Release, &sink), None);
        assert_eq!(tracker.handle(Control::Left, Edge::Cancel, &sink), None);
        assert!(sink.tokens().is_empty());
    }

    #[test]
    fn test_repeated_press_sends_once() {
        let sink = RecordingSink::default();
        let mut tracker = InputEdgeTracker::new();

        tracker.handle(Control::Forward, Edge::Press, &sink);
        assert_eq!(tracker.handle(Control::Forward, Edge::Press, &sink), None);
        tracker.handle(Control::Forward, Edge::Release, &sink);
        assert_eq!(tracker.handle(Control::Forward, Edge::Release, &sink), None);

        assert_eq!(sink.tokens(), vec!["forward", "stop"]);
    }

    #[test]
    fn test_concurrent_presses_not_merged() {
        let sink = RecordingSink::default();
        let mut tracker = InputEdgeTracker::new();

        tracker.handle(Control::Forward, Edge::Press, &sink);
        tracker.handle(Control::CamUp, Edge::Press, &sink);
        tracker.handle(Control::Forward, Edge::Release, &sink);
        tracker.handle(Control::CamUp, Edge::Release, &sink);

        assert_eq!(sink.tokens(), vec!["forward", "cam_up", "stop", "stop"]);
    }

    #[test]
    fn test_release_all() {
        let sink = RecordingSink::default();
        let mut tracker = InputEdgeTracker::new();

        assert_eq!(tracker.release_all(&sink), None);

        tracker.handle(Control::Right, Edge::Press, &sink);
        tracker.handle(Control::CamDown, Edge::Press, &sink);
        assert_eq!(tracker.release_all(&sink), Some(Command::Stop));
        assert!(!tracker.any_pressed());

        assert_eq!(sink.tokens(), vec!["right", "cam_down", "stop"]);
    }

    #[test]
    fn test_edges_counted_even_when_sink_drops() {
        struct DeadSink;
        impl CommandSink for DeadSink {
            fn send_command(&self, _command: Command) -> bool {
                false
            }
        }

        let mut tracker = InputEdgeTracker::new();
        assert_eq!(tracker.handle(Control::Left, Edge::Press, &DeadSink), Some(Command::Left));
        assert!(tracker.is_pressed(Control::Left));
        assert_eq!(tracker.handle(Control::Left, Edge::Release, &DeadSink), Some(Command::Stop));
    }
}
