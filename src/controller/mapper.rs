//! # Gamepad Event Mapper Module
//!
//! Converts raw evdev events from a gamepad into control edges.
//!
//! ## Mapping
//!
//! | Input | evdev Code | Control |
//! |-------|------------|---------|
//! | D-Pad up | ABS_HAT0Y = -1 | Forward |
//! | D-Pad down | ABS_HAT0Y = 1 | Backward |
//! | D-Pad left | ABS_HAT0X = -1 | Left |
//! | D-Pad right | ABS_HAT0X = 1 | Right |
//! | Triangle (△) | BTN_NORTH | CamUp |
//! | Cross (×) | BTN_SOUTH | CamDown |
//! | Square (□) | BTN_WEST | CamLeft |
//! | Circle (○) | BTN_EAST | CamRight |
//! | Share | BTN_SELECT | Microphone toggle (on press) |
//!
//! Some pads report the D-Pad as buttons instead of a hat; BTN_DPAD_* map to
//! the same controls.
//!
//! ## Usage
//!
//! ```no_run
//! use rover_link::controller::gamepad::Gamepad;
//! use rover_link::controller::mapper::GamepadMapper;
//!
//! let mut pad = Gamepad::open()?;
//! let mut mapper = GamepadMapper::new();
//!
//! loop {
//!     for event in pad.fetch_events()? {
//!         for control_event in mapper.process_event(&event) {
//!             println!("{:?}", control_event);
//!         }
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use evdev::{AbsoluteAxisType, InputEvent, InputEventKind, Key};

use super::edge::{Control, Edge};

/// D-Pad hat released.
pub const DPAD_RELEASED: i32 = 0;
/// D-Pad hat pressed negative direction (left or up).
pub const DPAD_NEGATIVE: i32 = -1;
/// D-Pad hat pressed positive direction (right or down).
pub const DPAD_POSITIVE: i32 = 1;

/// Input the link reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// Direction button edge
    Edge(Control, Edge),
    /// Microphone button pressed
    ToggleMic,
}

/// Tracks hat positions and turns evdev events into [`ControlEvent`]s.
///
/// `GamepadMapper` is not thread-safe. Use from a single task/thread only.
#[derive(Debug, Default)]
pub struct GamepadMapper {
    hat_x: i32,
    hat_y: i32,
}

impl GamepadMapper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one evdev event
    ///
    /// # Returns
    ///
    /// * `Vec<ControlEvent>` - Zero, one or two events (a hat flip releases
    ///   the old direction before pressing the new one)
    pub fn process_event(&mut self, event: &InputEvent) -> Vec<ControlEvent> {
        match event.kind() {
            InputEventKind::AbsAxis(axis) => self.process_axis_event(axis, event.value()),
            InputEventKind::Key(key) => Self::process_key_event(key, event.value()),
            _ => Vec::new(),
        }
    }

    fn process_axis_event(&mut self, axis: AbsoluteAxisType, value: i32) -> Vec<ControlEvent> {
        let value = value.signum();
        match axis {
            AbsoluteAxisType::ABS_HAT0X => {
                let previous = std::mem::replace(&mut self.hat_x, value);
                hat_transition(previous, value, Control::Left, Control::Right)
            }
            AbsoluteAxisType::ABS_HAT0Y => {
                let previous = std::mem::replace(&mut self.hat_y, value);
                hat_transition(previous, value, Control::Forward, Control::Backward)
            }
            _ => Vec::new(),
        }
    }

    fn process_key_event(key: Key, value: i32) -> Vec<ControlEvent> {
        // 0 = release, 1 = press, 2 = autorepeat
        let edge = match value {
            0 => Edge::Release,
            1 => Edge::Press,
            _ => return Vec::new(),
        };

        if key == Key::BTN_SELECT {
            return match edge {
                Edge::Press => vec![ControlEvent::ToggleMic],
                _ => Vec::new(),
            };
        }

        let control = match key {
            Key::BTN_NORTH => Control::CamUp,
            Key::BTN_SOUTH => Control::CamDown,
            Key::BTN_WEST => Control::CamLeft,
            Key::BTN_EAST => Control::CamRight,
            Key::BTN_DPAD_UP => Control::Forward,
            Key::BTN_DPAD_DOWN => Control::Backward,
            Key::BTN_DPAD_LEFT => Control::Left,
            Key::BTN_DPAD_RIGHT => Control::Right,
            _ => return Vec::new(),
        };
        vec![ControlEvent::Edge(control, edge)]
    }

    /// Releases for every hat direction currently held
    ///
    /// Used when the device disappears mid-press.
    pub fn reset(&mut self) -> Vec<ControlEvent> {
        let mut events = hat_transition(self.hat_x, DPAD_RELEASED, Control::Left, Control::Right);
        events.extend(hat_transition(self.hat_y, DPAD_RELEASED, Control::Forward, Control::Backward));
        self.hat_x = DPAD_RELEASED;
        self.hat_y = DPAD_RELEASED;
        events
    }
}

fn hat_transition(previous: i32, current: i32, negative: Control, positive: Control) -> Vec<ControlEvent> {
    let control_for = |value: i32| match value {
        DPAD_NEGATIVE => Some(negative),
        DPAD_POSITIVE => Some(positive),
        _ => None,
    };

    if previous == current {
        return Vec::new();
    }

    let mut events = Vec::with_capacity(2);
    if let Some(control) = control_for(previous) {
        events.push(ControlEvent::Edge(control, Edge::Release));
    }
    if let Some(control) = control_for(current) {
        events.push(ControlEvent::Edge(control, Edge::Press));
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use evdev::EventType;

    /// Helper to create an axis event for testing.
    fn make_axis_event(axis: AbsoluteAxisType, value: i32) -> InputEvent {
        InputEvent::new(EventType::ABSOLUTE, axis.0, value)
    }

    /// Helper to create a key event for testing.
    fn make_key_event(key: Key, value: i32) -> InputEvent {
        InputEvent::new(EventType::KEY, key.code(), value)
    }

    fn press(control: Control) -> ControlEvent {
        ControlEvent::Edge(control, Edge::Press)
    }

    fn release(control: Control) -> ControlEvent {
        ControlEvent::Edge(control, Edge::Release)
    }

    #[test]
    fn test_hat_y_forward_and_back() {
        let mut mapper = GamepadMapper::new();

        let events = mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_HAT0Y, DPAD_NEGATIVE));
        assert_eq!(events, vec![press(Control::Forward)]);

        let events = mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_HAT0Y, DPAD_RELEASED));
        assert_eq!(events, vec![release(Control::Forward)]);

        let events = mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_HAT0Y, DPAD_POSITIVE));
        assert_eq!(events, vec![press(Control::Backward)]);
    }

    #[test]
    fn test_hat_x_flip_releases_first() {
        let mut mapper = GamepadMapper::new();
        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_HAT0X, DPAD_NEGATIVE));

        let events = mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_HAT0X, DPAD_POSITIVE));
        assert_eq!(events, vec![release(Control::Left), press(Control::Right)]);
    }

    #[test]
    fn test_hat_repeat_is_silent() {
        let mut mapper = GamepadMapper::new();
        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_HAT0X, DPAD_POSITIVE));

        let events = mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_HAT0X, DPAD_POSITIVE));
        assert!(events.is_empty());
    }

    #[test]
    fn test_face_buttons_move_camera() {
        let cases = [
            (Key::BTN_NORTH, Control::CamUp),
            (Key::BTN_SOUTH, Control::CamDown),
            (Key::BTN_WEST, Control::CamLeft),
            (Key::BTN_EAST, Control::CamRight),
        ];

        for (key, control) in cases {
            let mut mapper = GamepadMapper::new();
            assert_eq!(mapper.process_event(&make_key_event(key, 1)), vec![press(control)]);
            assert_eq!(mapper.process_event(&make_key_event(key, 0)), vec![release(control)]);
        }
    }

    #[test]
    fn test_dpad_buttons() {
        let mut mapper = GamepadMapper::new();
        assert_eq!(
            mapper.process_event(&make_key_event(Key::BTN_DPAD_UP, 1)),
            vec![press(Control::Forward)]
        );
        assert_eq!(
            mapper.process_event(&make_key_event(Key::BTN_DPAD_LEFT, 0)),
            vec![release(Control::Left)]
        );
    }

    #[test]
    fn test_autorepeat_ignored() {
        let mut mapper = GamepadMapper::new();
        assert!(mapper.process_event(&make_key_event(Key::BTN_NORTH, 2)).is_empty());
    }

    #[test]
    fn test_share_toggles_mic_on_press_only() {
        let mut mapper = GamepadMapper::new();
        assert_eq!(
            mapper.process_event(&make_key_event(Key::BTN_SELECT, 1)),
            vec![ControlEvent::ToggleMic]
        );
        assert!(mapper.process_event(&make_key_event(Key::BTN_SELECT, 0)).is_empty());
    }

    #[test]
    fn test_unmapped_inputs_ignored() {
        let mut mapper = GamepadMapper::new();
        assert!(mapper.process_event(&make_key_event(Key::BTN_TL, 1)).is_empty());
        assert!(mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_X, 200)).is_empty());
        assert!(mapper
            .process_event(&InputEvent::new(EventType::SYNCHRONIZATION, 0, 0))
            .is_empty());
    }

    #[test]
    fn test_reset_releases_held_directions() {
        let mut mapper = GamepadMapper::new();
        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_HAT0X, DPAD_POSITIVE));
        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_HAT0Y, DPAD_NEGATIVE));

        assert_eq!(mapper.reset(), vec![release(Control::Right), release(Control::Forward)]);
        assert!(mapper.reset().is_empty());
    }
}
