//! Keyboard and mouse button state tracking.
//!
//! Two snapshots are kept: the live map for the current translation batch
//! and the previous batch's copy, so just-pressed and just-released edges
//! can be computed. Keys held across a batch repost their inputs so
//! handler matching keeps seeing them.

use std::collections::HashMap;
use std::time::Instant;

use super::{Criteria, Input};
use crate::geometry::Position;

/// A named button the state map tracks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Button {
    /// Enter / Return.
    Enter,
    /// Escape.
    Escape,
    /// Backspace.
    Backspace,
    /// Tab.
    Tab,
    /// Arrow up.
    Up,
    /// Arrow down.
    Down,
    /// Arrow left.
    Left,
    /// Arrow right.
    Right,
    /// Shift.
    Shift,
    /// Alt.
    Alt,
    /// Control.
    Control,
    /// Super / Meta.
    Super,
    /// Left mouse button.
    MouseLeft,
    /// Middle mouse button.
    MouseMiddle,
    /// Right mouse button.
    MouseRight,
    /// Function key F1..=F16.
    Function(u8),
}

impl Button {
    /// The criteria bit reposted while this button stays held.
    pub fn held_criteria(self) -> Criteria {
        match self {
            Button::Enter => Criteria::ENTER,
            Button::Escape => Criteria::ESCAPE,
            Button::Backspace => Criteria::BACKSPACE,
            Button::Tab => Criteria::TAB,
            Button::Up => Criteria::UP,
            Button::Down => Criteria::DOWN,
            Button::Left => Criteria::LEFT,
            Button::Right => Criteria::RIGHT,
            Button::Shift => Criteria::SHIFT,
            Button::Alt => Criteria::ALT,
            Button::Control => Criteria::CONTROL,
            Button::Super => Criteria::SUPER,
            Button::MouseLeft => Criteria::MOUSE_LEFT_PRESSED,
            Button::MouseMiddle => Criteria::MOUSE_MIDDLE_PRESSED,
            Button::MouseRight => Criteria::MOUSE_RIGHT_PRESSED,
            Button::Function(n) => Criteria::function(n),
        }
    }
}

/// Pressed flag plus the instant the press was captured.
#[derive(Clone, Copy, Debug)]
pub struct ButtonState {
    /// Whether the button is down.
    pub pressed: bool,
    /// When the press was observed.
    pub captured: Instant,
}

impl ButtonState {
    /// A freshly pressed state.
    pub fn pressed_now() -> Self {
        Self {
            pressed: true,
            captured: Instant::now(),
        }
    }
}

/// The live button map and the previous batch's snapshot.
#[derive(Clone, Debug, Default)]
pub struct KeyboardState {
    current: HashMap<Button, ButtonState>,
    previous: HashMap<Button, ButtonState>,
}

impl KeyboardState {
    /// Create an empty state map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a translation batch: the live map becomes the previous
    /// snapshot and is cleared, except mouse buttons, whose release is
    /// reported explicitly by the terminal.
    pub fn begin_batch(&mut self) {
        self.previous = self.current.clone();
        self.current.retain(|button, _| {
            matches!(
                button,
                Button::MouseLeft | Button::MouseMiddle | Button::MouseRight
            )
        });
    }

    /// Record a press.
    pub fn press(&mut self, button: Button) {
        self.current.insert(button, ButtonState::pressed_now());
    }

    /// Record a release.
    pub fn release(&mut self, button: Button) {
        if let Some(state) = self.current.get_mut(&button) {
            state.pressed = false;
        }
    }

    /// Whether the button is currently down.
    pub fn is_pressed(&self, button: Button) -> bool {
        self.current.get(&button).is_some_and(|s| s.pressed)
    }

    /// Whether the button was down in the previous batch.
    pub fn was_pressed(&self, button: Button) -> bool {
        self.previous.get(&button).is_some_and(|s| s.pressed)
    }

    /// Down now but not in the previous batch.
    pub fn just_pressed(&self, button: Button) -> bool {
        self.is_pressed(button) && !self.was_pressed(button)
    }

    /// Down in the previous batch but not now.
    pub fn just_released(&self, button: Button) -> bool {
        !self.is_pressed(button) && self.was_pressed(button)
    }

    /// Repost inputs for buttons held across batches (down in the
    /// previous batch and still down), so handlers matching on held keys
    /// keep firing. Buttons pressed this batch already queued their input.
    pub fn repost_held(&self, out: &mut Vec<Input>, mouse: Position) {
        for (&button, state) in &self.current {
            if state.pressed && self.was_pressed(button) {
                out.push(Input::at(button.held_criteria(), mouse));
            }
        }
    }
}
