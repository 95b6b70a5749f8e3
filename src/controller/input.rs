//! Live input state and the handle external input sources use to drive it.
//!
//! The state is published through a [`watch`] channel: input sources write
//! with [`InputHandle`], the report emitter takes one snapshot per tick. A
//! change that lands between two ticks is simply picked up by the next one.
//! Stick values are not range-checked here; the codec saturates them.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Button {
    A,
    B,
    X,
    Y,
    L,
    R,
    Zl,
    Zr,
    Home,
    Capture,
    Plus,
    Minus,
    Up,
    Down,
    Left,
    Right,
    LeftStick,
    RightStick,
}

impl Button {
    pub const ALL: [Button; 18] = [
        Button::A,
        Button::B,
        Button::X,
        Button::Y,
        Button::L,
        Button::R,
        Button::Zl,
        Button::Zr,
        Button::Home,
        Button::Capture,
        Button::Plus,
        Button::Minus,
        Button::Up,
        Button::Down,
        Button::Left,
        Button::Right,
        Button::LeftStick,
        Button::RightStick,
    ];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stick {
    Left,
    Right,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Dpad {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Buttons {
    pub a: bool,
    pub b: bool,
    pub x: bool,
    pub y: bool,
    pub l: bool,
    pub r: bool,
    pub zl: bool,
    pub zr: bool,
    pub home: bool,
    pub capture: bool,
    pub plus: bool,
    pub minus: bool,
}

/// Analog stick position, nominally in [-1, 1] per axis.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StickState {
    pub x: f64,
    pub y: f64,
    pub pressed: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InputState {
    pub dpad: Dpad,
    pub buttons: Buttons,
    pub left_stick: StickState,
    pub right_stick: StickState,
}

// One table for both shared and mutable access to a button's flag.
macro_rules! button_field {
    ($state:ident, $button:expr, $($borrow:tt)+) => {
        match $button {
            Button::A => $($borrow)+ $state.buttons.a,
            Button::B => $($borrow)+ $state.buttons.b,
            Button::X => $($borrow)+ $state.buttons.x,
            Button::Y => $($borrow)+ $state.buttons.y,
            Button::L => $($borrow)+ $state.buttons.l,
            Button::R => $($borrow)+ $state.buttons.r,
            Button::Zl => $($borrow)+ $state.buttons.zl,
            Button::Zr => $($borrow)+ $state.buttons.zr,
            Button::Home => $($borrow)+ $state.buttons.home,
            Button::Capture => $($borrow)+ $state.buttons.capture,
            Button::Plus => $($borrow)+ $state.buttons.plus,
            Button::Minus => $($borrow)+ $state.buttons.minus,
            Button::Up => $($borrow)+ $state.dpad.up,
            Button::Down => $($borrow)+ $state.dpad.down,
            Button::Left => $($borrow)+ $state.dpad.left,
            Button::Right => $($borrow)+ $state.dpad.right,
            Button::LeftStick => $($borrow)+ $state.left_stick.pressed,
            Button::RightStick => $($borrow)+ $state.right_stick.pressed,
        }
    };
}

impl InputState {
    fn field(&self, button: Button) -> &bool {
        button_field!(self, button, &)
    }

    fn slot(&mut self, button: Button) -> &mut bool {
        button_field!(self, button, &mut)
    }

    pub fn set(&mut self, button: Button, pressed: bool) {
        *self.slot(button) = pressed;
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        *self.field(button)
    }

    pub fn stick_mut(&mut self, stick: Stick) -> &mut StickState {
        match stick {
            Stick::Left => &mut self.left_stick,
            Stick::Right => &mut self.right_stick,
        }
    }

    /// Releases every button and recentres both sticks.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Cloneable writer side of the live input state.
#[derive(Clone, Debug)]
pub struct InputHandle {
    sender: Arc<watch::Sender<InputState>>,
}

impl InputHandle {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(InputState::default());
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<InputState> {
        self.sender.subscribe()
    }

    pub fn snapshot(&self) -> InputState {
        self.sender.borrow().clone()
    }

    pub fn update(&self, f: impl FnOnce(&mut InputState)) {
        self.sender.send_modify(f);
    }

    pub fn press(&self, button: Button) {
        debug!("Press {:?}", button);
        self.update(|state| state.set(button, true));
    }

    pub fn release(&self, button: Button) {
        debug!("Release {:?}", button);
        self.update(|state| state.set(button, false));
    }

    pub fn set_stick(&self, stick: Stick, x: f64, y: f64) {
        self.update(|state| {
            let target = state.stick_mut(stick);
            target.x = x;
            target.y = y;
        });
    }

    pub fn clear(&self) {
        self.update(InputState::clear);
    }

    /// Holds `button` for `hold`, then releases it.
    pub async fn tap(&self, button: Button, hold: Duration) {
        self.press(button);
        tokio::time::sleep(hold).await;
        self.release(button);
    }
}

impl Default for InputHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_query_every_button() {
        let mut state = InputState::default();
        for button in Button::ALL {
            assert!(!state.is_pressed(button));
            state.set(button, true);
            assert!(state.is_pressed(button));
        }
        state.clear();
        assert_eq!(state, InputState::default());
    }

    #[test]
    fn each_button_owns_a_distinct_flag() {
        for button in Button::ALL {
            let mut state = InputState::default();
            state.set(button, true);
            let pressed: Vec<Button> = Button::ALL
                .into_iter()
                .filter(|other| state.is_pressed(*other))
                .collect();
            assert_eq!(pressed, vec![button]);
        }
    }

    #[test]
    fn handle_writes_are_visible_to_subscribers() {
        let handle = InputHandle::new();
        let receiver = handle.subscribe();

        handle.press(Button::Home);
        handle.set_stick(Stick::Right, -0.25, 0.75);

        let seen = receiver.borrow().clone();
        assert!(seen.buttons.home);
        assert_eq!(seen.right_stick.x, -0.25);
        assert_eq!(seen.right_stick.y, 0.75);

        handle.release(Button::Home);
        assert!(!handle.snapshot().buttons.home);
    }

    #[tokio::test]
    async fn tap_releases_after_hold() {
        let handle = InputHandle::new();
        handle.tap(Button::B, Duration::from_millis(5)).await;
        assert!(!handle.snapshot().buttons.b);
    }
}
