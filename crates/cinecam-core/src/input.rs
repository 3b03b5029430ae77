//! Logical input actions and edge detection.
//!
//! The core never touches devices; it consumes an [`InputPoller`]
//! implemented by the host-side glue. Hotkeys go through a per-action
//! debounce state machine driven by discrete polling ticks, so nothing
//! ever sleeps waiting for a key release.

use std::collections::HashMap;

/// Logical actions the camera tool responds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    ToggleCamera,
    CameraForward,
    CameraBackward,
    CameraLeft,
    CameraRight,
    CameraUp,
    CameraDown,
    PitchUp,
    PitchDown,
    YawLeft,
    YawRight,
    RollLeft,
    RollRight,
    FovIncrease,
    FovDecrease,
    TrackCreateNode,
    TrackDeleteNode,
    TrackPlay,
}

/// Device-polling collaborator.
pub trait InputPoller {
    /// Whether the action's binding is currently held.
    fn is_action_down(&self, action: Action) -> bool;

    /// Analog deflection in `0.0..=1.0` (digital bindings report 0 or 1).
    fn action_state(&self, action: Action) -> f32;

    /// Raw mouse movement since the previous poll: (dx, dy, wheel).
    fn mouse_delta(&self) -> (f32, f32, f32);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Idle,
    Pressed,
    Held,
    Released,
}

/// Edge detector over [`InputPoller::is_action_down`].
///
/// `Pressed` is reported for exactly one tick per physical press no
/// matter how long the key stays down.
#[derive(Debug, Default)]
pub struct ActionDebouncer {
    phases: HashMap<Action, Phase>,
}

impl ActionDebouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance one action by one polling tick.
    fn step(&mut self, action: Action, down: bool) -> Phase {
        let phase = self.phases.entry(action).or_default();
        *phase = match (*phase, down) {
            (Phase::Idle | Phase::Released, true) => Phase::Pressed,
            (Phase::Pressed | Phase::Held, true) => Phase::Held,
            (Phase::Pressed | Phase::Held, false) => Phase::Released,
            (_, false) => Phase::Idle,
        };
        *phase
    }

    /// True on the tick the action transitions from up to down.
    pub fn just_pressed<P: InputPoller + ?Sized>(&mut self, poller: &P, action: Action) -> bool {
        self.step(action, poller.is_action_down(action)) == Phase::Pressed
    }
}
