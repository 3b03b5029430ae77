//! Win32 key polling behind the core [`InputPoller`] trait.
//!
//! Hotkeys and camera controls are sampled with `GetAsyncKeyState` on
//! the tool thread; mouse deltas are accumulated by whoever receives
//! them (a raw-input or WndProc hook) and drained once per tick.

use cinecam_core::{Action, InputPoller};

#[cfg(target_os = "windows")]
use std::collections::HashMap;
#[cfg(target_os = "windows")]
use std::sync::Mutex;
#[cfg(target_os = "windows")]
use windows::Win32::UI::Input::KeyboardAndMouse::VIRTUAL_KEY;

#[cfg(target_os = "windows")]
pub struct Win32Poller {
    bindings: HashMap<Action, VIRTUAL_KEY>,
    mouse: Mutex<(f32, f32, f32)>,
}

#[cfg(target_os = "windows")]
impl Win32Poller {
    pub fn new() -> Self {
        use windows::Win32::UI::Input::KeyboardAndMouse::{
            VK_ADD, VK_DOWN, VK_F5, VK_F6, VK_F7, VK_INSERT, VK_LEFT, VK_NUMPAD1, VK_NUMPAD3,
            VK_NUMPAD4, VK_NUMPAD5, VK_NUMPAD6, VK_NUMPAD7, VK_NUMPAD8, VK_NUMPAD9, VK_RIGHT,
            VK_SUBTRACT, VK_UP,
        };

        // Numpad-centric layout so WASD keeps moving the character.
        let bindings = HashMap::from([
            (Action::ToggleCamera, VK_INSERT),
            (Action::CameraForward, VK_NUMPAD8),
            (Action::CameraBackward, VK_NUMPAD5),
            (Action::CameraLeft, VK_NUMPAD4),
            (Action::CameraRight, VK_NUMPAD6),
            (Action::CameraUp, VK_NUMPAD9),
            (Action::CameraDown, VK_NUMPAD7),
            (Action::PitchUp, VK_UP),
            (Action::PitchDown, VK_DOWN),
            (Action::YawLeft, VK_LEFT),
            (Action::YawRight, VK_RIGHT),
            (Action::RollLeft, VK_NUMPAD1),
            (Action::RollRight, VK_NUMPAD3),
            (Action::FovIncrease, VK_ADD),
            (Action::FovDecrease, VK_SUBTRACT),
            (Action::TrackCreateNode, VK_F5),
            (Action::TrackDeleteNode, VK_F6),
            (Action::TrackPlay, VK_F7),
        ]);

        Self {
            bindings,
            mouse: Mutex::new((0.0, 0.0, 0.0)),
        }
    }

    /// Accumulate a raw mouse delta until the next poll drains it.
    pub fn push_mouse_delta(&self, dx: f32, dy: f32, wheel: f32) {
        if let Ok(mut mouse) = self.mouse.lock() {
            mouse.0 += dx;
            mouse.1 += dy;
            mouse.2 += wheel;
        }
    }

    fn key_down(&self, action: Action) -> bool {
        use windows::Win32::UI::Input::KeyboardAndMouse::GetAsyncKeyState;

        let Some(&vk) = self.bindings.get(&action) else {
            return false;
        };
        // SAFETY: GetAsyncKeyState is safe for any virtual-key value.
        let state = unsafe { GetAsyncKeyState(vk.0 as i32) };
        (state as u16 & 0x8000) != 0
    }
}

#[cfg(target_os = "windows")]
impl Default for Win32Poller {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "windows")]
impl InputPoller for Win32Poller {
    fn is_action_down(&self, action: Action) -> bool {
        self.key_down(action)
    }

    fn action_state(&self, action: Action) -> f32 {
        if self.key_down(action) { 1.0 } else { 0.0 }
    }

    fn mouse_delta(&self) -> (f32, f32, f32) {
        match self.mouse.lock() {
            Ok(mut mouse) => std::mem::take(&mut *mouse),
            Err(_) => (0.0, 0.0, 0.0),
        }
    }
}

// --- Non-Windows stubs ---

#[cfg(not(target_os = "windows"))]
#[derive(Default)]
pub struct Win32Poller;

#[cfg(not(target_os = "windows"))]
impl Win32Poller {
    pub fn new() -> Self {
        Self
    }

    pub fn push_mouse_delta(&self, _dx: f32, _dy: f32, _wheel: f32) {}
}

#[cfg(not(target_os = "windows"))]
impl InputPoller for Win32Poller {
    fn is_action_down(&self, _action: Action) -> bool {
        false
    }

    fn action_state(&self, _action: Action) -> f32 {
        0.0
    }

    fn mouse_delta(&self) -> (f32, f32, f32) {
        (0.0, 0.0, 0.0)
    }
}
