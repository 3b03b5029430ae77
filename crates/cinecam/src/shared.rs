//! State shared between the tool thread and the hooked game functions.
//!
//! The camera-update detour runs on the game's render path and must not
//! block, so the transform buffers are read and written without locks.
//! Each buffer has exactly one writer: the tool thread publishes the
//! override transform, the detour publishes the captured game transform.
//! A reader racing a writer can observe a transform mixing two ticks of
//! the same camera; that is visually harmless and accepted.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, Ordering};

pub type TransformRows = [[f32; 4]; 4];

const IDENTITY: TransformRows = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

pub struct SharedCameraState {
    enabled: AtomicBool,
    override_transform: UnsafeCell<TransformRows>,
    captured_transform: UnsafeCell<TransformRows>,
    captured: AtomicBool,
}

// SAFETY: each UnsafeCell has a single designated writer thread and the
// data is plain f32 rows; torn reads are tolerated by contract above.
unsafe impl Sync for SharedCameraState {}

impl SharedCameraState {
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(false),
            override_transform: UnsafeCell::new(IDENTITY),
            captured_transform: UnsafeCell::new(IDENTITY),
            captured: AtomicBool::new(false),
        }
    }

    /// Whether the detour should write the override transform.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Tool thread: publish the pose the detour writes into the game.
    pub fn publish_override(&self, rows: &TransformRows) {
        // SAFETY: the tool thread is the only writer of this buffer.
        unsafe { *self.override_transform.get() = *rows };
    }

    /// Detour: read the transform to write over the game camera.
    pub fn read_override(&self) -> TransformRows {
        // SAFETY: reads may race publish_override; tolerated by contract.
        unsafe { *self.override_transform.get() }
    }

    /// Detour: record the game's own camera transform while the
    /// override is inactive.
    pub fn capture(&self, rows: &TransformRows) {
        // SAFETY: the detour is the only writer of this buffer.
        unsafe { *self.captured_transform.get() = *rows };
        self.captured.store(true, Ordering::Release);
    }

    /// Tool thread: latest captured game transform, if any arrived yet.
    pub fn captured(&self) -> Option<TransformRows> {
        if !self.captured.load(Ordering::Acquire) {
            return None;
        }
        // SAFETY: reads may race capture; tolerated by contract.
        Some(unsafe { *self.captured_transform.get() })
    }
}

impl Default for SharedCameraState {
    fn default() -> Self {
        Self::new()
    }
}
