//! # cinecam-core
//!
//! Core library for the cinecam in-process camera tool.
//!
//! This crate provides:
//! - Binary signature compilation, scanning and offset resolution
//! - Hook bookkeeping over a pluggable code-patching backend
//! - Free-fly camera state and input aggregation
//! - Camera track recording with Catmull-Rom playback
//! - TOML configuration and JSON track persistence
//!
//! Everything here is platform independent; the injected host crate
//! supplies the process-facing collaborators (input polling, patching,
//! overlay rendering).

pub mod camera;
pub mod config;
pub mod error;
pub mod hook;
pub mod input;
pub mod math;
pub mod offsets;
pub mod render;
pub mod signature;

pub use camera::track::{Track, TrackNode, TrackPlayer};
pub use camera::{CameraManager, CameraPose};
pub use config::{CameraConfig, ToolConfig, TrackConfig};
pub use error::{Error, Result};
pub use hook::{Hook, HookKind, HookManager, PatchBackend};
pub use input::{Action, ActionDebouncer, InputPoller};
pub use offsets::OffsetResolver;
pub use render::{OverlayRenderer, PathGeometry};
pub use signature::Signature;
