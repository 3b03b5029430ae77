//! Free-fly camera state and orchestration.
//!
//! [`CameraManager`] aggregates input into per-tick pose deltas,
//! integrates them (or defers to track playback), and exposes the
//! queries the hooked game functions use to decide whether to suppress
//! native camera and input handling.

pub mod track;

use nalgebra::{Matrix4, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::config::{CameraConfig, ToolConfig};
use crate::input::{Action, ActionDebouncer, InputPoller};

use self::track::TrackPlayer;

/// Live camera pose. Rotation stays a unit quaternion; it is
/// renormalised after every composition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub position: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub field_of_view: f32,
}

impl Default for CameraPose {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            field_of_view: 50.0,
        }
    }
}

impl CameraPose {
    /// Column-vector transform, for marker rendering.
    pub fn to_matrix(&self) -> Matrix4<f32> {
        let mut m = self.rotation.to_homogeneous();
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.position);
        m
    }

    /// Row-major layout as the game camera stores it: rows 0..2 are the
    /// right/up/forward basis vectors, row 3 is the position.
    pub fn to_row_matrix(&self) -> [[f32; 4]; 4] {
        let right = self.rotation * Vector3::x();
        let up = self.rotation * Vector3::y();
        let forward = self.rotation * Vector3::z();
        let p = self.position;
        [
            [right.x, right.y, right.z, 0.0],
            [up.x, up.y, up.z, 0.0],
            [forward.x, forward.y, forward.z, 0.0],
            [p.x, p.y, p.z, 1.0],
        ]
    }
}

/// Per-tick control deltas, consumed and zeroed by every update.
#[derive(Debug, Clone, Copy, Default)]
struct ControlDeltas {
    dx: f32,
    dy: f32,
    dz: f32,
    pitch: f32,
    yaw: f32,
    roll: f32,
    fov: f32,
}

pub struct CameraManager {
    pose: CameraPose,
    deltas: ControlDeltas,
    track_player: TrackPlayer,
    config: CameraConfig,

    enabled: bool,
    first_enable: bool,
    gamepad_disabled: bool,
    kbm_disabled: bool,

    /// The game's own camera transform, captured passively by the camera
    /// hook while the free camera is disabled.
    reset_pose: Option<CameraPose>,

    debouncer: ActionDebouncer,
}

impl Default for CameraManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraManager {
    pub fn new() -> Self {
        Self {
            pose: CameraPose::default(),
            deltas: ControlDeltas::default(),
            track_player: TrackPlayer::new(),
            config: CameraConfig::default(),
            enabled: false,
            first_enable: true,
            gamepad_disabled: true,
            kbm_disabled: true,
            reset_pose: None,
            debouncer: ActionDebouncer::new(),
        }
    }

    pub fn pose(&self) -> &CameraPose {
        &self.pose
    }

    pub fn track_player(&self) -> &TrackPlayer {
        &self.track_player
    }

    pub fn track_player_mut(&mut self) -> &mut TrackPlayer {
        &mut self.track_player
    }

    pub fn is_camera_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_gamepad_disabled(&self) -> bool {
        self.enabled && self.gamepad_disabled
    }

    pub fn is_kbm_disabled(&self) -> bool {
        self.enabled && self.kbm_disabled
    }

    /// Store the game camera transform for seeding the free camera.
    /// Called from the camera hook whenever the override is inactive.
    pub fn set_reset_transform(&mut self, rows: &[[f32; 4]; 4]) {
        self.reset_pose = Some(CameraPose {
            position: Vector3::new(rows[3][0], rows[3][1], rows[3][2]),
            rotation: UnitQuaternion::identity(),
            field_of_view: self.pose.field_of_view,
        });
    }

    /// Enable/disable the free camera. On first enable (or always, with
    /// auto-reset) the pose is seeded from the captured game transform
    /// so the free camera starts where the native camera left off.
    pub fn toggle_camera(&mut self) {
        if self.first_enable || self.config.auto_reset {
            if let Some(reset) = self.reset_pose {
                self.pose.position = reset.position;
                self.pose.rotation = UnitQuaternion::identity();
            }
            self.first_enable = false;
        }
        self.enabled = !self.enabled;
    }

    /// Debounced hotkey handling; one event per physical key press.
    pub fn hotkey_update<P: InputPoller + ?Sized>(&mut self, poller: &P) {
        if self.debouncer.just_pressed(poller, Action::ToggleCamera) {
            self.toggle_camera();
        }

        if !self.enabled {
            return;
        }
        if self.debouncer.just_pressed(poller, Action::TrackCreateNode) {
            let pose = self.pose;
            self.track_player.create_node(&pose);
        }
        if self.debouncer.just_pressed(poller, Action::TrackDeleteNode) {
            self.track_player.delete_node();
        }
        if self.debouncer.just_pressed(poller, Action::TrackPlay) {
            self.track_player.toggle();
        }
    }

    /// One tool-thread tick: poll analog input and integrate the pose.
    pub fn update<P: InputPoller + ?Sized>(&mut self, dt: f32, poller: &P) {
        if !self.enabled {
            return;
        }
        self.poll_input(dt, poller);
        self.integrate(dt);
    }

    fn poll_input<P: InputPoller + ?Sized>(&mut self, dt: f32, poller: &P) {
        let state = |a| poller.action_state(a);
        let d = &mut self.deltas;

        d.dx = state(Action::CameraRight) - state(Action::CameraLeft);
        d.dy = state(Action::CameraUp) - state(Action::CameraDown);
        d.dz = state(Action::CameraForward) - state(Action::CameraBackward);

        d.pitch = state(Action::PitchDown) - state(Action::PitchUp);
        d.yaw = state(Action::YawRight) - state(Action::YawLeft);
        d.roll = state(Action::RollLeft) - state(Action::RollRight);
        d.fov = state(Action::FovIncrease) - state(Action::FovDecrease);

        if self.enabled && self.kbm_disabled {
            let (mx, my, wheel) = poller.mouse_delta();
            d.pitch += my * dt;
            d.yaw += mx * dt;
            d.fov += wheel * dt;
        }
    }

    fn integrate(&mut self, dt: f32) {
        let d = self.deltas;

        let q_pitch = UnitQuaternion::from_axis_angle(
            &Vector3::x_axis(),
            d.pitch * dt * self.config.rotation_speed,
        );
        let q_yaw = UnitQuaternion::from_axis_angle(
            &Vector3::y_axis(),
            d.yaw * dt * self.config.rotation_speed,
        );
        let q_roll =
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), d.roll * dt * self.config.roll_speed);

        // Pitch and roll in camera space, yaw in world space.
        let mut rotation = self.pose.rotation * q_pitch;
        rotation = q_yaw * rotation;
        rotation *= q_roll;
        rotation.renormalize();

        let mut fov = self.pose.field_of_view + d.fov * dt * self.config.fov_speed;
        let mut position = self.pose.position;

        if self.track_player.is_playing() {
            // Up/down input doubles as the manual scrub control.
            let sample = self.track_player.advance(dt, d.dy);

            position = sample.position;
            if self.track_player.is_rotation_locked() {
                rotation = sample.rotation;
            }
            if self.track_player.is_fov_locked() {
                fov = sample.field_of_view;
            }
        } else {
            let speed = dt * self.config.movement_speed;
            position += (rotation * Vector3::x()) * (d.dx * speed);
            position += (rotation * Vector3::y()) * (d.dy * speed);
            position += (rotation * Vector3::z()) * (d.dz * speed);
        }

        self.pose = CameraPose {
            position,
            rotation,
            field_of_view: fov,
        };
        self.deltas = ControlDeltas::default();
    }

    pub fn read_config(&mut self, config: &ToolConfig) {
        self.config = config.camera.clone();
        self.track_player.apply_config(&config.track);
    }

    pub fn get_config(&self) -> ToolConfig {
        ToolConfig {
            camera: self.config.clone(),
            track: self.track_player.config(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::tests::FakePoller;

    fn enabled_manager() -> CameraManager {
        let mut manager = CameraManager::new();
        manager.toggle_camera();
        assert!(manager.is_camera_enabled());
        manager
    }

    #[test]
    fn test_queries_gated_by_enable() {
        let mut manager = CameraManager::new();
        assert!(!manager.is_camera_enabled());
        assert!(!manager.is_gamepad_disabled());
        assert!(!manager.is_kbm_disabled());

        manager.toggle_camera();
        assert!(manager.is_camera_enabled());
        assert!(manager.is_gamepad_disabled());
        assert!(manager.is_kbm_disabled());
    }

    #[test]
    fn test_first_enable_seeds_from_reset_transform() {
        let mut manager = CameraManager::new();
        let rows = CameraPose {
            position: Vector3::new(10.0, 20.0, 30.0),
            ..CameraPose::default()
        }
        .to_row_matrix();

        manager.set_reset_transform(&rows);
        manager.toggle_camera();

        assert_eq!(manager.pose().position, Vector3::new(10.0, 20.0, 30.0));
        assert_eq!(manager.pose().rotation, UnitQuaternion::identity());
    }

    #[test]
    fn test_translation_along_local_basis() {
        let mut manager = enabled_manager();
        let mut poller = FakePoller::default();
        poller.analog.insert(Action::CameraForward, 1.0);

        manager.update(0.5, &poller);

        // Identity rotation: forward is +z, speed 1.0.
        let p = manager.pose().position;
        assert!((p - Vector3::new(0.0, 0.0, 0.5)).norm() < 1e-6);
    }

    #[test]
    fn test_deltas_consumed_each_tick() {
        let mut manager = enabled_manager();
        let mut poller = FakePoller::default();
        poller.analog.insert(Action::CameraForward, 1.0);
        manager.update(1.0, &poller);

        // Second tick with no input: no residual motion.
        let before = manager.pose().position;
        manager.update(1.0, &FakePoller::default());
        assert_eq!(manager.pose().position, before);
    }

    #[test]
    fn test_pitch_stays_local_after_yaw() {
        let mut manager = enabled_manager();
        manager.pose.rotation =
            UnitQuaternion::from_axis_angle(&Vector3::y_axis(), std::f32::consts::FRAC_PI_2);

        let mut poller = FakePoller::default();
        poller.analog.insert(Action::PitchDown, 1.0);
        manager.update(0.5, &poller);

        // Pitch acts about the camera's own right axis: after a 90° yaw
        // it must tilt the forward vector vertically, not twist it about
        // the world x axis.
        let forward = manager.pose().rotation * Vector3::z();
        assert!(forward.y.abs() > 0.05);
        assert!(forward.x > 0.9);
    }

    #[test]
    fn test_rotation_stays_unit_after_composition() {
        let mut manager = enabled_manager();
        let mut poller = FakePoller::default();
        poller.analog.insert(Action::YawRight, 1.0);
        poller.analog.insert(Action::PitchDown, 0.7);
        poller.analog.insert(Action::RollLeft, 0.3);

        for _ in 0..200 {
            manager.update(0.016, &poller);
        }
        assert!((manager.pose().rotation.coords.norm() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_track_playback_overrides_position() {
        let mut manager = enabled_manager();
        let start = CameraPose {
            position: Vector3::new(0.0, 0.0, 0.0),
            ..CameraPose::default()
        };
        let end = CameraPose {
            position: Vector3::new(4.0, 0.0, 0.0),
            ..CameraPose::default()
        };
        manager.track_player_mut().create_node(&start);
        manager.track_player_mut().create_node(&end);
        manager.track_player_mut().toggle();

        // Forward input is ignored while a track plays.
        let mut poller = FakePoller::default();
        poller.analog.insert(Action::CameraForward, 1.0);
        manager.update(1.5, &poller);

        let x = manager.pose().position.x;
        assert!(x > 0.0 && x <= 4.0);
        assert_eq!(manager.pose().position.z, 0.0);
    }

    #[test]
    fn test_hotkey_toggle_is_debounced() {
        let mut manager = CameraManager::new();
        let mut poller = FakePoller::default();
        poller.down.insert(Action::ToggleCamera, true);

        manager.hotkey_update(&poller);
        assert!(manager.is_camera_enabled());

        // Key held across several polls: state must not flap.
        for _ in 0..5 {
            manager.hotkey_update(&poller);
            assert!(manager.is_camera_enabled());
        }

        poller.down.insert(Action::ToggleCamera, false);
        manager.hotkey_update(&poller);
        poller.down.insert(Action::ToggleCamera, true);
        manager.hotkey_update(&poller);
        assert!(!manager.is_camera_enabled());
    }

    #[test]
    fn test_hotkey_node_creation_requires_enable() {
        let mut manager = CameraManager::new();
        let mut poller = FakePoller::default();
        poller.down.insert(Action::TrackCreateNode, true);

        manager.hotkey_update(&poller);
        assert!(manager.track_player().selected_track().nodes.is_empty());
    }

    #[test]
    fn test_config_roundtrip() {
        let mut manager = CameraManager::new();
        let mut config = ToolConfig::default();
        config.camera.movement_speed = 7.5;
        config.track.node_time_span = 0.5;

        manager.read_config(&config);
        assert_eq!(manager.get_config(), config);
    }
}
