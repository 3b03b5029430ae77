//! Camera track recording and spline playback.
//!
//! A track is an ordered list of timestamped pose keyframes ("nodes").
//! Playback interpolates a Catmull-Rom path through them, either at
//! wall-clock rate or scrubbed manually with directional input.

use std::fs;
use std::path::Path;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::TrackConfig;
use crate::error::{Error, Result};
use crate::math;
use crate::render::PathGeometry;

use super::CameraPose;

/// One keyframe on a track. Timestamps are strictly increasing in
/// insertion order; nodes are appended and deleted at the tail only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackNode {
    pub pose: CameraPose,
    pub timestamp: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub name: String,
    pub nodes: Vec<TrackNode>,
    #[serde(skip)]
    geometry: PathGeometry,
}

impl Track {
    fn new(name: String) -> Self {
        Self {
            name,
            nodes: Vec::new(),
            geometry: PathGeometry::default(),
        }
    }
}

/// Coarse sampling step used when regenerating display geometry.
const DISPLAY_STEP: f32 = 0.1;
/// Emit a forward tick every this many display samples (0.5 s of track time).
const TICK_INTERVAL: usize = 5;
/// World-space length of a forward tick.
const TICK_LENGTH: f32 = 0.5;

pub struct TrackPlayer {
    tracks: Vec<Track>,
    selected: usize,
    running_id: u32,

    playing: bool,
    manual_play: bool,
    lock_rotation: bool,
    lock_field_of_view: bool,
    node_time_span: f32,

    current_node: usize,
    current_time: f32,
}

impl Default for TrackPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackPlayer {
    pub fn new() -> Self {
        Self {
            tracks: vec![Track::new("Track #1".to_string())],
            selected: 0,
            running_id: 2,
            playing: false,
            manual_play: false,
            lock_rotation: true,
            lock_field_of_view: false,
            node_time_span: 3.0,
            current_node: 0,
            current_time: 0.0,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_rotation_locked(&self) -> bool {
        self.lock_rotation
    }

    pub fn is_fov_locked(&self) -> bool {
        self.lock_field_of_view
    }

    pub fn apply_config(&mut self, config: &TrackConfig) {
        self.node_time_span = config.node_time_span.max(0.01);
        self.lock_rotation = config.lock_rotation;
        self.lock_field_of_view = config.lock_field_of_view;
        self.manual_play = config.manual_play;
    }

    pub fn config(&self) -> TrackConfig {
        TrackConfig {
            node_time_span: self.node_time_span,
            lock_rotation: self.lock_rotation,
            lock_field_of_view: self.lock_field_of_view,
            manual_play: self.manual_play,
        }
    }

    pub fn selected_track(&self) -> &Track {
        &self.tracks[self.selected]
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn select_track(&mut self, index: usize) {
        if self.playing {
            return;
        }
        self.selected = index.min(self.tracks.len() - 1);
    }

    /// Append a keyframe at `last timestamp + 1.0` (or 0 for the first).
    /// No-op while playing.
    pub fn create_node(&mut self, pose: &CameraPose) {
        if self.playing {
            return;
        }

        let nodes = &mut self.tracks[self.selected].nodes;
        let timestamp = nodes.last().map_or(0.0, |n| n.timestamp + 1.0);
        nodes.push(TrackNode {
            pose: *pose,
            timestamp,
        });
        debug!("Node created, total nodes: {}", nodes.len());
        self.regenerate_geometry();
    }

    /// Remove the last keyframe. A track may be emptied entirely; only
    /// deleting from an already-empty track is rejected.
    pub fn delete_node(&mut self) {
        if self.playing {
            return;
        }

        let track = &mut self.tracks[self.selected];
        if track.nodes.is_empty() {
            warn!("No nodes to delete on '{}'", track.name);
            return;
        }
        track.nodes.pop();
        debug!("Deleted node, remaining nodes: {}", track.nodes.len());
        self.regenerate_geometry();
    }

    pub fn create_track(&mut self) {
        if self.playing {
            return;
        }
        self.tracks.push(Track::new(format!("Track #{}", self.running_id)));
        self.running_id += 1;
        self.selected = self.tracks.len() - 1;
    }

    /// Delete the selected track. The track list is never emptied: with
    /// one track left this is a no-op (unlike node deletion).
    pub fn delete_track(&mut self) {
        if self.playing || self.tracks.len() <= 1 {
            return;
        }
        self.tracks.remove(self.selected);
        if self.selected >= self.tracks.len() {
            self.selected -= 1;
        }
    }

    /// Start or stop playback. Needs at least 2 nodes to start; entering
    /// playback resets the cursor to the track start.
    pub fn toggle(&mut self) {
        let count = self.tracks[self.selected].nodes.len();
        if count < 2 {
            warn!("{}", Error::InsufficientTrackNodes(count));
            return;
        }

        self.playing = !self.playing;
        if self.playing {
            self.current_time = 0.0;
            self.current_node = 0;
        }
    }

    /// Advance playback time and sample the interpolated pose.
    ///
    /// `control` is the net directional input (positive forward) and is
    /// only applied in manual play. Past the final node the last pose is
    /// returned; scrubbing before the start clamps time to 0.
    pub fn advance(&mut self, dt: f32, control: f32) -> CameraPose {
        let control = if self.manual_play { Some(control) } else { None };
        self.advance_inner(dt, control)
    }

    fn advance_inner(&mut self, dt: f32, control: Option<f32>) -> CameraPose {
        let nodes = &self.tracks[self.selected].nodes;
        match nodes.len() {
            0 => return CameraPose::default(),
            1 => return nodes[0].pose,
            _ => {}
        }

        // Node-to-node playback takes node_time_span seconds.
        let step = dt / self.node_time_span;
        self.current_time += match control {
            Some(c) => step * c,
            None => step,
        };

        // Walk the cursor to the segment containing current_time,
        // clamping at both ends of the track.
        loop {
            if self.current_time >= nodes[self.current_node + 1].timestamp {
                if self.current_node + 1 < nodes.len() - 1 {
                    self.current_node += 1;
                } else {
                    return nodes[self.current_node + 1].pose;
                }
            } else if self.current_time < nodes[self.current_node].timestamp {
                if self.current_node > 0 {
                    self.current_node -= 1;
                } else {
                    self.current_time = 0.0;
                    return nodes[0].pose;
                }
            } else {
                break;
            }
        }

        // Four control points, duplicating boundary nodes at the edges.
        let n1 = self.current_node;
        let n2 = n1 + 1;
        let n0 = n1.saturating_sub(1);
        let n3 = (n2 + 1).min(nodes.len() - 1);

        let mu = (self.current_time - nodes[n1].timestamp)
            / (nodes[n2].timestamp - nodes[n1].timestamp);

        let p = [&nodes[n0].pose, &nodes[n1].pose, &nodes[n2].pose, &nodes[n3].pose];
        CameraPose {
            position: math::catmull_rom_vec3(
                &p[0].position,
                &p[1].position,
                &p[2].position,
                &p[3].position,
                mu,
            ),
            rotation: math::catmull_rom_quat(
                &p[0].rotation,
                &p[1].rotation,
                &p[2].rotation,
                &p[3].rotation,
                mu,
            ),
            field_of_view: math::catmull_rom(
                p[0].field_of_view,
                p[1].field_of_view,
                p[2].field_of_view,
                p[3].field_of_view,
                mu,
            ),
        }
    }

    /// Replay the whole track at a fixed coarse step and rebuild the
    /// display polyline plus periodic forward ticks. Leaves the live
    /// cursor untouched.
    pub fn regenerate_geometry(&mut self) {
        if self.tracks[self.selected].nodes.len() < 2 {
            self.tracks[self.selected].geometry.clear();
            return;
        }

        let saved_cursor = (self.current_node, self.current_time);
        self.current_node = 0;
        self.current_time = 0.0;

        let mut geometry = PathGeometry::default();
        let (first_pose, end_time) = {
            let nodes = &self.tracks[self.selected].nodes;
            (nodes[0].pose, nodes[nodes.len() - 1].timestamp)
        };

        geometry.push_polyline_point(first_pose.position.into());
        push_forward_tick(&mut geometry, &first_pose);

        let mut samples = 0usize;
        while self.current_time < end_time {
            let before = self.current_time;
            samples += 1;
            // Manual-play scaling is suppressed while sampling.
            let sample = self.advance_inner(DISPLAY_STEP, None);
            geometry.push_polyline_point(sample.position.into());

            if samples % TICK_INTERVAL == 0 {
                push_forward_tick(&mut geometry, &sample);
            }
            // f32 accumulation stops advancing well short of a huge
            // end timestamp.
            if self.current_time <= before {
                break;
            }
        }

        self.tracks[self.selected].geometry = geometry;
        (self.current_node, self.current_time) = saved_cursor;
    }

    pub fn geometry(&self) -> &PathGeometry {
        &self.tracks[self.selected].geometry
    }

    /// Save the selected track as JSON.
    pub fn save_selected<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self.selected_track())?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Load a track from JSON and append it to the track list.
    ///
    /// Node timestamps must follow the recorder's layout (finite, node
    /// `i` at `t = i`); anything else is a tampered or foreign file and
    /// is rejected without touching the track list.
    pub fn load_track<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let content = fs::read_to_string(path)?;
        let track: Track = serde_json::from_str(&content)?;

        let consistent = track
            .nodes
            .iter()
            .enumerate()
            .all(|(i, n)| n.timestamp.is_finite() && n.timestamp == i as f32);
        if !consistent {
            let err = Error::InvalidTrack(track.name.clone());
            warn!("{err}");
            return Err(err);
        }

        self.tracks.push(track);
        self.selected = self.tracks.len() - 1;
        self.regenerate_geometry();
        Ok(())
    }
}

fn push_forward_tick(geometry: &mut PathGeometry, pose: &CameraPose) {
    let forward = pose.rotation * Vector3::z();
    let tip = pose.position - forward * TICK_LENGTH;
    geometry.push_segment(pose.position.into(), tip.into());
}

#[cfg(test)]
mod tests {
    use nalgebra::UnitQuaternion;

    use super::*;

    fn pose(x: f32, yaw: f32, fov: f32) -> CameraPose {
        CameraPose {
            position: Vector3::new(x, 2.0 * x, 3.0 * x),
            rotation: UnitQuaternion::from_euler_angles(0.0, yaw, 0.0),
            field_of_view: fov,
        }
    }

    /// Player with nodes at t = 0, 1, 2 and a 2-second node time span.
    fn three_node_player() -> TrackPlayer {
        let mut player = TrackPlayer::new();
        player.apply_config(&TrackConfig {
            node_time_span: 2.0,
            ..TrackConfig::default()
        });
        player.create_node(&pose(0.0, 0.0, 40.0));
        player.create_node(&pose(1.0, 0.2, 50.0));
        player.create_node(&pose(2.0, 0.4, 60.0));
        player
    }

    #[test]
    fn test_node_timestamps_increase_by_one() {
        let player = three_node_player();
        let stamps: Vec<f32> = player
            .selected_track()
            .nodes
            .iter()
            .map(|n| n.timestamp)
            .collect();
        assert_eq!(stamps, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_create_and_delete_rejected_while_playing() {
        let mut player = three_node_player();
        player.toggle();
        assert!(player.is_playing());

        player.create_node(&pose(3.0, 0.0, 40.0));
        player.delete_node();
        assert_eq!(player.selected_track().nodes.len(), 3);
    }

    #[test]
    fn test_delete_node_may_empty_track() {
        let mut player = three_node_player();
        for _ in 0..3 {
            player.delete_node();
        }
        assert!(player.selected_track().nodes.is_empty());

        // Deleting from an empty track is rejected, not a panic.
        player.delete_node();
        assert!(player.selected_track().nodes.is_empty());
    }

    #[test]
    fn test_toggle_requires_two_nodes() {
        let mut player = TrackPlayer::new();
        player.toggle();
        assert!(!player.is_playing());

        player.create_node(&pose(0.0, 0.0, 40.0));
        player.toggle();
        assert!(!player.is_playing());

        player.create_node(&pose(1.0, 0.0, 40.0));
        player.toggle();
        assert!(player.is_playing());
    }

    #[test]
    fn test_toggle_resets_cursor() {
        let mut player = three_node_player();
        player.toggle();
        player.advance(3.0, 0.0);
        player.toggle();
        player.toggle();
        assert_eq!((player.current_node, player.current_time), (0, 0.0));
    }

    #[test]
    fn test_advance_midpoint_is_strictly_between() {
        let mut player = three_node_player();
        player.toggle();

        // Half a node span: track time 0.5, between nodes 0 and 1.
        let sample = player.advance(1.0, 0.0);
        let (p0, p1) = (pose(0.0, 0.0, 40.0), pose(1.0, 0.2, 50.0));

        for i in 0..3 {
            assert!(sample.position[i] > p0.position[i].min(p1.position[i]) - 1e-6);
            assert!(sample.position[i] < p0.position[i].max(p1.position[i]) + 1e-6);
        }
        assert!(sample.position.x > 0.0 && sample.position.x < 1.0);
        assert!(sample.field_of_view > 40.0 && sample.field_of_view < 50.0);

        let yaw = sample.rotation.euler_angles().1;
        assert!(yaw > 0.0 && yaw < 0.2);
    }

    #[test]
    fn test_advance_passes_through_interior_node() {
        let mut player = three_node_player();
        player.toggle();

        // Accumulate exactly one node span: track time 1.0 == node 1.
        player.advance(1.0, 0.0);
        let sample = player.advance(1.0, 0.0);
        let expected = pose(1.0, 0.2, 50.0);

        assert!((sample.position - expected.position).norm() < 1e-5);
        assert!((sample.field_of_view - expected.field_of_view).abs() < 1e-4);
        assert!(sample.rotation.angle_to(&expected.rotation) < 1e-4);
    }

    #[test]
    fn test_advance_reaches_final_node_exactly() {
        let mut player = three_node_player();
        player.toggle();

        let mut sample = CameraPose::default();
        for _ in 0..4 {
            sample = player.advance(1.0, 0.0);
        }
        let last = pose(2.0, 0.4, 60.0);
        assert!((sample.position - last.position).norm() < 1e-5);
        assert!((sample.field_of_view - last.field_of_view).abs() < 1e-4);
    }

    #[test]
    fn test_advance_clamps_past_end() {
        let mut player = three_node_player();
        player.toggle();

        let mut sample = CameraPose::default();
        for _ in 0..50 {
            sample = player.advance(1.0, 0.0);
        }
        let last = pose(2.0, 0.4, 60.0);
        assert!((sample.position - last.position).norm() < 1e-5);
        assert!(player.is_playing());
    }

    #[test]
    fn test_manual_scrub_clamps_at_start() {
        let mut player = TrackPlayer::new();
        player.apply_config(&TrackConfig {
            node_time_span: 1.0,
            manual_play: true,
            ..TrackConfig::default()
        });
        player.create_node(&pose(0.0, 0.0, 40.0));
        player.create_node(&pose(1.0, 0.2, 50.0));
        player.toggle();

        // Forward a little, then scrub hard backward.
        player.advance(0.4, 1.0);
        let sample = player.advance(5.0, -1.0);

        assert!((sample.position - pose(0.0, 0.0, 40.0).position).norm() < 1e-6);
        assert_eq!(player.current_time, 0.0);
    }

    #[test]
    fn test_manual_control_scales_time() {
        let mut player = TrackPlayer::new();
        player.apply_config(&TrackConfig {
            node_time_span: 1.0,
            manual_play: true,
            ..TrackConfig::default()
        });
        player.create_node(&pose(0.0, 0.0, 40.0));
        player.create_node(&pose(1.0, 0.2, 50.0));
        player.toggle();

        // Zero control: time stands still at the start pose.
        let sample = player.advance(10.0, 0.0);
        assert!((sample.position - pose(0.0, 0.0, 40.0).position).norm() < 1e-6);
    }

    #[test]
    fn test_regenerate_geometry_preserves_cursor() {
        let mut player = three_node_player();
        player.toggle();
        player.advance(1.0, 0.0);
        let cursor = (player.current_node, player.current_time);

        player.regenerate_geometry();
        assert_eq!((player.current_node, player.current_time), cursor);
        assert!(!player.geometry().is_empty());
    }

    #[test]
    fn test_geometry_cleared_below_two_nodes() {
        let mut player = three_node_player();
        assert!(!player.geometry().is_empty());
        player.delete_node();
        player.delete_node();
        assert!(player.geometry().is_empty());
    }

    #[test]
    fn test_track_list_never_empty() {
        let mut player = TrackPlayer::new();
        player.delete_track();
        assert_eq!(player.track_count(), 1);

        player.create_track();
        assert_eq!(player.selected_track().name, "Track #2");
        player.delete_track();
        assert_eq!(player.track_count(), 1);
        assert_eq!(player.selected_track().name, "Track #1");
    }

    #[test]
    fn test_load_rejects_tampered_timestamps() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut player = three_node_player();
        player.save_selected(file.path()).unwrap();

        // A huge timestamp would stall the display-geometry resampling
        // loop; the file must be refused outright.
        let tampered = fs::read_to_string(file.path())
            .unwrap()
            .replace("\"timestamp\": 2.0", "\"timestamp\": 1e9");
        fs::write(file.path(), tampered).unwrap();

        assert!(matches!(
            player.load_track(file.path()),
            Err(Error::InvalidTrack(_))
        ));
        assert_eq!(player.track_count(), 1);
    }

    #[test]
    fn test_load_rejects_out_of_order_timestamps() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let track = Track {
            name: "shuffled".to_string(),
            nodes: vec![
                TrackNode {
                    pose: pose(0.0, 0.0, 40.0),
                    timestamp: 1.0,
                },
                TrackNode {
                    pose: pose(1.0, 0.2, 50.0),
                    timestamp: 0.0,
                },
            ],
            geometry: PathGeometry::default(),
        };
        fs::write(file.path(), serde_json::to_string(&track).unwrap()).unwrap();

        let mut player = TrackPlayer::new();
        assert!(matches!(
            player.load_track(file.path()),
            Err(Error::InvalidTrack(_))
        ));
        assert_eq!(player.track_count(), 1);
    }

    #[test]
    fn test_track_json_roundtrip() {
        let file = tempfile::NamedTempFile::new().unwrap();

        let mut player = three_node_player();
        player.save_selected(file.path()).unwrap();
        player.load_track(file.path()).unwrap();

        assert_eq!(player.track_count(), 2);
        assert_eq!(
            player.selected_track().nodes,
            player.tracks[0].nodes.clone()
        );
    }
}
