//! Geometry handoff to the overlay renderer.
//!
//! The core owns the sampled path data; the renderer collaborator owns
//! the GPU resources built from it.

use nalgebra::Matrix4;

use crate::error::Result;

/// Line-list geometry sampled from a camera track.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathGeometry {
    pub vertices: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
    last_polyline: Option<u32>,
}

impl PathGeometry {
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
        self.last_polyline = None;
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    fn push_vertex(&mut self, position: [f32; 3]) -> u32 {
        self.vertices.push(position);
        (self.vertices.len() - 1) as u32
    }

    /// Append a vertex connected to the previous polyline vertex.
    /// Interleaved tick segments do not break the chain.
    pub fn push_polyline_point(&mut self, position: [f32; 3]) {
        let index = self.push_vertex(position);
        if let Some(previous) = self.last_polyline.replace(index) {
            self.indices.push(previous);
            self.indices.push(index);
        }
    }

    /// Append a standalone segment between two points.
    pub fn push_segment(&mut self, a: [f32; 3], b: [f32; 3]) {
        let ia = self.push_vertex(a);
        let ib = self.push_vertex(b);
        self.indices.push(ia);
        self.indices.push(ib);
    }
}

/// Drawing collaborator. Implemented by the host-side overlay; the core
/// only requests buffer uploads and draws.
pub trait OverlayRenderer {
    /// (Re)create vertex/index buffers for the current track path.
    fn upload_path(&mut self, geometry: &PathGeometry) -> Result<()>;

    /// Draw the uploaded path lines.
    fn draw_path(&mut self) -> Result<()>;

    /// Draw a keyframe marker at each node transform.
    fn draw_node_markers(&mut self, transforms: &[Matrix4<f32>]) -> Result<()>;
}
