use crate::TREE_SCALE;

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// The maximum distance at which nodes of tree depth `level` are near enough to matter.
/// Each level halves the boundary: finer cells must be closer to be worth sending or
/// rendering.
#[inline]
pub fn boundary_distance_for_level(level: u32, size_scale: f32) -> f32 {
    size_scale / 2.0f32.powi(level as i32)
}

/// Default scale-to-distance ratio. At this setting a cell of the universe's edge length
/// stays visible out to 400 universe widths, which keeps several levels of detail in
/// range at typical viewing distances.
pub const DEFAULT_LOD_SIZE_SCALE: f32 = TREE_SCALE * 400.0;

/// Scale-to-distance policy for LOD decisions. `level_adjust` biases every node's
/// effective level, trading resolution for bandwidth.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct LodPolicy {
    pub size_scale: f32,
    pub level_adjust: u32,
}

impl Default for LodPolicy {
    fn default() -> Self {
        Self {
            size_scale: DEFAULT_LOD_SIZE_SCALE,
            level_adjust: 0,
        }
    }
}

impl LodPolicy {
    #[inline]
    pub fn boundary_distance(&self, level: u32) -> f32 {
        boundary_distance_for_level(level + self.level_adjust, self.size_scale)
    }
}

/// The consumer's eye point, in world units.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct Viewer {
    pub position: Vec3,
}

impl Viewer {
    #[inline]
    pub fn new(position: Vec3) -> Self {
        Self { position }
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
