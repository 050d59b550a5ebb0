//! The core data types for addressing and measuring a sparse voxel octree:
//! - `OctalCode`: the path from the root to a node, one 3-bit digit per level
//! - `Cube`: the axis-aligned bounds of a node's octant
//! - `Color3`: RGB voxel content
//! - `LodPolicy`: the scale-to-distance policy for render decisions

pub mod color;
pub mod cube;
pub mod octal_code;
pub mod view;

pub use color::Color3;
pub use cube::Cube;
pub use octal_code::OctalCode;
pub use view::{boundary_distance_for_level, LodPolicy, Viewer, DEFAULT_LOD_SIZE_SCALE};

pub use glam;

/// Edge length of the cubic universe in world units. Only used to convert the normalized
/// [0,1] coordinates that octal codes address into display units.
pub const TREE_SCALE: f32 = 16384.0;

/// Deepest octal code the tree will address. At this depth a cell is `1 / 2^128` of the
/// universe, far below any useful resolution; it exists to reject malformed input.
pub const MAX_TREE_DEPTH: usize = 128;

/// Recursion ceiling for tree walks. A well-formed tree never gets near this; hitting it
/// means the tree is malformed (or cyclic) and the operation must abort with a diagnostic
/// instead of overflowing the stack.
pub const DANGEROUSLY_DEEP_RECURSION: usize = 200;

pub mod prelude {
    pub use super::{
        boundary_distance_for_level, Color3, Cube, LodPolicy, OctalCode, Viewer, TREE_SCALE,
    };
}
