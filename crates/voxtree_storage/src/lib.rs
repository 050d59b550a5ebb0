//! Storage for sparse voxel octrees.
//!
//! The tree (`VoxelTree`) owns its nodes in a slab arena and addresses them with `NodeId`
//! keys; nodes hold their children in a capacity-tiered `ChildSlots` so that a tree of
//! millions of mostly-sparse nodes stays small. All structural operations go through the
//! tree, which maintains the structural invariants:
//!
//! - a colored leaf that must gain children first splits into 8 color-inheriting children
//!   and loses its own color
//! - 8 identical colored leaf children collapse back into one colored leaf
//! - an internal node's color is the density-weighted average of its colored children,
//!   visible only above a density threshold
//!
//! The `NodeWorkBag` is the de-duplicating worklist that drives incremental packet
//! encoding, and `TagInterner` is the injected owner/source tag interning service.

pub mod arena;
pub mod bag;
pub mod children;
pub mod interner;
pub mod node;
pub mod tree;

pub use arena::{NodeArena, NodeId};
pub use bag::NodeWorkBag;
pub use children::ChildSlots;
pub use interner::{Tag, TagInterner};
pub use node::VoxelNode;
pub use tree::{RayHit, VoxelTree, VISIBLE_ABOVE_DENSITY};

/// Hash map type for small keys like interned tags.
pub type SmallKeyHashMap<K, V> = ahash::AHashMap<K, V>;

pub mod prelude {
    pub use super::{
        ChildSlots, NodeArena, NodeId, NodeWorkBag, RayHit, Tag, TagInterner, VoxelNode,
        VoxelTree, VISIBLE_ABOVE_DENSITY,
    };
}
