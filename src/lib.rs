//! A sparse voxel octree with bounded-size transactional wire encoding.
//!
//! This library is organized into several crates:
//! - **core**: octal codes, octant geometry, colors, and the LOD policy
//! - **storage**: the arena-backed tree, tiered child storage, and change tracking
//! - **codec**: packet building, the tree bitstream encoder/decoder, and compression
//!   backends
//!
//! The usual flow: mutate a `VoxelTree` with `create_voxel` and `delete_voxel_at`, run
//! `reaverage_colors` after a batch, then stream it with `encode_tree_bitstream` into
//! `PacketBuilder`s, carrying the spillover in a `NodeWorkBag` between packets. The
//! receiving side replays each packet with `decode_tree_bitstream` into its own tree.

pub use voxtree_codec as codec;
pub use voxtree_core as core;
pub use voxtree_storage as storage;

pub mod prelude {
    pub use super::codec::prelude::*;
    pub use super::core::prelude::*;
    pub use super::storage::prelude::*;
}
