//! Wire encoding for sparse voxel octrees under a hard per-packet byte budget.
//!
//! The `PacketBuilder` is an append-only buffer with transactional subtree and level
//! sections; the encoder walks a `VoxelTree` emitting one `[colorMask][colors..]
//! [childMask]` section per node, rolling back and re-queueing (via the `NodeWorkBag`)
//! whatever does not fit. The decoder replays those sections into another tree. Packet
//! payloads can optionally pass through an LZ4 or Snappy `BytesCompression` backend,
//! re-checked lazily so compression cost stays off the per-append path.

pub mod compression;
pub mod decoder;
pub mod encoder;
pub mod packet;

pub use compression::{BytesCompression, NoCompression};
pub use decoder::{decode_tree_bitstream, DecodeOutcome, VoxelDetail};
pub use encoder::{encode_tree_bitstream, EncodeParams};
pub use packet::{
    CategoryCounters, LevelCheckpoint, PacketBuilder, DEFAULT_PACKET_CONTENT_BYTES,
    MTU_BYTES, PACKET_HEADER_BYTES,
};

#[cfg(feature = "lz4")]
pub use compression::Lz4;
#[cfg(feature = "snap")]
pub use compression::Snappy;

pub mod prelude {
    pub use super::{
        decode_tree_bitstream, encode_tree_bitstream, BytesCompression, DecodeOutcome,
        EncodeParams, NoCompression, PacketBuilder, VoxelDetail,
    };

    #[cfg(feature = "lz4")]
    pub use super::Lz4;
    #[cfg(feature = "snap")]
    pub use super::Snappy;
}
