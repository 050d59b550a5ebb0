#[cfg(feature = "lz4")]
mod lz4_compression;
#[cfg(feature = "snap")]
mod snappy_compression;

#[cfg(feature = "lz4")]
pub use lz4_compression::Lz4;
#[cfg(feature = "snap")]
pub use snappy_compression::Snappy;

use serde::{Deserialize, Serialize};

/// A compression algorithm that acts directly on a slice of bytes.
///
/// Compressing our own well-formed buffers into a `Vec` cannot meaningfully fail, but
/// decompression runs on bytes off the network, so it must report malformed input instead
/// of panicking.
pub trait BytesCompression {
    fn compress_bytes(&self, bytes: &[u8], compressed_bytes: impl std::io::Write);
    fn decompress_bytes(
        compressed_bytes: &[u8],
        bytes: &mut impl std::io::Write,
    ) -> std::io::Result<()>;
}

/// The identity "compression". Lets the same packet pipeline run without any compression
/// backend compiled in.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct NoCompression;

impl BytesCompression for NoCompression {
    fn compress_bytes(&self, bytes: &[u8], mut compressed_bytes: impl std::io::Write) {
        let _ = std::io::copy(
            &mut std::io::Cursor::new(bytes),
            &mut compressed_bytes,
        );
    }

    fn decompress_bytes(
        compressed_bytes: &[u8],
        bytes: &mut impl std::io::Write,
    ) -> std::io::Result<()> {
        std::io::copy(&mut std::io::Cursor::new(compressed_bytes), bytes)?;

        Ok(())
    }
}

// ████████╗███████╗███████╗████████╗███████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝
//    ██║   █████╗  ███████╗   ██║   ███████╗
//    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║
//    ██║   ███████╗███████║   ██║   ███████║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_compression_is_the_identity() {
        let bytes: Vec<u8> = (0u8..100).collect();

        let mut compressed_bytes = Vec::new();
        NoCompression.compress_bytes(&bytes, &mut compressed_bytes);
        assert_eq!(bytes, compressed_bytes);

        let mut decompressed_bytes = Vec::new();
        NoCompression::decompress_bytes(&compressed_bytes, &mut decompressed_bytes).unwrap();
        assert_eq!(bytes, decompressed_bytes);
    }
}
