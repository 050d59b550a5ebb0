use super::BytesCompression;

use serde::{Deserialize, Serialize};

/// The [Snappy compression algorithm](https://en.wikipedia.org/wiki/Snappy_(compression)).
/// Uses a pure Rust implementation, making it suitable for use with the WASM target.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct Snappy;

impl BytesCompression for Snappy {
    fn compress_bytes(&self, bytes: &[u8], compressed_bytes: impl std::io::Write) {
        let mut encoder = snap::write::FrameEncoder::new(compressed_bytes);
        std::io::copy(&mut std::io::Cursor::new(bytes), &mut encoder).unwrap();
        encoder.into_inner().expect("failed to flush the writer");
    }

    fn decompress_bytes(
        compressed_bytes: &[u8],
        bytes: &mut impl std::io::Write,
    ) -> std::io::Result<()> {
        let mut decoder = snap::read::FrameDecoder::new(compressed_bytes);
        std::io::copy(&mut decoder, bytes)?;

        Ok(())
    }
}

// ████████╗███████╗███████╗████████╗███████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝
//    ██║   █████╗  ███████╗   ██║   ███████╗
//    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║
//    ██║   ███████╗███████║   ██║   ███████║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝
