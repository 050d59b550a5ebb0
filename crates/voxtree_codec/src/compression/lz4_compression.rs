use super::BytesCompression;

use serde::{Deserialize, Serialize};

/// The [LZ4 compression algorithm](https://en.wikipedia.org/wiki/LZ4_(compression_algorithm)).
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct Lz4 {
    /// The compression level, from 0 to 10. 0 is fastest and least aggressive. 10 is slowest and
    /// most aggressive.
    pub level: u32,
}

impl BytesCompression for Lz4 {
    fn compress_bytes(&self, bytes: &[u8], compressed_bytes: impl std::io::Write) {
        let mut encoder = lz4::EncoderBuilder::new()
            .level(self.level)
            .build(compressed_bytes)
            .unwrap();
        std::io::copy(&mut std::io::Cursor::new(bytes), &mut encoder).unwrap();
        let (_output, _result) = encoder.finish();
    }

    fn decompress_bytes(
        compressed_bytes: &[u8],
        bytes: &mut impl std::io::Write,
    ) -> std::io::Result<()> {
        let mut decoder = lz4::Decoder::new(compressed_bytes)?;
        let decompressed_len = std::io::copy(&mut decoder, bytes)?;
        // The decoder defers some frame validation until the stream is finished.
        let (_input, result) = decoder.finish();
        result?;
        if decompressed_len == 0 && !compressed_bytes.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "compressed stream decoded to nothing",
            ));
        }

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
    fn compress_and_decompress_round_trip() {
        let bytes: Vec<u8> = (0u8..100).collect();

        let mut compressed_bytes = Vec::new();
        Lz4 { level: 10 }.compress_bytes(&bytes, &mut compressed_bytes);
        let mut decompressed_bytes = Vec::new();
        Lz4::decompress_bytes(&compressed_bytes, &mut decompressed_bytes).unwrap();

        assert_eq!(bytes, decompressed_bytes);
    }

    #[test]
    fn garbage_input_reports_an_error() {
        let mut decompressed_bytes = Vec::new();
        assert!(Lz4::decompress_bytes(&[0xDE, 0xAD, 0xBE, 0xEF], &mut decompressed_bytes).is_err());
    }
}
