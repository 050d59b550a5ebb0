use crate::compression::{BytesCompression, NoCompression};

use voxtree_core::{Color3, OctalCode};

use tracing::warn;

/// Conservative MTU for the transports we care about.
pub const MTU_BYTES: usize = 1492;

/// Bytes the transport header occupies within the MTU.
pub const PACKET_HEADER_BYTES: usize = 12;

/// Default content budget for one packet.
pub const DEFAULT_PACKET_CONTENT_BYTES: usize = MTU_BYTES - PACKET_HEADER_BYTES;

/// Slack required between the compressed size and the target, absorbing growth from the
/// bytes appended after the last compressed-size check.
const COMPRESS_PADDING: usize = 15;

/// Compression is only re-run once this many new bytes have been appended since the last
/// check. Compressing after every level would dominate encode time.
const RECHECK_AFTER_BYTES: usize = 256;

/// Running totals of what the packet's bytes were spent on, for tuning and stats.
/// Checkpoint rollback restores these along with the byte cursor, so they always agree
/// with the actual buffer content.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CategoryCounters {
    pub code_bytes: usize,
    pub bitmask_bytes: usize,
    pub color_bytes: usize,
}

/// Where a level started, handed back by `start_level` so the level can be atomically
/// discarded. Opaque to callers.
#[derive(Clone, Copy, Debug)]
pub struct LevelCheckpoint {
    start_index: usize,
    bytes_reserved: usize,
    counters: CategoryCounters,
}

/// An append-only packet under construction, with transactional sections.
///
/// Two nesting granularities can be rolled back: a *subtree* (octal code plus everything
/// after it) and a *level* (one `[colorMask][colors..][childMask]` section). The budget
/// invariant holds at all times:
///
/// ```text
/// bytes_in_use + bytes_available + bytes_reserved == target_size
/// ```
///
/// With a compression backend the target applies to the compressed output; appends are
/// still budgeted uncompressed (compression only ever shrinks the payload here), and
/// `end_level` re-checks the compressed size lazily. Compression is likewise lazy on the
/// read side: `finalized_data` only compresses when appends have dirtied the buffer since
/// the last time.
pub struct PacketBuilder<B = NoCompression> {
    compression: Option<B>,
    target_size: usize,
    buffer: Vec<u8>,
    compressed: Vec<u8>,
    bytes_reserved: usize,
    counters: CategoryCounters,
    subtree_at: usize,
    reserved_at_subtree_start: usize,
    counters_at_subtree_start: CategoryCounters,
    bytes_in_use_last_check: usize,
    dirty: bool,
}

impl PacketBuilder<NoCompression> {
    /// A builder with no compression backend at all.
    pub fn uncompressed(target_size: usize) -> Self {
        Self::new(None, target_size)
    }
}

impl<B: BytesCompression> PacketBuilder<B> {
    pub fn new(compression: Option<B>, target_size: usize) -> Self {
        Self {
            compression,
            target_size,
            buffer: Vec::with_capacity(target_size),
            compressed: Vec::new(),
            bytes_reserved: 0,
            counters: CategoryCounters::default(),
            subtree_at: 0,
            reserved_at_subtree_start: 0,
            counters_at_subtree_start: CategoryCounters::default(),
            bytes_in_use_last_check: 0,
            dirty: false,
        }
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.compressed.clear();
        self.bytes_reserved = 0;
        self.counters = CategoryCounters::default();
        self.subtree_at = 0;
        self.reserved_at_subtree_start = 0;
        self.counters_at_subtree_start = CategoryCounters::default();
        self.bytes_in_use_last_check = 0;
        self.dirty = false;
    }

    #[inline]
    pub fn target_size(&self) -> usize {
        self.target_size
    }

    #[inline]
    pub fn bytes_in_use(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    pub fn bytes_reserved(&self) -> usize {
        self.bytes_reserved
    }

    #[inline]
    pub fn bytes_available(&self) -> usize {
        self.target_size - self.buffer.len() - self.bytes_reserved
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[inline]
    pub fn counters(&self) -> CategoryCounters {
        self.counters
    }

    /// The raw uncompressed content, for decoding after `load_finalized_content`.
    #[inline]
    pub fn content(&self) -> &[u8] {
        &self.buffer
    }

    // ── appending ───────────────────────────────────────────────────────────

    /// Append raw bytes if the budget allows. `false` leaves the packet unchanged.
    pub fn append_bytes(&mut self, bytes: &[u8]) -> bool {
        if bytes.len() > self.bytes_available() {
            return false;
        }
        self.buffer.extend_from_slice(bytes);
        self.dirty = true;

        true
    }

    pub fn append_bitmask(&mut self, mask: u8) -> bool {
        let appended = self.append_bytes(&[mask]);
        if appended {
            self.counters.bitmask_bytes += 1;
        }
        appended
    }

    pub fn append_color(&mut self, color: Color3) -> bool {
        let appended = self.append_bytes(&color.to_array());
        if appended {
            self.counters.color_bytes += 3;
        }
        appended
    }

    /// Rewrite a bitmask appended earlier, at the byte offset that `bytes_in_use`
    /// reported just before it was appended. Used to prune children whose subtrees
    /// failed to fit after the mask was already written.
    pub fn update_prior_bitmask(&mut self, offset: usize, mask: u8) -> bool {
        match self.buffer.get_mut(offset) {
            Some(byte) => {
                *byte = mask;
                self.dirty = true;
                true
            }
            None => {
                warn!(offset, "update_prior_bitmask offset out of range");
                false
            }
        }
    }

    /// Rewrite bytes appended earlier.
    pub fn update_prior_bytes(&mut self, offset: usize, bytes: &[u8]) -> bool {
        match self.buffer.get_mut(offset..offset + bytes.len()) {
            Some(slot) => {
                slot.copy_from_slice(bytes);
                self.dirty = true;
                true
            }
            None => {
                warn!(offset, "update_prior_bytes range out of range");
                false
            }
        }
    }

    // ── reservations ────────────────────────────────────────────────────────

    /// Set aside budget that later appends may not consume.
    pub fn reserve_bytes(&mut self, count: usize) -> bool {
        if count > self.bytes_available() {
            return false;
        }
        self.bytes_reserved += count;

        true
    }

    pub fn release_reserved_bytes(&mut self, count: usize) -> bool {
        if count > self.bytes_reserved {
            warn!(count, reserved = self.bytes_reserved, "releasing more than was reserved");
            return false;
        }
        self.bytes_reserved -= count;

        true
    }

    // ── subtree sections ────────────────────────────────────────────────────

    /// Begin a subtree section by appending its octal code (`None` means the root).
    /// `false` means the code itself did not fit; the packet is unchanged.
    pub fn start_subtree(&mut self, code: Option<&OctalCode>) -> bool {
        self.subtree_at = self.buffer.len();
        self.reserved_at_subtree_start = self.bytes_reserved;
        self.counters_at_subtree_start = self.counters;
        let wire = match code {
            Some(c) => c.to_wire_bytes(),
            None => vec![0],
        };

        let appended = self.append_bytes(&wire);
        if appended {
            self.counters.code_bytes += wire.len();
        }
        appended
    }

    /// Commit the current subtree section.
    pub fn end_subtree(&mut self) {
        self.subtree_at = self.buffer.len();
    }

    /// Roll the packet back to the state at `start_subtree`, including reservations and
    /// category accounting.
    pub fn discard_subtree(&mut self) {
        self.buffer.truncate(self.subtree_at);
        self.bytes_reserved = self.reserved_at_subtree_start;
        self.counters = self.counters_at_subtree_start;
        self.dirty = true;
    }

    // ── level sections ──────────────────────────────────────────────────────

    pub fn start_level(&mut self) -> LevelCheckpoint {
        LevelCheckpoint {
            start_index: self.buffer.len(),
            bytes_reserved: self.bytes_reserved,
            counters: self.counters,
        }
    }

    /// Roll the packet back to the state at the matching `start_level`: byte cursor,
    /// reservations, and category counters all restore to their checkpoint values.
    pub fn discard_level(&mut self, checkpoint: LevelCheckpoint) {
        self.buffer.truncate(checkpoint.start_index);
        self.bytes_reserved = checkpoint.bytes_reserved;
        self.counters = checkpoint.counters;
        self.dirty = true;
    }

    /// Commit a level. Under compression this is where the compressed size is
    /// re-checked; if the packet no longer fits its target the level is discarded and
    /// `false` is returned, and the caller must re-send that level in another packet.
    pub fn end_level(&mut self, checkpoint: LevelCheckpoint) -> bool {
        if self.compression.is_none() {
            return true;
        }
        let nearly_full = self.compressed.len() + COMPRESS_PADDING >= self.target_size;
        let enough_new_bytes =
            self.buffer.len() >= self.bytes_in_use_last_check + RECHECK_AFTER_BYTES;
        if !nearly_full && !enough_new_bytes {
            return true;
        }

        self.compress_now();
        if self.compressed.len() + COMPRESS_PADDING > self.target_size {
            self.discard_level(checkpoint);
            self.compress_now();
            self.bytes_in_use_last_check = self.buffer.len();
            return false;
        }
        self.bytes_in_use_last_check = self.buffer.len();

        true
    }

    // ── finalization ────────────────────────────────────────────────────────

    fn compress_now(&mut self) {
        if let Some(compression) = &self.compression {
            self.compressed.clear();
            compression.compress_bytes(&self.buffer, &mut self.compressed);
            self.dirty = false;
        }
    }

    /// The bytes to put on the wire: compressed if a backend is configured, raw
    /// otherwise. Compresses only if appends have happened since the last call. `None`
    /// means the compressed payload exceeds the target size; the caller must discard a
    /// level or subtree and retry with less content.
    pub fn finalized_data(&mut self) -> Option<&[u8]> {
        if self.compression.is_some() {
            if self.dirty {
                self.compress_now();
            }
            if self.compressed.len() > self.target_size {
                warn!(
                    compressed = self.compressed.len(),
                    target = self.target_size,
                    "finalized packet exceeds its target size"
                );
                return None;
            }
            Some(&self.compressed)
        } else {
            Some(&self.buffer)
        }
    }

    pub fn finalized_size(&mut self) -> Option<usize> {
        self.finalized_data().map(<[u8]>::len)
    }

    /// Replace this packet's content with received wire bytes, decompressing if a
    /// backend is configured. `false` means the input was malformed or larger than the
    /// target size; the packet is left empty.
    pub fn load_finalized_content(&mut self, bytes: &[u8]) -> bool {
        self.reset();
        match &self.compression {
            Some(_) => {
                let mut decompressed = Vec::new();
                if let Err(error) = B::decompress_bytes(bytes, &mut decompressed) {
                    warn!(%error, "dropping malformed compressed packet");
                    return false;
                }
                self.buffer = decompressed;
            }
            None => self.buffer.extend_from_slice(bytes),
        }
        if self.buffer.len() > self.target_size {
            warn!(
                content = self.buffer.len(),
                target = self.target_size,
                "dropping packet content larger than the target size"
            );
            self.reset();
            return false;
        }
        self.dirty = true;

        true
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    fn assert_budget<B: BytesCompression>(packet: &PacketBuilder<B>) {
        assert_eq!(
            packet.bytes_in_use() + packet.bytes_available() + packet.bytes_reserved(),
            packet.target_size()
        );
    }

    #[test]
    fn budget_invariant_holds_across_operations() {
        let mut packet = PacketBuilder::uncompressed(64);
        assert_budget(&packet);

        assert!(packet.append_bytes(&[1, 2, 3, 4]));
        assert_budget(&packet);

        assert!(packet.reserve_bytes(10));
        assert_budget(&packet);

        assert!(packet.append_bitmask(0xAB));
        assert_budget(&packet);

        assert!(packet.release_reserved_bytes(10));
        assert_budget(&packet);

        let checkpoint = packet.start_level();
        packet.append_color(Color3::new(1, 2, 3));
        packet.discard_level(checkpoint);
        assert_budget(&packet);
    }

    #[test]
    fn append_fails_cleanly_when_full() {
        let mut packet = PacketBuilder::uncompressed(4);
        assert!(packet.append_bytes(&[1, 2, 3]));
        assert!(!packet.append_bytes(&[4, 5]));
        assert_eq!(packet.bytes_in_use(), 3);
        assert!(packet.append_bytes(&[4]));
        assert!(!packet.append_bitmask(0xFF));
    }

    #[test]
    fn reservation_blocks_appends_until_released() {
        let mut packet = PacketBuilder::uncompressed(8);
        assert!(packet.reserve_bytes(6));
        assert!(!packet.append_bytes(&[0; 4]));
        assert!(packet.append_bytes(&[0; 2]));

        assert!(packet.release_reserved_bytes(6));
        assert!(packet.append_bytes(&[0; 4]));

        assert!(!packet.release_reserved_bytes(1));
    }

    #[test]
    fn reserve_beyond_budget_fails() {
        let mut packet = PacketBuilder::uncompressed(8);
        assert!(!packet.reserve_bytes(9));
        assert_eq!(packet.bytes_reserved(), 0);
    }

    #[test]
    fn discard_level_restores_exact_state() {
        let mut packet = PacketBuilder::uncompressed(64);
        packet.append_bytes(&[9, 9]);
        packet.reserve_bytes(3);

        let before = packet.counters();
        let checkpoint = packet.start_level();
        packet.append_bitmask(0x0F);
        packet.append_color(Color3::new(10, 20, 30));
        packet.reserve_bytes(2);
        packet.discard_level(checkpoint);

        assert_eq!(packet.bytes_in_use(), 2);
        assert_eq!(packet.bytes_reserved(), 3);
        assert_eq!(packet.content(), &[9, 9]);
        assert_eq!(packet.counters(), before);
    }

    #[test]
    fn category_counters_track_what_bytes_were_spent_on() {
        let mut packet = PacketBuilder::uncompressed(64);
        let code = OctalCode::from_digits(&[3, 1]).unwrap();
        assert!(packet.start_subtree(Some(&code)));
        packet.append_bitmask(0x01);
        packet.append_color(Color3::new(1, 2, 3));
        packet.append_bitmask(0x00);

        let counters = packet.counters();
        assert_eq!(counters.code_bytes, code.wire_len());
        assert_eq!(counters.bitmask_bytes, 2);
        assert_eq!(counters.color_bytes, 3);
        assert_eq!(
            counters.code_bytes + counters.bitmask_bytes + counters.color_bytes,
            packet.bytes_in_use()
        );

        packet.discard_subtree();
        assert_eq!(packet.counters(), CategoryCounters::default());
    }

    #[test]
    fn discard_subtree_rolls_back_code_and_content() {
        let mut packet = PacketBuilder::uncompressed(64);
        let code = OctalCode::from_digits(&[1, 2]).unwrap();
        assert!(packet.start_subtree(Some(&code)));
        packet.append_bitmask(0x01);
        packet.discard_subtree();
        assert!(packet.is_empty());

        // A committed subtree survives a later discard.
        assert!(packet.start_subtree(Some(&code)));
        packet.append_bitmask(0x01);
        packet.end_subtree();
        let committed = packet.bytes_in_use();
        assert!(packet.start_subtree(None));
        packet.discard_subtree();
        assert_eq!(packet.bytes_in_use(), committed);
    }

    #[test]
    fn update_prior_bitmask_rewrites_in_place() {
        let mut packet = PacketBuilder::uncompressed(16);
        packet.append_bytes(&[0xAA]);
        let at = packet.bytes_in_use();
        packet.append_bitmask(0xFF);
        packet.append_bytes(&[0xBB]);

        assert!(packet.update_prior_bitmask(at, 0x7F));
        assert_eq!(packet.content(), &[0xAA, 0x7F, 0xBB]);

        assert!(!packet.update_prior_bitmask(99, 0x00));
    }

    #[test]
    fn uncompressed_finalize_returns_appended_bytes() {
        let mut packet = PacketBuilder::uncompressed(16);
        packet.append_bytes(&[1, 2, 3]);
        assert_eq!(packet.finalized_data(), Some(&[1u8, 2, 3][..]));
        assert_eq!(packet.finalized_size(), Some(3));

        let mut receiver = PacketBuilder::uncompressed(16);
        assert!(receiver.load_finalized_content(&[1, 2, 3]));
        assert_eq!(receiver.content(), &[1, 2, 3]);
    }

    #[test]
    fn oversized_content_is_rejected_on_load() {
        let mut receiver = PacketBuilder::uncompressed(8);
        assert!(!receiver.load_finalized_content(&[0u8; 16]));
        assert!(receiver.is_empty());
        assert_eq!(receiver.bytes_available(), 8);
    }

    #[cfg(feature = "lz4")]
    mod lz4_tests {
        use super::*;
        use crate::compression::Lz4;

        use pretty_assertions::assert_eq;

        #[test]
        fn compressed_finalize_round_trips() {
            let mut packet = PacketBuilder::new(Some(Lz4 { level: 4 }), 256);
            let payload: Vec<u8> = std::iter::repeat(7u8).take(100).collect();
            assert!(packet.append_bytes(&payload));

            let wire = packet.finalized_data().unwrap().to_vec();
            assert!(wire.len() < payload.len());

            let mut receiver = PacketBuilder::new(Some(Lz4 { level: 4 }), 256);
            assert!(receiver.load_finalized_content(&wire));
            assert_eq!(receiver.content(), payload.as_slice());
        }

        #[test]
        fn finalize_is_lazy_until_dirtied() {
            let mut packet = PacketBuilder::new(Some(Lz4 { level: 4 }), 256);
            packet.append_bytes(&[1, 2, 3]);
            let first = packet.finalized_data().unwrap().to_vec();
            // No appends in between: same bytes without recompressing.
            assert_eq!(packet.finalized_data(), Some(first.as_slice()));

            packet.append_bytes(&[4]);
            let second = packet.finalized_data().unwrap().to_vec();
            assert_ne!(first, second);
        }

        #[test]
        fn oversized_compressed_payload_reports_failure() {
            // Incompressible bytes grow under compression; with fewer new bytes than
            // the end_level re-check threshold the overflow is only caught at
            // finalization, which must refuse to hand out an over-cap payload.
            let mut packet = PacketBuilder::new(Some(Lz4 { level: 4 }), 260);
            let mut state = 0x2545_f491_4f6c_dd1du64;
            let noise: Vec<u8> = (0..250)
                .map(|_| {
                    state = state
                        .wrapping_mul(6_364_136_223_846_793_005)
                        .wrapping_add(1_442_695_040_888_963_407);
                    (state >> 56) as u8
                })
                .collect();

            let checkpoint = packet.start_level();
            assert!(packet.append_bytes(&noise));
            assert!(packet.end_level(checkpoint));

            assert!(packet.finalized_data().is_none());
            assert!(packet.finalized_size().is_none());
        }

        #[test]
        fn malformed_compressed_content_is_rejected() {
            let mut receiver = PacketBuilder::new(Some(Lz4 { level: 4 }), 256);
            assert!(!receiver.load_finalized_content(&[0xDE, 0xAD, 0xBE, 0xEF]));
            assert!(receiver.is_empty());
        }
    }
}
