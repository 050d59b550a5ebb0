use crate::{Cube, MAX_TREE_DEPTH};

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one node of an octree as the path from the root: one digit in `[0..7]` per
/// level, selecting which child was descended into. The empty code is the root. A node at
/// depth `d` spans a cell of edge length `1 / 2^d` in normalized universe units.
///
/// Digit bit layout is `0bZYX`: bit 0 selects the upper half in x, bit 1 in y, bit 2 in z.
///
/// The derived ordering is lexicographic over the digit sequence with shallow digits most
/// significant, which is the ordering the work bag sorts by.
#[derive(Clone, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct OctalCode {
    digits: Vec<u8>,
}

impl OctalCode {
    pub const ROOT: Self = Self { digits: Vec::new() };

    /// Build a code directly from digits. Returns `None` if any digit is out of range or
    /// the code is deeper than `MAX_TREE_DEPTH`.
    pub fn from_digits(digits: &[u8]) -> Option<Self> {
        if digits.len() > MAX_TREE_DEPTH || digits.iter().any(|&d| d > 7) {
            return None;
        }

        Some(Self {
            digits: digits.to_vec(),
        })
    }

    /// The code of the cell containing `(x, y, z)` at cell size `scale`, all in normalized
    /// [0,1] universe units. The depth is however many halvings it takes to reach `scale`.
    /// Returns `None` for coordinates outside the universe or a non-positive scale.
    pub fn from_point(x: f32, y: f32, z: f32, scale: f32) -> Option<Self> {
        if !(0.0..1.0).contains(&x) || !(0.0..1.0).contains(&y) || !(0.0..1.0).contains(&z) {
            return None;
        }
        if scale <= 0.0 || scale > 1.0 {
            return None;
        }

        let mut digits = Vec::new();
        let mut min = Vec3::ZERO;
        let mut edge = 1.0f32;

        // Tiny epsilon so a scale of exactly 1/2^d stops at depth d despite float drift.
        while edge > scale * 1.000_01 {
            if digits.len() >= MAX_TREE_DEPTH {
                return None;
            }
            edge *= 0.5;

            let mut digit = 0u8;
            if x >= min.x + edge {
                digit |= 1;
                min.x += edge;
            }
            if y >= min.y + edge {
                digit |= 2;
                min.y += edge;
            }
            if z >= min.z + edge {
                digit |= 4;
                min.z += edge;
            }
            digits.push(digit);
        }

        Some(Self { digits })
    }

    /// Tree depth; the root has depth 0.
    #[inline]
    pub fn depth(&self) -> usize {
        self.digits.len()
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.digits.is_empty()
    }

    #[inline]
    pub fn digit(&self, level: usize) -> Option<u8> {
        self.digits.get(level).copied()
    }

    #[inline]
    pub fn digits(&self) -> &[u8] {
        &self.digits
    }

    /// The code of child `index` of this node.
    pub fn child(&self, index: u8) -> Self {
        debug_assert!(index < 8);
        let mut digits = self.digits.clone();
        digits.push(index & 7);

        Self { digits }
    }

    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }

        Some(Self {
            digits: self.digits[..self.digits.len() - 1].to_vec(),
        })
    }

    /// `true` iff `other` is this code or lies in this code's subtree.
    pub fn contains(&self, other: &Self) -> bool {
        other.digits.len() >= self.digits.len() && other.digits.starts_with(&self.digits)
    }

    /// Which of this node's children lies on the path toward `descendant`. `None` if
    /// `descendant` is not strictly below this node.
    pub fn branch_index_toward(&self, descendant: &Self) -> Option<u8> {
        if descendant.depth() <= self.depth() || !self.contains(descendant) {
            return None;
        }

        descendant.digit(self.depth())
    }

    /// The octant this code addresses, in normalized universe units.
    pub fn octant(&self) -> Cube {
        let mut min = Vec3::ZERO;
        let mut edge = 1.0f32;
        for &digit in &self.digits {
            edge *= 0.5;
            if digit & 1 != 0 {
                min.x += edge;
            }
            if digit & 2 != 0 {
                min.y += edge;
            }
            if digit & 4 != 0 {
                min.z += edge;
            }
        }

        Cube::new(min, edge)
    }

    /// Bytes this code occupies on the wire.
    #[inline]
    pub fn wire_len(&self) -> usize {
        Self::wire_len_for_depth(self.digits.len())
    }

    /// Wire size of a code with `depth` 3-bit sections: a count byte plus the packed digits.
    #[inline]
    pub fn wire_len_for_depth(depth: usize) -> usize {
        1 + (3 * depth + 7) / 8
    }

    /// Wire form: `[depth: u8][digits packed 3 bits each, MSB first]`. The root is the
    /// single byte 0.
    pub fn to_wire_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; self.wire_len()];
        bytes[0] = self.digits.len() as u8;

        let mut bit_pos = 0usize;
        for &digit in &self.digits {
            for shift in (0..3).rev() {
                if digit & (1 << shift) != 0 {
                    bytes[1 + bit_pos / 8] |= 0x80 >> (bit_pos % 8);
                }
                bit_pos += 1;
            }
        }

        bytes
    }

    /// Parse a wire-form code from the front of `bytes`. Returns the code and how many
    /// bytes it consumed, or `None` if the buffer is truncated or the depth is absurd.
    pub fn from_wire_bytes(bytes: &[u8]) -> Option<(Self, usize)> {
        let &depth_byte = bytes.first()?;
        let depth = depth_byte as usize;
        if depth > MAX_TREE_DEPTH {
            return None;
        }

        let wire_len = Self::wire_len_for_depth(depth);
        if bytes.len() < wire_len {
            return None;
        }

        let mut digits = Vec::with_capacity(depth);
        let mut bit_pos = 0usize;
        for _ in 0..depth {
            let mut digit = 0u8;
            for shift in (0..3).rev() {
                if bytes[1 + bit_pos / 8] & (0x80 >> (bit_pos % 8)) != 0 {
                    digit |= 1 << shift;
                }
                bit_pos += 1;
            }
            digits.push(digit);
        }

        Some((Self { digits }, wire_len))
    }
}

impl fmt::Debug for OctalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OctalCode[")?;
        for (i, d) in self.digits.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
