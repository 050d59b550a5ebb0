use voxtree_core::{Color3, OctalCode, DANGEROUSLY_DEEP_RECURSION, TREE_SCALE};
use voxtree_storage::{NodeId, VoxelTree};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// One decoded voxel, in normalized [0,1] universe units.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct VoxelDetail {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub scale: f32,
    pub color: Color3,
}

impl VoxelDetail {
    pub fn from_code(code: &OctalCode, color: Color3) -> Self {
        let cube = code.octant();
        let min = cube.minimum();

        Self {
            x: min.x,
            y: min.y,
            z: min.z,
            scale: cube.edge_length(),
            color,
        }
    }

    /// Minimum corner in world units.
    pub fn world_minimum(&self) -> voxtree_core::glam::Vec3 {
        voxtree_core::glam::Vec3::new(self.x, self.y, self.z) * TREE_SCALE
    }

    /// Edge length in world units.
    pub fn world_edge_length(&self) -> f32 {
        self.scale * TREE_SCALE
    }
}

/// What one bitstream decode produced.
#[derive(Clone, Debug, Default)]
pub struct DecodeOutcome {
    /// Every voxel whose color was written, in stream order.
    pub created: Vec<VoxelDetail>,
    pub bytes_read: usize,
}

/// Apply one encoded subtree section to `tree`: parse the leading octal code, walk to
/// (and create) that node, then replay the `[colorMask][colors..][childMask]` sections.
///
/// `source` tags every written node with the producing remote's identifier. Returns
/// `None` on a malformed or truncated stream; whatever was applied before the bad byte
/// remains applied, matching the transactional guarantees of the *sender* (a sender
/// never emits a partial level, so a truncated stream means corruption in transit).
pub fn decode_tree_bitstream(
    tree: &mut VoxelTree,
    bytes: &[u8],
    source: Option<&str>,
) -> Option<DecodeOutcome> {
    let (code, consumed) = match OctalCode::from_wire_bytes(bytes) {
        Some(parsed) => parsed,
        None => {
            warn!("bitstream with truncated or malformed octal code");
            return None;
        }
    };
    let start = tree.create_missing_node(&code)?;

    let mut outcome = DecodeOutcome::default();
    let read = read_node_data(tree, start, &bytes[consumed..], source, &mut outcome, 0)?;
    outcome.bytes_read = consumed + read;

    Some(outcome)
}

fn read_node_data(
    tree: &mut VoxelTree,
    parent: NodeId,
    bytes: &[u8],
    source: Option<&str>,
    outcome: &mut DecodeOutcome,
    depth: usize,
) -> Option<usize> {
    if depth > DANGEROUSLY_DEEP_RECURSION {
        warn!(depth, "bitstream deeper than the recursion ceiling, dropping the rest");
        return None;
    }

    let mut at = 0usize;

    let &color_mask = bytes.get(at)?;
    at += 1;
    for i in 0..8 {
        if color_mask & (1 << i) == 0 {
            continue;
        }
        let rgb = bytes.get(at..at + 3)?;
        at += 3;
        let color = Color3::new(rgb[0], rgb[1], rgb[2]);

        let child = tree.add_child_at(parent, i)?;
        tree.set_node_color(child, Some(color));
        if let Some(name) = source {
            tree.set_node_source(child, name);
        }
        if let Some(node) = tree.node(child) {
            outcome.created.push(VoxelDetail::from_code(node.code(), color));
        }
    }

    let &child_tree_mask = bytes.get(at)?;
    at += 1;
    for i in 0..8 {
        if child_tree_mask & (1 << i) == 0 {
            continue;
        }
        let child = tree.add_child_at(parent, i)?;
        at += read_node_data(tree, child, &bytes[at..], source, outcome, depth + 1)?;
    }

    Some(at)
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

    const RED: Color3 = Color3::new(255, 0, 0);

    // A hand-built stream rooted at [2]: one colored child at slot 0, one descended
    // child at slot 1 that itself has a colored child at slot 7.
    fn hand_built_stream() -> Vec<u8> {
        let mut bytes = OctalCode::from_digits(&[2]).unwrap().to_wire_bytes();
        bytes.extend_from_slice(&[
            0b0000_0001, // colorMask: child 0
            255, 0, 0, // its color
            0b0000_0010, // childMask: descend into child 1
            0b1000_0000, // child 1's colorMask: child 7
            0, 255, 0, // its color
            0b0000_0000, // child 1's childMask: nothing deeper
        ]);
        bytes
    }

    #[test]
    fn decodes_a_hand_built_stream() {
        let mut tree = VoxelTree::default();
        let outcome = decode_tree_bitstream(&mut tree, &hand_built_stream(), None).unwrap();

        assert_eq!(outcome.created.len(), 2);
        assert_eq!(outcome.bytes_read, hand_built_stream().len());

        let red = tree
            .node_for_code(&OctalCode::from_digits(&[2, 0]).unwrap())
            .and_then(|id| tree.node(id))
            .and_then(|n| n.color());
        assert_eq!(red, Some(RED));

        let green = tree
            .node_for_code(&OctalCode::from_digits(&[2, 1, 7]).unwrap())
            .and_then(|id| tree.node(id))
            .and_then(|n| n.color());
        assert_eq!(green, Some(Color3::new(0, 255, 0)));
    }

    #[test]
    fn truncated_stream_is_rejected() {
        let bytes = hand_built_stream();
        for cut in 1..bytes.len() {
            let mut tree = VoxelTree::default();
            assert!(
                decode_tree_bitstream(&mut tree, &bytes[..cut], None).is_none(),
                "cut at {} should not decode",
                cut
            );
        }
    }

    #[test]
    fn source_tag_lands_on_written_nodes() {
        let mut tree = VoxelTree::default();
        decode_tree_bitstream(&mut tree, &hand_built_stream(), Some("server-a")).unwrap();

        let id = tree
            .node_for_code(&OctalCode::from_digits(&[2, 0]).unwrap())
            .unwrap();
        let tag = tree.node(id).unwrap().source().unwrap();
        assert_eq!(tree.interner().resolve(tag).as_deref(), Some("server-a"));
    }

    #[test]
    fn empty_input_is_rejected() {
        let mut tree = VoxelTree::default();
        assert!(decode_tree_bitstream(&mut tree, &[], None).is_none());
    }

    #[test]
    fn world_units_scale_from_normalized() {
        let detail = VoxelDetail::from_code(&OctalCode::from_digits(&[1]).unwrap(), RED);
        assert_eq!(detail.scale, 0.5);
        assert_eq!(detail.world_edge_length(), 0.5 * TREE_SCALE);
        assert_eq!(detail.world_minimum().x, 0.5 * TREE_SCALE);
        assert_eq!(detail.world_minimum().y, 0.0);
    }
}
