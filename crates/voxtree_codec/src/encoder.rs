use crate::compression::BytesCompression;
use crate::packet::PacketBuilder;

use voxtree_core::{Color3, LodPolicy, Viewer, DANGEROUSLY_DEEP_RECURSION, TREE_SCALE};
use voxtree_storage::{NodeId, NodeWorkBag, VoxelTree};

use tracing::warn;

/// Controls what an encode pass puts on the wire.
///
/// With no `viewer` every colored node is a candidate, which is the full-replication
/// configuration. With a viewer, LOD boundaries prune both colors and descent.
/// `changed_since` restricts the pass to subtrees stamped after the given change-clock
/// reading, for delta updates to an already-synchronized consumer.
#[derive(Clone, Copy, Debug)]
pub struct EncodeParams {
    pub viewer: Option<Viewer>,
    pub lod: LodPolicy,
    pub max_levels: usize,
    pub changed_since: Option<u64>,
}

impl Default for EncodeParams {
    fn default() -> Self {
        Self {
            viewer: None,
            lod: LodPolicy::default(),
            max_levels: usize::MAX,
            changed_since: None,
        }
    }
}

/// Encode the subtree rooted at `start` into `packet`, one
/// `[colorMask][colors..][childMask]` section per visited node.
///
/// Whatever does not fit is put in `bag` to be encoded into a later packet: a pruned
/// child gets its bit cleared from the already-written child mask, and a node whose own
/// level section cannot fit rolls the whole subtree section back. Returns the number of
/// colored nodes whose colors were appended.
pub fn encode_tree_bitstream<B: BytesCompression>(
    tree: &VoxelTree,
    start: NodeId,
    params: &EncodeParams,
    packet: &mut PacketBuilder<B>,
    bag: &mut NodeWorkBag,
) -> usize {
    let code = match tree.node(start) {
        Some(node) => node.code().clone(),
        None => return 0,
    };

    if !packet.start_subtree(Some(&code)) {
        bag.insert(code, start);
        return 0;
    }

    match encode_recursion(tree, start, params, packet, bag, 0) {
        Some(appended) => {
            packet.end_subtree();
            appended
        }
        None => {
            packet.discard_subtree();
            bag.insert(code, start);
            0
        }
    }
}

/// Whether this node is near enough that its subtree is worth descending into at all.
fn subtree_in_range(tree: &VoxelTree, id: NodeId, params: &EncodeParams) -> bool {
    let viewer = match &params.viewer {
        Some(v) => v,
        None => return true,
    };
    let node = match tree.node(id) {
        Some(n) => n,
        None => return false,
    };

    let cube = node.code().octant().scaled(TREE_SCALE);
    let level = node.code().depth() as u32;

    cube.furthest_distance_from(viewer.position) <= params.lod.boundary_distance(level)
}

fn encode_recursion<B: BytesCompression>(
    tree: &VoxelTree,
    parent: NodeId,
    params: &EncodeParams,
    packet: &mut PacketBuilder<B>,
    bag: &mut NodeWorkBag,
    depth: usize,
) -> Option<usize> {
    if depth > DANGEROUSLY_DEEP_RECURSION {
        warn!(depth, "encode_tree_bitstream hit the recursion ceiling, bailing");
        return Some(0);
    }
    let node = match tree.node(parent) {
        Some(n) => n,
        None => return Some(0),
    };

    let mut color_mask = 0u8;
    let mut colors: Vec<Color3> = Vec::new();
    let mut child_tree_mask = 0u8;
    let mut to_recurse: Vec<(u8, NodeId)> = Vec::new();

    for i in 0..8 {
        let child_id = match node.get_child(i) {
            Some(c) => c,
            None => continue,
        };
        let child = match tree.node(child_id) {
            Some(c) => c,
            None => continue,
        };

        // Ancestors are stamped on every descendant change, so one stamp check covers
        // the whole subtree.
        if let Some(since) = params.changed_since {
            if !child.has_changed_since(since) {
                continue;
            }
        }

        let colored_here = match &params.viewer {
            Some(viewer) => tree.should_render(child_id, viewer, &params.lod),
            None => child.is_colored(),
        };
        if colored_here {
            if let Some(color) = child.color() {
                color_mask |= 1 << i;
                colors.push(color);
            }
        }

        if !child.is_leaf()
            && depth + 1 < params.max_levels
            && subtree_in_range(tree, child_id, params)
        {
            child_tree_mask |= 1 << i;
            to_recurse.push((i, child_id));
        }
    }

    let checkpoint = packet.start_level();

    if !packet.append_bitmask(color_mask) {
        packet.discard_level(checkpoint);
        return None;
    }
    let mut appended = 0usize;
    for color in colors {
        if !packet.append_color(color) {
            packet.discard_level(checkpoint);
            return None;
        }
        appended += 1;
    }

    let tree_mask_at = packet.bytes_in_use();
    if !packet.append_bitmask(child_tree_mask) {
        packet.discard_level(checkpoint);
        return None;
    }

    let mut surviving_mask = child_tree_mask;
    for (i, child_id) in to_recurse {
        match encode_recursion(tree, child_id, params, packet, bag, depth + 1) {
            Some(count) => appended += count,
            None => {
                // The child's section rolled back; un-promise it and send it later.
                surviving_mask &= !(1 << i);
                packet.update_prior_bitmask(tree_mask_at, surviving_mask);
                if let Some(child) = tree.node(child_id) {
                    bag.insert(child.code().clone(), child_id);
                }
            }
        }
    }

    if !packet.end_level(checkpoint) {
        return None;
    }

    Some(appended)
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

    use crate::decoder::decode_tree_bitstream;

    use voxtree_core::glam::Vec3;

    const RED: Color3 = Color3::new(255, 0, 0);
    const GREEN: Color3 = Color3::new(0, 255, 0);
    const BLUE: Color3 = Color3::new(0, 0, 255);

    fn sample_tree() -> VoxelTree {
        let mut tree = VoxelTree::default();
        tree.create_voxel(0.1, 0.1, 0.1, 0.25, RED, false);
        tree.create_voxel(0.8, 0.1, 0.6, 0.25, GREEN, false);
        tree.create_voxel(0.3, 0.7, 0.2, 0.125, BLUE, false);
        tree
    }

    fn assert_same_colors(a: &VoxelTree, b: &VoxelTree) {
        for &(x, y, z, s) in &[
            (0.1, 0.1, 0.1, 0.25),
            (0.8, 0.1, 0.6, 0.25),
            (0.3, 0.7, 0.2, 0.125),
        ] {
            let expected = a
                .find_node_at(x, y, z, s)
                .and_then(|id| a.node(id))
                .and_then(|n| n.color());
            let actual = b
                .find_node_at(x, y, z, s)
                .and_then(|id| b.node(id))
                .and_then(|n| n.color());
            assert_eq!(expected, actual);
        }
    }

    #[test]
    fn encode_decode_round_trip_in_one_packet() {
        let src = sample_tree();
        let mut packet = PacketBuilder::uncompressed(1024);
        let mut bag = NodeWorkBag::new();

        let appended = encode_tree_bitstream(
            &src,
            src.root_id(),
            &EncodeParams::default(),
            &mut packet,
            &mut bag,
        );
        assert_eq!(appended, 3);
        assert!(bag.is_empty());

        let mut dst = VoxelTree::default();
        let outcome =
            decode_tree_bitstream(&mut dst, packet.finalized_data().unwrap(), None).unwrap();
        assert_eq!(outcome.created.len(), 3);
        assert_same_colors(&src, &dst);
    }

    #[test]
    fn overflow_spills_into_the_bag_and_later_packets() {
        let src = sample_tree();
        let mut dst = VoxelTree::default();
        let mut bag = NodeWorkBag::new();

        let root_code = src.node(src.root_id()).unwrap().code().clone();
        bag.insert(root_code, src.root_id());

        // Packets this small force multiple rounds; every round must make progress.
        let mut rounds = 0;
        while let Some((_, id)) = bag.extract() {
            rounds += 1;
            assert!(rounds < 64, "encoding is not making progress");

            let mut packet = PacketBuilder::uncompressed(16);
            encode_tree_bitstream(&src, id, &EncodeParams::default(), &mut packet, &mut bag);
            if !packet.is_empty() {
                decode_tree_bitstream(&mut dst, packet.finalized_data().unwrap(), None)
                    .unwrap();
            }
        }

        assert!(rounds > 1, "expected the sample tree to span packets");
        assert_same_colors(&src, &dst);
    }

    #[test]
    fn delta_pass_skips_unchanged_subtrees() {
        let mut src = VoxelTree::default();
        src.create_voxel(0.1, 0.1, 0.1, 0.25, RED, false);
        let synced_at = src.change_clock();
        src.create_voxel(0.8, 0.1, 0.6, 0.25, GREEN, false);

        let params = EncodeParams {
            changed_since: Some(synced_at),
            ..EncodeParams::default()
        };
        let mut packet = PacketBuilder::uncompressed(1024);
        let mut bag = NodeWorkBag::new();
        encode_tree_bitstream(&src, src.root_id(), &params, &mut packet, &mut bag);

        let mut dst = VoxelTree::default();
        decode_tree_bitstream(&mut dst, packet.finalized_data().unwrap(), None).unwrap();

        let green = dst
            .find_node_at(0.8, 0.1, 0.6, 0.25)
            .and_then(|id| dst.node(id))
            .and_then(|n| n.color());
        assert_eq!(green, Some(GREEN));
        assert!(dst.find_node_at(0.1, 0.1, 0.1, 0.25).is_none());
    }

    #[test]
    fn distant_viewer_prunes_everything() {
        let src = sample_tree();
        let lod = LodPolicy::default();
        // Far beyond the coarsest boundary distance.
        let params = EncodeParams {
            viewer: Some(Viewer::new(Vec3::splat(-4.0 * lod.size_scale))),
            lod,
            ..EncodeParams::default()
        };

        let mut packet = PacketBuilder::uncompressed(1024);
        let mut bag = NodeWorkBag::new();
        let appended =
            encode_tree_bitstream(&src, src.root_id(), &params, &mut packet, &mut bag);
        assert_eq!(appended, 0);
        assert!(bag.is_empty());
    }

    #[test]
    fn near_viewer_includes_everything() {
        let src = sample_tree();
        let params = EncodeParams {
            viewer: Some(Viewer::new(Vec3::splat(0.0))),
            ..EncodeParams::default()
        };

        let mut packet = PacketBuilder::uncompressed(1024);
        let mut bag = NodeWorkBag::new();
        let appended =
            encode_tree_bitstream(&src, src.root_id(), &params, &mut packet, &mut bag);
        assert_eq!(appended, 3);
    }

    #[test]
    fn max_levels_caps_descent() {
        let src = sample_tree();
        let params = EncodeParams {
            max_levels: 1,
            ..EncodeParams::default()
        };

        let mut packet = PacketBuilder::uncompressed(1024);
        let mut bag = NodeWorkBag::new();
        let appended =
            encode_tree_bitstream(&src, src.root_id(), &params, &mut packet, &mut bag);
        // Nothing is colored at depth 1 in the sample tree.
        assert_eq!(appended, 0);
    }
}
