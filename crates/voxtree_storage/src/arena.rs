use crate::VoxelNode;

use serde::{Deserialize, Serialize};
use slab::Slab;

/// Key into the node arena. Nodes reference their children by id rather than by pointer,
/// so child storage stays compact and the tree can be moved or serialized freely.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct NodeId(u32);

impl NodeId {
    /// Sentinel for unfilled inline slots. Never stored in a presence mask's slots.
    pub const NULL: Self = Self(u32::MAX);

    #[inline]
    pub fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Owns every `VoxelNode` in one tree. Also keeps running node/leaf counters; they are
/// observability numbers, not correctness-critical.
#[derive(Debug, Default)]
pub struct NodeArena {
    nodes: Slab<VoxelNode>,
    leaf_count: usize,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, which is always born a leaf.
    pub fn insert(&mut self, node: VoxelNode) -> NodeId {
        debug_assert!(node.is_leaf());
        self.leaf_count += 1;

        NodeId::from_index(self.nodes.insert(node))
    }

    pub fn remove(&mut self, id: NodeId) -> Option<VoxelNode> {
        let node = self.nodes.try_remove(id.index())?;
        if node.is_leaf() {
            self.leaf_count -= 1;
        }

        Some(node)
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&VoxelNode> {
        self.nodes.get(id.index())
    }

    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut VoxelNode> {
        self.nodes.get_mut(id.index())
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// The tree calls these when a node crosses the leaf/internal boundary, since the
    /// arena can't observe child mutations itself.
    pub(crate) fn note_became_internal(&mut self) {
        self.leaf_count = self.leaf_count.saturating_sub(1);
    }

    pub(crate) fn note_became_leaf(&mut self) {
        self.leaf_count += 1;
    }
}
