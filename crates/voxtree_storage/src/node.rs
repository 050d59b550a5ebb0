use crate::{ChildSlots, Tag};

use voxtree_core::{Color3, OctalCode};

/// One cell of the octree.
///
/// A node is a *leaf* iff it has no children, and *colored* iff it carries RGB content.
/// In steady state a node is never both colored and internal; the split operation clears
/// the parent's color the moment it gains children. `density` is the fraction of this
/// node's volume that is colored: 1.0 for colored leaves, an average of the children for
/// internal nodes.
#[derive(Clone, Debug)]
pub struct VoxelNode {
    code: OctalCode,
    pub(crate) children: ChildSlots,
    color: Option<Color3>,
    density: f32,
    last_changed: u64,
    owner: Option<Tag>,
    source: Option<Tag>,
}

impl VoxelNode {
    pub fn new(code: OctalCode) -> Self {
        Self {
            code,
            children: ChildSlots::Empty,
            color: None,
            density: 0.0,
            last_changed: 0,
            owner: None,
            source: None,
        }
    }

    /// The octal code identifying this node's position and size. Immutable for the node's
    /// lifetime.
    #[inline]
    pub fn code(&self) -> &OctalCode {
        &self.code
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    #[inline]
    pub fn is_colored(&self) -> bool {
        self.color.is_some()
    }

    /// Whether this node carries content worth sending. Today that is the same as being
    /// colored.
    #[inline]
    pub fn has_content(&self) -> bool {
        self.is_colored()
    }

    #[inline]
    pub fn color(&self) -> Option<Color3> {
        self.color
    }

    #[inline]
    pub fn density(&self) -> f32 {
        self.density
    }

    #[inline]
    pub fn last_changed(&self) -> u64 {
        self.last_changed
    }

    #[inline]
    pub fn has_changed_since(&self, time: u64) -> bool {
        self.last_changed > time
    }

    #[inline]
    pub fn child_mask(&self) -> u8 {
        self.children.mask()
    }

    #[inline]
    pub fn child_count(&self) -> u8 {
        self.children.count()
    }

    #[inline]
    pub fn get_child(&self, index: u8) -> Option<crate::NodeId> {
        self.children.get(index)
    }

    #[inline]
    pub fn owner(&self) -> Option<Tag> {
        self.owner
    }

    #[inline]
    pub fn source(&self) -> Option<Tag> {
        self.source
    }

    pub(crate) fn set_color(&mut self, color: Option<Color3>, density: f32) {
        self.color = color;
        self.density = density;
    }

    pub(crate) fn set_owner(&mut self, owner: Option<Tag>) {
        self.owner = owner;
    }

    pub(crate) fn set_source(&mut self, source: Option<Tag>) {
        self.source = source;
    }

    pub(crate) fn stamp(&mut self, clock: u64) {
        self.last_changed = clock;
    }
}
