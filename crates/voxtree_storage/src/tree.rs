use crate::{NodeArena, NodeId, TagInterner, VoxelNode};

use voxtree_core::{
    Color3, LodPolicy, OctalCode, Viewer, DANGEROUSLY_DEEP_RECURSION, TREE_SCALE,
};

use glam::Vec3;
use std::sync::Arc;
use tracing::warn;

/// An averaged internal node is treated as colored only above this density. Below it,
/// sparse content rendered as a solid cell would look fatter at a distance than the real
/// geometry; the constant is tuned against that effect and must not drift.
pub const VISIBLE_ABOVE_DENSITY: f32 = 0.10;

/// A ray hit against a colored node, distance in normalized universe units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    pub node: NodeId,
    pub distance: f32,
}

/// A sparse octree of colored cells over the normalized [0,1] cubic universe.
///
/// The tree is the single owner of its nodes and the only mutator; callers needing
/// concurrent access wrap the whole tree in a reader/writer lock. Every structural
/// mutation bumps a monotonic change clock and stamps the path from the root, which is
/// what delta-sync and render-dirty tracking read.
pub struct VoxelTree {
    arena: NodeArena,
    root: NodeId,
    clock: u64,
    dirty: bool,
    interner: Arc<TagInterner>,
}

impl Default for VoxelTree {
    fn default() -> Self {
        Self::new(Arc::new(TagInterner::new()))
    }
}

impl VoxelTree {
    pub fn new(interner: Arc<TagInterner>) -> Self {
        let mut arena = NodeArena::new();
        let root = arena.insert(VoxelNode::new(OctalCode::ROOT));

        Self {
            arena,
            root,
            clock: 0,
            dirty: false,
            interner,
        }
    }

    #[inline]
    pub fn root_id(&self) -> NodeId {
        self.root
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&VoxelNode> {
        self.arena.get(id)
    }

    #[inline]
    pub fn interner(&self) -> &Arc<TagInterner> {
        &self.interner
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.arena.node_count()
    }

    #[inline]
    pub fn leaf_count(&self) -> usize {
        self.arena.leaf_count()
    }

    /// Whether anything has changed since `clear_dirty`.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    #[inline]
    pub fn change_clock(&self) -> u64 {
        self.clock
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.dirty = true;
        self.clock
    }

    // ── lookup ──────────────────────────────────────────────────────────────

    /// The node with exactly this code, if it exists.
    pub fn node_for_code(&self, code: &OctalCode) -> Option<NodeId> {
        let mut current = self.root;
        for level in 0..code.depth() {
            let digit = code.digit(level)?;
            current = self.arena.get(current)?.get_child(digit)?;
        }

        Some(current)
    }

    /// The deepest existing node on the path toward `code` (possibly the root).
    pub fn deepest_node_toward(&self, code: &OctalCode) -> NodeId {
        let mut current = self.root;
        for level in 0..code.depth() {
            let digit = match code.digit(level) {
                Some(d) => d,
                None => break,
            };
            match self.arena.get(current).and_then(|n| n.get_child(digit)) {
                Some(child) => current = child,
                None => break,
            }
        }

        current
    }

    /// The node spanning exactly the cell at `(x, y, z)` with size `scale`.
    pub fn find_node_at(&self, x: f32, y: f32, z: f32, scale: f32) -> Option<NodeId> {
        let code = OctalCode::from_point(x, y, z, scale)?;
        self.node_for_code(&code)
    }

    /// The deepest existing node enclosing the cell at `(x, y, z)` with size `scale`.
    pub fn find_enclosing_node_at(&self, x: f32, y: f32, z: f32, scale: f32) -> Option<NodeId> {
        let code = OctalCode::from_point(x, y, z, scale)?;
        Some(self.deepest_node_toward(&code))
    }

    // ── structural mutation ─────────────────────────────────────────────────

    /// Add a child at `index`, allocating a new node whose code extends the parent's.
    /// Fails fast: if the child already exists it is returned unchanged.
    pub fn add_child_at(&mut self, parent: NodeId, index: u8) -> Option<NodeId> {
        let parent_node = self.arena.get(parent)?;
        if let Some(existing) = parent_node.get_child(index) {
            return Some(existing);
        }

        let child_code = parent_node.code().child(index);
        let was_leaf = parent_node.is_leaf();

        let child = self.arena.insert(VoxelNode::new(child_code));
        let clock = self.tick();

        match self.arena.get_mut(parent) {
            Some(p) => {
                p.children.set(index, Some(child));
                p.stamp(clock);
            }
            None => {
                warn!("parent vanished during add_child_at");
                return None;
            }
        }
        if let Some(c) = self.arena.get_mut(child) {
            c.stamp(clock);
        }
        if was_leaf {
            self.arena.note_became_internal();
        }

        Some(child)
    }

    /// Remove the child at `index` together with its whole subtree.
    pub fn delete_child_at(&mut self, parent: NodeId, index: u8) -> bool {
        let child = match self.arena.get(parent).and_then(|n| n.get_child(index)) {
            Some(c) => c,
            None => return false,
        };

        let clock = self.tick();
        let mut became_leaf = false;
        if let Some(p) = self.arena.get_mut(parent) {
            p.children.set(index, None);
            p.stamp(clock);
            became_leaf = p.is_leaf();
        }
        if became_leaf {
            self.arena.note_became_leaf();
        }
        self.free_subtree(child);

        true
    }

    /// Depth-guarded recursive delete: removes all descendants of the child first, then
    /// the child itself. Exceeding the recursion ceiling aborts this subtree's deletion
    /// with a diagnostic instead of overflowing the stack on a malformed tree.
    pub fn safe_deep_delete_child_at(&mut self, parent: NodeId, index: u8) -> bool {
        self.safe_deep_delete_recursion(parent, index, 0)
    }

    fn safe_deep_delete_recursion(&mut self, parent: NodeId, index: u8, recursion: usize) -> bool {
        if recursion > DANGEROUSLY_DEEP_RECURSION {
            warn!(recursion, "safe_deep_delete_child_at hit the recursion ceiling, bailing");
            return false;
        }

        let child = match self.arena.get(parent).and_then(|n| n.get_child(index)) {
            Some(c) => c,
            None => return false,
        };

        let grandchildren: Vec<u8> = match self.arena.get(child) {
            Some(n) => n.children.iter().map(|(i, _)| i).collect(),
            None => Vec::new(),
        };
        let mut approved = true;
        for i in grandchildren {
            approved &= self.safe_deep_delete_recursion(child, i, recursion + 1);
        }
        if !approved {
            return false;
        }

        self.delete_child_at(parent, index)
    }

    /// Drop `id` and every descendant. Uses an explicit stack, so no depth limit applies.
    fn free_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.arena.remove(next) {
                stack.extend(node.children.iter().map(|(_, child)| child));
            }
        }
    }

    fn free_children(&mut self, id: NodeId) {
        let children: Vec<NodeId> = match self.arena.get(id) {
            Some(n) => n.children.iter().map(|(_, c)| c).collect(),
            None => return,
        };
        if children.is_empty() {
            return;
        }

        let clock = self.tick();
        if let Some(n) = self.arena.get_mut(id) {
            n.children = crate::ChildSlots::Empty;
            n.stamp(clock);
        }
        self.arena.note_became_leaf();
        for child in children {
            self.free_subtree(child);
        }
    }

    /// Walk toward `code`, creating missing nodes along the way, and return the node at
    /// exactly `code`. A colored leaf on the path splits first: all 8 children are
    /// created inheriting its color, then its own color clears, so no visual information
    /// is lost by descending.
    pub fn create_missing_node(&mut self, code: &OctalCode) -> Option<NodeId> {
        let mut current = self.root;
        loop {
            let node = self.arena.get(current)?;
            if node.code() == code {
                return Some(current);
            }
            let index = node.code().branch_index_toward(code)?;

            if node.is_leaf() && node.is_colored() {
                self.split(current);
            }

            current = match self.arena.get(current)?.get_child(index) {
                Some(child) => child,
                None => self.add_child_at(current, index)?,
            };
        }
    }

    /// Convert a colored leaf into an internal scaffold: create all 8 children carrying
    /// the parent's color, then clear the parent's own color.
    pub fn split(&mut self, id: NodeId) -> bool {
        let color = match self.arena.get(id) {
            Some(n) if n.is_leaf() && n.is_colored() => match n.color() {
                Some(c) => c,
                None => return false,
            },
            _ => return false,
        };

        for i in 0..8 {
            if let Some(child) = self.add_child_at(id, i) {
                if let Some(c) = self.arena.get_mut(child) {
                    c.set_color(Some(color), 1.0);
                }
            }
        }

        let clock = self.tick();
        if let Some(n) = self.arena.get_mut(id) {
            n.set_color(None, 1.0);
            n.stamp(clock);
        }

        true
    }

    // ── voxel CRUD ──────────────────────────────────────────────────────────

    /// Write a colored voxel at the cell addressed by `(x, y, z, scale)`, creating the
    /// path down to it. `destructive` replaces any existing subtree at the target;
    /// otherwise an existing finer-grained subtree is left untouched and the write is
    /// skipped. Returns whether a write happened.
    pub fn create_voxel(
        &mut self,
        x: f32,
        y: f32,
        z: f32,
        scale: f32,
        color: Color3,
        destructive: bool,
    ) -> bool {
        let code = match OctalCode::from_point(x, y, z, scale) {
            Some(c) => c,
            None => {
                warn!(x, y, z, scale, "create_voxel given out-of-universe coordinates");
                return false;
            }
        };
        let id = match self.create_missing_node(&code) {
            Some(id) => id,
            None => return false,
        };

        let has_finer_detail = self
            .arena
            .get(id)
            .map(|n| !n.is_leaf())
            .unwrap_or(false);

        if has_finer_detail {
            if !destructive {
                return false;
            }
            self.free_children(id);
        }

        let clock = self.tick();
        if let Some(n) = self.arena.get_mut(id) {
            n.set_color(Some(color), 1.0);
            n.stamp(clock);
        }
        self.stamp_path_to(&code);

        true
    }

    /// Delete the voxel at the cell addressed by `(x, y, z, scale)`: its descendants are
    /// removed and its own color cleared. Deleting a cell inside a larger colored leaf
    /// splits that leaf down to the target first, so the rest of the volume survives.
    pub fn delete_voxel_at(&mut self, x: f32, y: f32, z: f32, scale: f32) -> bool {
        let code = match OctalCode::from_point(x, y, z, scale) {
            Some(c) => c,
            None => return false,
        };

        let id = match self.node_for_code(&code) {
            Some(id) => id,
            None => {
                // The target may be buried inside a coarser colored leaf; break that
                // leaf up down to the target and then clear it.
                let deepest = self.deepest_node_toward(&code);
                let is_coverable = self
                    .arena
                    .get(deepest)
                    .map(|n| n.is_leaf() && n.is_colored() && n.code().contains(&code))
                    .unwrap_or(false);
                if !is_coverable {
                    return false;
                }
                match self.create_missing_node(&code) {
                    Some(id) => id,
                    None => return false,
                }
            }
        };

        self.free_children(id);
        let clock = self.tick();
        if let Some(n) = self.arena.get_mut(id) {
            n.set_color(None, 0.0);
            n.stamp(clock);
        }
        self.stamp_path_to(&code);

        true
    }

    /// Set a node's color directly (the decoder path). Colored nodes get density 1.0.
    pub fn set_node_color(&mut self, id: NodeId, color: Option<Color3>) -> bool {
        let clock = self.tick();
        match self.arena.get_mut(id) {
            Some(n) => {
                let density = if color.is_some() { 1.0 } else { 0.0 };
                n.set_color(color, density);
                n.stamp(clock);
                true
            }
            None => false,
        }
    }

    /// Tag the exact node at `(x, y, z, scale)` with the owning system's name.
    pub fn set_owner_at(&mut self, x: f32, y: f32, z: f32, scale: f32, owner: &str) -> bool {
        let tag = self.interner.intern(owner);
        match self.find_node_at(x, y, z, scale) {
            Some(id) => match self.arena.get_mut(id) {
                Some(n) => {
                    n.set_owner(Some(tag));
                    true
                }
                None => false,
            },
            None => false,
        }
    }

    /// Record which remote source produced a node's data (the decoder path).
    pub fn set_node_source(&mut self, id: NodeId, source: &str) -> bool {
        let tag = self.interner.intern(source);
        match self.arena.get_mut(id) {
            Some(n) => {
                n.set_source(Some(tag));
                true
            }
            None => false,
        }
    }

    /// Bump `last_changed` on every node from the root down to `code`, so delta-sync
    /// walks can find the changed subtree.
    pub fn stamp_path_to(&mut self, code: &OctalCode) {
        let clock = self.tick();
        let mut current = self.root;
        if let Some(n) = self.arena.get_mut(current) {
            n.stamp(clock);
        }
        for level in 0..code.depth() {
            let digit = match code.digit(level) {
                Some(d) => d,
                None => break,
            };
            match self.arena.get(current).and_then(|n| n.get_child(digit)) {
                Some(child) => {
                    current = child;
                    if let Some(n) = self.arena.get_mut(current) {
                        n.stamp(clock);
                    }
                }
                None => break,
            }
        }
    }

    // ── color maintenance ───────────────────────────────────────────────────

    /// Recompute an internal node's color as the mean RGB of its colored children.
    /// Density averages over all 8 slots, absent children counting 0. The node is
    /// colored only if the averaged density clears `VISIBLE_ABOVE_DENSITY`.
    pub fn set_color_from_average_of_children(&mut self, id: NodeId) {
        let children: Vec<NodeId> = match self.arena.get(id) {
            Some(n) => n.children.iter().map(|(_, c)| c).collect(),
            None => return,
        };

        let mut color_sum = [0.0f32; 3];
        let mut colored_count = 0.0f32;
        let mut density_sum = 0.0f32;

        for child in children {
            if let Some(c) = self.arena.get(child) {
                density_sum += c.density();
                if let Some(rgb) = c.color() {
                    color_sum[0] += f32::from(rgb.r);
                    color_sum[1] += f32::from(rgb.g);
                    color_sum[2] += f32::from(rgb.b);
                    colored_count += 1.0;
                }
            }
        }

        let density = density_sum / 8.0;
        let color = if density > VISIBLE_ABOVE_DENSITY && colored_count > 0.0 {
            Some(Color3::new(
                (color_sum[0] / colored_count).round() as u8,
                (color_sum[1] / colored_count).round() as u8,
                (color_sum[2] / colored_count).round() as u8,
            ))
        } else {
            None
        };

        let clock = self.tick();
        if let Some(n) = self.arena.get_mut(id) {
            n.set_color(color, density);
            n.stamp(clock);
        }
    }

    /// If all 8 children are colored leaves sharing one RGB, fold them back into this
    /// node: delete the children and adopt the color. The exact structural inverse of
    /// `split`, and idempotent: a second call finds no children and does nothing.
    pub fn collapse_identical_leaves(&mut self, id: NodeId) -> bool {
        let node = match self.arena.get(id) {
            Some(n) => n,
            None => return false,
        };
        if node.child_mask() != 0xFF {
            return false;
        }

        let mut shared: Option<Color3> = None;
        for (_, child) in node.children.iter() {
            let c = match self.arena.get(child) {
                Some(c) => c,
                None => return false,
            };
            if !c.is_leaf() || !c.is_colored() {
                return false;
            }
            match (shared, c.color()) {
                (None, rgb) => shared = rgb,
                (Some(a), Some(b)) if a == b => {}
                _ => return false,
            }
        }

        let color = match shared {
            Some(c) => c,
            None => return false,
        };

        self.free_children(id);
        let clock = self.tick();
        if let Some(n) = self.arena.get_mut(id) {
            n.set_color(Some(color), 1.0);
            n.stamp(clock);
        }

        true
    }

    /// Postorder collapse-then-average over the whole tree. Expensive; callers run it
    /// after a batch of writes rather than per write.
    pub fn reaverage_colors(&mut self) {
        self.reaverage_recursion(self.root, 0);
    }

    fn reaverage_recursion(&mut self, id: NodeId, recursion: usize) {
        if recursion > DANGEROUSLY_DEEP_RECURSION {
            warn!(recursion, "reaverage_colors hit the recursion ceiling, bailing");
            return;
        }

        let children: Vec<NodeId> = match self.arena.get(id) {
            Some(n) => n.children.iter().map(|(_, c)| c).collect(),
            None => return,
        };
        if children.is_empty() {
            return;
        }

        for child in children {
            self.reaverage_recursion(child, recursion + 1);
        }

        // A successful collapse already sets the color; don't average it away again.
        if !self.collapse_identical_leaves(id) {
            self.set_color_from_average_of_children(id);
        }
    }

    // ── queries ─────────────────────────────────────────────────────────────

    /// The LOD render decision. Exactly one node along any root-to-leaf line can be
    /// renderable: a leaf within its level's child boundary, or an internal node that is
    /// within its own boundary but whose children would be out of range.
    pub fn should_render(&self, id: NodeId, viewer: &Viewer, policy: &LodPolicy) -> bool {
        let node = match self.arena.get(id) {
            Some(n) => n,
            None => return false,
        };
        if !node.has_content() {
            return false;
        }

        let cube = node.code().octant().scaled(TREE_SCALE);
        let furthest = cube.furthest_distance_from(viewer.position);
        let level = node.code().depth() as u32;
        let in_boundary = furthest <= policy.boundary_distance(level);
        let in_child_boundary = furthest <= policy.boundary_distance(level + 1);

        (node.is_leaf() && in_child_boundary) || (in_boundary && !in_child_boundary)
    }

    /// Nearest colored node hit by the ray, in normalized universe units.
    pub fn find_ray_intersection(&self, origin: Vec3, direction: Vec3) -> Option<RayHit> {
        let mut best: Option<RayHit> = None;
        self.ray_recursion(self.root, origin, direction, &mut best);
        best
    }

    fn ray_recursion(&self, id: NodeId, origin: Vec3, direction: Vec3, best: &mut Option<RayHit>) {
        let node = match self.arena.get(id) {
            Some(n) => n,
            None => return,
        };
        let distance = match node.code().octant().ray_intersection(origin, direction) {
            Some(d) => d,
            None => return,
        };
        if let Some(hit) = best {
            if distance >= hit.distance {
                return;
            }
        }

        if node.has_content() {
            *best = Some(RayHit { node: id, distance });
        }
        for (_, child) in node.children.iter() {
            self.ray_recursion(child, origin, direction, best);
        }
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
