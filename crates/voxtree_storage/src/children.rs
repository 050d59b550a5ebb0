use crate::NodeId;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Capacity-tiered storage for a node's 0-8 children.
///
/// Most nodes in a populated tree have zero or one child, so paying for eight slots on
/// every node wastes most of the tree's memory. Instead the storage migrates between
/// tiers as the population count crosses a boundary:
///
/// - `Empty`: no children
/// - `One`: a single `(index, child)` pair
/// - `Few`: 2-3 children inline, in presence-bit order
/// - `Many`: 4-8 children in a full slot array
///
/// Migration preserves every `(index, child)` pair in both directions. The presence
/// bitmask is authoritative; bit `i` set means slot `i` is populated.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ChildSlots {
    Empty,
    One(u8, NodeId),
    Few { mask: u8, slots: [NodeId; 3] },
    Many { mask: u8, slots: [Option<NodeId>; 8] },
}

impl Default for ChildSlots {
    fn default() -> Self {
        Self::Empty
    }
}

impl ChildSlots {
    /// Presence bitmask; bit `i` is set iff child `i` exists.
    pub fn mask(&self) -> u8 {
        match self {
            Self::Empty => 0,
            Self::One(index, _) => 1 << index,
            Self::Few { mask, .. } => *mask,
            Self::Many { mask, .. } => *mask,
        }
    }

    #[inline]
    pub fn count(&self) -> u8 {
        self.mask().count_ones() as u8
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mask() == 0
    }

    /// The child at `index`, if present. O(1) for `One`/`Many`; a popcount rank for `Few`.
    pub fn get(&self, index: u8) -> Option<NodeId> {
        debug_assert!(index < 8);
        match self {
            Self::Empty => None,
            Self::One(i, child) => {
                if *i == index {
                    Some(*child)
                } else {
                    None
                }
            }
            Self::Few { mask, slots } => {
                if mask & (1 << index) == 0 {
                    return None;
                }
                // Children are packed in presence-bit order, so the child's position is
                // the number of set bits below its index.
                let rank = (mask & ((1 << index) - 1)).count_ones() as usize;
                if rank >= slots.len() {
                    // Mask claims more children than the tier can hold. Don't hand the
                    // caller a stale reference; report the child missing.
                    warn!(mask, index, "child storage mask inconsistent with Few tier");
                    return None;
                }
                Some(slots[rank])
            }
            Self::Many { mask, slots } => {
                if mask & (1 << index) == 0 {
                    return None;
                }
                let slot = slots[index as usize];
                if slot.is_none() {
                    warn!(mask, index, "child storage mask inconsistent with Many tier");
                }
                slot
            }
        }
    }

    /// Set or clear the child at `index`, migrating tiers if the population count crosses
    /// a boundary. Returns the previous occupant of the slot.
    pub fn set(&mut self, index: u8, child: Option<NodeId>) -> Option<NodeId> {
        debug_assert!(index < 8);
        let previous = self.get(index);

        let mut flat = self.to_flat();
        flat[index as usize] = child;
        *self = Self::from_flat(&flat);

        previous
    }

    /// Iterate present `(index, child)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, NodeId)> + '_ {
        let mask = self.mask();
        (0..8u8).filter_map(move |i| {
            if mask & (1 << i) != 0 {
                self.get(i).map(|child| (i, child))
            } else {
                None
            }
        })
    }

    fn to_flat(&self) -> [Option<NodeId>; 8] {
        let mut flat = [None; 8];
        for (index, child) in self.iter() {
            flat[index as usize] = Some(child);
        }
        flat
    }

    fn from_flat(flat: &[Option<NodeId>; 8]) -> Self {
        let mut mask = 0u8;
        let mut count = 0usize;
        for (i, slot) in flat.iter().enumerate() {
            if slot.is_some() {
                mask |= 1 << i;
                count += 1;
            }
        }

        match count {
            0 => Self::Empty,
            1 => {
                let index = mask.trailing_zeros() as u8;
                Self::One(index, flat[index as usize].unwrap())
            }
            2 | 3 => {
                let mut slots = [NodeId::NULL; 3];
                let mut at = 0;
                for slot in flat.iter().flatten() {
                    slots[at] = *slot;
                    at += 1;
                }
                Self::Few { mask, slots }
            }
            _ => Self::Many { mask, slots: *flat },
        }
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

    use rand::prelude::*;

    fn id(n: u32) -> NodeId {
        NodeId::from_index(n as usize)
    }

    #[test]
    fn tiers_follow_population_count() {
        let mut slots = ChildSlots::default();
        assert!(matches!(slots, ChildSlots::Empty));

        slots.set(3, Some(id(30)));
        assert!(matches!(slots, ChildSlots::One(3, _)));

        slots.set(6, Some(id(60)));
        assert!(matches!(slots, ChildSlots::Few { .. }));

        slots.set(0, Some(id(0)));
        assert!(matches!(slots, ChildSlots::Few { .. }));

        slots.set(7, Some(id(70)));
        assert!(matches!(slots, ChildSlots::Many { .. }));

        // And back down.
        slots.set(7, None);
        assert!(matches!(slots, ChildSlots::Few { .. }));
        slots.set(0, None);
        slots.set(6, None);
        assert!(matches!(slots, ChildSlots::One(3, _)));
        slots.set(3, None);
        assert!(matches!(slots, ChildSlots::Empty));
    }

    #[test]
    fn migration_preserves_all_children() {
        let mut slots = ChildSlots::default();
        for i in 0..8u8 {
            slots.set(i, Some(id(100 + i as u32)));
            // Every previously set child must still be present after each migration.
            for j in 0..=i {
                assert_eq!(slots.get(j), Some(id(100 + j as u32)), "lost child {}", j);
            }
        }
        for i in (0..8u8).rev() {
            slots.set(i, None);
            for j in 0..i {
                assert_eq!(slots.get(j), Some(id(100 + j as u32)));
            }
            assert_eq!(slots.get(i), None);
        }
    }

    #[test]
    fn set_returns_previous_occupant() {
        let mut slots = ChildSlots::default();
        assert_eq!(slots.set(2, Some(id(1))), None);
        assert_eq!(slots.set(2, Some(id(2))), Some(id(1)));
        assert_eq!(slots.set(2, None), Some(id(2)));
    }

    #[test]
    fn random_ops_match_reference_model() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut slots = ChildSlots::default();
        let mut model = [None::<NodeId>; 8];

        for _ in 0..1000 {
            let index = rng.gen_range(0..8u8);
            let child = if rng.gen_bool(0.5) {
                Some(id(rng.gen_range(0..1000)))
            } else {
                None
            };
            slots.set(index, child);
            model[index as usize] = child;

            for i in 0..8u8 {
                assert_eq!(slots.get(i), model[i as usize]);
            }
            let expected_count = model.iter().filter(|s| s.is_some()).count() as u8;
            assert_eq!(slots.count(), expected_count);
            assert_eq!(slots.count(), slots.mask().count_ones() as u8);
        }
    }

    #[test]
    fn iter_visits_in_index_order() {
        let mut slots = ChildSlots::default();
        for &i in &[5u8, 1, 7, 2] {
            slots.set(i, Some(id(i as u32)));
        }
        let indices: Vec<u8> = slots.iter().map(|(i, _)| i).collect();
        assert_eq!(indices, vec![1, 2, 5, 7]);
    }
}
