use crate::NodeId;

use voxtree_core::OctalCode;

/// Backing storage grows by this many entries at a time.
const GROWTH_CHUNK: usize = 16;

/// An ordered, de-duplicating worklist of nodes pending processing (typically: still
/// needing to be sent).
///
/// Entries are kept sorted by octal code, shallow digits most significant, so insertion
/// can binary-search and drop exact duplicates. `extract` pops from the end of the array;
/// callers must not assume sorted-order extraction, only that each distinct node comes
/// back at most once per insert.
#[derive(Debug, Default)]
pub struct NodeWorkBag {
    entries: Vec<(OctalCode, NodeId)>,
}

impl NodeWorkBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node keyed by its octal code. Returns `false` (and changes nothing) if an
    /// entry with the same code is already present.
    pub fn insert(&mut self, code: OctalCode, node: NodeId) -> bool {
        match self.entries.binary_search_by(|(c, _)| c.cmp(&code)) {
            Ok(_) => false,
            Err(at) => {
                if self.entries.len() == self.entries.capacity() {
                    self.entries.reserve_exact(GROWTH_CHUNK);
                }
                self.entries.insert(at, (code, node));
                true
            }
        }
    }

    /// Remove and return one entry.
    pub fn extract(&mut self) -> Option<(OctalCode, NodeId)> {
        self.entries.pop()
    }

    pub fn contains(&self, code: &OctalCode) -> bool {
        self.entries
            .binary_search_by(|(c, _)| c.cmp(code))
            .is_ok()
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
