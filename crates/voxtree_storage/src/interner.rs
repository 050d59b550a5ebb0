use crate::SmallKeyHashMap;

use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// A small interned key standing in for an owner-system or remote-source identifier.
/// Nodes store this 2-byte key instead of the full identifier string.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Tag(u16);

impl Tag {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Bidirectional map between identifier strings and `Tag` keys.
///
/// The key space (distinct owning systems, distinct remote sources) is small and
/// long-lived, so the map grows monotonically and is never pruned. It is synchronized
/// internally; callers share one instance (typically via `Arc`) between trees and
/// decoders rather than relying on process-wide statics.
#[derive(Debug, Default)]
pub struct TagInterner {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    names: Vec<String>,
    keys: SmallKeyHashMap<String, Tag>,
}

impl TagInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// The key for `name`, allocating one if this is the first time it is seen.
    pub fn intern(&self, name: &str) -> Tag {
        if let Some(&tag) = self.inner.read().expect("interner lock poisoned").keys.get(name) {
            return tag;
        }

        let mut inner = self.inner.write().expect("interner lock poisoned");
        // Re-check; another thread may have interned between the read and write locks.
        if let Some(&tag) = inner.keys.get(name) {
            return tag;
        }

        let tag = Tag(inner.names.len() as u16);
        inner.names.push(name.to_owned());
        inner.keys.insert(name.to_owned(), tag);

        tag
    }

    pub fn resolve(&self, tag: Tag) -> Option<String> {
        self.inner
            .read()
            .expect("interner lock poisoned")
            .names
            .get(tag.index())
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("interner lock poisoned").names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
