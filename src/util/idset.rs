//! Ordered set of file identifiers.
//!
//! Used by the incremental coordinator for the delete-set (fids whose tag
//! records must be swept) and the find-set (fids seen on the file system).

use std::collections::BTreeSet;

use crate::types::Fid;

/// Ordered fid membership set.
#[derive(Debug, Default, Clone)]
pub struct IdSet {
    ids: BTreeSet<Fid>,
}

impl IdSet {
    pub fn new() -> Self {
        IdSet {
            ids: BTreeSet::new(),
        }
    }

    pub fn add(&mut self, id: Fid) {
        self.ids.insert(id);
    }

    pub fn contains(&self, id: Fid) -> bool {
        self.ids.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Ascending iteration over members.
    pub fn iter(&self) -> impl Iterator<Item = Fid> + '_ {
        self.ids.iter().copied()
    }
}

impl FromIterator<Fid> for IdSet {
    fn from_iter<T: IntoIterator<Item = Fid>>(iter: T) -> Self {
        IdSet {
            ids: iter.into_iter().collect(),
        }
    }
}
