use lens_types::StateTree;

/// Single-slot store for the last committed snapshot of a session.
///
/// A commit happens only after the diff has been handed to the caller; a
/// cancelled or failed observation leaves the slot untouched.
#[derive(Default)]
pub struct SnapshotStore {
    previous: Option<StateTree>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&StateTree> {
        self.previous.as_ref()
    }

    /// Commit a tree, dropping the previous one.
    pub fn put(&mut self, tree: StateTree) {
        self.previous = Some(tree);
    }

    pub fn clear(&mut self) {
        self.previous = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lens_types::{tree::document_root, RepresentationKind};

    #[test]
    fn holds_exactly_one_tree() {
        let mut store = SnapshotStore::new();
        assert!(store.get().is_none());

        let first = StateTree::new("https://a.test/1", "", RepresentationKind::A11y, document_root());
        store.put(first);
        assert_eq!(store.get().unwrap().url, "https://a.test/1");

        let second = StateTree::new("https://a.test/2", "", RepresentationKind::A11y, document_root());
        store.put(second);
        assert_eq!(store.get().unwrap().url, "https://a.test/2");

        store.clear();
        assert!(store.get().is_none());
    }
}
