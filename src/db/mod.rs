pub mod bits;
pub mod core;
pub mod snapshot;
pub mod trace;

use std::cell::RefCell;

pub use crate::db::core::{RadixTree, SearchStats};
pub use crate::db::snapshot::{TreeDocument, MAX_SNAPSHOT_NODES};
pub use crate::db::trace::ExecPath;

/// Result of one prefix search, ready for the wire.
#[derive(Debug)]
pub struct SearchResult {
    pub results: Vec<String>,
    pub stats: SearchStats,
    pub exec_path: String,
}

/// The in-memory index behind the service.
///
/// The whole service runs on one thread, so interior mutability is a
/// `RefCell` rather than a lock: at most one logical flow of control ever
/// touches the tree, and that exclusion is structural.
#[derive(Default)]
pub struct Notebook {
    tree: RefCell<RadixTree<String>>,
}

impl Notebook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, returning the rendered execution path.
    pub fn insert(&self, key: &str, data: String) -> String {
        let mut path = ExecPath::new();
        self.tree.borrow_mut().insert(key, data, Some(&mut path));
        path.to_string()
    }

    /// Collect every record whose key starts with `key`.
    pub fn search(&self, key: &str) -> SearchResult {
        let mut path = ExecPath::new();
        let tree = self.tree.borrow();
        let outcome = tree.prefix_search(key, Some(&mut path));
        SearchResult {
            results: outcome.matches.into_iter().cloned().collect(),
            stats: outcome.stats,
            exec_path: path.to_string(),
        }
    }

    /// Capped breadth-first snapshot of the tree.
    pub fn snapshot(&self) -> TreeDocument {
        snapshot::to_document(&self.tree.borrow(), String::clone, MAX_SNAPSHOT_NODES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facade_round_trip() {
        let notebook = Notebook::new();
        let path = notebook.insert("cat", "C1".to_string());
        assert!(!path.is_empty());

        let found = notebook.search("c");
        assert_eq!(found.results, vec!["C1"]);
        assert_eq!(found.stats.compared_str, 1);
        assert!(!found.exec_path.is_empty());

        let doc = notebook.snapshot();
        assert_eq!(doc.radix_tree.len(), 1);
    }
}
