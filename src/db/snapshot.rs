//! Bounded diagnostic serialization of the tree.
//!
//! A breadth-first walk over at most [`MAX_SNAPSHOT_NODES`] nodes, flattened
//! into a document a client UI can render. Truncation is not an error; it
//! shows up as nodes whose `pid` is missing and as the best-effort `masked`
//! flag below.

use std::collections::VecDeque;

use serde::Serialize;

use crate::db::core::{Node, RadixTree};

/// Cap on nodes included in one snapshot document.
pub const MAX_SNAPSHOT_NODES: usize = 30;

#[derive(Debug, Serialize)]
pub struct TreeDocument {
    pub radix_tree: Vec<SnapshotNode>,
}

#[derive(Debug, Serialize)]
pub struct SnapshotNode {
    /// Prefix bytes up to the first NUL, rendered as (lossy) text. Bits
    /// past `prefix_bits` in the last byte are slack from the whole-byte
    /// slice copy and render as-is.
    pub prefix: String,
    #[serde(rename = "prefixBits")]
    pub prefix_bits: usize,
    /// Index of the parent within this document's visitation order; absent
    /// for the root and for nodes whose parent fell outside the cap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<usize>,
    pub data: Vec<String>,
    /// True when this node has two children and at least one of them also
    /// made it into the capped set. Resolved only against visited nodes,
    /// so it is approximate under truncation by construction.
    pub masked: bool,
}

/// Flatten `tree` into a [`TreeDocument`], visiting at most `cap` nodes in
/// breadth-first order and stringifying each stored record.
pub fn to_document<V>(
    tree: &RadixTree<V>,
    stringify: impl Fn(&V) -> String,
    cap: usize,
) -> TreeDocument {
    let mut nodes = Vec::new();
    let Some(root) = tree.root_node() else {
        return TreeDocument { radix_tree: nodes };
    };

    let mut queue: VecDeque<&Node<V>> = VecDeque::new();
    queue.push_back(root);
    let mut visited: Vec<&Node<V>> = Vec::new();

    while let Some(node) = queue.pop_front() {
        if visited.len() == cap {
            break;
        }
        let pid = visited.iter().position(|seen| seen.is_parent_of(node));
        nodes.push(SnapshotNode {
            prefix: render_prefix(&node.prefix),
            prefix_bits: node.prefix_bits,
            pid,
            data: node.records.iter().map(&stringify).collect(),
            masked: false,
        });
        visited.push(node);

        if let Some(a) = node.branch_a.as_deref() {
            queue.push_back(a);
        }
        if let Some(b) = node.branch_b.as_deref() {
            queue.push_back(b);
        }
    }

    for (i, node) in visited.iter().enumerate() {
        if node.branch_a.is_some() && node.branch_b.is_some() {
            nodes[i].masked = visited[i + 1..].iter().any(|later| node.is_parent_of(later));
        }
    }

    TreeDocument { radix_tree: nodes }
}

fn render_prefix(prefix: &[u8]) -> String {
    let end = prefix.iter().position(|&b| b == 0).unwrap_or(prefix.len());
    String::from_utf8_lossy(&prefix[..end]).into_owned()
}
