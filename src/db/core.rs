//! The compressed binary trie (PATRICIA-style radix tree).
//!
//! Each node consumes a multi-bit prefix from any key passing through it
//! and has at most two children: branch A when the next bit is 0, branch B
//! when it is 1. Only leaves hold records. Every stored key gets a `\0`
//! sentinel byte appended, so no logical key can be a bit-prefix of
//! another and every insert terminates at a distinguishable position.

use crate::db::bits;
use crate::db::trace::{ExecPath, Step};

pub(crate) const KEY_SENTINEL: u8 = 0;

pub(crate) struct Node<V> {
    pub(crate) prefix_bits: usize,
    pub(crate) prefix: Vec<u8>,
    pub(crate) branch_a: Option<Box<Node<V>>>,
    pub(crate) branch_b: Option<Box<Node<V>>>,
    pub(crate) records: Vec<V>,
}

impl<V> Node<V> {
    fn leaf(prefix: Vec<u8>, prefix_bits: usize, value: V) -> Self {
        let mut records = Vec::with_capacity(2);
        records.push(value);
        Node {
            prefix_bits,
            prefix,
            branch_a: None,
            branch_b: None,
            records,
        }
    }

    pub(crate) fn is_leaf(&self) -> bool {
        self.branch_a.is_none() && self.branch_b.is_none()
    }

    pub(crate) fn is_parent_of(&self, other: &Node<V>) -> bool {
        let a = self.branch_a.as_deref();
        let b = self.branch_b.as_deref();
        a.is_some_and(|a| std::ptr::eq(a, other)) || b.is_some_and(|b| std::ptr::eq(b, other))
    }
}

/// Counters reported by [`RadixTree::prefix_search`].
///
/// `compared_str` is always 1: a radix search is one continuous bit-string
/// comparison against tree-resident prefixes, not a key-by-key scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub compared_bit: usize,
    pub compared_char: usize,
    pub compared_str: usize,
}

pub struct SearchOutcome<'a, V> {
    pub matches: Vec<&'a V>,
    pub stats: SearchStats,
}

/// Radix tree mapping string keys to lists of values.
///
/// Duplicate keys accumulate at one leaf in insertion order. There is no
/// per-key deletion; the whole tree is torn down at once when dropped.
pub struct RadixTree<V> {
    root: Option<Box<Node<V>>>,
}

impl<V> Default for RadixTree<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> RadixTree<V> {
    pub fn new() -> Self {
        RadixTree { root: None }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub(crate) fn root_node(&self) -> Option<&Node<V>> {
        self.root.as_deref()
    }

    /// Insert `value` under `key`, recording traversal steps into `trace`
    /// when supplied.
    ///
    /// The sentinel byte is appended here, so the stored bit length is
    /// always `(key.len() + 1) * 8`.
    pub fn insert(&mut self, key: &str, value: V, mut trace: Option<&mut ExecPath>) {
        let mut buf = Vec::with_capacity(key.len() + 1);
        buf.extend_from_slice(key.as_bytes());
        buf.push(KEY_SENTINEL);
        let mut remaining = buf.len() * bits::BITS_PER_BYTE;

        if let Some(t) = trace.as_deref_mut() {
            t.push(Step::Root);
        }

        // Cursor over the slot the remaining key resolves to: the root for
        // an empty tree, or the branch slot selected at each step.
        let mut cur = &mut self.root;
        loop {
            let node = match cur {
                Some(node) => node,
                None => {
                    *cur = Some(Box::new(Node::leaf(buf, remaining, value)));
                    return;
                }
            };

            let (matched, diverged) =
                bits::compare(&buf, remaining, &node.prefix, node.prefix_bits);
            if let Some(t) = trace.as_deref_mut() {
                t.push(Step::Bits(matched));
            }

            if diverged {
                // Split: the node keeps the common prefix, its old remainder
                // (with children and records) moves into a displaced child,
                // and the key remainder becomes a fresh leaf. The bit right
                // after the split decides which side each child lands on.
                let common = bits::slice(&node.prefix, node.prefix_bits, 0, matched);
                let displaced_bits = node.prefix_bits - matched;
                let displaced_prefix =
                    bits::slice(&node.prefix, node.prefix_bits, matched, displaced_bits);
                let fresh_bits = remaining - matched;
                let fresh_prefix = bits::slice(&buf, remaining, matched, fresh_bits);

                let displaced = Box::new(Node {
                    prefix_bits: displaced_bits,
                    prefix: displaced_prefix,
                    branch_a: node.branch_a.take(),
                    branch_b: node.branch_b.take(),
                    records: std::mem::take(&mut node.records),
                });
                let fresh = Box::new(Node::leaf(fresh_prefix, fresh_bits, value));

                let displaced_bit = bits::bit_at(&displaced.prefix, displaced.prefix_bits, 0);
                node.prefix = common;
                node.prefix_bits = matched;
                if displaced_bit == 0 {
                    node.branch_a = Some(displaced);
                    node.branch_b = Some(fresh);
                    if let Some(t) = trace.as_deref_mut() {
                        t.push(Step::NewRight);
                    }
                } else {
                    node.branch_a = Some(fresh);
                    node.branch_b = Some(displaced);
                    if let Some(t) = trace.as_deref_mut() {
                        t.push(Step::NewLeft);
                    }
                }
                return;
            }

            if matched < remaining {
                // Node prefix exhausted, key bits remain: descend by the
                // next key bit. A missing branch sends the cursor to an
                // empty slot, filled with a fresh leaf on the next pass.
                let rest = remaining - matched;
                buf = bits::slice(&buf, remaining, matched, rest);
                remaining = rest;
                let next_bit = bits::bit_at(&buf, remaining, 0);
                let branch = if next_bit == 0 {
                    &mut node.branch_a
                } else {
                    &mut node.branch_b
                };
                if let Some(t) = trace.as_deref_mut() {
                    match (branch.is_some(), next_bit) {
                        (true, 0) => t.push(Step::Left),
                        (true, _) => t.push(Step::Right),
                        (false, 0) => {
                            t.push(Step::Match);
                            t.push(Step::NewLeft);
                        }
                        (false, _) => {
                            t.push(Step::Match);
                            t.push(Step::NewRight);
                        }
                    }
                }
                cur = branch;
            } else {
                // Key and prefix both exhausted: same key seen before.
                if let Some(t) = trace.as_deref_mut() {
                    t.push(Step::Match);
                }
                node.records.push(value);
                return;
            }
        }
    }

    /// Collect every record stored under keys starting with `key`.
    ///
    /// The query carries no sentinel, so it matches any stored key it is a
    /// byte-prefix of. Results come back in depth-first order, branch A
    /// before branch B, each leaf's records in insertion order.
    pub fn prefix_search(&self, key: &str, mut trace: Option<&mut ExecPath>) -> SearchOutcome<'_, V> {
        let mut buf = key.as_bytes().to_vec();
        let mut remaining = buf.len() * bits::BITS_PER_BYTE;
        let mut matches = Vec::new();
        let mut compared_bit = 0usize;

        let mut cursor = self.root.as_deref();
        if let Some(t) = trace.as_deref_mut() {
            t.push(if cursor.is_some() {
                Step::Root
            } else {
                Step::NoMatch
            });
        }

        while let Some(node) = cursor {
            let (matched, diverged) =
                bits::compare(&buf, remaining, &node.prefix, node.prefix_bits);
            compared_bit += matched;
            if let Some(t) = trace.as_deref_mut() {
                t.push(Step::Bits(matched));
            }

            if diverged {
                if let Some(t) = trace.as_deref_mut() {
                    t.push(Step::NoMatch);
                }
                break;
            }
            if matched == remaining {
                // Query exhausted at or inside this node: everything below
                // it matches the prefix.
                collect_records(node, &mut matches);
                if let Some(t) = trace.as_deref_mut() {
                    t.push(Step::Match);
                }
                break;
            }

            let rest = remaining - matched;
            buf = bits::slice(&buf, remaining, matched, rest);
            remaining = rest;
            let next_bit = bits::bit_at(&buf, remaining, 0);
            let branch = if next_bit == 0 {
                node.branch_a.as_deref()
            } else {
                node.branch_b.as_deref()
            };
            match branch {
                Some(child) => {
                    if let Some(t) = trace.as_deref_mut() {
                        t.push(if next_bit == 0 { Step::Left } else { Step::Right });
                    }
                    cursor = Some(child);
                }
                None => {
                    if let Some(t) = trace.as_deref_mut() {
                        t.push(Step::NoMatch);
                    }
                    break;
                }
            }
        }

        SearchOutcome {
            matches,
            stats: SearchStats {
                compared_bit,
                compared_char: compared_bit.div_ceil(bits::BITS_PER_BYTE),
                compared_str: 1,
            },
        }
    }
}

/// Depth-first collection with an explicit stack, leaves only.
fn collect_records<'a, V>(node: &'a Node<V>, out: &mut Vec<&'a V>) {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if let Some(b) = current.branch_b.as_deref() {
            stack.push(b);
        }
        if let Some(a) = current.branch_a.as_deref() {
            stack.push(a);
        }
        if current.is_leaf() {
            out.extend(current.records.iter());
        }
    }
}

impl<V> Drop for RadixTree<V> {
    // Iterative teardown with an explicit stack: trie depth is bounded by
    // key bit length, and a chain of nested prefixes would otherwise grow
    // the call stack one frame per node.
    fn drop(&mut self) {
        let mut stack = Vec::new();
        if let Some(root) = self.root.take() {
            stack.push(root);
        }
        while let Some(mut node) = stack.pop() {
            if let Some(b) = node.branch_b.take() {
                stack.push(b);
            }
            if let Some(a) = node.branch_a.take() {
                stack.push(a);
            }
        }
    }
}
