//! Execution-path recording.
//!
//! Both tree operations can log every traversal decision they take into an
//! [`ExecPath`]. The rendered form is a compact token string:
//!
//! - `O`: entered the tree at the root
//! - decimal digits: number of equal bits found at the visited node
//! - `L` / `R`: descended into branch A / branch B
//! - `A` / `B`: created a fresh leaf as branch A / branch B
//! - `M`: terminal match (value appended, or search key fully consumed)
//! - `N`: terminal mismatch, nothing found
//!
//! The log is purely diagnostic: it is handed back to the client verbatim
//! and never read back by the tree.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Root,
    Left,
    Right,
    NewLeft,
    NewRight,
    Match,
    NoMatch,
    Bits(usize),
}

/// Ordered log of the traversal decisions taken by one insert or search.
#[derive(Debug, Default)]
pub struct ExecPath {
    steps: Vec<Step>,
}

impl ExecPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl fmt::Display for ExecPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            match step {
                Step::Root => f.write_str("O")?,
                Step::Left => f.write_str("L")?,
                Step::Right => f.write_str("R")?,
                Step::NewLeft => f.write_str("A")?,
                Step::NewRight => f.write_str("B")?,
                Step::Match => f.write_str("M")?,
                Step::NoMatch => f.write_str("N")?,
                Step::Bits(n) => write!(f, "{n}")?,
            }
        }
        Ok(())
    }
}
