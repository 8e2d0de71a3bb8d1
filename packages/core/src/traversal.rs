//! Depth-first traversal with global node uniqueness.
//!
//! [`Traversal`] walks a [`ReadTransaction`] from a start node, expanding
//! every visited node along every [`RelationshipSpec`] it was given. A node
//! is emitted at most once per traversal no matter how many paths reach it,
//! which is what keeps symmetric relations (`EQUIVALENT_CLASS`, `SAME_AS`)
//! from looping forever.

use std::collections::HashSet;

use crate::closure::CancellationFlag;
use crate::store::{ReadTransaction, StoreError};
use crate::types::{NodeId, OwlRelationship, RelationshipSpec};

/// One position reached by a [`Traversal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Path {
    end: NodeId,
    length: usize,
    last_relationship: Option<OwlRelationship>,
}

impl Path {
    /// The node this path ends at.
    pub fn end_node(&self) -> NodeId {
        self.end
    }

    /// Number of edges from the start node. The start node itself has length 0.
    pub fn length(&self) -> usize {
        self.length
    }

    /// The relationship type of the final edge, `None` for the start node.
    pub fn last_relationship(&self) -> Option<OwlRelationship> {
        self.last_relationship
    }
}

#[derive(Debug)]
struct Frame {
    node: NodeId,
    depth: usize,
    via: Option<OwlRelationship>,
}

/// A lazy depth-first iterator of [`Path`]s.
///
/// The visited set is checked before a node is expanded, so each node is
/// expanded and yielded exactly once. The start node is yielded first.
///
/// After the first store error the iterator yields that error and then
/// ends; it never yields a partial continuation. A traversal given a
/// [`CancellationFlag`] ends early, without an error, once the flag is
/// raised; the caller decides what an early end means.
pub struct Traversal<'tx> {
    tx: &'tx dyn ReadTransaction,
    specs: Vec<RelationshipSpec>,
    visited: HashSet<NodeId>,
    stack: Vec<Frame>,
    failed: bool,
    cancel: Option<CancellationFlag>,
}

impl<'tx> Traversal<'tx> {
    pub fn new(tx: &'tx dyn ReadTransaction, start: NodeId, specs: &[RelationshipSpec]) -> Self {
        Self {
            tx,
            specs: specs.to_vec(),
            visited: HashSet::new(),
            stack: vec![Frame {
                node: start,
                depth: 0,
                via: None,
            }],
            failed: false,
            cancel: None,
        }
    }

    /// Stop between store calls once `cancel` is raised.
    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationFlag::is_cancelled)
    }

    /// Number of distinct nodes visited so far.
    pub fn visited(&self) -> usize {
        self.visited.len()
    }

    fn expand(&mut self, node: NodeId, depth: usize) -> Result<(), StoreError> {
        let mut discovered = Vec::new();
        for spec in &self.specs {
            if self.cancelled() {
                break;
            }
            for next in self.tx.neighbours(node, *spec)? {
                if !self.visited.contains(&next) {
                    discovered.push(Frame {
                        node: next,
                        depth: depth + 1,
                        via: Some(spec.relationship),
                    });
                }
            }
        }
        // Reversed so the first neighbour found is the first one explored.
        self.stack.extend(discovered.into_iter().rev());
        Ok(())
    }
}

impl Iterator for Traversal<'_> {
    type Item = Result<Path, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        while let Some(frame) = self.stack.pop() {
            if !self.visited.insert(frame.node) {
                continue;
            }
            if let Err(e) = self.expand(frame.node, frame.depth) {
                self.failed = true;
                self.stack.clear();
                return Some(Err(e));
            }
            // A cancelled expansion is incomplete; yield nothing built on it.
            if self.cancelled() {
                self.stack.clear();
                return None;
            }
            return Some(Ok(Path {
                end: frame.node,
                length: frame.depth,
                last_relationship: frame.via,
            }));
        }
        None
    }
}
