//! Node snapshots raised by tracked mutations and by the re-parse diff

use crate::tree::{NodeId, NodeKind};
use serde::{Deserialize, Serialize};

/// A node and its ancestor chain at one point in time
///
/// `ancestors` runs from the parent up to the node just below the document,
/// so a snapshot of the document element has no ancestors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub node: NodeId,
    pub kind: NodeKind,
    pub ancestors: Vec<NodeId>,
    pub added: bool,
}

impl NodeSnapshot {
    /// Node followed by its ancestors
    pub fn path(&self) -> Vec<NodeId> {
        let mut path = Vec::with_capacity(self.ancestors.len() + 1);
        path.push(self.node);
        path.extend(self.ancestors.iter().copied());
        path
    }

    /// True when the node sits directly under the document
    pub fn is_root_level(&self) -> bool {
        self.ancestors.is_empty()
    }
}

/// Pre-image and post-image of one atomic change
///
/// A pure insertion has no `before`; a pure deletion has no `after`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotPair {
    pub before: Option<NodeSnapshot>,
    pub after: Option<NodeSnapshot>,
}

impl SnapshotPair {
    pub fn modified(before: NodeSnapshot, after: NodeSnapshot) -> Self {
        Self {
            before: Some(before),
            after: Some(after),
        }
    }

    pub fn inserted(after: NodeSnapshot) -> Self {
        Self {
            before: None,
            after: Some(after),
        }
    }

    pub fn removed(before: NodeSnapshot) -> Self {
        Self {
            before: Some(before),
            after: None,
        }
    }

    /// Present snapshots, pre-image first
    pub fn snapshots(&self) -> impl Iterator<Item = &NodeSnapshot> {
        self.before.iter().chain(self.after.iter())
    }
}
