//! # Change Records
//!
//! A change record is one reconciliation task derived from a node snapshot.
//! It carries two paths: the *structure path* locates the node in the
//! current tree, the *context path* is the ancestry namespaces are resolved
//! against. They only differ for removals, where the context path is the
//! pre-edit ancestry and the structure path stops at the first ancestor that
//! no longer exists.

use crate::component::ComponentId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use weft_parser::{NodeId, NodeKind, NodeSnapshot, RawTree, SnapshotPair};

/// What happened to the node a record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Inserted,
    Removed,
    Modified,
}

impl ChangeKind {
    /// Classify one snapshot of a pair
    ///
    /// A pair whose two sides describe the same node is a modification;
    /// otherwise each side stands for itself.
    pub fn of(pair: &SnapshotPair, snapshot: &NodeSnapshot) -> Self {
        match (&pair.before, &pair.after) {
            (Some(before), Some(after)) if before.node == after.node => ChangeKind::Modified,
            _ if snapshot.added => ChangeKind::Inserted,
            _ => ChangeKind::Removed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Component the record is filed under
    pub anchor: ComponentId,
    pub node: NodeId,
    pub kind: NodeKind,
    pub change: ChangeKind,
    /// Node first, then its ancestors below the document
    pub path: Vec<NodeId>,
    pub context_path: Vec<NodeId>,
    pub added: bool,
    /// Prefix to URI bindings in scope along the context path
    pub namespaces: BTreeMap<String, String>,
}

impl ChangeRecord {
    /// Build a record from a snapshot
    ///
    /// `context` is the tree the snapshot was taken from: the pre-edit tree
    /// for removals seen by a re-parse, the live tree otherwise. `anchor`
    /// picks the component for the structure path; no anchor, no record.
    pub fn from_snapshot(
        snapshot: &NodeSnapshot,
        change: ChangeKind,
        current: &RawTree,
        context: &RawTree,
        anchor: impl FnOnce(&[NodeId]) -> Option<ComponentId>,
    ) -> Option<Self> {
        let context_path = snapshot.path();
        let path = match change {
            ChangeKind::Removed => structure_path(&context_path, current),
            _ => context_path.clone(),
        };
        let anchor = anchor(&path)?;
        let namespaces = context.namespace_bindings(&context_path);

        Some(Self {
            anchor,
            node: snapshot.node,
            kind: snapshot.kind,
            change,
            path,
            context_path,
            added: snapshot.added,
            namespaces,
        })
    }

    /// Nodes above the record's node, nearest first
    pub fn ancestors(&self) -> &[NodeId] {
        self.path.get(1..).unwrap_or(&[])
    }
}

/// Removed node followed by the part of its old ancestry still in `current`
pub(crate) fn structure_path(context_path: &[NodeId], current: &RawTree) -> Vec<NodeId> {
    let mut path = Vec::with_capacity(context_path.len());
    if let Some(node) = context_path.first() {
        path.push(*node);
    }
    path.extend(
        context_path
            .iter()
            .skip(1)
            .take_while(|id| current.is_reachable(**id)),
    );
    path
}
