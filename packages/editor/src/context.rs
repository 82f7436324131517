use crate::unit::ReconciliationUnit;
use serde::{Deserialize, Serialize};
use weft_parser::NodeId;

/// Caller-side state consulted by the mutation guard
///
/// Mutations are suppressed while a pass is in progress but has not yet
/// started raising events, and for the whole of an undo/redo replay. The
/// engine combines this with its own state, so an idle context is enough
/// for ordinary callers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationContext {
    pub pass_in_progress: bool,
    pub events_started: bool,
    pub replaying: bool,
}

impl MutationContext {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn replaying() -> Self {
        Self {
            replaying: true,
            ..Self::default()
        }
    }

    pub fn is_suppressed(&self) -> bool {
        (self.pass_in_progress && !self.events_started) || self.replaying
    }
}

/// What a mutation call did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MutationOutcome {
    /// The guard was active; nothing changed
    Suppressed,
    /// A detached subtree was edited directly
    Floating { changed: NodeId },
    /// The live document was targeted but the mutation was a no-op
    Unchanged { changed: NodeId },
    /// The live document was edited; `unit` describes the change
    InTree { changed: NodeId, unit: ReconciliationUnit },
}

impl MutationOutcome {
    pub fn changed(&self) -> Option<NodeId> {
        match self {
            MutationOutcome::Suppressed => None,
            MutationOutcome::Floating { changed }
            | MutationOutcome::Unchanged { changed }
            | MutationOutcome::InTree { changed, .. } => Some(*changed),
        }
    }

    pub fn unit(&self) -> Option<&ReconciliationUnit> {
        match self {
            MutationOutcome::InTree { unit, .. } => Some(unit),
            _ => None,
        }
    }

    pub fn is_suppressed(&self) -> bool {
        matches!(self, MutationOutcome::Suppressed)
    }
}
