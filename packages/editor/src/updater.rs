use crate::component::{ComponentTree, Correlation, RebuildReport};
use crate::unit::ReconciliationUnit;
use weft_parser::{NodeId, RawTree};

/// Threads the result of an in-tree mutation back into the component tree
///
/// `changed` is the node [`RawTree::mutate`](weft_parser::RawTree::mutate)
/// reported; `unit` describes the mutation and is anchored at or above it.
pub trait Updater {
    fn update(
        &mut self,
        components: &mut ComponentTree,
        tree: &RawTree,
        changed: NodeId,
        unit: &ReconciliationUnit,
    ) -> RebuildReport;
}

/// Default updater: rebuilds the unit's anchor and rebinds components whose
/// peer was replaced by a node of the same kind and name
#[derive(Debug, Default, Clone, Copy)]
pub struct Rebinder;

impl Updater for Rebinder {
    fn update(
        &mut self,
        components: &mut ComponentTree,
        tree: &RawTree,
        _changed: NodeId,
        unit: &ReconciliationUnit,
    ) -> RebuildReport {
        components.rebuild(unit, tree, Correlation::Replaced)
    }
}
