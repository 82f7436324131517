//! # Reconciliation Units
//!
//! A unit is the batch of change records filed under one anchor component.
//! During a pass the [`ReconciliationQueue`] keeps at most one unit per
//! anchor and never two units where one anchor sits inside the other, so a
//! commit rebuilds a minimal set of disjoint subtrees, each once.
//!
//! Merging treats a unit's records as a set: duplicates are dropped, so
//! merging is idempotent, associative and commutative up to record order.

use crate::change::ChangeRecord;
use crate::component::{ComponentId, ComponentTree, PreparedUnit};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;
use weft_parser::RawTree;

static NEXT_UNIT: AtomicU64 = AtomicU64::new(1);

/// Identity of a unit object, independent of where it is filed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub u64);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationUnit {
    pub id: UnitId,
    pub anchor: ComponentId,
    pub records: Vec<ChangeRecord>,
    /// Cleared once the unit has been rebuilt
    mergeable: bool,
}

impl ReconciliationUnit {
    pub fn new(anchor: ComponentId) -> Self {
        Self {
            id: UnitId(NEXT_UNIT.fetch_add(1, Ordering::Relaxed)),
            anchor,
            records: Vec::new(),
            mergeable: true,
        }
    }

    pub fn with_record(anchor: ComponentId, record: ChangeRecord) -> Self {
        let mut unit = Self::new(anchor);
        unit.push(record);
        unit
    }

    pub fn is_mergeable(&self) -> bool {
        self.mergeable
    }

    /// Mark the unit as rebuilt; sealed units accept no more records
    pub fn seal(&mut self) {
        self.mergeable = false;
    }

    /// Add a record unless an equal one is already present
    ///
    /// The record is retargeted to this unit's anchor.
    pub fn push(&mut self, mut record: ChangeRecord) -> bool {
        if !self.mergeable {
            return false;
        }
        record.anchor = self.anchor;
        if self.records.contains(&record) {
            return false;
        }
        self.records.push(record);
        true
    }

    /// Fold `other`'s records into this unit
    ///
    /// Returns false, leaving both untouched, when either side is sealed.
    pub fn merge(&mut self, other: ReconciliationUnit) -> bool {
        if !self.mergeable || !other.mergeable {
            return false;
        }
        for record in other.records {
            self.push(record);
        }
        true
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Units queued during one pass, keyed by anchor
#[derive(Debug, Default)]
pub struct ReconciliationQueue {
    units: BTreeMap<ComponentId, ReconciliationUnit>,
}

impl ReconciliationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, anchor: ComponentId) -> Option<&ReconciliationUnit> {
        self.units.get(&anchor)
    }

    pub fn anchors(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.units.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn clear(&mut self) {
        self.units.clear();
    }

    /// File a record under its anchor, merging with what is already queued
    pub fn submit(&mut self, components: &ComponentTree, tree: &RawTree, record: ChangeRecord) {
        let requested = record.anchor;
        let PreparedUnit {
            requested_anchor,
            resolved_anchor,
            unit,
        } = components.prepare_unit(record, self.units.get(&requested), tree, |anchor| {
            self.units.contains_key(&anchor)
        });

        let unit_id = unit.id;
        match self.units.remove(&resolved_anchor) {
            None => {
                self.units.insert(resolved_anchor, unit);
            }
            Some(queued) if queued.id == unit_id => {
                // the prepared unit is the queued one plus the new record
                self.units.insert(resolved_anchor, unit);
            }
            Some(mut queued) => {
                queued.merge(unit);
                self.units.insert(resolved_anchor, queued);
            }
        }

        if requested_anchor != resolved_anchor {
            if let Some(stale) = self.units.remove(&requested_anchor) {
                debug!(requested = %requested_anchor, resolved = %resolved_anchor, "dropping stale unit");
                self.merge_into(resolved_anchor, stale);
            }
        }

        self.absorb_descendants(components, resolved_anchor);
    }

    fn merge_into(&mut self, anchor: ComponentId, unit: ReconciliationUnit) {
        if let Some(target) = self.units.get_mut(&anchor) {
            target.merge(unit);
        }
    }

    /// Fold units anchored strictly inside `anchor` into its unit
    fn absorb_descendants(&mut self, components: &ComponentTree, anchor: ComponentId) {
        let nested: Vec<ComponentId> = self
            .units
            .keys()
            .copied()
            .filter(|other| *other != anchor && components.is_ancestor(anchor, *other))
            .collect();
        for other in nested {
            if let Some(unit) = self.units.remove(&other) {
                debug!(outer = %anchor, inner = %other, "absorbing nested unit");
                self.merge_into(anchor, unit);
            }
        }
    }

    /// Drain the queued units in anchor order
    pub fn into_units(self) -> Vec<ReconciliationUnit> {
        self.units.into_values().collect()
    }
}
