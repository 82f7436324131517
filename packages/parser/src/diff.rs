//! # Re-identification and Re-parse Diff
//!
//! After an external edit the whole document is re-parsed into a fresh tree.
//! [`reidentify`] walks the old and new trees side by side and gives every
//! new node whose kind, name and position line up with an old node that old
//! node's id. [`diff`] then compares the two trees along those shared ids and
//! emits the snapshot pairs a tracked mutation would have raised.
//!
//! Matching is positional and greedy: content children are paired in order
//! by key (element name, text, token), attributes are paired by name. This
//! handles trees that differ only in the region touched by an edit; it is
//! not a general tree diff.

use crate::snapshot::SnapshotPair;
use crate::tree::{NodeData, NodeId, RawTree};
use std::collections::{HashMap, HashSet};

/// Matching key for content children
#[derive(Debug, PartialEq, Eq)]
enum MatchKey<'a> {
    Element(&'a str),
    Text,
    Token,
    Other,
}

fn match_key(tree: &RawTree, id: NodeId) -> MatchKey<'_> {
    match tree.get(id).map(|node| node.data()) {
        Some(NodeData::Element(element)) => MatchKey::Element(&element.name),
        Some(NodeData::Text(_)) => MatchKey::Text,
        Some(NodeData::Token(_)) => MatchKey::Token,
        _ => MatchKey::Other,
    }
}

/// Carry ids over from `old` into `new`
///
/// Unmatched new nodes keep their ids. When the trees come from different
/// id lineages, `new` first adopts the lineage of `old` so unmatched ids can
/// never collide with carried ones. Returns the number of carried ids.
pub fn reidentify(old: &RawTree, new: &mut RawTree) -> usize {
    if !old.ids.same_lineage(&new.ids) {
        adopt_lineage(old, new);
    }

    let mut mapping = HashMap::new();
    match_pair(old, new, old.document(), new.document(), &mut mapping);
    mapping.retain(|new_id, old_id| new_id != old_id);
    let carried = mapping.len();
    new.remap_ids(&mapping);
    carried
}

/// Re-key every node of `new` with fresh ids drawn from the lineage of `old`
fn adopt_lineage(old: &RawTree, new: &mut RawTree) {
    new.ids = old.ids.clone();
    let fresh: HashMap<NodeId, NodeId> = {
        let mut ids: Vec<NodeId> = new.node_ids().into_iter().collect();
        ids.sort();
        ids.into_iter().map(|id| (id, new.ids.new_id())).collect()
    };
    new.remap_ids(&fresh);
}

fn match_pair(old: &RawTree, new: &RawTree, old_id: NodeId, new_id: NodeId, mapping: &mut HashMap<NodeId, NodeId>) {
    mapping.insert(new_id, old_id);

    for attr in new.attributes(new_id) {
        let Some(name) = new.get(*attr).and_then(|node| node.as_attribute()).map(|data| data.name.as_str()) else {
            continue;
        };
        if let Some(old_attr) = old.attribute_node(old_id, name) {
            mapping.insert(*attr, old_attr);
        }
    }

    let old_children = old.children(old_id);
    let mut cursor = 0;
    for new_child in new.children(new_id) {
        let key = match_key(new, *new_child);
        let found = old_children[cursor..]
            .iter()
            .position(|old_child| match_key(old, *old_child) == key);
        if let Some(offset) = found {
            let old_child = old_children[cursor + offset];
            cursor += offset + 1;
            match_pair(old, new, old_child, *new_child, mapping);
        }
    }
}

/// Snapshot pairs describing how `new` differs from `old`
///
/// Expects `new` to have been re-identified against `old`. Nodes present
/// in both trees with different own tokens or attributes yield a modify
/// pair; children only in `old` yield removals with their pre-edit
/// ancestry; children only in `new` yield insertions; a change in the
/// relative order of surviving children yields a modify pair on the parent.
pub fn diff(old: &RawTree, new: &RawTree) -> Vec<SnapshotPair> {
    let mut pairs = Vec::new();
    diff_node(old, new, old.document(), &mut pairs);
    pairs
}

fn diff_node(old: &RawTree, new: &RawTree, id: NodeId, pairs: &mut Vec<SnapshotPair>) {
    let own_changed = old.own_tokens(id) != new.own_tokens(id);
    let attrs_changed = attribute_tokens(old, id) != attribute_tokens(new, id);

    let old_children = old.children(id);
    let new_children = new.children(id);
    let old_set: HashSet<NodeId> = old_children.iter().copied().collect();
    let new_set: HashSet<NodeId> = new_children.iter().copied().collect();

    let old_common: Vec<NodeId> = old_children.iter().copied().filter(|c| new_set.contains(c)).collect();
    let new_common: Vec<NodeId> = new_children.iter().copied().filter(|c| old_set.contains(c)).collect();
    let reordered = old_common != new_common;

    if (own_changed || attrs_changed || reordered) && id != old.document() {
        pairs.push(SnapshotPair::modified(old.snapshot(id, false), new.snapshot(id, true)));
    }

    for child in old_children.iter().filter(|c| !new_set.contains(c)) {
        pairs.push(SnapshotPair::removed(old.snapshot(*child, false)));
    }
    for child in new_children.iter().filter(|c| !old_set.contains(c)) {
        pairs.push(SnapshotPair::inserted(new.snapshot(*child, true)));
    }
    for child in new_common {
        diff_node(old, new, child, pairs);
    }
}

fn attribute_tokens(tree: &RawTree, id: NodeId) -> Vec<(NodeId, Vec<crate::tree::RawToken>)> {
    tree.attributes(id)
        .iter()
        .map(|attr| (*attr, tree.own_tokens(*attr)))
        .collect()
}
