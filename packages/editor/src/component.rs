//! # Component Tree
//!
//! Components wrap raw tree nodes (their *peers*) with a stable identity the
//! rest of an application can hold on to. Only elements and significant
//! text get components, and children are materialised lazily: a component's
//! child list stays `None` until someone asks for it, and reconciliation
//! never descends into regions nobody has observed.
//!
//! The peer id is the join key between old and new raw trees. A rebuild
//! reuses the component already bound to a peer; only when a peer vanished
//! does it try to correlate the old component with a new node, and only
//! when that fails does it create a fresh component.

use crate::change::{ChangeKind, ChangeRecord};
use crate::errors::{EditorError, EditorResult};
use crate::unit::ReconciliationUnit;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;
use weft_parser::{NodeId, NodeKind, RawTree, TreeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentId(pub u64);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComponentKind {
    Element,
    Text,
}

/// Where a component's peer currently lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Placement {
    /// Reachable from the live document
    InTree,
    /// Part of a detached subtree rooted at `root`
    Floating { root: NodeId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub(crate) id: ComponentId,
    pub(crate) peer: NodeId,
    pub(crate) kind: ComponentKind,
    pub(crate) parent: Option<ComponentId>,
    /// `None` until the children are first observed
    pub(crate) children: Option<Vec<ComponentId>>,
}

impl Component {
    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn peer(&self) -> NodeId {
        self.peer
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn parent(&self) -> Option<ComponentId> {
        self.parent
    }

    /// Children, if they have been observed
    pub fn observed_children(&self) -> Option<&[ComponentId]> {
        self.children.as_deref()
    }
}

/// Outcome of preparing a unit for a record
#[derive(Debug, Clone)]
pub struct PreparedUnit {
    pub requested_anchor: ComponentId,
    /// Equal to the requested anchor unless the record had to move up
    pub resolved_anchor: ComponentId,
    pub unit: ReconciliationUnit,
}

/// Components touched by a rebuild
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildReport {
    /// Anchors whose subtrees were reconciled
    pub updated: Vec<ComponentId>,
    pub created: Vec<ComponentId>,
    /// Components moved to a new peer after their old peer disappeared
    pub rebound: Vec<ComponentId>,
    /// Components whose peer left the document but still exists
    pub detached: Vec<ComponentId>,
    pub destroyed: Vec<ComponentId>,
}

impl RebuildReport {
    pub fn extend(&mut self, other: RebuildReport) {
        self.updated.extend(other.updated);
        self.created.extend(other.created);
        self.rebound.extend(other.rebound);
        self.detached.extend(other.detached);
        self.destroyed.extend(other.destroyed);
    }

    pub fn is_empty(&self) -> bool {
        self.updated.is_empty()
            && self.created.is_empty()
            && self.rebound.is_empty()
            && self.detached.is_empty()
            && self.destroyed.is_empty()
    }
}

/// How a rebuild pairs vanished peers with new nodes
#[derive(Debug, Clone, Copy)]
pub enum Correlation<'a> {
    /// After a re-parse: structural equivalence against the pre-edit tree
    Structural(&'a RawTree),
    /// After a programmatic mutation: a replaced peer is rebound to the
    /// new node of the same kind and name at its position
    Replaced,
    None,
}

#[derive(Debug, Clone, Default)]
pub struct ComponentTree {
    components: HashMap<ComponentId, Component>,
    by_peer: HashMap<NodeId, ComponentId>,
    root: Option<ComponentId>,
    next_id: u64,
    preserve_whitespace: bool,
}

impl ComponentTree {
    pub fn new(preserve_whitespace: bool) -> Self {
        Self {
            preserve_whitespace,
            ..Self::default()
        }
    }

    pub fn root(&self) -> Option<ComponentId> {
        self.root
    }

    pub(crate) fn set_root(&mut self, root: Option<ComponentId>) {
        self.root = root;
    }

    pub fn get(&self, id: ComponentId) -> Option<&Component> {
        self.components.get(&id)
    }

    pub fn component(&self, id: ComponentId) -> EditorResult<&Component> {
        self.components.get(&id).ok_or(EditorError::UnknownComponent(id))
    }

    pub fn peer(&self, id: ComponentId) -> EditorResult<NodeId> {
        self.component(id).map(Component::peer)
    }

    /// Component bound to `peer`, if any
    pub fn component_for(&self, peer: NodeId) -> Option<ComponentId> {
        self.by_peer.get(&peer).copied()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.components.keys().copied()
    }

    /// Whether any node of the subtree at `root` has a component
    pub fn references_subtree(&self, tree: &RawTree, root: NodeId) -> bool {
        tree.descendants(root)
            .iter()
            .any(|node| self.by_peer.contains_key(node))
    }

    pub fn placement(&self, tree: &RawTree, id: ComponentId) -> EditorResult<Placement> {
        let peer = self.peer(id)?;
        if tree.is_reachable(peer) {
            Ok(Placement::InTree)
        } else {
            Ok(Placement::Floating {
                root: tree.subtree_root(peer),
            })
        }
    }

    pub fn is_in_tree(&self, tree: &RawTree, id: ComponentId) -> bool {
        matches!(self.placement(tree, id), Ok(Placement::InTree))
    }

    /// Component ancestors, nearest first
    pub fn ancestors(&self, id: ComponentId) -> Vec<ComponentId> {
        let mut ancestors = Vec::new();
        let mut current = self.components.get(&id).and_then(|c| c.parent);
        while let Some(parent) = current {
            ancestors.push(parent);
            current = self.components.get(&parent).and_then(|c| c.parent);
        }
        ancestors
    }

    /// Whether `ancestor` is a strict ancestor of `id`
    pub fn is_ancestor(&self, ancestor: ComponentId, id: ComponentId) -> bool {
        self.ancestors(id).contains(&ancestor)
    }

    // ----- construction -----

    /// Bind a component to `peer`, or return the one already bound
    pub fn attach(&mut self, tree: &RawTree, peer: NodeId) -> EditorResult<ComponentId> {
        if let Some(existing) = self.by_peer.get(&peer) {
            return Ok(*existing);
        }
        let kind = match tree.node(peer)?.kind() {
            NodeKind::Element => ComponentKind::Element,
            NodeKind::Text => ComponentKind::Text,
            _ => return Err(TreeError::invalid(peer, "only elements and text have components").into()),
        };
        let parent = tree
            .ancestors(peer)
            .into_iter()
            .find_map(|ancestor| self.by_peer.get(&ancestor).copied());
        Ok(self.create(peer, kind, parent))
    }

    fn create(&mut self, peer: NodeId, kind: ComponentKind, parent: Option<ComponentId>) -> ComponentId {
        self.next_id += 1;
        let id = ComponentId(self.next_id);
        self.components.insert(
            id,
            Component {
                id,
                peer,
                kind,
                parent,
                children: None,
            },
        );
        self.by_peer.insert(peer, id);
        debug!(component = %id, peer = %peer, "created component");
        id
    }

    /// Remove a component and its observed descendants
    pub fn destroy(&mut self, id: ComponentId) -> Vec<ComponentId> {
        let mut destroyed = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(component) = self.components.remove(&current) else {
                continue;
            };
            if self.by_peer.get(&component.peer) == Some(&current) {
                self.by_peer.remove(&component.peer);
            }
            for child in component.children.unwrap_or_default() {
                if self.components.get(&child).and_then(|c| c.parent) == Some(current) {
                    stack.push(child);
                }
            }
            destroyed.push(current);
        }
        if self.root == Some(id) {
            debug!(root = %id, "destroyed root component");
            self.root = None;
        }
        destroyed
    }

    /// Raw children of `peer` that get components
    fn significant_children(&self, tree: &RawTree, peer: NodeId) -> Vec<(NodeId, ComponentKind)> {
        tree.children(peer)
            .iter()
            .filter_map(|child| {
                let node = tree.get(*child)?;
                match node.kind() {
                    NodeKind::Element => Some((*child, ComponentKind::Element)),
                    NodeKind::Text => {
                        let text = node.as_text().unwrap_or_default();
                        (self.preserve_whitespace || !text.trim().is_empty()).then_some((*child, ComponentKind::Text))
                    }
                    _ => None,
                }
            })
            .collect()
    }

    /// Children of a component, materialising them on first observation
    pub fn children(&mut self, tree: &RawTree, id: ComponentId) -> EditorResult<Vec<ComponentId>> {
        let component = self.component(id)?;
        if let Some(children) = &component.children {
            return Ok(children.clone());
        }
        if component.kind == ComponentKind::Text {
            return Ok(Vec::new());
        }

        let peer = component.peer;
        let mut children = Vec::new();
        for (node, kind) in self.significant_children(tree, peer) {
            let child = match self.by_peer.get(&node).copied() {
                Some(existing) => existing,
                None => self.create(node, kind, Some(id)),
            };
            if let Some(component) = self.components.get_mut(&child) {
                component.parent = Some(id);
            }
            children.push(child);
        }
        if let Some(component) = self.components.get_mut(&id) {
            component.children = Some(children.clone());
        }
        Ok(children)
    }

    // ----- reconciliation -----

    /// Nearest element component on a record path
    ///
    /// Modifications may anchor at the node itself; insertions and removals
    /// anchor strictly above it.
    pub fn anchor_for(&self, path: &[NodeId], change: ChangeKind) -> Option<ComponentId> {
        let start = if change == ChangeKind::Modified { 0 } else { 1 };
        path.iter().skip(start).find_map(|peer| {
            let id = self.by_peer.get(peer)?;
            (self.components.get(id)?.kind == ComponentKind::Element).then_some(*id)
        })
    }

    /// Prepare the unit a record belongs in
    ///
    /// The anchor moves up when its peer is no longer in the document (the
    /// anchored element sits in a removed subtree) and again to the topmost
    /// ancestor that already has a queued unit. When the anchor does not
    /// move, the record joins `existing`.
    pub fn prepare_unit(
        &self,
        record: ChangeRecord,
        existing: Option<&ReconciliationUnit>,
        tree: &RawTree,
        is_queued: impl Fn(ComponentId) -> bool,
    ) -> PreparedUnit {
        let requested = record.anchor;
        let mut resolved = requested;

        while let Some(component) = self.components.get(&resolved) {
            match component.parent {
                Some(parent) if !tree.is_reachable(component.peer) => resolved = parent,
                _ => break,
            }
        }
        if let Some(queued) = self
            .ancestors(resolved)
            .into_iter()
            .filter(|ancestor| is_queued(*ancestor))
            .last()
        {
            resolved = queued;
        }

        let mut unit = match existing {
            Some(existing) if resolved == requested && existing.is_mergeable() => existing.clone(),
            _ => ReconciliationUnit::new(resolved),
        };
        unit.push(record);

        PreparedUnit {
            requested_anchor: requested,
            resolved_anchor: resolved,
            unit,
        }
    }

    /// Bring the observed subtree under a unit's anchor in line with `tree`
    pub fn rebuild(&mut self, unit: &ReconciliationUnit, tree: &RawTree, correlation: Correlation<'_>) -> RebuildReport {
        let mut report = RebuildReport::default();
        if !self.components.contains_key(&unit.anchor) {
            debug!(anchor = %unit.anchor, "anchor vanished before rebuild");
            return report;
        }
        report.updated.push(unit.anchor);
        self.reconcile(unit.anchor, tree, correlation, &mut report);
        report
    }

    /// Reconcile one component's observed children, then recurse
    pub(crate) fn reconcile(
        &mut self,
        id: ComponentId,
        tree: &RawTree,
        correlation: Correlation<'_>,
        report: &mut RebuildReport,
    ) {
        let Some(component) = self.components.get(&id) else {
            return;
        };
        let Some(observed) = component.children.clone() else {
            return;
        };
        let peer = component.peer;

        let mut pool = observed;
        let mut next = Vec::new();
        for (node, kind) in self.significant_children(tree, peer) {
            let child = if let Some(existing) = self.by_peer.get(&node).copied() {
                pool.retain(|c| *c != existing);
                existing
            } else if let Some(index) = self.correlate(&pool, tree, node, kind, correlation) {
                let rebound = pool.remove(index);
                self.rebind(rebound, node);
                report.rebound.push(rebound);
                rebound
            } else {
                let created = self.create(node, kind, Some(id));
                report.created.push(created);
                created
            };
            if let Some(component) = self.components.get_mut(&child) {
                component.parent = Some(id);
            }
            next.push(child);
        }

        for leftover in pool {
            let Some(component) = self.components.get(&leftover) else {
                continue;
            };
            if component.parent != Some(id) {
                continue;
            }
            if tree.contains(component.peer) {
                if let Some(component) = self.components.get_mut(&leftover) {
                    component.parent = None;
                }
                report.detached.push(leftover);
            } else {
                report.destroyed.extend(self.destroy(leftover));
            }
        }

        if let Some(component) = self.components.get_mut(&id) {
            component.children = Some(next.clone());
        }
        for child in next {
            self.reconcile(child, tree, correlation, report);
        }
    }

    fn correlate(
        &self,
        pool: &[ComponentId],
        tree: &RawTree,
        node: NodeId,
        kind: ComponentKind,
        correlation: Correlation<'_>,
    ) -> Option<usize> {
        pool.iter().position(|candidate| {
            let Some(component) = self.components.get(candidate) else {
                return false;
            };
            if component.kind != kind {
                return false;
            }
            match correlation {
                Correlation::Structural(previous) => {
                    !tree.contains(component.peer) && previous.same_node(component.peer, tree, node)
                }
                Correlation::Replaced => {
                    !tree.is_reachable(component.peer)
                        && match (tree.element(component.peer), tree.element(node)) {
                            (Ok(old), Ok(new)) => old.name == new.name,
                            _ => kind == ComponentKind::Text,
                        }
                }
                Correlation::None => false,
            }
        })
    }

    fn rebind(&mut self, id: ComponentId, peer: NodeId) {
        let Some(component) = self.components.get_mut(&id) else {
            return;
        };
        let old = std::mem::replace(&mut component.peer, peer);
        // the old peer's children are gone with it
        component.children = None;
        if self.by_peer.get(&old) == Some(&id) {
            self.by_peer.remove(&old);
        }
        self.by_peer.insert(peer, id);
        debug!(component = %id, from = %old, to = %peer, "rebound component");
    }

    /// Destroys every component other than the root whose peer is gone,
    /// including ones attached below a parent that never observed them.
    pub fn prune(&mut self, tree: &RawTree) -> Vec<ComponentId> {
        let orphans: Vec<ComponentId> = self
            .components
            .values()
            .filter(|c| Some(c.id) != self.root && !tree.contains(c.peer))
            .map(|c| c.id)
            .collect();
        let mut destroyed = Vec::new();
        for id in orphans {
            // already taken down with an ancestor
            let Some(parent) = self.components.get(&id).map(|c| c.parent) else {
                continue;
            };
            if let Some(children) = parent
                .and_then(|p| self.components.get_mut(&p))
                .and_then(|p| p.children.as_mut())
            {
                children.retain(|child| *child != id);
            }
            destroyed.extend(self.destroy(id));
        }
        destroyed
    }

    // ----- views -----

    pub fn view(&self, tree: &RawTree, id: ComponentId) -> EditorResult<ComponentView> {
        let component = self.component(id)?;
        let placement = self.placement(tree, id)?;
        match component.kind {
            ComponentKind::Element => {
                let element = tree.element(component.peer)?;
                let attributes = tree
                    .attributes(component.peer)
                    .iter()
                    .filter_map(|attr| tree.get(*attr)?.as_attribute())
                    .map(|attr| AttributeView {
                        name: attr.name.clone(),
                        value: attr.value(),
                    })
                    .collect();
                Ok(ComponentView::Element(ElementView {
                    id,
                    peer: component.peer,
                    name: element.name.clone(),
                    prefix: element.prefix().map(str::to_string),
                    local_name: element.local_name().to_string(),
                    namespace: tree.namespace_of(component.peer),
                    attributes,
                    placement,
                }))
            }
            ComponentKind::Text => Ok(ComponentView::Text(TextView {
                id,
                peer: component.peer,
                text: tree.text_content(component.peer),
                placement,
            })),
        }
    }
}

/// Read-only snapshot of a component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ComponentView {
    Element(ElementView),
    Text(TextView),
}

impl ComponentView {
    pub fn id(&self) -> ComponentId {
        match self {
            ComponentView::Element(view) => view.id,
            ComponentView::Text(view) => view.id,
        }
    }

    pub fn as_element(&self) -> Option<&ElementView> {
        match self {
            ComponentView::Element(view) => Some(view),
            ComponentView::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextView> {
        match self {
            ComponentView::Text(view) => Some(view),
            ComponentView::Element(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementView {
    pub id: ComponentId,
    pub peer: NodeId,
    pub name: String,
    pub prefix: Option<String>,
    pub local_name: String,
    pub namespace: Option<String>,
    pub attributes: Vec<AttributeView>,
    pub placement: Placement,
}

impl ElementView {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeView {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextView {
    pub id: ComponentId,
    pub peer: NodeId,
    pub text: String,
    pub placement: Placement,
}
