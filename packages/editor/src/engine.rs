//! # Sync Engine
//!
//! Keeps a [`ComponentTree`] consistent with the [`RawTree`] beneath it.
//!
//! ## Passes
//!
//! ```text
//! Idle ──start_sync──▶ TrackedPass ──end_sync(commit)──▶ Idle
//! ```
//!
//! A pass snapshots the current tree, swaps in the re-parsed one (ids carried
//! over), turns the diff into change records and files them in the
//! reconciliation queue. Committing rebuilds every queued unit once; rolling
//! back restores the snapshot and drops speculative components. A document
//! that ends up without a root element is rolled back and reported as
//! [`SyncResult::NotWellFormed`].
//!
//! ## Programmatic edits
//!
//! Edits made through the engine know their shape. Edits to floating
//! subtrees go straight to the raw tree. Edits to the live document are
//! tracked, folded into exactly one [`ReconciliationUnit`], and handed to an
//! [`Updater`] that brings the affected components up to date.

use crate::change::{ChangeKind, ChangeRecord};
use crate::component::{ComponentId, ComponentTree, ComponentView, Correlation, Placement, RebuildReport};
use crate::config::EngineConfig;
use crate::context::{MutationContext, MutationOutcome};
use crate::errors::{EditorError, EditorResult};
use crate::undo_stack::UndoStack;
use crate::unit::{ReconciliationQueue, ReconciliationUnit};
use crate::updater::{Rebinder, Updater};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, instrument, warn};
use weft_parser::{
    diff, parse_with_ids, reidentify, serialize, IDGenerator, MutationOp, NodeId, NodeKind, NodeSnapshot,
    RawTree, SnapshotPair, TreeError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncResult {
    Valid,
    NotWellFormed,
}

impl SyncResult {
    pub fn is_valid(&self) -> bool {
        *self == SyncResult::Valid
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerId(u64);

/// What a committed pass or an in-tree mutation changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    pub units: Vec<ReconciliationUnit>,
    pub rebuild: RebuildReport,
    pub root_replaced: bool,
    /// Produced while replaying undo/redo history
    pub replay: bool,
}

type Listener = Box<dyn Fn(&ReconciliationReport) + Send + Sync>;

struct PassState {
    previous: RawTree,
    queue: ReconciliationQueue,
    /// Root component built for a replacement document element
    pending_root: Option<ComponentId>,
    root_removed: bool,
    events_started: bool,
}

pub struct SyncEngine {
    config: EngineConfig,
    tree: RawTree,
    components: ComponentTree,
    pass: Option<PassState>,
    replaying: bool,
    history: UndoStack,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
    last_report: Option<ReconciliationReport>,
}

impl fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncEngine")
            .field("config", &self.config)
            .field("nodes", &self.tree.len())
            .field("components", &self.components.len())
            .field("syncing", &self.pass.is_some())
            .field("replaying", &self.replaying)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_ids(IDGenerator::default(), config)
    }

    /// Engine whose node ids are seeded from the document path
    pub fn for_path(path: &str, config: EngineConfig) -> Self {
        Self::with_ids(IDGenerator::new(path), config)
    }

    fn with_ids(ids: IDGenerator, config: EngineConfig) -> Self {
        Self {
            tree: RawTree::new(ids),
            components: ComponentTree::new(config.preserve_whitespace_text),
            history: UndoStack::with_max_levels(config.undo_levels),
            config,
            pass: None,
            replaying: false,
            listeners: Vec::new(),
            next_listener: 0,
            last_report: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tree(&self) -> &RawTree {
        &self.tree
    }

    pub fn components(&self) -> &ComponentTree {
        &self.components
    }

    pub fn root(&self) -> Option<ComponentId> {
        self.components.root()
    }

    pub fn history(&self) -> &UndoStack {
        &self.history
    }

    pub fn is_syncing(&self) -> bool {
        self.pass.is_some()
    }

    pub fn is_replaying(&self) -> bool {
        self.replaying
    }

    /// Report of the most recent committed pass or in-tree mutation
    pub fn last_report(&self) -> Option<&ReconciliationReport> {
        self.last_report.as_ref()
    }

    /// Current document text
    pub fn text(&self) -> String {
        serialize(&self.tree)
    }

    /// The engine's own view of the mutation guard inputs
    pub fn context(&self) -> MutationContext {
        MutationContext {
            pass_in_progress: self.pass.is_some(),
            events_started: self.pass.as_ref().map_or(false, |pass| pass.events_started),
            replaying: self.replaying,
        }
    }

    // ----- listeners -----

    pub fn add_reconciliation_listener<F>(&mut self, listener: F) -> ListenerId
    where
        F: Fn(&ReconciliationReport) + Send + Sync + 'static,
    {
        self.next_listener += 1;
        let id = ListenerId(self.next_listener);
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn remove_reconciliation_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener, _)| *listener != id);
        self.listeners.len() != before
    }

    fn publish(&mut self, report: ReconciliationReport) {
        for (_, listener) in &self.listeners {
            listener(&report);
        }
        self.last_report = Some(report);
    }

    // ----- synchronization -----

    /// Re-parse `text` and reconcile the component tree with it
    #[instrument(skip(self, text), fields(bytes = text.len()))]
    pub fn sync(&mut self, text: &str) -> EditorResult<SyncResult> {
        if self.pass.is_some() {
            return Err(EditorError::AlreadySyncing);
        }
        let parsed = parse_with_ids(text, self.tree.ids().clone())?;
        self.sync_parsed(parsed)
    }

    /// Reconcile with a tree parsed elsewhere (for example off the lock)
    pub fn sync_parsed(&mut self, parsed: RawTree) -> EditorResult<SyncResult> {
        if self.pass.is_some() {
            return Err(EditorError::AlreadySyncing);
        }
        if self.components.root().is_none() {
            return self.initial_sync(parsed);
        }

        let result = self.run_pass(parsed, true)?;
        if result.is_valid() && !self.replaying {
            // structural history does not survive external edits
            self.history.clear();
        }
        Ok(result)
    }

    fn initial_sync(&mut self, mut parsed: RawTree) -> EditorResult<SyncResult> {
        if parsed.root_element().is_none() {
            info!(diagnostics = parsed.diagnostics().len(), "document is not well-formed");
            return Ok(SyncResult::NotWellFormed);
        }
        self.prepare_incoming(&mut parsed, true);

        let Some(root) = parsed.root_element() else {
            return Ok(SyncResult::NotWellFormed);
        };
        self.check_root(&parsed, root)?;

        self.tree = parsed;
        let component = self.components.attach(&self.tree, root)?;
        self.components.set_root(Some(component));
        info!(root = %component, peer = %root, "created root component");
        Ok(SyncResult::Valid)
    }

    /// Enter a tracked pass
    pub fn start_sync(&mut self) -> EditorResult<()> {
        if self.pass.is_some() {
            return Err(EditorError::AlreadySyncing);
        }
        self.pass = Some(PassState {
            previous: self.tree.clone(),
            queue: ReconciliationQueue::new(),
            pending_root: None,
            root_removed: false,
            events_started: false,
        });
        debug!("entered tracked pass");
        Ok(())
    }

    /// Leave the tracked pass, committing or rolling back its work
    ///
    /// Returns the report of a commit. The pass is closed whatever happens.
    pub fn end_sync(&mut self, commit: bool) -> EditorResult<Option<ReconciliationReport>> {
        let pass = self.pass.take().ok_or(EditorError::NotSyncing)?;

        if !commit {
            self.tree = pass.previous;
            if let Some(pending) = pass.pending_root {
                self.components.destroy(pending);
            }
            info!(discarded = pass.queue.len(), "pass rolled back");
            return Ok(None);
        }

        let mut report = ReconciliationReport {
            replay: self.replaying,
            ..ReconciliationReport::default()
        };

        if let Some(pending) = pass.pending_root {
            if let Some(old) = self.components.root() {
                report.rebuild.destroyed.extend(self.components.destroy(old));
            }
            self.components.set_root(Some(pending));
            report.root_replaced = true;
        }

        for mut unit in pass.queue.into_units() {
            let rebuilt = self
                .components
                .rebuild(&unit, &self.tree, Correlation::Structural(&pass.previous));
            report.rebuild.extend(rebuilt);
            unit.seal();
            report.units.push(unit);
        }
        self.collect_garbage();

        info!(
            units = report.units.len(),
            created = report.rebuild.created.len(),
            destroyed = report.rebuild.destroyed.len(),
            root_replaced = report.root_replaced,
            "pass committed"
        );
        self.publish(report.clone());
        Ok(Some(report))
    }

    fn run_pass(&mut self, parsed: RawTree, reidentify_ids: bool) -> EditorResult<SyncResult> {
        self.start_sync()?;
        match self.apply_pass(parsed, reidentify_ids) {
            Ok(SyncResult::Valid) => {
                self.end_sync(true)?;
                Ok(SyncResult::Valid)
            }
            Ok(SyncResult::NotWellFormed) => {
                self.end_sync(false)?;
                Ok(SyncResult::NotWellFormed)
            }
            Err(error) => {
                if let Err(close) = self.end_sync(false) {
                    warn!(%close, "failed to close pass");
                }
                Err(error)
            }
        }
    }

    fn apply_pass(&mut self, mut parsed: RawTree, reidentify_ids: bool) -> EditorResult<SyncResult> {
        if parsed.root_element().is_none() {
            info!(diagnostics = parsed.diagnostics().len(), "document is not well-formed");
            return Ok(SyncResult::NotWellFormed);
        }
        self.prepare_incoming(&mut parsed, reidentify_ids);
        self.tree = parsed;

        let pairs = {
            let pass = self.pass.as_mut().ok_or(EditorError::NotSyncing)?;
            pass.events_started = true;
            diff(&pass.previous, &self.tree)
        };
        debug!(pairs = pairs.len(), "diff complete");

        for pair in &pairs {
            self.process_pair(pair)?;
        }

        let pass = self.pass.as_ref().ok_or(EditorError::NotSyncing)?;
        if pass.root_removed && pass.pending_root.is_none() {
            info!("document element removed without replacement");
            return Ok(SyncResult::NotWellFormed);
        }
        Ok(SyncResult::Valid)
    }

    /// Carry ids and referenced floating subtrees over into `incoming`
    fn prepare_incoming(&self, incoming: &mut RawTree, reidentify_ids: bool) {
        if reidentify_ids || !incoming.ids().same_lineage(self.tree.ids()) {
            let carried = reidentify(&self.tree, incoming);
            debug!(carried, "re-identified nodes");
        }
        for root in self.tree.detached_roots() {
            if !self.components.references_subtree(&self.tree, root) {
                continue;
            }
            if let Err(error) = incoming.transplant(&self.tree, root) {
                debug!(root = %root, %error, "floating subtree not carried over");
            }
        }
    }

    fn process_pair(&mut self, pair: &SnapshotPair) -> EditorResult<()> {
        for snapshot in pair.snapshots() {
            self.process_snapshot(snapshot, ChangeKind::of(pair, snapshot))?;
        }
        Ok(())
    }

    fn process_snapshot(&mut self, snapshot: &NodeSnapshot, change: ChangeKind) -> EditorResult<()> {
        if snapshot.is_root_level() {
            if snapshot.kind != NodeKind::Element {
                return Ok(());
            }
            let root_peer = self.components.root().and_then(|root| self.components.peer(root).ok());
            let modifies_root = change == ChangeKind::Modified && Some(snapshot.node) == root_peer;
            if !modifies_root {
                return if snapshot.added {
                    self.construct_pending_root(snapshot.node)
                } else {
                    if let Some(pass) = self.pass.as_mut() {
                        pass.root_removed = true;
                    }
                    Ok(())
                };
            }
        }

        let pass = self.pass.as_mut().ok_or(EditorError::NotSyncing)?;
        let context = if change == ChangeKind::Removed {
            &pass.previous
        } else {
            &self.tree
        };
        let components = &self.components;
        let record = ChangeRecord::from_snapshot(snapshot, change, &self.tree, context, |path| {
            components.anchor_for(path, change).or(components.root())
        });
        if let Some(record) = record {
            debug!(node = %record.node, anchor = %record.anchor, change = ?change, "filing change record");
            pass.queue.submit(components, &self.tree, record);
        }
        Ok(())
    }

    fn construct_pending_root(&mut self, node: NodeId) -> EditorResult<()> {
        self.check_root(&self.tree, node)?;
        let component = self.components.attach(&self.tree, node)?;
        if let Some(pass) = self.pass.as_mut() {
            pass.pending_root = Some(component);
        }
        debug!(component = %component, peer = %node, "constructed replacement root");
        Ok(())
    }

    fn check_root(&self, tree: &RawTree, node: NodeId) -> EditorResult<()> {
        let Some(expected) = &self.config.expected_root else {
            return Ok(());
        };
        let found = &tree.element(node)?.name;
        if found != expected {
            return Err(EditorError::UnexpectedRoot {
                expected: expected.clone(),
                found: found.clone(),
            });
        }
        Ok(())
    }

    /// Drop detached nodes and components nothing refers to any more
    fn collect_garbage(&mut self) {
        let keep: HashSet<NodeId> = self
            .tree
            .detached_roots()
            .into_iter()
            .filter(|root| self.components.references_subtree(&self.tree, *root))
            .collect();
        let nodes = self.tree.prune_detached(|root| keep.contains(&root));
        let components = self.components.prune(&self.tree).len();
        if nodes > 0 || components > 0 {
            debug!(nodes, components, "collected garbage");
        }
    }

    // ----- undo / redo -----

    pub fn prepare_for_undo_redo(&mut self) {
        self.replaying = true;
    }

    pub fn finish_undo_redo(&mut self) {
        self.replaying = false;
    }

    /// Reconcile with a stored tree state, trusting its ids
    #[instrument(skip(self, state), fields(nodes = state.len()))]
    pub fn replay(&mut self, state: RawTree) -> EditorResult<SyncResult> {
        if self.pass.is_some() {
            return Err(EditorError::AlreadySyncing);
        }
        if self.components.root().is_none() {
            return self.initial_sync(state);
        }
        self.run_pass(state, false)
    }

    /// Group the following edits into one undo step
    pub fn begin_batch(&mut self, description: impl Into<String>) {
        self.history.begin_batch();
        self.history.set_batch_description(description);
    }

    pub fn end_batch(&mut self) {
        self.history.end_batch();
    }

    pub fn undo(&mut self) -> EditorResult<bool> {
        let Some(entry) = self.history.pop_undo() else {
            return Ok(false);
        };
        match self.replay_entry(entry.before.clone()) {
            Ok(true) => {
                self.history.push_redo(entry);
                Ok(true)
            }
            other => {
                self.history.push_undo(entry);
                other
            }
        }
    }

    pub fn redo(&mut self) -> EditorResult<bool> {
        let Some(entry) = self.history.pop_redo() else {
            return Ok(false);
        };
        match self.replay_entry(entry.after.clone()) {
            Ok(true) => {
                self.history.push_undo(entry);
                Ok(true)
            }
            other => {
                self.history.push_redo(entry);
                other
            }
        }
    }

    fn replay_entry(&mut self, state: RawTree) -> EditorResult<bool> {
        self.prepare_for_undo_redo();
        let result = self.replay(state);
        self.finish_undo_redo();
        Ok(result?.is_valid())
    }

    // ----- components -----

    pub fn view(&self, component: ComponentId) -> EditorResult<ComponentView> {
        self.components.view(&self.tree, component)
    }

    /// Children of a component, materialised on first call
    pub fn children(&mut self, component: ComponentId) -> EditorResult<Vec<ComponentId>> {
        self.components.children(&self.tree, component)
    }

    pub fn placement(&self, component: ComponentId) -> EditorResult<Placement> {
        self.components.placement(&self.tree, component)
    }

    pub fn is_in_tree(&self, component: ComponentId) -> bool {
        self.components.is_in_tree(&self.tree, component)
    }

    /// Text of the component's subtree
    pub fn component_text(&self, component: ComponentId) -> EditorResult<String> {
        Ok(weft_parser::serialize_node(&self.tree, self.components.peer(component)?))
    }

    /// Component for an existing element or text node
    pub fn attach(&mut self, node: NodeId) -> EditorResult<ComponentId> {
        self.components.attach(&self.tree, node)
    }

    /// New floating element component
    pub fn create_element(&mut self, name: &str) -> EditorResult<ComponentId> {
        let node = self.tree.create_element(name)?;
        self.components.attach(&self.tree, node)
    }

    /// New floating text component
    pub fn create_text(&mut self, text: &str) -> EditorResult<ComponentId> {
        let node = self.tree.create_text(text);
        self.components.attach(&self.tree, node)
    }

    /// Deep copy of a component's peer subtree as a new floating component
    pub fn duplicate(&mut self, component: ComponentId) -> EditorResult<ComponentId> {
        let peer = self.components.peer(component)?;
        let copy = self.tree.deep_copy(peer)?;
        self.components.attach(&self.tree, copy)
    }

    /// Forget a floating component and, if nothing else needs it, its nodes
    pub fn release(&mut self, component: ComponentId) -> EditorResult<()> {
        let peer = self.components.peer(component)?;
        if self.tree.is_reachable(peer) {
            return Err(TreeError::invalid(peer, "component is part of the document").into());
        }
        self.components.destroy(component);
        self.collect_garbage();
        Ok(())
    }

    // ----- mutations -----

    pub fn set_attribute(
        &mut self,
        ctx: &MutationContext,
        component: ComponentId,
        name: &str,
        value: &str,
    ) -> EditorResult<MutationOutcome> {
        let element = self.components.peer(component)?;
        self.apply(
            ctx,
            MutationOp::SetAttribute {
                element,
                name: name.to_string(),
                value: value.to_string(),
            },
        )
    }

    pub fn remove_attribute(&mut self, ctx: &MutationContext, component: ComponentId, name: &str) -> EditorResult<MutationOutcome> {
        let element = self.components.peer(component)?;
        self.apply(
            ctx,
            MutationOp::RemoveAttribute {
                element,
                name: name.to_string(),
            },
        )
    }

    pub fn append_child(&mut self, ctx: &MutationContext, parent: ComponentId, child: ComponentId) -> EditorResult<MutationOutcome> {
        let op = MutationOp::AppendChild {
            parent: self.components.peer(parent)?,
            child: self.components.peer(child)?,
        };
        self.apply(ctx, op)
    }

    pub fn insert_before(
        &mut self,
        ctx: &MutationContext,
        parent: ComponentId,
        child: ComponentId,
        before: ComponentId,
    ) -> EditorResult<MutationOutcome> {
        let op = MutationOp::InsertBefore {
            parent: self.components.peer(parent)?,
            child: self.components.peer(child)?,
            before: self.components.peer(before)?,
        };
        self.apply(ctx, op)
    }

    pub fn remove_child(&mut self, ctx: &MutationContext, parent: ComponentId, child: ComponentId) -> EditorResult<MutationOutcome> {
        let op = MutationOp::RemoveChild {
            parent: self.components.peer(parent)?,
            child: self.components.peer(child)?,
        };
        self.apply(ctx, op)
    }

    pub fn remove_children(
        &mut self,
        ctx: &MutationContext,
        parent: ComponentId,
        children: &[ComponentId],
    ) -> EditorResult<MutationOutcome> {
        let children = children
            .iter()
            .map(|child| self.components.peer(*child))
            .collect::<EditorResult<Vec<_>>>()?;
        let op = MutationOp::RemoveChildren {
            parent: self.components.peer(parent)?,
            children,
        };
        self.apply(ctx, op)
    }

    pub fn replace_child(
        &mut self,
        ctx: &MutationContext,
        parent: ComponentId,
        old: ComponentId,
        new: ComponentId,
    ) -> EditorResult<MutationOutcome> {
        let op = MutationOp::ReplaceChild {
            parent: self.components.peer(parent)?,
            old: self.components.peer(old)?,
            new: self.components.peer(new)?,
        };
        self.apply(ctx, op)
    }

    pub fn set_text(&mut self, ctx: &MutationContext, component: ComponentId, text: &str) -> EditorResult<MutationOutcome> {
        let element = self.components.peer(component)?;
        self.apply(
            ctx,
            MutationOp::SetText {
                element,
                text: text.to_string(),
            },
        )
    }

    pub fn set_xml_fragment(&mut self, ctx: &MutationContext, component: ComponentId, fragment: &str) -> EditorResult<MutationOutcome> {
        let element = self.components.peer(component)?;
        self.apply(
            ctx,
            MutationOp::SetXmlFragment {
                element,
                fragment: fragment.to_string(),
            },
        )
    }

    /// Reorder a component's children
    ///
    /// `permutation` ranges over the component children (significant nodes
    /// only); comments and layout whitespace keep their positions.
    pub fn reorder_children(
        &mut self,
        ctx: &MutationContext,
        parent: ComponentId,
        permutation: &[usize],
    ) -> EditorResult<MutationOutcome> {
        let peer = self.components.peer(parent)?;
        let observed = self.components.children(&self.tree, parent)?;
        if permutation.len() != observed.len() || permutation.iter().any(|index| *index >= observed.len()) {
            return Err(TreeError::invalid(peer, "reorder argument is not a permutation of the children").into());
        }

        let raw = self.tree.children(peer).to_vec();
        let slots = observed
            .iter()
            .map(|child| -> EditorResult<usize> {
                let child_peer = self.components.peer(*child)?;
                raw.iter()
                    .position(|id| *id == child_peer)
                    .ok_or_else(|| TreeError::invalid(child_peer, "not a child of the reordered element").into())
            })
            .collect::<EditorResult<Vec<usize>>>()?;

        let mut raw_permutation: Vec<usize> = (0..raw.len()).collect();
        for (position, slot) in slots.iter().enumerate() {
            raw_permutation[*slot] = slots[permutation[position]];
        }
        self.apply(
            ctx,
            MutationOp::ReorderChildren {
                parent: peer,
                permutation: raw_permutation,
            },
        )
    }

    pub fn set_prefix(&mut self, ctx: &MutationContext, component: ComponentId, prefix: Option<&str>) -> EditorResult<MutationOutcome> {
        let element = self.components.peer(component)?;
        self.apply(
            ctx,
            MutationOp::SetPrefix {
                element,
                prefix: prefix.map(str::to_string),
            },
        )
    }

    fn apply(&mut self, ctx: &MutationContext, op: MutationOp) -> EditorResult<MutationOutcome> {
        self.apply_with(ctx, op, &mut Rebinder)
    }

    fn is_suppressed(&self, ctx: &MutationContext) -> bool {
        let own = self.context();
        MutationContext {
            pass_in_progress: ctx.pass_in_progress || own.pass_in_progress,
            events_started: if own.pass_in_progress {
                own.events_started
            } else {
                ctx.events_started
            },
            replaying: ctx.replaying || own.replaying,
        }
        .is_suppressed()
    }

    /// Apply a raw mutation, threading in-tree results through `updater`
    pub fn apply_with(
        &mut self,
        ctx: &MutationContext,
        op: MutationOp,
        updater: &mut dyn Updater,
    ) -> EditorResult<MutationOutcome> {
        if self.is_suppressed(ctx) {
            debug!(op = op.name(), "mutation suppressed");
            return Ok(MutationOutcome::Suppressed);
        }

        let target = op.target();
        self.tree.node(target)?;
        if !self.tree.is_reachable(target) {
            return self.apply_floating(op, target);
        }
        self.guard_document_element(&op)?;

        let name = op.name();
        let before = self.tree.clone();
        self.tree.begin_tracking();
        let result = self.tree.mutate(op);
        let pairs = self.tree.end_tracking();
        let changed = result?;

        let root_replaced = match self.sync_root_component() {
            Ok(replaced) => replaced,
            Err(error) => {
                self.tree = before;
                return Err(error);
            }
        };
        let Some(mut unit) = self.unit_for(&pairs) else {
            debug!(op = name, changed = %changed, "in-tree mutation changed nothing");
            return Ok(MutationOutcome::Unchanged { changed });
        };
        debug!(op = name, changed = %changed, anchor = %unit.anchor, records = unit.len(), "applied in-tree mutation");

        let rebuild = updater.update(&mut self.components, &self.tree, changed, &unit);
        unit.seal();
        self.history.record(before, self.tree.clone());
        self.collect_garbage();
        self.publish(ReconciliationReport {
            units: vec![unit.clone()],
            rebuild,
            root_replaced,
            replay: false,
        });
        Ok(MutationOutcome::InTree { changed, unit })
    }

    fn apply_floating(&mut self, op: MutationOp, target: NodeId) -> EditorResult<MutationOutcome> {
        let name = op.name();
        let changed = self.tree.mutate(op)?;
        if let Some(component) = self.components.component_for(target) {
            let mut report = RebuildReport::default();
            self.components
                .reconcile(component, &self.tree, Correlation::Replaced, &mut report);
        }
        debug!(op = name, changed = %changed, "applied floating mutation");
        Ok(MutationOutcome::Floating { changed })
    }

    /// The document element may be replaced but never removed outright
    fn guard_document_element(&self, op: &MutationOp) -> EditorResult<()> {
        let Some(root) = self.tree.root_element() else {
            return Ok(());
        };
        let removes_root = match op {
            MutationOp::RemoveChild { parent, child } => *parent == self.tree.document() && *child == root,
            MutationOp::RemoveChildren { parent, children } => {
                *parent == self.tree.document() && children.contains(&root)
            }
            _ => false,
        };
        if removes_root {
            return Err(TreeError::invalid(root, "the document element cannot be removed").into());
        }
        if let MutationOp::ReplaceChild { parent, old, new } = op {
            if *parent == self.tree.document() && *old == root && self.tree.element(*new).is_ok() {
                self.check_root(&self.tree, *new)?;
            }
        }
        Ok(())
    }

    /// Follow a programmatic replacement of the document element
    fn sync_root_component(&mut self) -> EditorResult<bool> {
        let Some(root) = self.tree.root_element() else {
            return Ok(false);
        };
        let current = self.components.root().and_then(|id| self.components.peer(id).ok());
        if current == Some(root) {
            return Ok(false);
        }
        self.check_root(&self.tree, root)?;
        let component = self.components.attach(&self.tree, root)?;
        self.components.set_root(Some(component));
        info!(root = %component, "document element replaced");
        Ok(true)
    }

    /// Fold the snapshots of one mutation into a single unit
    fn unit_for(&self, pairs: &[SnapshotPair]) -> Option<ReconciliationUnit> {
        let mut queue = ReconciliationQueue::new();
        for pair in pairs {
            for snapshot in pair.snapshots() {
                let change = ChangeKind::of(pair, snapshot);
                let record = ChangeRecord::from_snapshot(snapshot, change, &self.tree, &self.tree, |path| {
                    self.components.anchor_for(path, change).or(self.components.root())
                });
                if let Some(record) = record {
                    queue.submit(&self.components, &self.tree, record);
                }
            }
        }

        let mut units = queue.into_units();
        units.sort_by_key(|unit| self.components.ancestors(unit.anchor).len());
        let mut units = units.into_iter();
        let mut unit = units.next()?;
        for other in units {
            unit.merge(other);
        }
        Some(unit)
    }
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
