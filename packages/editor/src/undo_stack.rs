//! # Undo/Redo Stack
//!
//! Tracks the raw tree state around programmatic edits.
//!
//! ## Design
//!
//! - Each recorded step keeps the tree as it was before and after the edit
//! - Undo replays the `before` state through the engine, redo the `after` one
//! - New edits clear the redo stack
//! - Batches group several edits into one step: the batch keeps the first
//!   `before` and the last `after`
//!
//! The stack only stores states; [`SyncEngine::undo`](crate::SyncEngine::undo)
//! and [`SyncEngine::redo`](crate::SyncEngine::redo) do the replaying.

use weft_parser::RawTree;

/// One undoable step
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub before: RawTree,
    pub after: RawTree,

    /// Optional description of this step
    pub description: Option<String>,
}

#[derive(Debug)]
struct PendingBatch {
    before: Option<RawTree>,
    after: Option<RawTree>,
    description: Option<String>,
}

/// Undo/redo history of tree states
#[derive(Debug)]
pub struct UndoStack {
    /// Applied steps (most recent last)
    undo_stack: Vec<HistoryEntry>,

    /// Undone steps (most recent last)
    redo_stack: Vec<HistoryEntry>,

    /// Maximum number of undo levels (0 = unlimited)
    max_levels: usize,

    current_batch: Option<PendingBatch>,
}

impl UndoStack {
    /// Create a new undo stack with default max levels (100)
    pub fn new() -> Self {
        Self::with_max_levels(100)
    }

    pub fn with_max_levels(max_levels: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_levels,
            current_batch: None,
        }
    }

    /// Record one edit
    pub fn record(&mut self, before: RawTree, after: RawTree) {
        if let Some(batch) = &mut self.current_batch {
            batch.before.get_or_insert(before);
            batch.after = Some(after);
        } else {
            self.push_entry(HistoryEntry {
                before,
                after,
                description: None,
            });
        }
    }

    /// Start a batch (undone/redone as one step)
    pub fn begin_batch(&mut self) {
        self.current_batch = Some(PendingBatch {
            before: None,
            after: None,
            description: None,
        });
    }

    /// End the current batch and push it, unless it recorded nothing
    pub fn end_batch(&mut self) {
        if let Some(batch) = self.current_batch.take() {
            if let (Some(before), Some(after)) = (batch.before, batch.after) {
                self.push_entry(HistoryEntry {
                    before,
                    after,
                    description: batch.description,
                });
            }
        }
    }

    pub fn is_batching(&self) -> bool {
        self.current_batch.is_some()
    }

    pub fn set_batch_description(&mut self, description: impl Into<String>) {
        if let Some(batch) = &mut self.current_batch {
            batch.description = Some(description.into());
        }
    }

    fn push_entry(&mut self, entry: HistoryEntry) {
        self.undo_stack.push(entry);

        if self.max_levels > 0 && self.undo_stack.len() > self.max_levels {
            self.undo_stack.remove(0);
        }

        // new edits invalidate the future
        self.redo_stack.clear();
    }

    /// Take the step to undo
    pub fn pop_undo(&mut self) -> Option<HistoryEntry> {
        self.undo_stack.pop()
    }

    /// Take the step to redo
    pub fn pop_redo(&mut self) -> Option<HistoryEntry> {
        self.redo_stack.pop()
    }

    /// File an undone step so it can be redone
    pub fn push_redo(&mut self, entry: HistoryEntry) {
        self.redo_stack.push(entry);
    }

    /// File a redone step without clearing the redo stack
    pub fn push_undo(&mut self, entry: HistoryEntry) {
        self.undo_stack.push(entry);
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_levels(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_levels(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.current_batch = None;
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack
            .last()
            .and_then(|entry| entry.description.as_deref())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack
            .last()
            .and_then(|entry| entry.description.as_deref())
    }
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_parser::{parse, serialize};

    fn state(source: &str) -> RawTree {
        parse(source).unwrap()
    }

    #[test]
    fn test_undo_stack_creation() {
        let stack = UndoStack::new();
        assert_eq!(stack.undo_levels(), 0);
        assert_eq!(stack.redo_levels(), 0);
        assert!(!stack.can_undo());
        assert!(!stack.can_redo());
    }

    #[test]
    fn test_batched_steps() {
        let mut stack = UndoStack::new();

        stack.begin_batch();
        stack.set_batch_description("Rename items");
        stack.record(state("<a/>"), state("<b/>"));
        stack.record(state("<b/>"), state("<c/>"));
        stack.end_batch();

        assert_eq!(stack.undo_levels(), 1);
        assert_eq!(stack.undo_description(), Some("Rename items"));

        let entry = stack.pop_undo().unwrap();
        assert_eq!(serialize(&entry.before), "<a/>");
        assert_eq!(serialize(&entry.after), "<c/>");
    }

    #[test]
    fn test_empty_batch_is_dropped() {
        let mut stack = UndoStack::new();
        stack.begin_batch();
        stack.end_batch();
        assert!(!stack.can_undo());
    }

    #[test]
    fn test_new_step_clears_redo() {
        let mut stack = UndoStack::new();
        stack.record(state("<a/>"), state("<b/>"));
        let entry = stack.pop_undo().unwrap();
        stack.push_redo(entry);
        assert_eq!(stack.redo_levels(), 1);

        stack.record(state("<a/>"), state("<c/>"));
        assert_eq!(stack.redo_levels(), 0);
    }

    #[test]
    fn test_max_levels_enforced() {
        let mut stack = UndoStack::with_max_levels(2);
        for i in 0..3 {
            stack.record(state("<a/>"), state(&format!("<a{}/>", i)));
        }
        assert_eq!(stack.undo_levels(), 2);
    }
}
