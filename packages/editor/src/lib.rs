//! # Weft Editor
//!
//! Keeps a tree of editable components in sync with the raw document tree.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ parser: text → RawTree (every byte kept)    │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ editor: SyncEngine                          │
//! │  - re-parse passes (diff → change records)  │
//! │  - reconciliation queue and units           │
//! │  - programmatic mutations + undo/redo       │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ ComponentTree: lazily observed components   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Raw tree is source of truth**: components are a derived view
//! 2. **Identity survives edits**: a component keeps its id across re-parses
//!    for as long as its node can be matched
//! 3. **One rebuild per subtree**: changes are merged under the topmost
//!    affected component before anything is rebuilt
//!
//! ## Usage
//!
//! ```rust,ignore
//! use weft_editor::{EngineConfig, MutationContext, SyncEngine};
//!
//! let mut engine = SyncEngine::new(EngineConfig::default());
//! engine.sync("<a><b/></a>")?;
//!
//! let root = engine.root().unwrap();
//! engine.set_attribute(&MutationContext::idle(), root, "id", "main")?;
//! assert_eq!(engine.text(), r#"<a id="main"><b/></a>"#);
//! ```

mod change;
mod component;
mod config;
mod context;
mod engine;
mod errors;
mod shared;
mod undo_stack;
mod unit;
mod updater;

pub use change::{ChangeKind, ChangeRecord};
pub use component::{
    AttributeView, Component, ComponentId, ComponentKind, ComponentTree, ComponentView, Correlation, ElementView,
    Placement, PreparedUnit, RebuildReport, TextView,
};
pub use config::EngineConfig;
pub use context::{MutationContext, MutationOutcome};
pub use engine::{ListenerId, ReconciliationReport, SyncEngine, SyncResult};
pub use errors::{EditorError, EditorResult};
pub use shared::SharedEngine;
pub use undo_stack::{HistoryEntry, UndoStack};
pub use unit::{ReconciliationQueue, ReconciliationUnit, UnitId};
pub use updater::{Rebinder, Updater};

pub use weft_parser::{MutationOp, NodeId, RawTree};
