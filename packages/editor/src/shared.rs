//! Thread-safe handle around a [`SyncEngine`]
//!
//! Parsing is the slow part of a sync, so [`SharedEngine::sync`] parses
//! under a read lock only long enough to clone the id generator and takes
//! the write lock for the reconciliation itself.

use crate::engine::{SyncEngine, SyncResult};
use crate::errors::EditorResult;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use weft_parser::{parse_with_ids, RawTree};

#[derive(Debug, Clone)]
pub struct SharedEngine {
    inner: Arc<RwLock<SyncEngine>>,
}

impl SharedEngine {
    pub fn new(engine: SyncEngine) -> Self {
        Self {
            inner: Arc::new(RwLock::new(engine)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, SyncEngine> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, SyncEngine> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Parse `text` with the engine's ids without holding any lock
    pub fn parse_detached(&self, text: &str) -> EditorResult<RawTree> {
        let ids = self.read().tree().ids().clone();
        Ok(parse_with_ids(text, ids)?)
    }

    pub fn sync_parsed(&self, tree: RawTree) -> EditorResult<SyncResult> {
        self.write().sync_parsed(tree)
    }

    pub fn sync(&self, text: &str) -> EditorResult<SyncResult> {
        let parsed = self.parse_detached(text)?;
        self.sync_parsed(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use std::thread;

    #[test]
    fn test_sync_from_threads() {
        let shared = SharedEngine::new(SyncEngine::new(EngineConfig::default()));
        shared.sync("<a/>").unwrap();

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let shared = shared.clone();
                thread::spawn(move || shared.sync(&format!("<a><b n=\"{}\"/></a>", i)).unwrap())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), SyncResult::Valid);
        }

        let engine = shared.read();
        assert!(!engine.is_syncing());
        assert!(engine.text().starts_with("<a><b n="));
    }
}
