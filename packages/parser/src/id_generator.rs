use crate::tree::NodeId;
use crc32fast::Hasher;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Generate document ID from file path using CRC32
pub fn get_document_id(path: &str) -> String {
    let mut buff = String::from(path);
    if !path.starts_with("file://") {
        buff = format!("file://{}", buff);
    }

    let mut hasher = Hasher::new();
    hasher.update(buff.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Sequential node ID generator for one document lineage
///
/// Clones share the counter: every tree parsed for the same document
/// (re-parses, fragments, undo snapshots) draws from one sequence, so ids
/// handed out by different trees never collide.
#[derive(Debug, Clone)]
pub struct IDGenerator {
    seed: String,
    count: Arc<AtomicU64>,
}

impl IDGenerator {
    pub fn new(path: &str) -> Self {
        Self::from_seed(get_document_id(path))
    }

    pub fn from_seed(seed: String) -> Self {
        Self {
            seed,
            count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Generate next sequential ID
    pub fn new_id(&self) -> NodeId {
        NodeId(self.count.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Get document ID seed
    pub fn seed(&self) -> &str {
        &self.seed
    }

    /// Number of ids handed out so far
    pub fn issued(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// True when both generators draw from the same sequence
    pub fn same_lineage(&self, other: &IDGenerator) -> bool {
        Arc::ptr_eq(&self.count, &other.count)
    }
}

impl Default for IDGenerator {
    fn default() -> Self {
        Self::new("memory://untitled")
    }
}
