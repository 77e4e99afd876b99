// # Memory Change Log
//
// In-memory implementation of ChangeLog.
//
// ## When to Use
//
// - Testing environments
// - Sessions where no history should touch the disk

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::change_log::{ChangeLog, ChangeLogEntry};

/// In-memory change log
///
/// Clones share the same entries, so a test can keep one handle while the
/// scheduler owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryChangeLog {
    entries: Arc<RwLock<Vec<ChangeLogEntry>>>,
}

impl MemoryChangeLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the log is empty
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// All entries in append order
    pub async fn entries(&self) -> Vec<ChangeLogEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl ChangeLog for MemoryChangeLog {
    async fn append(&self, entry: &ChangeLogEntry) -> Result<(), Error> {
        self.entries.write().await.push(entry.clone());
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<String>, Error> {
        let entries = self.entries.read().await;
        let skip = entries.len().saturating_sub(limit);
        Ok(entries[skip..].iter().map(ChangeLogEntry::to_line).collect())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
