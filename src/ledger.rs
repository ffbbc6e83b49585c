//! The world-state boundary: keyed get/put of opaque records.
//!
//! The ledger owns atomicity and isolation. A transaction reads through
//! [`Ledger::get_state`] and writes everything it touched in a single
//! [`Ledger::commit`] call.

use crate::error::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateWrite {
    pub key: String,
    pub value: Vec<u8>,
}

impl StateWrite {
    pub fn new(key: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Returns `None` when the key was never written.
    async fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn put_state(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Applies a batch of writes as one unit.
    async fn commit(&self, writes: Vec<StateWrite>) -> Result<()> {
        for write in writes {
            self.put_state(&write.key, write.value).await?;
        }
        Ok(())
    }
}

/// Process-local ledger. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    state: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.state.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().is_empty()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.state.read().get(key).cloned())
    }

    async fn put_state(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.state.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn commit(&self, writes: Vec<StateWrite>) -> Result<()> {
        let mut state = self.state.write();
        for write in writes {
            state.insert(write.key, write.value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_ledger_round_trip() {
        let ledger = MemoryLedger::new();
        assert!(ledger.get_state("IT-missing").await.unwrap().is_none());

        ledger.put_state("IT-1", b"one".to_vec()).await.unwrap();
        ledger
            .commit(vec![
                StateWrite::new("IT-1", b"uno".to_vec()),
                StateWrite::new("QT-1", b"quote".to_vec()),
            ])
            .await
            .unwrap();

        assert_eq!(ledger.get_state("IT-1").await.unwrap(), Some(b"uno".to_vec()));
        assert_eq!(ledger.len(), 2);

        let shared = ledger.clone();
        assert_eq!(shared.get_state("QT-1").await.unwrap(), Some(b"quote".to_vec()));
    }
}
