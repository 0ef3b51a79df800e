use std::collections::HashMap;
use std::sync::RwLock;

use mck_types::TransactionId;
use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// Append-only archive of accepted raw transactions.
///
/// Implementations must satisfy:
/// - An id is written at most once; a second write fails with
///   [`StoreError::AlreadyArchived`] and leaves the first entry untouched.
/// - Reads never observe a partially written entry.
pub trait TransactionArchive: Send + Sync {
    /// Archive `raw` under `id`.
    fn append(&self, id: TransactionId, raw: Vec<u8>) -> StoreResult<()>;

    /// Fetch the raw bytes of an archived transaction.
    ///
    /// Returns `Ok(None)` if the id was never archived.
    fn get(&self, id: &TransactionId) -> StoreResult<Option<Vec<u8>>>;

    /// Check whether an id is archived.
    fn contains(&self, id: &TransactionId) -> StoreResult<bool>;

    /// Number of archived transactions.
    fn len(&self) -> StoreResult<usize>;

    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}

/// `HashMap`-backed archive for tests and embedding.
#[derive(Default)]
pub struct InMemoryTransactionArchive {
    entries: RwLock<HashMap<TransactionId, Vec<u8>>>,
}

impl InMemoryTransactionArchive {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransactionArchive for InMemoryTransactionArchive {
    fn append(&self, id: TransactionId, raw: Vec<u8>) -> StoreResult<()> {
        let mut entries = self.entries.write().map_err(|_| StoreError::LockPoisoned)?;
        if entries.contains_key(&id) {
            return Err(StoreError::AlreadyArchived(id));
        }
        debug!(txid = %id, bytes = raw.len(), "transaction archived");
        entries.insert(id, raw);
        Ok(())
    }

    fn get(&self, id: &TransactionId) -> StoreResult<Option<Vec<u8>>> {
        let entries = self.entries.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(entries.get(id).cloned())
    }

    fn contains(&self, id: &TransactionId) -> StoreResult<bool> {
        let entries = self.entries.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(entries.contains_key(id))
    }

    fn len(&self) -> StoreResult<usize> {
        let entries = self.entries.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(entries.len())
    }
}

impl std::fmt::Debug for InMemoryTransactionArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len().unwrap_or_default();
        f.debug_struct("InMemoryTransactionArchive")
            .field("transaction_count", &count)
            .finish()
    }
}
