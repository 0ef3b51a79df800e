use mck_store::StoreError;
use mck_types::{Outpoint, TransactionId};

use crate::codec::CodecError;

/// Errors produced by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("input missing: {0}")]
    InputMissing(Outpoint),

    #[error("transaction already archived: {0}")]
    AlreadyArchived(TransactionId),

    #[error("malformed transaction: {0}")]
    Malformed(#[from] CodecError),

    #[error("store error: {0}")]
    Store(StoreError),

    #[error("ledger lock poisoned")]
    LockPoisoned,

    /// The unspent set, spend index and address index disagree.
    #[error("ledger state inconsistent: {0}")]
    Integrity(String),
}

impl From<StoreError> for LedgerError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::AlreadyArchived(id) => Self::AlreadyArchived(id),
            other => Self::Store(other),
        }
    }
}
