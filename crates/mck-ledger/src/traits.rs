use mck_types::{Address, Outpoint, TransactionId, UtxoRecord};

use crate::error::LedgerError;
use crate::records::{AppliedTransaction, OutpointState};

/// Write boundary for ledger mutation.
///
/// Implementations must serialize calls: validation and mutation form one
/// check-then-act sequence.
pub trait LedgerWriter: Send + Sync {
    /// Validate and apply a raw transaction.
    ///
    /// Either every input is unspent and all effects (spend, create, archive)
    /// are applied, or the call fails and nothing changed.
    fn apply_transaction(&self, raw: &[u8]) -> Result<AppliedTransaction, LedgerError>;
}

/// Read boundary for ledger queries.
pub trait LedgerReader: Send + Sync {
    fn fetch_transaction(&self, id: &TransactionId) -> Result<Option<Vec<u8>>, LedgerError>;

    /// Unspent outputs owned by `address`, oldest first.
    fn list_unspent_for_address(&self, address: &Address)
        -> Result<Vec<UtxoRecord>, LedgerError>;

    /// Id of the transaction that spent `outpoint`, if it was spent.
    fn lookup_spend(&self, outpoint: &Outpoint) -> Result<Option<TransactionId>, LedgerError>;

    fn get_unspent(&self, outpoint: &Outpoint) -> Result<Option<UtxoRecord>, LedgerError>;

    fn outpoint_state(&self, outpoint: &Outpoint) -> Result<OutpointState, LedgerError>;
}
