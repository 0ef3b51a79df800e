use serde::{Deserialize, Serialize};

use crate::ids::{Address, Outpoint, TransactionId};

/// An unspent pay-to-address output.
///
/// Created when a transaction is applied and removed from the unspent set the
/// moment a later transaction consumes it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoRecord {
    pub outpoint: Outpoint,
    pub transaction_id: TransactionId,
    pub output_index: u32,
    pub locking_script_hex: String,
    pub owner_address: Address,
    pub amount: u64,
    /// Ledger commit sequence of the transaction that created this output.
    pub created_at_seq: u64,
}

/// Permanent record that an outpoint was consumed, and by which transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendRecord {
    pub outpoint: Outpoint,
    pub spending_transaction_id: TransactionId,
}
