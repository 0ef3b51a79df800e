use serde::{Deserialize, Serialize};

use mck_types::{SpendRecord, TransactionId, UtxoRecord};

/// An output consumed by an applied transaction, together with the UTXO it
/// was before it was spent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpentOutput {
    pub spend: SpendRecord,
    pub utxo: UtxoRecord,
}

/// Everything one successful `apply_transaction` changed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedTransaction {
    pub transaction_id: TransactionId,
    /// Ledger commit sequence assigned to this transaction (starts at 1).
    pub commit_seq: u64,
    /// New pay-to-address UTXOs, in output order.
    pub created: Vec<UtxoRecord>,
    /// Consumed UTXOs, in input order.
    pub spent: Vec<SpentOutput>,
}

/// Where an outpoint currently stands in the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum OutpointState {
    Unspent(UtxoRecord),
    Spent { spending_transaction_id: TransactionId },
    Unknown,
}
