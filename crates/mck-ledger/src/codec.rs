use serde::{Deserialize, Serialize};

use mck_types::{Address, Outpoint, TransactionId};

/// Raised when transaction bytes cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct CodecError(pub String);

/// One decoded output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedOutput {
    /// Set when the output is a recognized pay-to-address output.
    pub address: Option<Address>,
    pub amount: u64,
    pub script_hex: String,
}

impl DecodedOutput {
    pub fn is_pay_to_address(&self) -> bool {
        self.address.is_some()
    }
}

/// The parts of a transaction the ledger needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedTransaction {
    pub transaction_id: TransactionId,
    pub inputs: Vec<Outpoint>,
    pub outputs: Vec<DecodedOutput>,
}

/// Decodes raw transaction bytes and classifies their outputs.
///
/// Script validation, if any, happens behind this boundary; the ledger only
/// checks that every input is currently unspent.
pub trait TransactionCodec: Send + Sync {
    fn decode(&self, raw: &[u8]) -> Result<DecodedTransaction, CodecError>;
}

/// Locking condition of a [`TxOutput`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputScript {
    /// Spendable by the holder of `address`.
    PayToAddress(Address),
    /// Unspendable data carrier.
    Data(Vec<u8>),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub amount: u64,
    pub script: OutputScript,
}

impl TxOutput {
    pub fn pay_to(address: impl Into<Address>, amount: u64) -> Self {
        Self {
            amount,
            script: OutputScript::PayToAddress(address.into()),
        }
    }

    pub fn data(data: impl Into<Vec<u8>>) -> Self {
        Self {
            amount: 0,
            script: OutputScript::Data(data.into()),
        }
    }
}

/// Transaction in the reference wire format understood by [`BincodeCodec`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<Outpoint>,
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    pub const VERSION: u32 = 1;

    pub fn new(inputs: Vec<Outpoint>, outputs: Vec<TxOutput>) -> Self {
        Self {
            version: Self::VERSION,
            inputs,
            outputs,
        }
    }

    /// Serialize to raw bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        bincode::serialize(self).map_err(|e| CodecError(e.to_string()))
    }

    /// Id of the transaction as it will be archived.
    pub fn id(&self) -> Result<TransactionId, CodecError> {
        Ok(TransactionId::from_raw(&self.to_bytes()?))
    }

    /// Outpoint of output `index` of this transaction.
    pub fn outpoint(&self, index: u32) -> Result<Outpoint, CodecError> {
        Ok(Outpoint::new(self.id()?, index))
    }
}

/// Reference codec: bincode-encoded [`Transaction`], id = BLAKE3 of the bytes.
#[derive(Clone, Copy, Debug, Default)]
pub struct BincodeCodec;

impl TransactionCodec for BincodeCodec {
    fn decode(&self, raw: &[u8]) -> Result<DecodedTransaction, CodecError> {
        let tx: Transaction =
            bincode::deserialize(raw).map_err(|e| CodecError(e.to_string()))?;

        if tx.version != Transaction::VERSION {
            return Err(CodecError(format!("unsupported version {}", tx.version)));
        }
        if tx.outputs.is_empty() {
            return Err(CodecError("transaction has no outputs".into()));
        }
        // Trailing bytes would give one transaction several ids.
        let canonical = tx.to_bytes()?;
        if canonical.len() != raw.len() {
            return Err(CodecError(format!(
                "{} trailing bytes",
                raw.len().saturating_sub(canonical.len())
            )));
        }

        let outputs = tx
            .outputs
            .iter()
            .map(|output| {
                let script_bytes =
                    bincode::serialize(&output.script).map_err(|e| CodecError(e.to_string()))?;
                let address = match &output.script {
                    OutputScript::PayToAddress(address) => Some(address.clone()),
                    OutputScript::Data(_) => None,
                };
                Ok(DecodedOutput {
                    address,
                    amount: output.amount,
                    script_hex: hex::encode(script_bytes),
                })
            })
            .collect::<Result<Vec<_>, CodecError>>()?;

        Ok(DecodedTransaction {
            transaction_id: TransactionId::from_raw(raw),
            inputs: tx.inputs,
            outputs,
        })
    }
}
