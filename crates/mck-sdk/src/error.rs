use thiserror::Error;

use mck_ledger::LedgerError;

#[derive(Debug, Error)]
pub enum SdkError {
    /// A referenced input is missing or already spent, or the transaction was
    /// already accepted. Nothing was changed.
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("malformed transaction: {0}")]
    MalformedTransaction(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("ledger error: {0}")]
    Ledger(LedgerError),

    #[error("fabric error: {0}")]
    Fabric(#[from] mck_fabric::FabricError),

    #[error("store error: {0}")]
    Store(#[from] mck_store::StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<LedgerError> for SdkError {
    fn from(error: LedgerError) -> Self {
        match error {
            LedgerError::InputMissing(_) | LedgerError::AlreadyArchived(_) => {
                Self::ValidationFailed(error.to_string())
            }
            LedgerError::Malformed(e) => Self::MalformedTransaction(e.to_string()),
            other => Self::Ledger(other),
        }
    }
}

pub type SdkResult<T> = Result<T, SdkError>;

#[cfg(test)]
mod tests {
    use super::*;
    use mck_ledger::CodecError;
    use mck_types::{Outpoint, TransactionId};

    #[test]
    fn ledger_errors_map_to_client_errors() {
        let outpoint = Outpoint::new(TransactionId::from_raw(b"x"), 0);
        assert!(matches!(
            SdkError::from(LedgerError::InputMissing(outpoint)),
            SdkError::ValidationFailed(msg) if msg.contains("input missing")
        ));
        assert!(matches!(
            SdkError::from(LedgerError::Malformed(CodecError("eof".into()))),
            SdkError::MalformedTransaction(msg) if msg == "eof"
        ));
        assert!(matches!(
            SdkError::from(LedgerError::LockPoisoned),
            SdkError::Ledger(LedgerError::LockPoisoned)
        ));
    }
}
