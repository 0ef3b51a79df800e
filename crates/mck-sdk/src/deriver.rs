use async_trait::async_trait;

use mck_types::{DerivedObjectRecord, Outpoint};

/// Result of asking the interpreter about one output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Derivation {
    Derived(DerivedObjectRecord),
    /// The output does not carry a derived object. Not an error.
    NotApplicable,
}

/// The interpreter failed on an output it should have understood.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("derivation failed: {0}")]
pub struct DerivationError(pub String);

/// External interpreter that reconstructs derived objects from outputs.
#[async_trait]
pub trait Deriver: Send + Sync {
    async fn derive(&self, outpoint: &Outpoint) -> Result<Derivation, DerivationError>;
}

/// Deriver for chains without an interpreter: nothing is ever applicable.
pub struct NoopDeriver;

#[async_trait]
impl Deriver for NoopDeriver {
    async fn derive(&self, _outpoint: &Outpoint) -> Result<Derivation, DerivationError> {
        Ok(Derivation::NotApplicable)
    }
}
