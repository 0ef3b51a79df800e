//! UTXO ledger store for Mockchain.
//!
//! This crate provides:
//! - The [`TransactionCodec`] boundary through which raw bytes are decoded,
//!   plus [`BincodeCodec`], a self-contained reference format
//! - `LedgerWriter` / `LedgerReader` trait boundaries
//! - [`InMemoryLedger`], which validates inputs against the unspent set and
//!   applies a transaction's effects all-or-nothing
//!
//! The ledger reports what each application created and spent; it never
//! publishes anything itself.

pub mod codec;
pub mod error;
pub mod memory;
pub mod records;
pub mod traits;

pub use codec::{
    BincodeCodec, CodecError, DecodedOutput, DecodedTransaction, OutputScript, Transaction,
    TransactionCodec, TxOutput,
};
pub use error::LedgerError;
pub use memory::InMemoryLedger;
pub use records::{AppliedTransaction, OutpointState, SpentOutput};
pub use traits::{LedgerReader, LedgerWriter};
