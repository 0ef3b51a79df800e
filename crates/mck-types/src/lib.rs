//! Foundation types for Mockchain.
//!
//! This crate provides the identifiers and records shared by the ledger, the
//! channel bus and the pipelines built on top of them. Every other Mockchain
//! crate depends on `mck-types`.
//!
//! # Key Types
//!
//! - [`TransactionId`] -- BLAKE3 hash of a transaction's raw bytes
//! - [`Outpoint`] -- `(transactionId, outputIndex)`, the unit of spendability
//! - [`UtxoRecord`] / [`SpendRecord`] -- ledger-visible output state
//! - [`DerivedObjectRecord`] -- application state derived from an output
//! - [`ChannelKey`] / [`SequenceId`] -- channel bus routing key and cursor
//! - [`MessageRecord`] -- a relayed message, keyed by its content hash

pub mod channel;
pub mod derived;
pub mod error;
pub mod ids;
pub mod message;
pub mod utxo;

pub use channel::{ChannelKey, SequenceId};
pub use derived::{DerivedObjectFilter, DerivedObjectRecord};
pub use error::TypeError;
pub use ids::{Address, Outpoint, TransactionId};
pub use message::{MessageBody, MessageId, MessageRecord};
pub use utxo::{SpendRecord, UtxoRecord};
