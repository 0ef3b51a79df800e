//! High-level API for Mockchain.
//!
//! [`Mockchain`] wires the ledger store, the channel bus and the derived
//! object store together behind the operations a transport layer needs:
//! broadcast, queries, message relay and channel subscriptions.

pub mod broadcast;
pub mod derivation;
pub mod deriver;
pub mod error;
pub mod mockchain;

pub use broadcast::BroadcastPipeline;
pub use derivation::{
    DerivationCompletion, DerivationConfig, DerivationJob, DerivationOutcome, DerivationPipeline,
};
pub use deriver::{Derivation, DerivationError, Deriver, NoopDeriver};
pub use error::{SdkError, SdkResult};
pub use mockchain::{Ledger, Mockchain, MockchainConfig};

// Re-export key types
pub use mck_fabric::{
    ChannelEvent, EventKind, EventPayload, FabricConfig, SubscriberHandle, Subscription,
    SubscriptionState,
};
pub use mck_ledger::{AppliedTransaction, Transaction, TxOutput};
pub use mck_types::{
    Address, ChannelKey, DerivedObjectFilter, DerivedObjectRecord, MessageBody, MessageId,
    MessageRecord, Outpoint, SequenceId, SpendRecord, TransactionId, UtxoRecord,
};
