//! Storage boundaries for Mockchain.
//!
//! Three stores live here, each behind a trait so a persistent backend can be
//! substituted later:
//!
//! - [`TransactionArchive`] -- append-only map from transaction id to the
//!   raw bytes that were accepted
//! - [`DerivedObjectStore`] -- derived object records keyed by location,
//!   upserted on every derivation
//! - [`MessageStore`] -- relayed messages keyed by content hash
//!
//! # Design Rules
//!
//! 1. Archive entries are written once and never modified.
//! 2. Derived objects are overwritten in place; there is never more than one
//!    record per location.
//! 3. Concurrent reads are always safe.
//! 4. Stores never interpret transaction bytes.

pub mod archive;
pub mod derived;
pub mod error;
pub mod message;

pub use archive::{InMemoryTransactionArchive, TransactionArchive};
pub use derived::{DerivedObjectStore, InMemoryDerivedObjectStore};
pub use error::{StoreError, StoreResult};
pub use message::{InMemoryMessageStore, MessageStore};
