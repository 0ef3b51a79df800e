//! Channel bus for Mockchain.
//!
//! Every published event receives the next id from one bus-wide
//! [`Sequencer`], is appended to its channel's log, and is pushed to the
//! channel's live subscribers in the same critical section. Subscribers that
//! (re)connect with a cursor are first handed the logged events after that
//! cursor, then continue live without a gap or duplicate.

pub mod bus;
pub mod error;
pub mod event;
pub mod sequencer;
pub mod subscription;

pub use bus::{ChannelBus, FabricConfig};
pub use error::FabricError;
pub use event::{ChannelEvent, EventKind, EventPayload};
pub use sequencer::Sequencer;
pub use subscription::{SubscriberHandle, Subscription, SubscriptionState};
