use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::Address;

/// Routing key of a channel on the bus.
///
/// Channels are purely application-defined: an address, a derived-object
/// owner, a kind, an origin, or a reserved name such as [`ChannelKey::TXNS`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelKey(String);

impl ChannelKey {
    /// Channel on which every accepted transaction id is announced.
    pub const TXNS: &'static str = "txns";

    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn txns() -> Self {
        Self::new(Self::TXNS)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ChannelKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&Address> for ChannelKey {
    fn from(address: &Address) -> Self {
        Self::new(address.as_str())
    }
}

/// Position of an event in the bus-wide total order.
///
/// Issued by a single monotonic counter starting at 1; [`SequenceId::ZERO`]
/// is the cursor that precedes every event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceId(u64);

impl SequenceId {
    pub const ZERO: SequenceId = SequenceId(0);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }

    /// The id immediately after this one.
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SequenceId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}
