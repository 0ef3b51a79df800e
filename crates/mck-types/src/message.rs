use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Content hash of a relayed message, rendered as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MessageId([u8; 32]);

impl MessageId {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        let arr: [u8; 32] = bytes.as_slice().try_into().map_err(|_| TypeError::InvalidLength {
            expected: 32,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for MessageId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for MessageId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<MessageId> for String {
    fn from(id: MessageId) -> Self {
        id.to_hex()
    }
}

/// A message as submitted by a client, before it is assigned an id.
///
/// Signatures are carried but not verified.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageBody {
    pub from: String,
    /// Recipient channel names. Each gets one copy of the message.
    pub to: Vec<String>,
    pub reply_to: Option<String>,
    pub subject: String,
    pub context: Vec<String>,
    pub payload: String,
    pub ts: u64,
    pub sig: Option<String>,
}

impl MessageBody {
    /// Hash of every field except the signature.
    pub fn id(&self) -> MessageId {
        let mut hasher = blake3::Hasher::new();
        let mut field = |bytes: &[u8]| {
            hasher.update(&(bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        };
        field(self.from.as_bytes());
        field(&(self.to.len() as u64).to_le_bytes());
        for to in &self.to {
            field(to.as_bytes());
        }
        field(self.reply_to.as_deref().unwrap_or_default().as_bytes());
        field(self.subject.as_bytes());
        field(&(self.context.len() as u64).to_le_bytes());
        for context in &self.context {
            field(context.as_bytes());
        }
        field(self.payload.as_bytes());
        field(&self.ts.to_le_bytes());
        MessageId(*hasher.finalize().as_bytes())
    }
}

/// A stored message, keyed by its content hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: MessageId,
    #[serde(flatten)]
    pub body: MessageBody,
}

impl From<MessageBody> for MessageRecord {
    fn from(body: MessageBody) -> Self {
        Self { id: body.id(), body }
    }
}
