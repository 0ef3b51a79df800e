use serde::{Deserialize, Serialize};

use mck_types::{
    ChannelKey, DerivedObjectRecord, MessageRecord, SequenceId, SpendRecord, TransactionId,
    UtxoRecord,
};

/// Closed set of event tags carried on the bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A pay-to-address output was created.
    Utxo,
    /// An output was consumed.
    Spend,
    /// A transaction was accepted.
    Txn,
    /// A derived object was recorded.
    Derived,
    /// A message was relayed to a recipient.
    Message,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Utxo => "utxo",
            Self::Spend => "spend",
            Self::Txn => "txn",
            Self::Derived => "derived",
            Self::Message => "message",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload data carried by a channel event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventPayload {
    Utxo(UtxoRecord),
    Spend(SpendRecord),
    Txn { transaction_id: TransactionId },
    Derived(DerivedObjectRecord),
    Message(MessageRecord),
}

impl EventPayload {
    /// The event kind this payload belongs to.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Utxo(_) => EventKind::Utxo,
            Self::Spend(_) => EventKind::Spend,
            Self::Txn { .. } => EventKind::Txn,
            Self::Derived(_) => EventKind::Derived,
            Self::Message(_) => EventKind::Message,
        }
    }
}

/// One entry of a channel log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelEvent {
    pub sequence_id: SequenceId,
    pub channel: ChannelKey,
    pub kind: EventKind,
    pub payload: EventPayload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_display() {
        assert_eq!(format!("{}", EventKind::Utxo), "utxo");
        assert_eq!(format!("{}", EventKind::Derived), "derived");
        assert_eq!(serde_json::to_string(&EventKind::Txn).unwrap(), "\"txn\"");
    }

    #[test]
    fn payload_reports_its_kind() {
        let txid = TransactionId::from_raw(b"t");
        assert_eq!(
            EventPayload::Txn { transaction_id: txid }.kind(),
            EventKind::Txn
        );
    }

    #[test]
    fn payload_serializes_without_wrapper() {
        let txid = TransactionId::from_hash([0; 32]);
        let json = serde_json::to_value(EventPayload::Txn { transaction_id: txid }).unwrap();
        assert_eq!(json["transaction_id"], "00".repeat(32));
    }

    #[test]
    fn message_payload_reads_back_as_message() {
        let record = MessageRecord::from(mck_types::MessageBody {
            from: "A1".into(),
            to: vec!["A2".into()],
            subject: "hi".into(),
            ..Default::default()
        });
        let payload = EventPayload::Message(record);
        assert_eq!(payload.kind(), EventKind::Message);

        let json = serde_json::to_string(&payload).unwrap();
        let back: EventPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }
}
