use std::collections::HashMap;
use std::sync::RwLock;

use mck_types::{MessageId, MessageRecord};

use crate::error::{StoreError, StoreResult};

/// Relayed messages keyed by content hash.
pub trait MessageStore: Send + Sync {
    /// Store a message. Re-posting identical content replaces the record and
    /// returns `true`.
    fn put(&self, message: MessageRecord) -> StoreResult<bool>;

    fn get(&self, id: &MessageId) -> StoreResult<Option<MessageRecord>>;

    fn len(&self) -> StoreResult<usize>;
}

#[derive(Debug, Default)]
pub struct InMemoryMessageStore {
    messages: RwLock<HashMap<MessageId, MessageRecord>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MessageStore for InMemoryMessageStore {
    fn put(&self, message: MessageRecord) -> StoreResult<bool> {
        let mut messages = self.messages.write().map_err(|_| StoreError::LockPoisoned)?;
        Ok(messages.insert(message.id, message).is_some())
    }

    fn get(&self, id: &MessageId) -> StoreResult<Option<MessageRecord>> {
        let messages = self.messages.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(messages.get(id).cloned())
    }

    fn len(&self) -> StoreResult<usize> {
        let messages = self.messages.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(messages.len())
    }
}

#[cfg(test)]
mod tests {
    use mck_types::MessageBody;

    use super::*;

    fn message(subject: &str) -> MessageRecord {
        MessageRecord::from(MessageBody {
            from: "A1".into(),
            to: vec!["A2".into()],
            subject: subject.into(),
            ..Default::default()
        })
    }

    #[test]
    fn put_then_get() {
        let store = InMemoryMessageStore::new();
        let m = message("hello");
        assert!(!store.put(m.clone()).unwrap());
        assert_eq!(store.get(&m.id).unwrap(), Some(m));
    }

    #[test]
    fn same_content_is_one_message() {
        let store = InMemoryMessageStore::new();
        store.put(message("hello")).unwrap();
        assert!(store.put(message("hello")).unwrap());
        store.put(message("bye")).unwrap();
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn unknown_id_is_none() {
        let store = InMemoryMessageStore::new();
        assert!(store.get(&message("never sent").id).unwrap().is_none());
    }
}
