use mck_types::SequenceId;

/// Bus-wide issuer of [`SequenceId`]s.
///
/// Not synchronized on its own: the bus keeps it inside the same lock as the
/// channel logs so that issue order and append order are one order.
#[derive(Debug, Default)]
pub struct Sequencer {
    last: SequenceId,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next id. The first id issued is 1.
    pub fn issue(&mut self) -> SequenceId {
        self.last = self.last.next();
        self.last
    }

    /// The most recently issued id, or [`SequenceId::ZERO`].
    pub fn last(&self) -> SequenceId {
        self.last
    }
}
