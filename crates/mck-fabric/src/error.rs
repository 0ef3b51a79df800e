use crate::event::EventKind;

/// Errors produced by the channel bus.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FabricError {
    /// The payload does not belong to the declared event kind.
    #[error("payload of kind {payload} published as {declared}")]
    PayloadMismatch {
        declared: EventKind,
        payload: EventKind,
    },

    /// The bus state lock was poisoned by a panicking publisher.
    #[error("bus lock poisoned")]
    LockPoisoned,
}

/// Convenience alias used throughout the fabric crate.
pub type Result<T> = std::result::Result<T, FabricError>;
