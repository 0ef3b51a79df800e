use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::broadcast::Receiver;
use tracing::{debug, warn};

use mck_types::{ChannelKey, SequenceId};

use crate::bus::BusInner;
use crate::event::ChannelEvent;

/// Identifies one live registration on one channel.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberHandle {
    pub channel: ChannelKey,
    pub id: u64,
}

/// Lifecycle of a subscription as seen by a gateway connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriptionState {
    /// The transport is connected but has not subscribed yet. Only a
    /// gateway session reports this; a [`Subscription`] starts replaying or
    /// live.
    Connecting,
    /// Logged events from the cursor are still being handed out.
    Replaying,
    /// Caught up; events arrive as they are published.
    Live,
    /// Unsubscribed or disconnected. Terminal.
    Closed,
}

/// A channel subscription: replayed events first, then live ones.
///
/// Dropping the subscription unregisters it from the bus.
pub struct Subscription {
    handle: SubscriberHandle,
    bus: Arc<BusInner>,
    receiver: Receiver<ChannelEvent>,
    pending: VecDeque<ChannelEvent>,
    /// Highest sequence id handed out or queued in `pending`.
    high_water: SequenceId,
    closed: bool,
}

impl Subscription {
    pub(crate) fn new(
        handle: SubscriberHandle,
        bus: Arc<BusInner>,
        receiver: Receiver<ChannelEvent>,
        pending: VecDeque<ChannelEvent>,
        registered_at: SequenceId,
    ) -> Self {
        let high_water = pending
            .back()
            .map_or(registered_at, |e| e.sequence_id.max(registered_at));
        Self {
            handle,
            bus,
            receiver,
            pending,
            high_water,
            closed: false,
        }
    }

    pub fn handle(&self) -> &SubscriberHandle {
        &self.handle
    }

    pub fn channel(&self) -> &ChannelKey {
        &self.handle.channel
    }

    pub fn state(&self) -> SubscriptionState {
        if self.closed {
            SubscriptionState::Closed
        } else if !self.pending.is_empty() {
            SubscriptionState::Replaying
        } else {
            SubscriptionState::Live
        }
    }

    /// Wait for the next event. Returns `None` once the subscription is closed.
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        loop {
            if self.closed {
                return None;
            }
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            match self.receiver.recv().await {
                Ok(event) => {
                    if let Some(event) = self.accept(event) {
                        return Some(event);
                    }
                }
                Err(RecvError::Lagged(skipped)) => self.resync(skipped),
                Err(RecvError::Closed) => {
                    self.closed = true;
                    return None;
                }
            }
        }
    }

    /// Return the next event if one is ready, without waiting.
    pub fn try_next(&mut self) -> Option<ChannelEvent> {
        loop {
            if self.closed {
                return None;
            }
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            match self.receiver.try_recv() {
                Ok(event) => {
                    if let Some(event) = self.accept(event) {
                        return Some(event);
                    }
                }
                Err(TryRecvError::Lagged(skipped)) => self.resync(skipped),
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Closed) => {
                    self.closed = true;
                    return None;
                }
            }
        }
    }

    /// Stop receiving. Idempotent; no event is returned after this.
    pub fn unsubscribe(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.pending.clear();
        if let Err(e) = self.bus.remove(&self.handle) {
            warn!(channel = %self.handle.channel, error = %e, "unsubscribe failed");
        }
    }

    fn accept(&mut self, event: ChannelEvent) -> Option<ChannelEvent> {
        // Already handed out by a replay or resync.
        if event.sequence_id <= self.high_water {
            return None;
        }
        self.high_water = event.sequence_id;
        Some(event)
    }

    /// The live queue overflowed: re-read what was missed from the log.
    fn resync(&mut self, skipped: u64) {
        match self.bus.recover(&self.handle.channel, self.high_water) {
            Ok((missed, evicted)) => {
                if let Some(evicted) = evicted {
                    warn!(
                        channel = %self.handle.channel,
                        after = %self.high_water,
                        evicted_through = %evicted,
                        "events evicted before resync"
                    );
                }
                debug!(
                    channel = %self.handle.channel,
                    skipped,
                    recovered = missed.len(),
                    "subscriber resynced from log"
                );
                if let Some(last) = missed.last() {
                    self.high_water = last.sequence_id;
                }
                self.pending.extend(missed);
            }
            Err(e) => {
                warn!(channel = %self.handle.channel, error = %e, "resync failed");
                self.closed = true;
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let _ = self.bus.remove(&self.handle);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("handle", &self.handle)
            .field("state", &self.state())
            .field("high_water", &self.high_water)
            .finish()
    }
}
