use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use mck_types::{ChannelKey, SequenceId};

use crate::error::{FabricError, Result};
use crate::event::{ChannelEvent, EventKind, EventPayload};
use crate::sequencer::Sequencer;
use crate::subscription::{SubscriberHandle, Subscription};

/// Configuration for the [`ChannelBus`].
#[derive(Clone, Debug)]
pub struct FabricConfig {
    /// Capacity of each subscriber's live queue. When a slow subscriber falls
    /// this far behind, its oldest queued events are dropped and it re-reads
    /// them from the channel log.
    pub subscriber_capacity: usize,
    /// Maximum events retained per channel log; `None` keeps everything.
    pub retention: Option<usize>,
}

impl Default for FabricConfig {
    fn default() -> Self {
        Self {
            subscriber_capacity: 1024,
            retention: None,
        }
    }
}

struct LiveSubscriber {
    id: u64,
    sender: broadcast::Sender<ChannelEvent>,
}

#[derive(Default)]
struct Channel {
    log: VecDeque<ChannelEvent>,
    /// Id of the newest event dropped by retention.
    evicted_through: SequenceId,
    subscribers: Vec<LiveSubscriber>,
}

impl Channel {
    /// Logged events with a sequence id strictly after `cursor`.
    fn events_after(&self, cursor: SequenceId) -> impl Iterator<Item = &ChannelEvent> {
        let start = self.log.partition_point(|e| e.sequence_id <= cursor);
        self.log.range(start..)
    }

    /// The newest evicted id, if events after `cursor` have been evicted.
    fn evicted_after(&self, cursor: SequenceId) -> Option<SequenceId> {
        (self.evicted_through > cursor).then_some(self.evicted_through)
    }
}

#[derive(Default)]
struct BusState {
    sequencer: Sequencer,
    channels: HashMap<ChannelKey, Channel>,
}

pub(crate) struct BusInner {
    config: FabricConfig,
    state: Mutex<BusState>,
    next_subscriber: AtomicU64,
}

impl BusInner {
    fn lock(&self) -> Result<MutexGuard<'_, BusState>> {
        self.state.lock().map_err(|_| FabricError::LockPoisoned)
    }

    /// Read every retained event on `channel` after `cursor`.
    pub(crate) fn replay(&self, channel: &ChannelKey, cursor: SequenceId) -> Result<Vec<ChannelEvent>> {
        Ok(self.recover(channel, cursor)?.0)
    }

    /// Like [`replay`](Self::replay), also reporting the newest evicted id
    /// when retention dropped events after `cursor`.
    pub(crate) fn recover(
        &self,
        channel: &ChannelKey,
        cursor: SequenceId,
    ) -> Result<(Vec<ChannelEvent>, Option<SequenceId>)> {
        let state = self.lock()?;
        Ok(state
            .channels
            .get(channel)
            .map(|c| (c.events_after(cursor).cloned().collect(), c.evicted_after(cursor)))
            .unwrap_or_default())
    }

    /// Remove a live subscriber. Returns `true` if it was registered.
    pub(crate) fn remove(&self, handle: &SubscriberHandle) -> Result<bool> {
        let mut state = self.lock()?;
        let Some(channel) = state.channels.get_mut(&handle.channel) else {
            return Ok(false);
        };
        let before = channel.subscribers.len();
        channel.subscribers.retain(|s| s.id != handle.id);
        let removed = channel.subscribers.len() != before;
        if removed {
            debug!(channel = %handle.channel, subscriber = handle.id, "subscriber removed");
        }
        Ok(removed)
    }
}

/// Multi-channel publish/subscribe log with a single global sequence.
///
/// Cheap to clone; clones share the same channels and sequencer.
#[derive(Clone)]
pub struct ChannelBus {
    inner: Arc<BusInner>,
}

impl ChannelBus {
    pub fn new(config: FabricConfig) -> Self {
        info!(
            subscriber_capacity = config.subscriber_capacity,
            retention = ?config.retention,
            "channel bus started"
        );
        Self {
            inner: Arc::new(BusInner {
                config,
                state: Mutex::new(BusState::default()),
                next_subscriber: AtomicU64::new(1),
            }),
        }
    }

    /// Publish one event on one channel.
    ///
    /// Id assignment, log append and delivery to live subscribers happen under
    /// one lock, so every subscriber sees events in sequence order. Delivery
    /// never blocks: each subscriber has its own bounded queue.
    pub fn publish(
        &self,
        channel: &ChannelKey,
        kind: EventKind,
        payload: EventPayload,
    ) -> Result<SequenceId> {
        if payload.kind() != kind {
            return Err(FabricError::PayloadMismatch {
                declared: kind,
                payload: payload.kind(),
            });
        }

        let mut state = self.inner.lock()?;
        let sequence_id = state.sequencer.issue();
        let event = ChannelEvent {
            sequence_id,
            channel: channel.clone(),
            kind,
            payload,
        };

        let entry = state.channels.entry(channel.clone()).or_default();
        entry.log.push_back(event.clone());
        if let Some(limit) = self.inner.config.retention {
            while entry.log.len() > limit {
                if let Some(evicted) = entry.log.pop_front() {
                    entry.evicted_through = evicted.sequence_id;
                }
            }
        }

        // A failed send means every receiver is gone.
        entry
            .subscribers
            .retain(|sub| sub.sender.send(event.clone()).is_ok());

        debug!(
            %channel,
            %kind,
            seq = %sequence_id,
            receivers = entry.subscribers.len(),
            "event published"
        );
        Ok(sequence_id)
    }

    /// Subscribe to `channel`.
    ///
    /// With `from = Some(k)`, the subscription first yields every retained
    /// event with id `> k`, then live events. Without a cursor it is live-only.
    /// A cursor beyond the latest issued id is treated as the latest id. A
    /// cursor older than the retained window replays what is left.
    pub fn subscribe(&self, channel: &ChannelKey, from: Option<SequenceId>) -> Result<Subscription> {
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = broadcast::channel(self.inner.config.subscriber_capacity.max(1));

        let mut state = self.inner.lock()?;
        let latest = state.sequencer.last();
        let cursor = from.map_or(latest, |k| k.min(latest));

        let entry = state.channels.entry(channel.clone()).or_default();
        let (replay, evicted): (VecDeque<ChannelEvent>, _) = match from {
            Some(_) => (entry.events_after(cursor).cloned().collect(), entry.evicted_after(cursor)),
            None => (VecDeque::new(), None),
        };
        // Registered under the same lock the replay was read under: anything
        // published after this point is newer than `latest`.
        entry.subscribers.push(LiveSubscriber { id, sender });
        drop(state);

        if let Some(evicted) = evicted {
            warn!(
                %channel,
                subscriber = id,
                after = %cursor,
                evicted_through = %evicted,
                "events evicted before replay"
            );
        }
        debug!(
            %channel,
            subscriber = id,
            cursor = %cursor,
            replay = replay.len(),
            "subscriber registered"
        );

        let handle = SubscriberHandle {
            channel: channel.clone(),
            id,
        };
        Ok(Subscription::new(
            handle,
            Arc::clone(&self.inner),
            receiver,
            replay,
            latest,
        ))
    }

    /// Stop live delivery to `handle`. Idempotent; returns `true` on the call
    /// that actually removed it.
    pub fn unsubscribe(&self, handle: &SubscriberHandle) -> Result<bool> {
        self.inner.remove(handle)
    }

    /// Retained events on `channel` after `cursor`, in sequence order.
    pub fn replay(&self, channel: &ChannelKey, cursor: SequenceId) -> Result<Vec<ChannelEvent>> {
        self.inner.replay(channel, cursor)
    }

    /// The most recently issued sequence id.
    pub fn last_sequence(&self) -> Result<SequenceId> {
        Ok(self.inner.lock()?.sequencer.last())
    }

    /// Number of channels ever published or subscribed to.
    pub fn channel_count(&self) -> Result<usize> {
        Ok(self.inner.lock()?.channels.len())
    }

    /// Number of live subscribers on `channel`.
    pub fn subscriber_count(&self, channel: &ChannelKey) -> Result<usize> {
        Ok(self
            .inner
            .lock()?
            .channels
            .get(channel)
            .map_or(0, |c| c.subscribers.len()))
    }

    /// Number of retained events on `channel`.
    pub fn log_len(&self, channel: &ChannelKey) -> Result<usize> {
        Ok(self
            .inner
            .lock()?
            .channels
            .get(channel)
            .map_or(0, |c| c.log.len()))
    }
}

impl Default for ChannelBus {
    fn default() -> Self {
        Self::new(FabricConfig::default())
    }
}

impl std::fmt::Debug for ChannelBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelBus")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
