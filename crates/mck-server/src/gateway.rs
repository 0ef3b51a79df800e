//! Subscriber gateway: channel subscriptions over HTTP.
//!
//! Two transports map onto the same bus subscription:
//!
//! - `GET /sse/:channel` streams events as server-sent events. Every event
//!   carries its sequence id as the SSE `id`, so a reconnecting client's
//!   `Last-Event-ID` header resumes the stream with no gap and no duplicate.
//! - `GET /events/:channel?after=N` long-polls: it returns as soon as at
//!   least one event after `N` exists, or empty once the timeout elapses.
//!
//! A subscription lives exactly as long as its HTTP response. When the peer
//! goes away the response is dropped and the bus handle released with it.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::Json;
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use mck_sdk::{ChannelEvent, ChannelKey, Mockchain, SequenceId, Subscription, SubscriptionState};

use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;

const LAST_EVENT_ID: &str = "last-event-id";
const DEFAULT_POLL_LIMIT: usize = 1000;

/// One gateway connection and the subscription it owns.
///
/// A session is `Connecting` from the moment the request is accepted until
/// the bus subscription is attached.
struct Session {
    id: Uuid,
    channel: ChannelKey,
    subscription: Option<Subscription>,
}

impl Session {
    fn connect(channel: ChannelKey) -> Self {
        Self {
            id: Uuid::now_v7(),
            channel,
            subscription: None,
        }
    }

    /// Subscribe through `chain`, resuming after `cursor` when given.
    fn attach(&mut self, chain: &Mockchain, cursor: Option<SequenceId>) -> ServerResult<()> {
        self.subscription = Some(chain.subscribe(&self.channel, cursor)?);
        debug!(
            session = %self.id,
            channel = %self.channel,
            cursor = ?cursor.map(|c| c.value()),
            state = ?self.state(),
            "subscriber connected"
        );
        Ok(())
    }

    fn state(&self) -> SubscriptionState {
        self.subscription
            .as_ref()
            .map_or(SubscriptionState::Connecting, Subscription::state)
    }

    async fn next(&mut self) -> Option<ChannelEvent> {
        self.subscription.as_mut()?.recv().await
    }

    fn ready(&mut self, limit: usize) -> Vec<ChannelEvent> {
        let mut out = Vec::new();
        let Some(subscription) = self.subscription.as_mut() else {
            return out;
        };
        while out.len() < limit {
            match subscription.try_next() {
                Some(event) => out.push(event),
                None => break,
            }
        }
        out
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.as_mut() {
            subscription.unsubscribe();
            debug!(session = %self.id, channel = %self.channel, "subscriber disconnected");
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    /// Resume cursor for clients that cannot set `Last-Event-ID`.
    pub from: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PollQuery {
    pub after: Option<u64>,
    pub timeout_ms: Option<u64>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PollResponse {
    pub events: Vec<ChannelEvent>,
    /// Pass back as `after` on the next poll.
    pub cursor: SequenceId,
}

fn last_event_id(headers: &HeaderMap) -> ServerResult<Option<SequenceId>> {
    let Some(value) = headers.get(LAST_EVENT_ID) else {
        return Ok(None);
    };
    let text = value
        .to_str()
        .map_err(|_| ServerError::BadRequest("Last-Event-ID is not text".into()))?;
    let id = text
        .trim()
        .parse::<u64>()
        .map_err(|_| ServerError::BadRequest(format!("Last-Event-ID {text:?} is not a sequence id")))?;
    Ok(Some(SequenceId::new(id)))
}

fn sse_event(event: &ChannelEvent) -> Event {
    let base = Event::default()
        .id(event.sequence_id.to_string())
        .event(event.kind.as_str());
    match serde_json::to_string(event) {
        Ok(data) => base.data(data),
        Err(e) => {
            warn!(sequence_id = %event.sequence_id, error = %e, "event not serializable");
            base.comment("unserializable event")
        }
    }
}

pub async fn sse_handler(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
) -> ServerResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let cursor = last_event_id(&headers)?.or(query.from.map(SequenceId::new));
    let mut session = Session::connect(ChannelKey::new(channel));
    session.attach(&state.chain, cursor)?;

    let events = stream::unfold(session, |mut session| async move {
        let event = session.next().await?;
        Some((Ok(sse_event(&event)), session))
    });
    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(state.config.keep_alive())))
}

pub async fn poll_handler(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    Query(query): Query<PollQuery>,
) -> ServerResult<Json<PollResponse>> {
    let ceiling = state.config.long_poll_timeout();
    let timeout = query
        .timeout_ms
        .map(Duration::from_millis)
        .map_or(ceiling, |t| t.min(ceiling));
    let limit = query.limit.unwrap_or(DEFAULT_POLL_LIMIT).max(1);

    // Without a cursor, start from now; the replay closes the window between
    // reading the cursor and registering.
    let cursor = match query.after {
        Some(after) => SequenceId::new(after),
        None => state.chain.last_sequence()?,
    };
    let mut session = Session::connect(ChannelKey::new(channel));
    session.attach(&state.chain, Some(cursor))?;

    let mut events = session.ready(limit);
    if events.is_empty() {
        if let Ok(Some(first)) = tokio::time::timeout(timeout, session.next()).await {
            events.push(first);
            events.extend(session.ready(limit - 1));
        }
    }

    let cursor = events.last().map_or(cursor, |e| e.sequence_id);
    Ok(Json(PollResponse { events, cursor }))
}
