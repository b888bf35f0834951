//! Server-Sent Events bridge for engine events.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use crate::state::AppState;

/// Live engine events.
///
/// Each SSE message is named after the event type and carries the
/// `{type, data}` JSON of the event. A slow client that falls behind gets a
/// `lagged` message with the number of skipped events.
#[utoipa::path(
    get,
    path = "/v1/events",
    responses(
        (status = 200, description = "Event stream", content_type = "text/event-stream"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "crawl"
)]
pub async fn stream_events<T, S>(
    State(state): State<Arc<AppState<T, S>>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    T: Send + Sync + 'static,
    S: Send + Sync + 'static,
{
    let events = BroadcastStream::new(state.events.subscribe())
        .filter_map(|item| async move {
            let event = match item {
                Ok(event) => Event::default().event(event.kind()).json_data(&event),
                Err(BroadcastStreamRecvError::Lagged(n)) => Event::default()
                    .event("lagged")
                    .json_data(serde_json::json!({ "missed": n })),
            };
            event.ok().map(Ok)
        })
        .take_until(state.shutdown.clone().cancelled_owned());

    Sse::new(events).keep_alive(KeepAlive::default())
}
