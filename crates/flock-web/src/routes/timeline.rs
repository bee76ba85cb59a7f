use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use flock_core::{Post, UserId};
use flock_db::TIMELINE_LIMIT;
use flock_util_error::FmtCompact as _;
use futures::Stream;
use tracing::{debug, warn};

use super::{AppJson, AppPath};
use crate::error::RequestResult;
use crate::{LOG_TARGET, SharedState};

pub async fn get_timeline(
    State(state): State<SharedState>,
    AppPath(user_id): AppPath<UserId>,
) -> RequestResult<AppJson<Vec<Post>>> {
    Ok(AppJson(
        state.db.current_timeline(user_id, TIMELINE_LIMIT).await?,
    ))
}

/// Live timeline as server-sent events
///
/// The first event is always the snapshot. Every event is sent with its
/// kind as the SSE event name and its JSON as data. Dropping the response
/// (client gone) drops the session, which unregisters it.
pub async fn stream_timeline(
    State(state): State<SharedState>,
    AppPath(user_id): AppPath<UserId>,
) -> RequestResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let mut session = state.timeline.subscribe(user_id).await?;

    let stream = async_stream::stream! {
        while let Some(event) = session.next_event().await {
            match Event::default().event(event.kind().as_str()).json_data(&*event) {
                Ok(frame) => yield Ok::<_, Infallible>(frame),
                Err(err) => {
                    // Only this stream is affected
                    warn!(
                        target: LOG_TARGET,
                        %user_id,
                        err = %err.fmt_compact(),
                        "Failed to serialize timeline event, closing stream"
                    );
                    break;
                }
            }
        }
        debug!(target: LOG_TARGET, %user_id, "Timeline stream ended");
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(state.opts.keep_alive)))
}
