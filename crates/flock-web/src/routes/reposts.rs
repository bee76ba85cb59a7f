use axum::extract::State;
use axum::http::StatusCode;
use flock_core::{Repost, RepostId, RepostParent, UserId};
use serde::Deserialize;
use snafu::OptionExt as _;

use super::{AppJson, AppPath};
use crate::SharedState;
use crate::error::{NotFoundSnafu, RequestResult};

#[derive(Deserialize)]
pub struct CreateRepostRequest {
    user_id: UserId,
    parent: RepostParent,
    /// Makes it a quote repost
    quote: Option<String>,
}

pub async fn create_repost(
    State(state): State<SharedState>,
    AppJson(req): AppJson<CreateRepostRequest>,
) -> RequestResult<(StatusCode, AppJson<Repost>)> {
    let repost = state
        .timeline
        .create_repost(req.user_id, req.parent, req.quote.as_deref())
        .await?;

    Ok((StatusCode::CREATED, AppJson(repost)))
}

pub async fn get_repost(
    State(state): State<SharedState>,
    AppPath(repost_id): AppPath<RepostId>,
) -> RequestResult<AppJson<Repost>> {
    let repost = state
        .db
        .get_repost(repost_id)
        .await?
        .context(NotFoundSnafu { what: "Repost" })?;

    Ok(AppJson(repost))
}

pub async fn delete_repost(
    State(state): State<SharedState>,
    AppPath(repost_id): AppPath<RepostId>,
) -> RequestResult<StatusCode> {
    state.timeline.delete_repost(repost_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
