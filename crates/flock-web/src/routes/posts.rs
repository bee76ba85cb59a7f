use axum::extract::State;
use axum::http::StatusCode;
use flock_core::{Post, PostId, UserId};
use serde::{Deserialize, Serialize};
use snafu::OptionExt as _;

use super::{AppJson, AppPath};
use crate::SharedState;
use crate::error::{NotFoundSnafu, RequestResult};

#[derive(Deserialize)]
pub struct CreatePostRequest {
    user_id: UserId,
    text: String,
}

pub async fn create_post(
    State(state): State<SharedState>,
    AppJson(req): AppJson<CreatePostRequest>,
) -> RequestResult<(StatusCode, AppJson<Post>)> {
    let post = state.timeline.create_post(req.user_id, &req.text).await?;

    Ok((StatusCode::CREATED, AppJson(post)))
}

#[derive(Serialize)]
pub struct PostView {
    #[serde(flatten)]
    post: Post,
    likes: u64,
}

pub async fn get_post(
    State(state): State<SharedState>,
    AppPath(post_id): AppPath<PostId>,
) -> RequestResult<AppJson<PostView>> {
    let post = state
        .db
        .get_post(post_id)
        .await?
        .context(NotFoundSnafu { what: "Post" })?;
    let likes = state.db.post_like_count(post_id).await?;

    Ok(AppJson(PostView { post, likes }))
}

pub async fn delete_post(
    State(state): State<SharedState>,
    AppPath(post_id): AppPath<PostId>,
) -> RequestResult<StatusCode> {
    state.timeline.delete_post(post_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
