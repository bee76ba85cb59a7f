//! Likes and user-to-user relations
use std::collections::BTreeSet;

use axum::extract::State;
use axum::http::StatusCode;
use flock_core::{PostId, UserId};
use serde::Deserialize;
use snafu::ensure;

use super::{AppJson, AppPath};
use crate::SharedState;
use crate::error::{NotFoundSnafu, RequestResult};

#[derive(Deserialize)]
pub struct LikeRequest {
    post_id: PostId,
}

pub async fn like(
    State(state): State<SharedState>,
    AppPath(user_id): AppPath<UserId>,
    AppJson(req): AppJson<LikeRequest>,
) -> RequestResult<StatusCode> {
    state.db.like_post(user_id, req.post_id).await?;
    Ok(StatusCode::CREATED)
}

pub async fn unlike(
    State(state): State<SharedState>,
    AppPath((user_id, post_id)): AppPath<(UserId, PostId)>,
) -> RequestResult<StatusCode> {
    state.db.unlike_post(user_id, post_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct RelationRequest {
    target_user_id: UserId,
}

pub async fn follow(
    State(state): State<SharedState>,
    AppPath(user_id): AppPath<UserId>,
    AppJson(req): AppJson<RelationRequest>,
) -> RequestResult<StatusCode> {
    state.db.follow(user_id, req.target_user_id).await?;
    Ok(StatusCode::CREATED)
}

pub async fn unfollow(
    State(state): State<SharedState>,
    AppPath((user_id, target)): AppPath<(UserId, UserId)>,
) -> RequestResult<StatusCode> {
    state.db.unfollow(user_id, target).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mute(
    State(state): State<SharedState>,
    AppPath(user_id): AppPath<UserId>,
    AppJson(req): AppJson<RelationRequest>,
) -> RequestResult<StatusCode> {
    state.db.mute(user_id, req.target_user_id).await?;
    Ok(StatusCode::CREATED)
}

pub async fn unmute(
    State(state): State<SharedState>,
    AppPath((user_id, target)): AppPath<(UserId, UserId)>,
) -> RequestResult<StatusCode> {
    state.db.unmute(user_id, target).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn block(
    State(state): State<SharedState>,
    AppPath(user_id): AppPath<UserId>,
    AppJson(req): AppJson<RelationRequest>,
) -> RequestResult<StatusCode> {
    state.db.block(user_id, req.target_user_id).await?;
    Ok(StatusCode::CREATED)
}

pub async fn unblock(
    State(state): State<SharedState>,
    AppPath((user_id, target)): AppPath<(UserId, UserId)>,
) -> RequestResult<StatusCode> {
    state.db.unblock(user_id, target).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Relation lists of a missing user would be indistinguishable from empty ones
async fn ensure_user(state: &SharedState, user_id: UserId) -> RequestResult<()> {
    ensure!(
        state.db.user_exists(user_id).await?,
        NotFoundSnafu { what: "User" }
    );
    Ok(())
}

pub async fn get_followers(
    State(state): State<SharedState>,
    AppPath(user_id): AppPath<UserId>,
) -> RequestResult<AppJson<BTreeSet<UserId>>> {
    ensure_user(&state, user_id).await?;
    Ok(AppJson(state.db.followers_of(user_id).await?))
}

pub async fn get_followees(
    State(state): State<SharedState>,
    AppPath(user_id): AppPath<UserId>,
) -> RequestResult<AppJson<BTreeSet<UserId>>> {
    ensure_user(&state, user_id).await?;
    Ok(AppJson(state.db.followees_of(user_id).await?))
}

pub async fn get_muted(
    State(state): State<SharedState>,
    AppPath(user_id): AppPath<UserId>,
) -> RequestResult<AppJson<BTreeSet<UserId>>> {
    ensure_user(&state, user_id).await?;
    Ok(AppJson(state.db.mutes_of(user_id).await?))
}

pub async fn get_blocked(
    State(state): State<SharedState>,
    AppPath(user_id): AppPath<UserId>,
) -> RequestResult<AppJson<BTreeSet<UserId>>> {
    ensure_user(&state, user_id).await?;
    Ok(AppJson(state.db.blocks_of(user_id).await?))
}
