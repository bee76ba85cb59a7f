use axum::extract::State;
use axum::http::StatusCode;
use flock_core::{Post, Repost, User, UserId};
use flock_db::{NewUser, TIMELINE_LIMIT, UserUpdate};
use serde::Deserialize;
use snafu::OptionExt as _;
use tracing::info;

use super::{AppJson, AppPath};
use crate::error::{NotFoundSnafu, RequestResult};
use crate::{LOG_TARGET, SharedState};

#[derive(Deserialize)]
pub struct CreateUserRequest {
    username: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    bio: String,
    #[serde(default)]
    is_private: bool,
}

pub async fn create_user(
    State(state): State<SharedState>,
    AppJson(req): AppJson<CreateUserRequest>,
) -> RequestResult<(StatusCode, AppJson<User>)> {
    let user = state
        .db
        .create_user(NewUser {
            username: req.username,
            display_name: req.display_name,
            bio: req.bio,
            is_private: req.is_private,
        })
        .await?;

    Ok((StatusCode::CREATED, AppJson(user)))
}

pub async fn get_user(
    State(state): State<SharedState>,
    AppPath(user_id): AppPath<UserId>,
) -> RequestResult<AppJson<User>> {
    let user = state
        .db
        .get_user(user_id)
        .await?
        .context(NotFoundSnafu { what: "User" })?;

    Ok(AppJson(user))
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    display_name: Option<String>,
    bio: Option<String>,
    is_private: Option<bool>,
}

pub async fn update_user(
    State(state): State<SharedState>,
    AppPath(user_id): AppPath<UserId>,
    AppJson(req): AppJson<UpdateUserRequest>,
) -> RequestResult<AppJson<User>> {
    let user = state
        .db
        .update_user(
            user_id,
            UserUpdate {
                display_name: req.display_name,
                bio: req.bio,
                is_private: req.is_private,
            },
        )
        .await?;

    Ok(AppJson(user))
}

/// Delete the account with everything it owns and end its streams
pub async fn delete_user(
    State(state): State<SharedState>,
    AppPath(user_id): AppPath<UserId>,
) -> RequestResult<StatusCode> {
    let deleted = state.timeline.delete_user(user_id).await?;
    info!(
        target: LOG_TARGET,
        %user_id,
        posts = deleted.posts.len(),
        "User deleted"
    );

    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_user_posts(
    State(state): State<SharedState>,
    AppPath(user_id): AppPath<UserId>,
) -> RequestResult<AppJson<Vec<Post>>> {
    Ok(AppJson(state.db.user_posts(user_id, TIMELINE_LIMIT).await?))
}

pub async fn get_user_reposts(
    State(state): State<SharedState>,
    AppPath(user_id): AppPath<UserId>,
) -> RequestResult<AppJson<Vec<Repost>>> {
    Ok(AppJson(state.db.user_reposts(user_id, TIMELINE_LIMIT).await?))
}
