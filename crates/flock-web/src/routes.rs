mod debug;
mod posts;
mod reposts;
mod social;
mod timeline;
mod users;

use axum::Router;
use axum::extract::{FromRequest, FromRequestParts};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};

use super::SharedState;
use super::error::RequestError;

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(RequestError))]
pub struct AppJson<T>(pub T);

impl<T> IntoResponse for AppJson<T>
where
    axum::Json<T>: IntoResponse,
{
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(RequestError))]
pub struct AppPath<T>(pub T);

pub fn route_handler(state: SharedState) -> Router {
    Router::new()
        .nest("/api", api_router())
        .with_state(state)
}

fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/users", post(users::create_user))
        .route(
            "/users/{user_id}",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route("/users/{user_id}/posts", get(users::get_user_posts))
        .route("/users/{user_id}/reposts", get(users::get_user_reposts))
        .route("/users/{user_id}/timeline", get(timeline::get_timeline))
        .route(
            "/users/{user_id}/timeline/stream",
            get(timeline::stream_timeline),
        )
        .route("/users/{user_id}/likes", post(social::like))
        .route("/users/{user_id}/likes/{post_id}", delete(social::unlike))
        .route("/users/{user_id}/following", post(social::follow))
        .route(
            "/users/{user_id}/following/{target_user_id}",
            delete(social::unfollow),
        )
        .route("/users/{user_id}/followers", get(social::get_followers))
        .route("/users/{user_id}/followees", get(social::get_followees))
        .route(
            "/users/{user_id}/muting",
            get(social::get_muted).post(social::mute),
        )
        .route(
            "/users/{user_id}/muting/{target_user_id}",
            delete(social::unmute),
        )
        .route(
            "/users/{user_id}/blocking",
            get(social::get_blocked).post(social::block),
        )
        .route(
            "/users/{user_id}/blocking/{target_user_id}",
            delete(social::unblock),
        )
        .route("/posts", post(posts::create_post))
        .route(
            "/posts/{post_id}",
            get(posts::get_post).delete(posts::delete_post),
        )
        .route("/reposts", post(reposts::create_repost))
        .route(
            "/reposts/{repost_id}",
            get(reposts::get_repost).delete(reposts::delete_repost),
        )
        .route("/debug/fanout", get(debug::get_fanout))
}
