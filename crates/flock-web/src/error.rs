use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use flock_db::DbError;
use flock_timeline::{SessionError, StoreError};
use flock_util_error::FmtCompact as _;
use serde::Serialize;
use snafu::Snafu;
use tracing::{debug, warn};

use crate::LOG_TARGET;
use crate::routes::AppJson;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RequestError {
    #[snafu(transparent)]
    Db { source: DbError },
    #[snafu(transparent)]
    Store { source: StoreError },
    #[snafu(transparent)]
    Session { source: SessionError },
    #[snafu(transparent)]
    Json { source: JsonRejection },
    #[snafu(transparent)]
    Path { source: PathRejection },
    #[snafu(display("{what} not found"))]
    NotFound { what: &'static str },
}
pub type RequestResult<T> = std::result::Result<T, RequestError>;

/// How error responses are serialized
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn db_error_status(err: &DbError) -> StatusCode {
    if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else if err.is_conflict() {
        StatusCode::CONFLICT
    } else if err.is_invalid() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl RequestError {
    pub fn status(&self) -> StatusCode {
        match self {
            RequestError::Db { source }
            | RequestError::Store {
                source: StoreError::Db { source },
            }
            | RequestError::Session {
                source:
                    SessionError::Store {
                        source: StoreError::Db { source },
                    },
            } => db_error_status(source),
            RequestError::Session {
                source: SessionError::UserNotFound { .. },
            }
            | RequestError::NotFound { .. } => StatusCode::NOT_FOUND,
            RequestError::Json { .. } | RequestError::Path { .. } => StatusCode::BAD_REQUEST,
            RequestError::Store { .. } | RequestError::Session { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let status = self.status();

        let error = if status.is_server_error() {
            warn!(
                target: LOG_TARGET,
                err = %self.fmt_compact(),
                "Unexpected Request Error"
            );
            "Internal Server Error".to_owned()
        } else {
            debug!(
                target: LOG_TARGET,
                err = %self.fmt_compact(),
                "Request Error"
            );
            match &self {
                RequestError::Json { source } => source.body_text(),
                RequestError::Path { source } => source.body_text(),
                _ => self.to_string(),
            }
        };

        (status, AppJson(ErrorResponse { error })).into_response()
    }
}
