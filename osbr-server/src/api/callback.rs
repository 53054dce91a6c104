//! Sidecar callback ingress.
//!
//! # Endpoints
//!
//! - `POST /callback[?secret=...]` – connect or disconnect notification

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use osbr_core::router::{CallbackError, CallbackReply};
use serde::Deserialize;

use crate::state::AppState;

/// Build the callback router.
pub fn router() -> Router<AppState> {
    Router::new().route("/callback", post(handle_callback))
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    secret: Option<String>,
}

/// `POST /callback`: the body is parsed by the core router so that a
/// malformed body never reaches any state.
async fn handle_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
    body: Bytes,
) -> Result<Response, CallbackApiError> {
    let reply = state
        .callbacks
        .handle_callback(query.secret.as_deref(), &body)
        .await?;

    Ok(match reply {
        CallbackReply::Accepted(accept) => Json(accept).into_response(),
        CallbackReply::Disconnected => StatusCode::OK.into_response(),
    })
}

/// Maps router errors to the statuses the sidecar understands. Any non-2xx
/// rejects the connection.
#[derive(Debug)]
struct CallbackApiError(CallbackError);

impl From<CallbackError> for CallbackApiError {
    fn from(err: CallbackError) -> Self {
        Self(err)
    }
}

impl IntoResponse for CallbackApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            CallbackError::Unauthorized => StatusCode::UNAUTHORIZED,
            CallbackError::Malformed(_) | CallbackError::Rejected(_) => StatusCode::BAD_REQUEST,
            CallbackError::UnknownStream(_) => StatusCode::NOT_FOUND,
        };
        (status, self.0.to_string()).into_response()
    }
}
