//! Custom Axum extractors for request authentication.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};

use crate::state::AppState;

/// Header carrying the shared secret on producer requests.
pub const SECRET_HEADER: &str = "Osbr-Secret";

/// Passes when the `Osbr-Secret` header matches the configured secret, or
/// always when the broker is not hardened.
pub struct ServiceAuth;

/// Rejection returned by [`ServiceAuth`].
#[derive(Debug, thiserror::Error)]
pub enum ServiceAuthError {
    #[error("invalid Osbr-Secret header")]
    InvalidHeader,
    #[error("secret missing or wrong")]
    Unauthorized,
}

impl IntoResponse for ServiceAuthError {
    fn into_response(self) -> Response {
        let status = match self {
            ServiceAuthError::InvalidHeader => StatusCode::BAD_REQUEST,
            ServiceAuthError::Unauthorized => StatusCode::UNAUTHORIZED,
        };
        (status, self.to_string()).into_response()
    }
}

impl FromRequestParts<AppState> for ServiceAuth {
    type Rejection = ServiceAuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let supplied = parts
            .headers
            .get(SECRET_HEADER)
            .map(|value| value.to_str())
            .transpose()
            .map_err(|_| ServiceAuthError::InvalidHeader)?;

        if state.config.security.read().await.authorize(supplied) {
            Ok(ServiceAuth)
        } else {
            tracing::warn!("Service request rejected: bad or missing secret");
            Err(ServiceAuthError::Unauthorized)
        }
    }
}
