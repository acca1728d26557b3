use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

/// Error returned by route handlers.
#[derive(Debug)]
pub enum ApiError {
    Store(repo_api::Error),
    /// Missing or malformed request parameters.
    BadRequest(String),
    Unauthorized,
    /// The request body went over the configured limit.
    PayloadTooLarge,
}

impl From<repo_api::Error> for ApiError {
    fn from(err: repo_api::Error) -> Self {
        Self::Store(err)
    }
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    fn status_and_body(&self) -> (StatusCode, String) {
        use repo_api::Error;

        match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".into()),
            Self::PayloadTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large".into()),
            Self::Store(err) if err.is_client_error() => {
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            Self::Store(err @ Error::NotFound(_)) => (StatusCode::NOT_FOUND, err.to_string()),
            Self::Store(err @ Error::QueueFull(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
            }
            Self::Store(err) => {
                error!(error = %err, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Error".into())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.status_and_body().into_response()
    }
}
