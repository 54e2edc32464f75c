//! HTTP error mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Unavailable(String),
    Internal(agora_core::Error),
}

impl From<agora_core::Error> for ApiError {
    fn from(err: agora_core::Error) -> Self {
        match err {
            agora_core::Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            agora_core::Error::NotFound(msg) => ApiError::NotFound(msg),
            agora_core::Error::Cancelled(msg) => ApiError::Unavailable(msg),
            other => ApiError::Internal(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Internal(err) => {
                tracing::error!(subsystem = "api", error = %err, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::Error;

    fn status(err: Error) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status(Error::InvalidInput("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(Error::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status(Error::Cancelled("x".into())), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status(Error::Internal("x".into())), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status(Error::Config("x".into())), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
