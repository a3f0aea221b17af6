use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use spout_core::SpoutError;

#[derive(Debug)]
pub struct ApiError {
    code: &'static str,
    message: String,
    status: StatusCode,
}

impl ApiError {
    pub fn new(code: &'static str, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NotFound", StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BadRequest", StatusCode::BAD_REQUEST, message)
    }
}

impl From<SpoutError> for ApiError {
    fn from(err: SpoutError) -> Self {
        match err {
            SpoutError::ContainerNotFound(id) => {
                ApiError::not_found(format!("container {id} not found"))
            }
            SpoutError::RouteNotFound(id) => ApiError::not_found(format!("route {id} not found")),
            SpoutError::InvalidRoute(msg) => {
                ApiError::new("InvalidRoute", StatusCode::BAD_REQUEST, msg)
            }
            SpoutError::Serde(e) => ApiError::new("SerdeError", StatusCode::BAD_REQUEST, e.to_string()),
            SpoutError::Runtime(e) => {
                ApiError::new("RuntimeError", StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            SpoutError::Store(msg) => {
                ApiError::new("StoreError", StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            SpoutError::Io(e) => {
                ApiError::new("IoError", StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            SpoutError::Other(msg) => {
                ApiError::new("Error", StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "code": self.code,
            "message": self.message,
        }));
        (self.status, body).into_response()
    }
}
