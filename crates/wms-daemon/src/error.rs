//! Maps a [`WmsError`] class to an HTTP status and the `{error, details?}`
//! body shape.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use wms_core::{ErrorClass, WmsError};

pub struct ApiError(pub WmsError);

impl From<WmsError> for ApiError {
    fn from(err: WmsError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = StatusCode::from_u16(err.class.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if matches!(err.class, ErrorClass::Internal) {
            error!(message = %err.message, "internal error returned from request handler");
        }

        let mut body = json!({ "error": err.message });
        if let Some(details) = err.details {
            body["details"] = details;
        }

        (status, Json(body)).into_response()
    }
}
