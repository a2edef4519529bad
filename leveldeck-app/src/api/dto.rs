use axum::http::StatusCode;
use leveldeck_core::CoreError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorOut {
    pub error: String,
}

pub fn status_for(err: &CoreError) -> StatusCode {
    match err {
        CoreError::Invalid(_) | CoreError::InvalidWeights(_) | CoreError::InvalidLevel(_) => {
            StatusCode::BAD_REQUEST
        }
        CoreError::NoSuchDrawnKey(_) | CoreError::DrawPending => StatusCode::CONFLICT,
        CoreError::NotFound(_) => StatusCode::NOT_FOUND,
        CoreError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
