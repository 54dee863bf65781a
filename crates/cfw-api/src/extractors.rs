//! # Extractor Helpers
//!
//! Handlers take `Result<Json<T>, JsonRejection>` (and the same for
//! `Path`) so that rejections render through [`AppError`] instead of
//! axum's plain-text defaults.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::Path;
use axum::Json;

use crate::error::AppError;

pub fn extract_json<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

pub fn extract_path<T>(path: Result<Path<T>, PathRejection>) -> Result<T, AppError> {
    path.map(|Path(value)| value)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    #[test]
    fn ok_body_passes_through() {
        let value = extract_json(Ok(Json(7u32))).unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn rejection_becomes_unprocessable() {
        use axum::extract::FromRequest;

        // No content type.
        let request = axum::http::Request::builder()
            .body(axum::body::Body::from("7"))
            .unwrap();
        let body = Json::<u32>::from_request(request, &()).await;
        let err = extract_json(body).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
