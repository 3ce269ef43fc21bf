//! JSON body extractor with API-shaped rejections.

use axum::extract::FromRequest;
use axum::extract::rejection::JsonRejection;

use crate::error::AppError;

/// `axum::Json` whose rejections render as `{"detail": "..."}` with 400.
#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}
