//! Request extractors whose rejections use the API error format.

use axum::{
  extract::FromRequest,
  response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::ApiError;

/// `axum::Json`, except that a missing, malformed or mistyped body is
/// answered as a 400 `invalid_input` [`ApiError`].
#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
  fn into_response(self) -> Response { axum::Json(self.0).into_response() }
}
