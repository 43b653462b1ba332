//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::rejection::JsonRejection,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler. Wraps the domain taxonomy and maps
/// each variant to a stable status code.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub alms_core::Error);

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self {
    Self(alms_core::Error::InvalidInput(rejection.body_text()))
  }
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    use alms_core::Error::*;
    match &self.0 {
      Unauthenticated => StatusCode::UNAUTHORIZED,
      Forbidden(_) | NotOwner(_) => StatusCode::FORBIDDEN,
      NotFound { .. } => StatusCode::NOT_FOUND,
      InvalidInput(_) => StatusCode::BAD_REQUEST,
      InvalidState(_) | Conflict(_) => StatusCode::CONFLICT,
      Serialization(_) | Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let message = if status.is_server_error() {
      tracing::error!(error = %self.0, "request failed");
      "internal server error".to_owned()
    } else {
      self.0.to_string()
    };

    let mut res =
      (status, Json(json!({ "error": message, "kind": self.0.kind() }))).into_response();
    if status == StatusCode::UNAUTHORIZED {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Bearer realm=\"alms\""),
      );
    }
    res
  }
}
