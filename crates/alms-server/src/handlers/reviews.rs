//! Handlers for reviews.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/api/reviews` | Parties of a COMPLETED donation only; 201 |
//! | `GET`  | `/api/users/{id}/reviews` | Public; includes the average rating |

use alms_core::{
  id::UserId,
  review::{ReviewInput, ReviewsReceived},
  store::DonationStore,
};
use axum::{
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};

use crate::{AppState, auth::Authenticated, error::ApiError, extract::Json};

/// `POST /api/reviews`
pub async fn submit<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  Json(input): Json<ReviewInput>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DonationStore + 'static,
{
  let review = state.engine.submit_review(&principal, input).await?;
  Ok((StatusCode::CREATED, Json(review)))
}

/// `GET /api/users/{id}/reviews`
pub async fn received<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<UserId>,
) -> Result<Json<ReviewsReceived>, ApiError>
where
  S: DonationStore + 'static,
{
  Ok(Json(state.engine.reviews_of(id).await?))
}
