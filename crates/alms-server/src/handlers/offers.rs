//! Handlers for `/api/offers` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/api/offers` | Optional `?status=…&type=…&creatorId=…` |
//! | `POST` | `/api/offers` | 201; created under the caller's acting identity |
//! | `GET`  | `/api/offers/{id}` | 404 if not found |
//! | `PUT`  | `/api/offers/{id}` | Creator or admin; 409 once terminal |
//! | `GET`  | `/api/offers/{id}/applications` | Creator or admin |
//! | `POST` | `/api/offers/{id}/applications` | Body: `{"message":…}`; 201 |

use alms_core::{
  application::Application,
  id::OfferId,
  offer::{DonationOffer, OfferDraft, OfferPatch, OfferQuery},
  store::DonationStore,
};
use axum::{
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;

use crate::{AppState, auth::Authenticated, error::ApiError, extract::Json};

/// `GET /api/offers`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Query(query): Query<OfferQuery>,
) -> Result<Json<Vec<DonationOffer>>, ApiError>
where
  S: DonationStore + 'static,
{
  Ok(Json(state.engine.offers(query).await?))
}

/// `POST /api/offers`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  Json(draft): Json<OfferDraft>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DonationStore + 'static,
{
  let offer = state.engine.create_offer(&principal, draft).await?;
  Ok((StatusCode::CREATED, Json(offer)))
}

/// `GET /api/offers/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<OfferId>,
) -> Result<Json<DonationOffer>, ApiError>
where
  S: DonationStore + 'static,
{
  Ok(Json(state.engine.offer(id).await?))
}

/// `PUT /api/offers/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  Path(id): Path<OfferId>,
  Json(patch): Json<OfferPatch>,
) -> Result<Json<DonationOffer>, ApiError>
where
  S: DonationStore + 'static,
{
  Ok(Json(state.engine.update_offer(&principal, id, patch).await?))
}

// ─── Applications on an offer ────────────────────────────────────────────────

/// `GET /api/offers/{id}/applications`
pub async fn applications<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  Path(id): Path<OfferId>,
) -> Result<Json<Vec<Application>>, ApiError>
where
  S: DonationStore + 'static,
{
  Ok(Json(state.engine.offer_applications(&principal, id).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct ApplyBody {
  pub message: Option<String>,
}

/// `POST /api/offers/{id}/applications`
pub async fn apply<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  Path(id): Path<OfferId>,
  Json(body): Json<ApplyBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DonationStore + 'static,
{
  let application = state.engine.submit_application(&principal, id, body.message).await?;
  Ok((StatusCode::CREATED, Json(application)))
}
