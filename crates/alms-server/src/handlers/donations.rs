//! Handlers for `/api/donations` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/api/donations/mine` | As donor or recipient |
//! | `GET`  | `/api/donations/{id}` | Parties or admin |
//! | `POST` | `/api/donations/{id}/complete` | Body: `{"feedback":…}` |
//! | `POST` | `/api/donations/{id}/cancel` | Body: `{"reason":…}` |

use alms_core::{donation::Donation, id::DonationId, store::DonationStore};
use axum::extract::{Path, State};
use serde::Deserialize;

use crate::{AppState, auth::Authenticated, error::ApiError, extract::Json};

/// `GET /api/donations/mine`
pub async fn mine<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
) -> Result<Json<Vec<Donation>>, ApiError>
where
  S: DonationStore + 'static,
{
  Ok(Json(state.engine.my_donations(&principal).await?))
}

/// `GET /api/donations/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  Path(id): Path<DonationId>,
) -> Result<Json<Donation>, ApiError>
where
  S: DonationStore + 'static,
{
  Ok(Json(state.engine.donation(&principal, id).await?))
}

#[derive(Debug, Deserialize)]
pub struct CompleteBody {
  pub feedback: Option<String>,
}

/// `POST /api/donations/{id}/complete`
pub async fn complete<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  Path(id): Path<DonationId>,
  Json(body): Json<CompleteBody>,
) -> Result<Json<Donation>, ApiError>
where
  S: DonationStore + 'static,
{
  Ok(Json(state.engine.complete_donation(&principal, id, body.feedback).await?))
}

#[derive(Debug, Deserialize)]
pub struct CancelBody {
  pub reason: Option<String>,
}

/// `POST /api/donations/{id}/cancel`
pub async fn cancel<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  Path(id): Path<DonationId>,
  Json(body): Json<CancelBody>,
) -> Result<Json<Donation>, ApiError>
where
  S: DonationStore + 'static,
{
  Ok(Json(state.engine.cancel_donation(&principal, id, body.reason).await?))
}
