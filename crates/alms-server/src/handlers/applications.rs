//! Handlers for `/api/applications` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/api/applications/mine` | Applications the caller submitted |
//! | `GET`  | `/api/applications/{id}` | Applicant, offer creator or admin |
//! | `POST` | `/api/applications/{id}/decision` | Body: `{"decision":"APPROVE"\|"REJECT",…}` |

use alms_core::{
  application::Application,
  id::ApplicationId,
  store::DonationStore,
  workflow::{Decided, DecisionInput},
};
use axum::extract::{Path, State};

use crate::{AppState, auth::Authenticated, error::ApiError, extract::Json};

/// `GET /api/applications/mine`
pub async fn mine<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
) -> Result<Json<Vec<Application>>, ApiError>
where
  S: DonationStore + 'static,
{
  Ok(Json(state.engine.my_applications(&principal).await?))
}

/// `GET /api/applications/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  Path(id): Path<ApplicationId>,
) -> Result<Json<Application>, ApiError>
where
  S: DonationStore + 'static,
{
  Ok(Json(state.engine.application(&principal, id).await?))
}

/// `POST /api/applications/{id}/decision`
pub async fn decide<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  Path(id): Path<ApplicationId>,
  Json(input): Json<DecisionInput>,
) -> Result<Json<Decided>, ApiError>
where
  S: DonationStore + 'static,
{
  Ok(Json(state.engine.decide_application(&principal, id, input).await?))
}
