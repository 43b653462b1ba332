//! Handlers for `/api/associations` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`    | `/api/associations` | Public |
//! | `GET`    | `/api/associations/search` | `?name=…&category=…`, case-insensitive |
//! | `GET`    | `/api/associations/{id}` | 404 if not found |
//! | `GET`    | `/api/associations/profile` | The association the caller acts for or owns |
//! | `PUT`    | `/api/associations/profile` | Owner edit |
//! | `DELETE` | `/api/associations/profile` | Offers revert to the owner |
//! | `POST`   | `/api/associations/admin` | Admin only; 201 |
//! | `PUT`    | `/api/associations/admin/{id}` | Admin only |
//! | `DELETE` | `/api/associations/admin/{id}` | Admin only |

use alms_core::{
  account::{Association, AssociationPatch, AssociationQuery},
  id::AssociationId,
  identity::AssociationInput,
  store::DonationStore,
};
use axum::{
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};

use super::require_admin;
use crate::{AppState, auth::Authenticated, error::ApiError, extract::Json};

// ─── Public directory ────────────────────────────────────────────────────────

/// `GET /api/associations`
pub async fn list<S>(
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<Association>>, ApiError>
where
  S: DonationStore + 'static,
{
  Ok(Json(state.engine.associations(AssociationQuery::default()).await?))
}

/// `GET /api/associations/search[?name=…][&category=…]`
pub async fn search<S>(
  State(state): State<AppState<S>>,
  Query(query): Query<AssociationQuery>,
) -> Result<Json<Vec<Association>>, ApiError>
where
  S: DonationStore + 'static,
{
  Ok(Json(state.engine.associations(query).await?))
}

/// `GET /api/associations/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<AssociationId>,
) -> Result<Json<Association>, ApiError>
where
  S: DonationStore + 'static,
{
  Ok(Json(state.engine.association(id).await?))
}

// ─── Own profile ─────────────────────────────────────────────────────────────

/// `GET /api/associations/profile`
pub async fn profile<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
) -> Result<Json<Association>, ApiError>
where
  S: DonationStore + 'static,
{
  Ok(Json(state.engine.own_association(&principal).await?))
}

/// `PUT /api/associations/profile`
pub async fn update_profile<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  Json(patch): Json<AssociationPatch>,
) -> Result<Json<Association>, ApiError>
where
  S: DonationStore + 'static,
{
  let own = state.engine.own_association(&principal).await?;
  Ok(Json(state.engine.update_association(&principal, own.id, patch).await?))
}

/// `DELETE /api/associations/profile`
pub async fn delete_profile<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
) -> Result<StatusCode, ApiError>
where
  S: DonationStore + 'static,
{
  let own = state.engine.own_association(&principal).await?;
  state.engine.delete_association(&principal, own.id).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Administration ──────────────────────────────────────────────────────────

/// `POST /api/associations/admin`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  Json(input): Json<AssociationInput>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DonationStore + 'static,
{
  let association = state.engine.create_association(&principal, input).await?;
  Ok((StatusCode::CREATED, Json(association)))
}

/// `PUT /api/associations/admin/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  Path(id): Path<AssociationId>,
  Json(patch): Json<AssociationPatch>,
) -> Result<Json<Association>, ApiError>
where
  S: DonationStore + 'static,
{
  require_admin(&principal)?;
  Ok(Json(state.engine.update_association(&principal, id, patch).await?))
}

/// `DELETE /api/associations/admin/{id}`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  Path(id): Path<AssociationId>,
) -> Result<StatusCode, ApiError>
where
  S: DonationStore + 'static,
{
  require_admin(&principal)?;
  state.engine.delete_association(&principal, id).await?;
  Ok(StatusCode::NO_CONTENT)
}
