//! Handlers for `/api/users` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`    | `/api/users/profile` | The caller's own account |
//! | `PUT`    | `/api/users/profile` | Role changes are admin-only |
//! | `DELETE` | `/api/users/profile` | 409 once the account has history |
//! | `GET`    | `/api/users/admin/all` | Admin only |
//! | `GET`    | `/api/users/admin/{id}` | Admin only |
//! | `PUT`    | `/api/users/admin/{id}` | Admin only |
//! | `DELETE` | `/api/users/admin/{id}` | Admin only |

use alms_core::{
  account::{User, UserPatch},
  id::UserId,
  store::DonationStore,
};
use axum::{
  extract::{Path, State},
  http::StatusCode,
};

use super::require_admin;
use crate::{AppState, auth::Authenticated, error::ApiError, extract::Json};

// ─── Own profile ─────────────────────────────────────────────────────────────

/// `GET /api/users/profile`
pub async fn profile<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
) -> Result<Json<User>, ApiError>
where
  S: DonationStore + 'static,
{
  Ok(Json(state.engine.user(&principal, principal.user_id).await?))
}

/// `PUT /api/users/profile`
pub async fn update_profile<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  Json(patch): Json<UserPatch>,
) -> Result<Json<User>, ApiError>
where
  S: DonationStore + 'static,
{
  let user = state.engine.update_user(&principal, principal.user_id, patch).await?;
  Ok(Json(user))
}

/// `DELETE /api/users/profile`
pub async fn delete_profile<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
) -> Result<StatusCode, ApiError>
where
  S: DonationStore + 'static,
{
  state.engine.delete_user(&principal, principal.user_id).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Administration ──────────────────────────────────────────────────────────

/// `GET /api/users/admin/all`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
) -> Result<Json<Vec<User>>, ApiError>
where
  S: DonationStore + 'static,
{
  Ok(Json(state.engine.users(&principal).await?))
}

/// `GET /api/users/admin/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  Path(id): Path<UserId>,
) -> Result<Json<User>, ApiError>
where
  S: DonationStore + 'static,
{
  require_admin(&principal)?;
  Ok(Json(state.engine.user(&principal, id).await?))
}

/// `PUT /api/users/admin/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  Path(id): Path<UserId>,
  Json(patch): Json<UserPatch>,
) -> Result<Json<User>, ApiError>
where
  S: DonationStore + 'static,
{
  require_admin(&principal)?;
  Ok(Json(state.engine.update_user(&principal, id, patch).await?))
}

/// `DELETE /api/users/admin/{id}`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  Path(id): Path<UserId>,
) -> Result<StatusCode, ApiError>
where
  S: DonationStore + 'static,
{
  require_admin(&principal)?;
  state.engine.delete_user(&principal, id).await?;
  Ok(StatusCode::NO_CONTENT)
}
