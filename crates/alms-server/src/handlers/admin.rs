//! Operator endpoints under `/api/admin`. Every route is admin-only.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/api/admin/offers/expire` | Optional `?asOf=<rfc3339>`; expires every due ACTIVE offer |
//! | `POST` | `/api/admin/offers/{id}/expire` | Idempotent on EXPIRED |
//! | `POST` | `/api/admin/notifications/flush` | Drains the outbox |
//! | `GET`  | `/api/admin/outbox` | Events awaiting dispatch |

use alms_core::{
  id::OfferId,
  notification::Notification,
  offer::DonationOffer,
  store::DonationStore,
};
use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::require_admin;
use crate::{AppState, auth::Authenticated, error::ApiError, extract::Json};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpireParams {
  pub as_of: Option<DateTime<Utc>>,
}

/// `POST /api/admin/offers/expire[?asOf=…]`
pub async fn expire_due<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  Query(params): Query<ExpireParams>,
) -> Result<Json<Vec<DonationOffer>>, ApiError>
where
  S: DonationStore + 'static,
{
  require_admin(&principal)?;
  Ok(Json(state.engine.expire_due_offers(params.as_of).await?))
}

/// `POST /api/admin/offers/{id}/expire`
pub async fn expire_one<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  Path(id): Path<OfferId>,
) -> Result<Json<DonationOffer>, ApiError>
where
  S: DonationStore + 'static,
{
  require_admin(&principal)?;
  Ok(Json(state.engine.expire_offer(id, None).await?))
}

/// `POST /api/admin/notifications/flush`
pub async fn flush<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
) -> Result<Json<Vec<Notification>>, ApiError>
where
  S: DonationStore + 'static,
{
  require_admin(&principal)?;
  Ok(Json(state.engine.flush_notifications().await?))
}

#[derive(Debug, Serialize)]
pub struct OutboxBody {
  pub pending: usize,
}

/// `GET /api/admin/outbox`
pub async fn outbox<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
) -> Result<Json<OutboxBody>, ApiError>
where
  S: DonationStore + 'static,
{
  require_admin(&principal)?;
  Ok(Json(OutboxBody { pending: state.engine.pending_events().await? }))
}
