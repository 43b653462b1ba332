//! Handlers for `/api/notifications` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/api/notifications` | Optional `?unreadOnly=true`; newest first |
//! | `POST` | `/api/notifications/{id}/read` | Owner only; idempotent |

use alms_core::{id::NotificationId, notification::Notification, store::DonationStore};
use axum::extract::{Path, Query, State};
use serde::Deserialize;

use crate::{AppState, auth::Authenticated, error::ApiError, extract::Json};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
  #[serde(default)]
  pub unread_only: bool,
}

/// `GET /api/notifications[?unreadOnly=true]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Notification>>, ApiError>
where
  S: DonationStore + 'static,
{
  Ok(Json(state.engine.notifications(&principal, params.unread_only).await?))
}

/// `POST /api/notifications/{id}/read`
pub async fn mark_read<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  Path(id): Path<NotificationId>,
) -> Result<Json<Notification>, ApiError>
where
  S: DonationStore + 'static,
{
  Ok(Json(state.engine.mark_notification_read(&principal, id).await?))
}
