//! Handlers for `/api/messages` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/api/messages` | Body: `{"receiverId","content","relatedOfferId"?}`; 201 |
//! | `GET`  | `/api/messages/inbox` | Newest first |
//! | `GET`  | `/api/messages/with/{user_id}` | Oldest first |
//! | `GET`  | `/api/messages/{id}` | Sender, receiver or admin |
//! | `POST` | `/api/messages/{id}/read` | Receiver only; idempotent |

use alms_core::{
  id::{MessageId, UserId},
  message::Message,
  messaging::MessageInput,
  store::DonationStore,
};
use axum::{
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};

use crate::{AppState, auth::Authenticated, error::ApiError, extract::Json};

/// `POST /api/messages`
pub async fn send<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  Json(input): Json<MessageInput>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DonationStore + 'static,
{
  let message = state.engine.send_message(&principal, input).await?;
  Ok((StatusCode::CREATED, Json(message)))
}

/// `GET /api/messages/inbox`
pub async fn inbox<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
) -> Result<Json<Vec<Message>>, ApiError>
where
  S: DonationStore + 'static,
{
  Ok(Json(state.engine.inbox(&principal).await?))
}

/// `GET /api/messages/with/{user_id}`
pub async fn conversation<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  Path(other): Path<UserId>,
) -> Result<Json<Vec<Message>>, ApiError>
where
  S: DonationStore + 'static,
{
  Ok(Json(state.engine.conversation(&principal, other).await?))
}

/// `GET /api/messages/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  Path(id): Path<MessageId>,
) -> Result<Json<Message>, ApiError>
where
  S: DonationStore + 'static,
{
  Ok(Json(state.engine.message(&principal, id).await?))
}

/// `POST /api/messages/{id}/read`
pub async fn mark_read<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  Path(id): Path<MessageId>,
) -> Result<Json<Message>, ApiError>
where
  S: DonationStore + 'static,
{
  Ok(Json(state.engine.mark_message_read(&principal, id).await?))
}
