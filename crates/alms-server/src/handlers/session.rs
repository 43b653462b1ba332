//! Handlers for `/api/auth` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/api/auth/register/user` | 201; starts a session |
//! | `POST` | `/api/auth/register/association` | 201; owner acts for the association |
//! | `POST` | `/api/auth/login` | Body: `{"email","password","userType":"user"\|"association"}` |
//! | `POST` | `/api/auth/logout` | 204; always succeeds |
//! | `GET`  | `/api/auth/me` | 401 without a live session |
//!
//! Successful register and login responses carry the token in the body and
//! in a `Set-Cookie` header.

use alms_core::{
  account::{Association, User},
  identity::{AssociationRegistration, Login, LoginKind, UserRegistration},
  session::{Principal, SessionStore as _},
  store::DonationStore,
};
use axum::{
  extract::State,
  http::{HeaderMap, HeaderName, StatusCode, header},
  response::IntoResponse,
};
use serde::{Deserialize, Serialize};

use crate::{
  AppState,
  auth::{Authenticated, cleared_cookie, new_token, session_cookie, session_token},
  error::ApiError,
  extract::Json,
};

#[derive(Debug, Serialize)]
pub struct SessionBody {
  pub token:       String,
  pub user:        User,
  pub association: Option<Association>,
}

type SessionResponse = (StatusCode, [(HeaderName, String); 1], Json<SessionBody>);

/// Open a session for `login` and build the response.
fn start_session<S>(state: &AppState<S>, status: StatusCode, login: Login) -> SessionResponse {
  let token = new_token();
  login.context.save(state.sessions.as_ref(), &token);
  tracing::debug!(user_id = %login.user.id, "session started");
  let cookie = session_cookie(&state.config, &token);
  let body = SessionBody { token, user: login.user, association: login.association };
  (status, [(header::SET_COOKIE, cookie)], Json(body))
}

// ─── Register ────────────────────────────────────────────────────────────────

/// `POST /api/auth/register/user`
pub async fn register_user<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<UserRegistration>,
) -> Result<SessionResponse, ApiError>
where
  S: DonationStore + 'static,
{
  let login = state.engine.register_user(body).await?;
  Ok(start_session(&state, StatusCode::CREATED, login))
}

/// `POST /api/auth/register/association`
pub async fn register_association<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<AssociationRegistration>,
) -> Result<SessionResponse, ApiError>
where
  S: DonationStore + 'static,
{
  let login = state.engine.register_association(body).await?;
  Ok(start_session(&state, StatusCode::CREATED, login))
}

// ─── Login / logout ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginBody {
  pub email:    String,
  pub password: String,
  #[serde(default, rename = "userType")]
  pub kind:     LoginKind,
}

/// `POST /api/auth/login`
pub async fn login<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<LoginBody>,
) -> Result<SessionResponse, ApiError>
where
  S: DonationStore + 'static,
{
  let login = state.engine.login(&body.email, &body.password, body.kind).await?;
  Ok(start_session(&state, StatusCode::OK, login))
}

/// `POST /api/auth/logout`
pub async fn logout<S>(
  State(state): State<AppState<S>>,
  headers: HeaderMap,
) -> impl IntoResponse
where
  S: DonationStore + 'static,
{
  if let Some(token) = session_token(&headers, &state.config.session_cookie) {
    state.sessions.invalidate(&token);
  }
  (StatusCode::NO_CONTENT, [(header::SET_COOKIE, cleared_cookie(&state.config))])
}

// ─── Current principal ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct MeBody {
  pub principal:   Principal,
  pub user:        User,
  pub association: Option<Association>,
}

/// `GET /api/auth/me`
pub async fn me<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
) -> Result<Json<MeBody>, ApiError>
where
  S: DonationStore + 'static,
{
  let user = state.engine.user(&principal, principal.user_id).await?;
  let association = match principal.actor.association_id() {
    Some(id) => Some(state.engine.association(id).await?),
    None => None,
  };
  Ok(Json(MeBody { principal, user, association }))
}
