//! HTTP surface for Alms.
//!
//! Exposes an axum [`Router`] over the donation workflow [`Engine`], backed
//! by any [`DonationStore`]. Sessions are carried by bearer token or cookie
//! and resolved to a fresh principal on every request.

pub mod auth;
pub mod error;
pub mod extract;
pub mod handlers;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc, time::Duration};

use alms_core::{Engine, store::DonationStore};
use axum::{
  Router,
  routing::{get, post},
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::MemorySessionStore;
use handlers::{
  admin, applications, associations, donations, messages, notifications, offers,
  reviews, session, users,
};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `ALMS_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:              String,
  pub port:              u16,
  pub store_path:        PathBuf,
  pub session_cookie:    String,
  pub session_ttl_secs:  u64,
  /// Seconds between background expiry sweeps; `0` disables the sweep.
  pub expiry_sweep_secs: u64,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:              "127.0.0.1".to_owned(),
      port:              8080,
      store_path:        PathBuf::from("~/.local/share/alms/alms.sqlite"),
      session_cookie:    "DONATION_SESSION".to_owned(),
      session_ttl_secs:  3600,
      expiry_sweep_secs: 300,
    }
  }
}

impl ServerConfig {
  pub fn session_ttl(&self) -> Duration { Duration::from_secs(self.session_ttl_secs) }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub engine:   Engine<S>,
  pub sessions: Arc<MemorySessionStore>,
  pub config:   Arc<ServerConfig>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      engine:   self.engine.clone(),
      sessions: Arc::clone(&self.sessions),
      config:   Arc::clone(&self.config),
    }
  }
}

impl<S: DonationStore> AppState<S> {
  pub fn new(engine: Engine<S>, config: ServerConfig) -> Self {
    Self {
      engine,
      sessions: Arc::new(MemorySessionStore::new(config.session_ttl())),
      config: Arc::new(config),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] for the API.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: DonationStore + 'static,
{
  Router::new()
    .route("/health", get(|| async { "ok" }))
    // auth
    .route("/api/auth/register/user",        post(session::register_user::<S>))
    .route("/api/auth/register/association", post(session::register_association::<S>))
    .route("/api/auth/login",                post(session::login::<S>))
    .route("/api/auth/logout",               post(session::logout::<S>))
    .route("/api/auth/me",                   get(session::me::<S>))
    // users
    .route(
      "/api/users/profile",
      get(users::profile::<S>)
        .put(users::update_profile::<S>)
        .delete(users::delete_profile::<S>),
    )
    .route("/api/users/admin/all", get(users::list::<S>))
    .route(
      "/api/users/admin/{id}",
      get(users::get_one::<S>).put(users::update::<S>).delete(users::delete::<S>),
    )
    .route("/api/users/{id}/reviews", get(reviews::received::<S>))
    // associations
    .route("/api/associations",        get(associations::list::<S>))
    .route("/api/associations/search", get(associations::search::<S>))
    .route(
      "/api/associations/profile",
      get(associations::profile::<S>)
        .put(associations::update_profile::<S>)
        .delete(associations::delete_profile::<S>),
    )
    .route("/api/associations/admin", post(associations::create::<S>))
    .route(
      "/api/associations/admin/{id}",
      axum::routing::put(associations::update::<S>).delete(associations::delete::<S>),
    )
    .route("/api/associations/{id}", get(associations::get_one::<S>))
    // offers & applications
    .route("/api/offers", get(offers::list::<S>).post(offers::create::<S>))
    .route("/api/offers/{id}", get(offers::get_one::<S>).put(offers::update::<S>))
    .route(
      "/api/offers/{id}/applications",
      get(offers::applications::<S>).post(offers::apply::<S>),
    )
    .route("/api/applications/mine",          get(applications::mine::<S>))
    .route("/api/applications/{id}",          get(applications::get_one::<S>))
    .route("/api/applications/{id}/decision", post(applications::decide::<S>))
    // donations & reviews
    .route("/api/donations/mine",          get(donations::mine::<S>))
    .route("/api/donations/{id}",          get(donations::get_one::<S>))
    .route("/api/donations/{id}/complete", post(donations::complete::<S>))
    .route("/api/donations/{id}/cancel",   post(donations::cancel::<S>))
    .route("/api/reviews",                 post(reviews::submit::<S>))
    // messaging & notifications
    .route("/api/messages",                 post(messages::send::<S>))
    .route("/api/messages/inbox",           get(messages::inbox::<S>))
    .route("/api/messages/with/{user_id}",  get(messages::conversation::<S>))
    .route("/api/messages/{id}",            get(messages::get_one::<S>))
    .route("/api/messages/{id}/read",       post(messages::mark_read::<S>))
    .route("/api/notifications",            get(notifications::list::<S>))
    .route("/api/notifications/{id}/read",  post(notifications::mark_read::<S>))
    // operations
    .route("/api/admin/offers/expire",        post(admin::expire_due::<S>))
    .route("/api/admin/offers/{id}/expire",   post(admin::expire_one::<S>))
    .route("/api/admin/notifications/flush",  post(admin::flush::<S>))
    .route("/api/admin/outbox",               get(admin::outbox::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
