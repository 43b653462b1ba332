//! Error types for `alms-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("not authenticated")]
  Unauthenticated,

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("not the owner of this {0}")]
  NotOwner(&'static str),

  #[error("{entity} not found: {id}")]
  NotFound { entity: &'static str, id: i64 },

  #[error("invalid input: {0}")]
  InvalidInput(String),

  #[error("invalid state: {0}")]
  InvalidState(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn not_found(entity: &'static str, id: impl Into<i64>) -> Self {
    Self::NotFound { entity, id: id.into() }
  }

  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }

  /// Stable machine-readable name for the variant, used in API bodies.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Unauthenticated => "unauthenticated",
      Self::Forbidden(_) => "forbidden",
      Self::NotOwner(_) => "not_owner",
      Self::NotFound { .. } => "not_found",
      Self::InvalidInput(_) => "invalid_input",
      Self::InvalidState(_) => "invalid_state",
      Self::Conflict(_) => "conflict",
      Self::Serialization(_) | Self::Store(_) => "internal",
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
