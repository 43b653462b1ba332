//! Error type for `alms-store-sqlite`.

use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Constraint violations (duplicate emails, dangling references) become
/// [`alms_core::Error::Conflict`]; everything else is a store failure.
impl From<Error> for alms_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Sqlite(e) | Error::Database(tokio_rusqlite::Error::Rusqlite(e)) => {
        match &e {
          rusqlite::Error::SqliteFailure(failure, detail)
            if failure.code == ErrorCode::ConstraintViolation =>
          {
            let detail = detail.clone().unwrap_or_else(|| failure.to_string());
            alms_core::Error::Conflict(detail)
          }
          _ => alms_core::Error::store(e),
        }
      }
      Error::Json(e) => alms_core::Error::Serialization(e),
      // Connection-level failures carry a non-`Sync` handle; keep the text.
      Error::Database(other) => alms_core::Error::Store(other.to_string().into()),
    }
  }
}
