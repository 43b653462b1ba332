//! Principals, request-scoped session context, and the credential and
//! session collaborators the core consumes.
//!
//! A session stores only stable ids. The role and acting identity are
//! re-resolved from the store on every request (see
//! [`crate::Engine::resolve_principal`]), so a profile or role edit is visible
//! on the very next call.

use serde::{Deserialize, Serialize};

use crate::{
  Result,
  account::Role,
  id::{AssociationId, UserId},
};

// ─── Actor ───────────────────────────────────────────────────────────────────

/// The identity a user acts under: themselves, or an association they own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Actor {
  Individual {
    user_id: UserId,
  },
  Association {
    user_id:        UserId,
    association_id: AssociationId,
  },
}

impl Actor {
  /// The accountable user, whichever identity is in use.
  pub fn user_id(&self) -> UserId {
    match self {
      Self::Individual { user_id } | Self::Association { user_id, .. } => *user_id,
    }
  }

  pub fn association_id(&self) -> Option<AssociationId> {
    match self {
      Self::Individual { .. } => None,
      Self::Association { association_id, .. } => Some(*association_id),
    }
  }
}

// ─── Principal ───────────────────────────────────────────────────────────────

/// The authenticated actor behind a request, freshly resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
  pub user_id: UserId,
  pub role:    Role,
  pub actor:   Actor,
}

impl Principal {
  pub fn is_admin(&self) -> bool { self.role == Role::Admin }
}

// ─── Session context ─────────────────────────────────────────────────────────

pub const USER_ID_KEY: &str = "user_id";
pub const ASSOCIATION_ID_KEY: &str = "association_id";

/// What a session remembers between requests: ids only, never entity
/// snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionContext {
  pub user_id:        UserId,
  pub association_id: Option<AssociationId>,
}

impl SessionContext {
  /// Read the context stored under `token`. Returns `None` when the token is
  /// unknown or expired, or holds no user id.
  pub fn load(store: &dyn SessionStore, token: &str) -> Option<Self> {
    let user_id = store.get(token, USER_ID_KEY)?.parse().ok().map(UserId)?;
    let association_id = store
      .get(token, ASSOCIATION_ID_KEY)
      .and_then(|v| v.parse().ok())
      .map(AssociationId);
    Some(Self { user_id, association_id })
  }

  pub fn save(&self, store: &dyn SessionStore, token: &str) {
    store.set(token, USER_ID_KEY, self.user_id.to_string());
    if let Some(a) = self.association_id {
      store.set(token, ASSOCIATION_ID_KEY, a.to_string());
    }
  }
}

// ─── Collaborators ───────────────────────────────────────────────────────────

/// Opaque key-value session storage keyed by session token.
pub trait SessionStore: Send + Sync {
  fn get(&self, token: &str, key: &str) -> Option<String>;
  fn set(&self, token: &str, key: &str, value: String);
  fn invalidate(&self, token: &str);
}

/// One-way credential hashing.
pub trait CredentialHasher: Send + Sync {
  fn hash(&self, plaintext: &str) -> Result<String>;
  fn verify(&self, plaintext: &str, hashed: &str) -> bool;
}
