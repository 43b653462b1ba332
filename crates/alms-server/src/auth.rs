//! Credential hashing, the in-memory session store, and the session
//! extractor.
//!
//! A session token is 32 random bytes, hex-encoded, handed to the client
//! once. The store only ever sees its SHA-256 digest.

use std::{
  collections::HashMap,
  sync::{PoisonError, RwLock},
  time::{Duration, Instant},
};

use alms_core::{
  session::{CredentialHasher, Principal, SessionContext, SessionStore},
  store::DonationStore,
};
use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use rand_core::{OsRng, RngCore as _};
use sha2::{Digest as _, Sha256};

use crate::{AppState, ServerConfig, error::ApiError};

// ─── Hashing ─────────────────────────────────────────────────────────────────

/// argon2id PHC-string hasher.
pub struct Argon2Hasher {
  argon2: Argon2<'static>,
}

impl Default for Argon2Hasher {
  fn default() -> Self { Self { argon2: Argon2::default() } }
}

impl Argon2Hasher {
  /// Minimum-cost parameters, for tests only.
  #[cfg(test)]
  pub fn fast() -> Self {
    use argon2::{Algorithm, Params, Version};
    let params = Params::new(Params::MIN_M_COST, 1, 1, None).expect("valid params");
    Self { argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params) }
  }
}

impl CredentialHasher for Argon2Hasher {
  fn hash(&self, plaintext: &str) -> alms_core::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    self
      .argon2
      .hash_password(plaintext.as_bytes(), &salt)
      .map(|h| h.to_string())
      .map_err(|e| alms_core::Error::Store(format!("argon2 error: {e}").into()))
  }

  fn verify(&self, plaintext: &str, hashed: &str) -> bool {
    PasswordHash::new(hashed).is_ok_and(|parsed| {
      self.argon2.verify_password(plaintext.as_bytes(), &parsed).is_ok()
    })
  }
}

// ─── Sessions ────────────────────────────────────────────────────────────────

/// A fresh 256-bit session token, hex-encoded.
pub fn new_token() -> String {
  let mut bytes = [0u8; 32];
  OsRng.fill_bytes(&mut bytes);
  hex::encode(bytes)
}

fn digest(token: &str) -> String { hex::encode(Sha256::digest(token.as_bytes())) }

struct Entry {
  values:     HashMap<String, String>,
  expires_at: Instant,
}

/// Process-local [`SessionStore`] with sliding expiry. Every write pushes
/// the deadline out by the TTL.
pub struct MemorySessionStore {
  ttl:     Duration,
  entries: RwLock<HashMap<String, Entry>>,
}

impl MemorySessionStore {
  pub fn new(ttl: Duration) -> Self { Self { ttl, entries: RwLock::default() } }

  /// Drop every expired session; returns how many were removed.
  pub fn purge_expired(&self) -> usize {
    let now = Instant::now();
    let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
    let before = entries.len();
    entries.retain(|_, e| e.expires_at > now);
    before - entries.len()
  }
}

impl SessionStore for MemorySessionStore {
  fn get(&self, token: &str, key: &str) -> Option<String> {
    let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
    let entry = entries.get(&digest(token))?;
    if entry.expires_at <= Instant::now() {
      return None;
    }
    entry.values.get(key).cloned()
  }

  fn set(&self, token: &str, key: &str, value: String) {
    let now = Instant::now();
    let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
    let entry = entries.entry(digest(token)).or_insert_with(|| Entry {
      values:     HashMap::new(),
      expires_at: now,
    });
    if entry.expires_at <= now {
      entry.values.clear();
    }
    entry.values.insert(key.to_owned(), value);
    entry.expires_at = now + self.ttl;
  }

  fn invalidate(&self, token: &str) {
    self
      .entries
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(&digest(token));
  }
}

// ─── Token transport ─────────────────────────────────────────────────────────

/// The session token from `Authorization: Bearer …`, else from the session
/// cookie.
pub fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
  let bearer = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
    .map(str::trim)
    .filter(|t| !t.is_empty());
  if let Some(token) = bearer {
    return Some(token.to_owned());
  }

  headers
    .get_all(header::COOKIE)
    .iter()
    .filter_map(|v| v.to_str().ok())
    .flat_map(|v| v.split(';'))
    .filter_map(|pair| pair.trim().split_once('='))
    .find(|(name, _)| *name == cookie_name)
    .map(|(_, value)| value.to_owned())
}

/// `Set-Cookie` value carrying `token`.
pub fn session_cookie(config: &ServerConfig, token: &str) -> String {
  format!(
    "{}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
    config.session_cookie, config.session_ttl_secs,
  )
}

/// `Set-Cookie` value that clears the session cookie.
pub fn cleared_cookie(config: &ServerConfig) -> String {
  format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", config.session_cookie)
}

// ─── Extractor ───────────────────────────────────────────────────────────────

/// The principal behind the request, freshly resolved from the store.
/// Rejects with 401 when there is no live session.
pub struct Authenticated(pub Principal);

impl<S> FromRequestParts<AppState<S>> for Authenticated
where
  S: DonationStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let context = session_token(&parts.headers, &state.config.session_cookie)
      .and_then(|token| SessionContext::load(state.sessions.as_ref(), &token));
    Ok(Self(state.engine.resolve_principal(context).await?))
  }
}

#[cfg(test)]
mod tests {
  use alms_core::id::{AssociationId, UserId};
  use axum::http::HeaderValue;

  use super::*;

  #[test]
  fn hash_then_verify() {
    let hasher = Argon2Hasher::fast();
    let hash = hasher.hash("secret").unwrap();
    assert!(hash.starts_with("$argon2id$"));
    assert!(hasher.verify("secret", &hash));
    assert!(!hasher.verify("wrong", &hash));
    assert!(!hasher.verify("secret", "not-a-phc-string"));
  }

  #[test]
  fn tokens_are_random_and_256_bit() {
    let a = new_token();
    assert_eq!(a.len(), 64);
    assert_ne!(a, new_token());
  }

  #[test]
  fn sessions_round_trip_context() {
    let store = MemorySessionStore::new(Duration::from_secs(60));
    let ctx = SessionContext {
      user_id:        UserId(7),
      association_id: Some(AssociationId(3)),
    };
    ctx.save(&store, "tok");
    assert_eq!(SessionContext::load(&store, "tok"), Some(ctx));
    assert_eq!(SessionContext::load(&store, "other"), None);

    store.invalidate("tok");
    assert_eq!(SessionContext::load(&store, "tok"), None);
  }

  #[test]
  fn expired_sessions_are_invisible_and_purged() {
    let store = MemorySessionStore::new(Duration::ZERO);
    store.set("tok", "user_id", "1".into());
    assert_eq!(store.get("tok", "user_id"), None);
    assert_eq!(store.purge_expired(), 1);
  }

  #[test]
  fn token_is_read_from_bearer_or_cookie() {
    let mut headers = HeaderMap::new();
    headers.insert(
      header::COOKIE,
      HeaderValue::from_static("theme=dark; DONATION_SESSION=abc123"),
    );
    assert_eq!(session_token(&headers, "DONATION_SESSION").as_deref(), Some("abc123"));
    assert_eq!(session_token(&headers, "OTHER"), None);

    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
    assert_eq!(session_token(&headers, "DONATION_SESSION").as_deref(), Some("xyz"));
  }
}
