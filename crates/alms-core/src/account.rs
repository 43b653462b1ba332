//! Users and associations: the identity records.
//!
//! A user is the login identity and carries the role. An association is a
//! profile owned by exactly one user; it keeps its own credential so that an
//! association login is a separate path from a user login.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::id::{AssociationId, UserId};

/// Role tag on a user account.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
  Individual,
  Recipient,
  Admin,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
  pub id:              UserId,
  pub first_name:      String,
  pub last_name:       String,
  pub email:           String,
  pub phone:           Option<String>,
  pub address:         Option<String>,
  pub bio:             Option<String>,
  pub profile_picture: Option<String>,
  pub role:            Role,
  /// Opaque verifier produced by a [`crate::session::CredentialHasher`].
  #[serde(skip_serializing)]
  pub password_hash:   String,
  pub created_at:      DateTime<Utc>,
  pub updated_at:      Option<DateTime<Utc>>,
}

impl User {
  pub fn is_admin(&self) -> bool { self.role == Role::Admin }
}

/// Input to [`crate::store::Tx::insert_user`]. `created_at` is set by the
/// store.
#[derive(Debug, Clone)]
pub struct NewUser {
  pub first_name:    String,
  pub last_name:     String,
  pub email:         String,
  pub phone:         Option<String>,
  pub address:       Option<String>,
  pub role:          Role,
  pub password_hash: String,
}

/// Editable profile fields. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
  pub first_name:      Option<String>,
  pub last_name:       Option<String>,
  pub phone:           Option<String>,
  pub address:         Option<String>,
  pub bio:             Option<String>,
  pub profile_picture: Option<String>,
  /// Plaintext; re-hashed before storage.
  pub password:        Option<String>,
  /// Honoured for admins only.
  pub role:            Option<Role>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Association {
  pub id:              AssociationId,
  pub owner_id:        UserId,
  pub name:            String,
  pub email:           Option<String>,
  #[serde(skip_serializing)]
  pub password_hash:   String,
  pub phone:           Option<String>,
  pub address:         Option<String>,
  pub description:     Option<String>,
  pub foundation_date: Option<NaiveDate>,
  pub category:        Option<String>,
  pub logo_url:        Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewAssociation {
  pub owner_id:        UserId,
  pub name:            String,
  pub email:           Option<String>,
  pub password_hash:   String,
  pub phone:           Option<String>,
  pub address:         Option<String>,
  pub description:     Option<String>,
  pub foundation_date: Option<NaiveDate>,
  pub category:        Option<String>,
  pub logo_url:        Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationPatch {
  pub name:            Option<String>,
  pub email:           Option<String>,
  pub phone:           Option<String>,
  pub address:         Option<String>,
  pub description:     Option<String>,
  pub foundation_date: Option<NaiveDate>,
  pub category:        Option<String>,
  pub logo_url:        Option<String>,
  pub password:        Option<String>,
  /// Re-home the association; admins only.
  pub owner_id:        Option<UserId>,
}

/// Parameters for [`crate::store::Tx::associations`]. Both filters are
/// case-insensitive; `name` matches a substring, `category` matches exactly.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssociationQuery {
  pub name:     Option<String>,
  pub category: Option<String>,
}
