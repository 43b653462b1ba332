//! Registration, login, and profile management for users and associations.
//!
//! Two login paths exist because users and associations each hold their own
//! credential:
//!
//! - [`LoginKind::User`] checks the password against the user's credential;
//!   the principal acts as an individual.
//! - [`LoginKind::Association`] finds the association by its own email (or
//!   by its owner's email) and checks the association's credential; the
//!   owner acts on behalf of the association.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Engine, Error, Result,
  account::{
    Association, AssociationPatch, AssociationQuery, NewAssociation, NewUser, Role,
    User, UserPatch,
  },
  authz::{Action, Target, authorize},
  id::{AssociationId, UserId},
  session::{Principal, SessionContext},
  store::{DonationStore, Tx},
};

// ─── Inputs ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRegistration {
  pub first_name: String,
  pub last_name:  String,
  pub email:      String,
  pub password:   String,
  pub phone:      Option<String>,
  pub address:    Option<String>,
  /// Defaults to [`Role::Individual`]. Self-registration as admin is refused.
  #[serde(alias = "userType")]
  pub role:       Option<Role>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationRegistration {
  pub first_name:          String,
  pub last_name:           String,
  pub email:               String,
  pub password:            String,
  pub phone:               Option<String>,
  pub address:             Option<String>,
  pub association_name:    String,
  pub association_email:   Option<String>,
  pub association_phone:   Option<String>,
  pub association_address: Option<String>,
  pub description:         Option<String>,
  pub category:            Option<String>,
  pub logo_url:            Option<String>,
  pub foundation_date:     Option<NaiveDate>,
}

/// An association created by an administrator for an existing user.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationInput {
  pub owner_id:        UserId,
  pub name:            String,
  pub email:           Option<String>,
  pub password:        String,
  pub phone:           Option<String>,
  pub address:         Option<String>,
  pub description:     Option<String>,
  pub foundation_date: Option<NaiveDate>,
  pub category:        Option<String>,
  pub logo_url:        Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginKind {
  #[default]
  User,
  Association,
}

/// A successful login or registration.
#[derive(Debug, Clone, Serialize)]
pub struct Login {
  pub user:        User,
  pub association: Option<Association>,
  #[serde(skip)]
  pub context:     SessionContext,
}

// ─── Validation ──────────────────────────────────────────────────────────────

fn validate_credentials(email: &str, password: &str) -> Result<()> {
  let email = email.trim();
  if email.is_empty() || !email.contains('@') {
    return Err(Error::InvalidInput("a valid email is required".into()));
  }
  if password.is_empty() {
    return Err(Error::InvalidInput("password must not be empty".into()));
  }
  Ok(())
}

fn ensure_email_free(tx: &dyn Tx, email: &str) -> Result<()> {
  if tx.user_by_email(email)?.is_some() {
    return Err(Error::Conflict(format!("email already in use: {email}")));
  }
  Ok(())
}

fn ensure_association_email_free(tx: &dyn Tx, email: Option<&str>) -> Result<()> {
  if let Some(email) = email
    && tx.association_by_email(email)?.is_some()
  {
    return Err(Error::Conflict(format!("association email already in use: {email}")));
  }
  Ok(())
}

fn load_user(tx: &dyn Tx, id: UserId) -> Result<User> {
  tx.user(id)?.ok_or_else(|| Error::not_found("user", id))
}

fn load_association(tx: &dyn Tx, id: AssociationId) -> Result<Association> {
  tx.association(id)?.ok_or_else(|| Error::not_found("association", id))
}

// ─── Operations ──────────────────────────────────────────────────────────────

impl<S: DonationStore> Engine<S> {
  // ── Registration & login ──────────────────────────────────────────────

  pub async fn register_user(&self, reg: UserRegistration) -> Result<Login> {
    validate_credentials(&reg.email, &reg.password)?;
    let role = reg.role.unwrap_or(Role::Individual);
    if role == Role::Admin {
      return Err(Error::Forbidden("cannot self-register as an administrator".into()));
    }
    let password_hash = self.hasher().hash(&reg.password)?;

    let user = self
      .commit(move |tx, _| {
        ensure_email_free(tx, reg.email.trim())?;
        tx.insert_user(NewUser {
          first_name: reg.first_name,
          last_name: reg.last_name,
          email: reg.email.trim().to_owned(),
          phone: reg.phone,
          address: reg.address,
          role,
          password_hash,
        })
      })
      .await?;

    tracing::info!(user_id = %user.id, "user registered");
    let context = SessionContext { user_id: user.id, association_id: None };
    Ok(Login { user, association: None, context })
  }

  /// Create a RECIPIENT user together with the association it owns. Both
  /// credentials are derived from the one password supplied.
  pub async fn register_association(&self, reg: AssociationRegistration) -> Result<Login> {
    validate_credentials(&reg.email, &reg.password)?;
    if reg.association_name.trim().is_empty() {
      return Err(Error::InvalidInput("association name must not be empty".into()));
    }
    let user_hash = self.hasher().hash(&reg.password)?;
    let association_hash = self.hasher().hash(&reg.password)?;

    let (user, association) = self
      .commit(move |tx, _| {
        ensure_email_free(tx, reg.email.trim())?;
        ensure_association_email_free(tx, reg.association_email.as_deref())?;
        let user = tx.insert_user(NewUser {
          first_name:    reg.first_name,
          last_name:     reg.last_name,
          email:         reg.email.trim().to_owned(),
          phone:         reg.phone,
          address:       reg.address,
          role:          Role::Recipient,
          password_hash: user_hash,
        })?;
        let association = tx.insert_association(NewAssociation {
          owner_id:        user.id,
          name:            reg.association_name,
          email:           reg.association_email,
          password_hash:   association_hash,
          phone:           reg.association_phone,
          address:         reg.association_address,
          description:     reg.description,
          foundation_date: reg.foundation_date,
          category:        reg.category,
          logo_url:        reg.logo_url,
        })?;
        Ok((user, association))
      })
      .await?;

    tracing::info!(
      user_id = %user.id,
      association_id = %association.id,
      "association registered",
    );
    let context = SessionContext {
      user_id:        user.id,
      association_id: Some(association.id),
    };
    Ok(Login { user, association: Some(association), context })
  }

  /// Check credentials. Every failure is [`Error::Unauthenticated`] so the
  /// response does not reveal which half was wrong.
  pub async fn login(&self, email: &str, password: &str, kind: LoginKind) -> Result<Login> {
    let email = email.trim().to_owned();
    let found = self
      .read(move |tx| match kind {
        LoginKind::User => Ok(tx.user_by_email(&email)?.map(|u| (u, None))),
        LoginKind::Association => {
          let association = match tx.association_by_email(&email)? {
            Some(a) => Some(a),
            None => match tx.user_by_email(&email)? {
              Some(u) => tx.association_by_owner(u.id)?,
              None => None,
            },
          };
          match association {
            Some(a) => Ok(tx.user(a.owner_id)?.map(|u| (u, Some(a)))),
            None => Ok(None),
          }
        }
      })
      .await?;

    let Some((user, association)) = found else {
      return Err(Error::Unauthenticated);
    };
    let verifier = match &association {
      Some(a) => &a.password_hash,
      None => &user.password_hash,
    };
    if !self.hasher().verify(password, verifier) {
      tracing::debug!(user_id = %user.id, ?kind, "login rejected");
      return Err(Error::Unauthenticated);
    }

    let context = SessionContext {
      user_id:        user.id,
      association_id: association.as_ref().map(|a| a.id),
    };
    Ok(Login { user, association, context })
  }

  // ── Users ─────────────────────────────────────────────────────────────

  pub async fn user(&self, principal: &Principal, id: UserId) -> Result<User> {
    authorize(Some(principal), Action::View, Target::User(id)).into_result()?;
    self.read(move |tx| load_user(tx, id)).await
  }

  pub async fn users(&self, principal: &Principal) -> Result<Vec<User>> {
    authorize(Some(principal), Action::Administer, Target::System).into_result()?;
    self.read(|tx| tx.users()).await
  }

  /// Edit a user's profile. Only administrators may change roles.
  pub async fn update_user(
    &self,
    principal: &Principal,
    id: UserId,
    patch: UserPatch,
  ) -> Result<User> {
    authorize(Some(principal), Action::Update, Target::User(id)).into_result()?;
    if patch.role.is_some() && !principal.is_admin() {
      return Err(Error::Forbidden("only administrators may change roles".into()));
    }
    let new_hash = patch
      .password
      .as_deref()
      .filter(|p| !p.is_empty())
      .map(|p| self.hasher().hash(p))
      .transpose()?;

    self
      .commit(move |tx, _| {
        let mut user = load_user(tx, id)?;
        let UserPatch {
          first_name,
          last_name,
          phone,
          address,
          bio,
          profile_picture,
          role,
          ..
        } = patch;
        if let Some(v) = first_name { user.first_name = v; }
        if let Some(v) = last_name { user.last_name = v; }
        if let Some(v) = phone { user.phone = Some(v); }
        if let Some(v) = address { user.address = Some(v); }
        if let Some(v) = bio { user.bio = Some(v); }
        if let Some(v) = profile_picture { user.profile_picture = Some(v); }
        if let Some(v) = role { user.role = v; }
        if let Some(h) = new_hash { user.password_hash = h; }
        user.updated_at = Some(Utc::now());
        tx.update_user(&user)?;
        Ok(user)
      })
      .await
  }

  /// Delete an account. Accounts referenced by offers, applications,
  /// donations, reviews or messages are kept for the record.
  pub async fn delete_user(&self, principal: &Principal, id: UserId) -> Result<()> {
    authorize(Some(principal), Action::Delete, Target::User(id)).into_result()?;
    self
      .commit(move |tx, _| {
        load_user(tx, id)?;
        if tx.user_has_history(id)? {
          return Err(Error::Conflict(
            "account has donation history and cannot be deleted".into(),
          ));
        }
        tx.delete_user(id)?;
        Ok(())
      })
      .await?;
    tracing::info!(user_id = %id, "user deleted");
    Ok(())
  }

  /// Grant the administrator role to an existing account. Used for
  /// bootstrapping from the command line, so it bypasses the gate.
  pub async fn promote_to_admin(&self, email: &str) -> Result<User> {
    let email = email.trim().to_owned();
    self
      .commit(move |tx, _| {
        let mut user = tx
          .user_by_email(&email)?
          .ok_or_else(|| Error::InvalidInput(format!("no user with email {email}")))?;
        user.role = Role::Admin;
        user.updated_at = Some(Utc::now());
        tx.update_user(&user)?;
        Ok(user)
      })
      .await
  }

  // ── Associations ──────────────────────────────────────────────────────

  pub async fn associations(&self, query: AssociationQuery) -> Result<Vec<Association>> {
    self.read(move |tx| tx.associations(&query)).await
  }

  pub async fn association(&self, id: AssociationId) -> Result<Association> {
    self.read(move |tx| load_association(tx, id)).await
  }

  /// The association the principal acts for, or else the one they own.
  pub async fn own_association(&self, principal: &Principal) -> Result<Association> {
    let acting = principal.actor.association_id();
    let owner = principal.user_id;
    self
      .read(move |tx| {
        let found = match acting {
          Some(id) => tx.association(id)?,
          None => tx.association_by_owner(owner)?,
        };
        found.ok_or_else(|| Error::not_found("association", owner))
      })
      .await
  }

  pub async fn create_association(
    &self,
    principal: &Principal,
    input: AssociationInput,
  ) -> Result<Association> {
    authorize(Some(principal), Action::Administer, Target::System).into_result()?;
    if input.name.trim().is_empty() {
      return Err(Error::InvalidInput("association name must not be empty".into()));
    }
    let password_hash = self.hasher().hash(&input.password)?;
    self
      .commit(move |tx, _| {
        load_user(tx, input.owner_id)?;
        ensure_association_email_free(tx, input.email.as_deref())?;
        tx.insert_association(NewAssociation {
          owner_id: input.owner_id,
          name: input.name,
          email: input.email,
          password_hash,
          phone: input.phone,
          address: input.address,
          description: input.description,
          foundation_date: input.foundation_date,
          category: input.category,
          logo_url: input.logo_url,
        })
      })
      .await
  }

  pub async fn update_association(
    &self,
    principal: &Principal,
    id: AssociationId,
    patch: AssociationPatch,
  ) -> Result<Association> {
    if patch.owner_id.is_some() && !principal.is_admin() {
      return Err(Error::Forbidden("only administrators may re-home an association".into()));
    }
    let new_hash = patch
      .password
      .as_deref()
      .filter(|p| !p.is_empty())
      .map(|p| self.hasher().hash(p))
      .transpose()?;
    let principal = principal.clone();

    self
      .commit(move |tx, _| {
        let mut a = load_association(tx, id)?;
        authorize(Some(&principal), Action::Update, Target::Association(&a))
          .into_result()?;
        if let Some(email) = patch.email.as_deref()
          && a.email.as_deref() != Some(email)
        {
          ensure_association_email_free(tx, Some(email))?;
        }
        if let Some(owner) = patch.owner_id {
          load_user(tx, owner)?;
          a.owner_id = owner;
        }
        if let Some(v) = patch.name {
          if v.trim().is_empty() {
            return Err(Error::InvalidInput("association name must not be empty".into()));
          }
          a.name = v;
        }
        if let Some(v) = patch.email { a.email = Some(v); }
        if let Some(v) = patch.phone { a.phone = Some(v); }
        if let Some(v) = patch.address { a.address = Some(v); }
        if let Some(v) = patch.description { a.description = Some(v); }
        if let Some(v) = patch.foundation_date { a.foundation_date = Some(v); }
        if let Some(v) = patch.category { a.category = Some(v); }
        if let Some(v) = patch.logo_url { a.logo_url = Some(v); }
        if let Some(h) = new_hash { a.password_hash = h; }
        tx.update_association(&a)?;
        Ok(a)
      })
      .await
  }

  pub async fn delete_association(
    &self,
    principal: &Principal,
    id: AssociationId,
  ) -> Result<()> {
    let principal = principal.clone();
    self
      .commit(move |tx, _| {
        let a = load_association(tx, id)?;
        authorize(Some(&principal), Action::Delete, Target::Association(&a))
          .into_result()?;
        tx.delete_association(id)?;
        Ok(())
      })
      .await?;
    tracing::info!(association_id = %id, "association deleted");
    Ok(())
  }
}
