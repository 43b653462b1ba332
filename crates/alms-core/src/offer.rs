//! Donation offers and their lifecycle.
//!
//! ```text
//! ACTIVE ──approval──▶ FULFILLED
//!    └─────expiry────▶ EXPIRED
//! ```
//!
//! Both targets are terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{
  Error, Result,
  id::{OfferId, UserId},
  session::Actor,
};

// ─── Enumerations ────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferKind {
  Food,
  Clothes,
  Medicine,
  Other,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferStatus {
  Active,
  Fulfilled,
  Expired,
}

impl OfferStatus {
  pub fn is_terminal(self) -> bool { !matches!(self, Self::Active) }

  pub fn can_transition_to(self, next: Self) -> bool {
    matches!((self, next), (Self::Active, Self::Fulfilled | Self::Expired))
  }
}

// ─── Offer ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationOffer {
  pub id:          OfferId,
  pub creator:     Actor,
  pub kind:        OfferKind,
  pub title:       String,
  pub description: String,
  /// Informational only; a single approval fulfils the whole offer.
  pub quantity:    u32,
  pub condition:   Option<String>,
  pub expiry_date: Option<DateTime<Utc>>,
  pub location:    Option<String>,
  pub status:      OfferStatus,
  pub created_at:  DateTime<Utc>,
  /// Opaque URLs, in display order.
  pub image_urls:  Vec<String>,
}

impl DonationOffer {
  /// Whether the offer is ACTIVE with an expiry at or before `as_of`.
  pub fn is_due_for_expiry(&self, as_of: DateTime<Utc>) -> bool {
    self.status == OfferStatus::Active
      && self.expiry_date.is_some_and(|at| at <= as_of)
  }
}

/// Caller-supplied content of a new offer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferDraft {
  #[serde(rename = "type")]
  pub kind:        OfferKind,
  pub title:       String,
  pub description: String,
  pub quantity:    i64,
  pub condition:   Option<String>,
  pub expiry_date: Option<DateTime<Utc>>,
  pub location:    Option<String>,
  #[serde(default)]
  pub image_urls:  Vec<String>,
}

impl OfferDraft {
  /// Check field constraints against the current instant `now`.
  pub fn validate(&self, now: DateTime<Utc>) -> Result<u32> {
    if self.title.trim().is_empty() {
      return Err(Error::InvalidInput("title must not be empty".into()));
    }
    validate_expiry(self.expiry_date, now)?;
    validate_quantity(self.quantity)
  }
}

/// Input to [`crate::store::Tx::insert_offer`]; status starts ACTIVE and
/// `created_at` is set by the store.
#[derive(Debug, Clone)]
pub struct NewOffer {
  pub creator:     Actor,
  pub kind:        OfferKind,
  pub title:       String,
  pub description: String,
  pub quantity:    u32,
  pub condition:   Option<String>,
  pub expiry_date: Option<DateTime<Utc>>,
  pub location:    Option<String>,
  pub image_urls:  Vec<String>,
}

/// Owner edits to an ACTIVE offer. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferPatch {
  pub title:       Option<String>,
  pub description: Option<String>,
  pub quantity:    Option<i64>,
  pub condition:   Option<String>,
  pub expiry_date: Option<DateTime<Utc>>,
  pub location:    Option<String>,
  pub image_urls:  Option<Vec<String>>,
}

impl OfferPatch {
  /// Validate and apply onto `offer`.
  pub fn apply(self, offer: &mut DonationOffer, now: DateTime<Utc>) -> Result<()> {
    if let Some(title) = self.title {
      if title.trim().is_empty() {
        return Err(Error::InvalidInput("title must not be empty".into()));
      }
      offer.title = title;
    }
    if let Some(q) = self.quantity {
      offer.quantity = validate_quantity(q)?;
    }
    if self.expiry_date.is_some() {
      validate_expiry(self.expiry_date, now)?;
      offer.expiry_date = self.expiry_date;
    }
    if let Some(d) = self.description { offer.description = d; }
    if let Some(c) = self.condition { offer.condition = Some(c); }
    if let Some(l) = self.location { offer.location = Some(l); }
    if let Some(urls) = self.image_urls { offer.image_urls = urls; }
    Ok(())
  }
}

fn validate_quantity(quantity: i64) -> Result<u32> {
  if quantity < 1 {
    return Err(Error::InvalidInput("quantity must be at least 1".into()));
  }
  u32::try_from(quantity)
    .map_err(|_| Error::InvalidInput("quantity is too large".into()))
}

fn validate_expiry(expiry: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Result<()> {
  match expiry {
    Some(at) if at <= now => {
      Err(Error::InvalidInput("expiry date must be in the future".into()))
    }
    _ => Ok(()),
  }
}

/// Parameters for [`crate::store::Tx::offers`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferQuery {
  pub status:     Option<OfferStatus>,
  #[serde(rename = "type")]
  pub kind:       Option<OfferKind>,
  pub creator_id: Option<UserId>,
  /// Only ACTIVE offers whose expiry is at or before this instant.
  #[serde(skip)]
  pub expiring_before: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
  use chrono::Duration;

  use super::*;

  fn draft(quantity: i64) -> OfferDraft {
    OfferDraft {
      kind:        OfferKind::Food,
      title:       "Rice".into(),
      description: "Two bags".into(),
      quantity,
      condition:   None,
      expiry_date: None,
      location:    None,
      image_urls:  vec![],
    }
  }

  #[test]
  fn status_only_moves_forward_from_active() {
    use OfferStatus::*;
    assert!(Active.can_transition_to(Fulfilled));
    assert!(Active.can_transition_to(Expired));
    for from in [Fulfilled, Expired] {
      for to in [Active, Fulfilled, Expired] {
        assert!(!from.can_transition_to(to), "{from} -> {to}");
      }
    }
    assert!(!Active.can_transition_to(Active));
  }

  #[test]
  fn draft_rejects_zero_quantity() {
    assert!(matches!(draft(0).validate(Utc::now()), Err(Error::InvalidInput(_))));
    assert_eq!(draft(3).validate(Utc::now()).unwrap(), 3);
  }

  #[test]
  fn draft_rejects_past_expiry() {
    let now = Utc::now();
    let mut d = draft(1);
    d.expiry_date = Some(now - Duration::minutes(1));
    assert!(matches!(d.validate(now), Err(Error::InvalidInput(_))));
    d.expiry_date = Some(now + Duration::days(1));
    assert!(d.validate(now).is_ok());
  }
}
