//! Donations: the scheduled handover created by an approved application.
//!
//! ```text
//! SCHEDULED ──▶ COMPLETED
//!     └───────▶ CANCELLED
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::id::{ApplicationId, DonationId, OfferId, UserId};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DonationStatus {
  Scheduled,
  Completed,
  Cancelled,
}

/// Which side of a donation a user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
  Donor,
  Recipient,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Donation {
  pub id:                  DonationId,
  pub offer_id:            OfferId,
  pub donor_id:            UserId,
  pub recipient_id:        UserId,
  pub application_id:      ApplicationId,
  pub handover_date:       Option<DateTime<Utc>>,
  pub status:              DonationStatus,
  pub feedback_donor:      Option<String>,
  pub feedback_recipient:  Option<String>,
  pub cancellation_reason: Option<String>,
  pub created_at:          DateTime<Utc>,
}

impl Donation {
  pub fn party_of(&self, user: UserId) -> Option<Party> {
    if user == self.donor_id {
      Some(Party::Donor)
    } else if user == self.recipient_id {
      Some(Party::Recipient)
    } else {
      None
    }
  }

  /// The other party, if `user` is one of the two.
  pub fn counterpart(&self, user: UserId) -> Option<UserId> {
    match self.party_of(user)? {
      Party::Donor => Some(self.recipient_id),
      Party::Recipient => Some(self.donor_id),
    }
  }
}

#[derive(Debug, Clone)]
pub struct NewDonation {
  pub offer_id:       OfferId,
  pub donor_id:       UserId,
  pub recipient_id:   UserId,
  pub application_id: ApplicationId,
  pub handover_date:  Option<DateTime<Utc>>,
}
