//! Applications: a recipient's request against an offer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::id::{ApplicationId, OfferId, UserId};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
  Pending,
  Approved,
  Rejected,
}

impl ApplicationStatus {
  /// Anything but REJECTED blocks a second application on the same offer.
  pub fn blocks_reapplication(self) -> bool { !matches!(self, Self::Rejected) }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
  pub id:               ApplicationId,
  pub offer_id:         OfferId,
  pub applicant_id:     UserId,
  pub message:          Option<String>,
  pub status:           ApplicationStatus,
  pub response_message: Option<String>,
  pub created_at:       DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewApplication {
  pub offer_id:     OfferId,
  pub applicant_id: UserId,
  pub message:      Option<String>,
}

/// A donor's verdict on a pending application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
  Approve,
  Reject,
}

/// Parameters for [`crate::store::Tx::applications`].
#[derive(Debug, Clone, Default)]
pub struct ApplicationQuery {
  pub offer_id:     Option<OfferId>,
  pub applicant_id: Option<UserId>,
}
