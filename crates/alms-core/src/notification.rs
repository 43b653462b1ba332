//! Notification records. Immutable once written, apart from the read flag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::id::{ApplicationId, MessageId, NotificationId, OfferId, UserId};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
  Application,
  Approval,
  Message,
  System,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
  pub id:                     NotificationId,
  pub user_id:                UserId,
  pub kind:                   NotificationKind,
  pub related_offer_id:       Option<OfferId>,
  pub related_application_id: Option<ApplicationId>,
  pub related_message_id:     Option<MessageId>,
  pub message:                String,
  pub is_read:                bool,
  pub created_at:             DateTime<Utc>,
}

/// Input to [`crate::store::Tx::insert_notification`]; always stored unread
/// with a store-assigned `created_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
  pub user_id:                UserId,
  pub kind:                   NotificationKind,
  pub related_offer_id:       Option<OfferId>,
  pub related_application_id: Option<ApplicationId>,
  pub related_message_id:     Option<MessageId>,
  pub message:                String,
}
