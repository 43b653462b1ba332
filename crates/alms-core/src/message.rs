//! Direct messages between two users.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::id::{MessageId, OfferId, UserId};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
  pub id:               MessageId,
  pub sender_id:        UserId,
  pub receiver_id:      UserId,
  pub related_offer_id: Option<OfferId>,
  pub content:          String,
  pub sent_at:          DateTime<Utc>,
  pub read_at:          Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
  pub sender_id:        UserId,
  pub receiver_id:      UserId,
  pub related_offer_id: Option<OfferId>,
  pub content:          String,
}
