//! Direct messaging between users, and the read side of notifications.

use chrono::Utc;
use serde::Deserialize;

use crate::{
  Engine, Error, Result,
  authz::{Action, Target, authorize},
  id::{MessageId, NotificationId, OfferId, UserId},
  message::{Message, NewMessage},
  notification::Notification,
  notify::WorkflowEvent,
  session::Principal,
  store::{DonationStore, Tx},
};

pub const MAX_MESSAGE_CHARS: usize = 1000;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageInput {
  pub receiver_id:      UserId,
  pub content:          String,
  pub related_offer_id: Option<OfferId>,
}

/// Trim and bound message content.
pub fn normalize_content(content: &str) -> Result<String> {
  let trimmed = content.trim();
  if trimmed.is_empty() {
    return Err(Error::InvalidInput("message content must not be empty".into()));
  }
  if trimmed.chars().count() > MAX_MESSAGE_CHARS {
    return Err(Error::InvalidInput(format!(
      "message content must be at most {MAX_MESSAGE_CHARS} characters",
    )));
  }
  Ok(trimmed.to_owned())
}

fn load_message(tx: &dyn Tx, id: MessageId) -> Result<Message> {
  tx.message(id)?.ok_or_else(|| Error::not_found("message", id))
}

fn load_notification(tx: &dyn Tx, id: NotificationId) -> Result<Notification> {
  tx.notification(id)?.ok_or_else(|| Error::not_found("notification", id))
}

impl<S: DonationStore> Engine<S> {
  // ── Messages ──────────────────────────────────────────────────────────

  pub async fn send_message(
    &self,
    principal: &Principal,
    input: MessageInput,
  ) -> Result<Message> {
    let content = normalize_content(&input.content)?;
    let sender = principal.user_id;
    if input.receiver_id == sender {
      return Err(Error::InvalidInput("cannot send a message to yourself".into()));
    }

    let message = self
      .commit(move |tx, events| {
        tx.user(input.receiver_id)?
          .ok_or_else(|| Error::not_found("user", input.receiver_id))?;
        if let Some(offer) = input.related_offer_id {
          tx.offer(offer)?.ok_or_else(|| Error::not_found("offer", offer))?;
        }

        let message = tx.insert_message(NewMessage {
          sender_id: sender,
          receiver_id: input.receiver_id,
          related_offer_id: input.related_offer_id,
          content,
        })?;
        events.push(WorkflowEvent::MessageSent {
          message_id:  message.id,
          sender_id:   message.sender_id,
          receiver_id: message.receiver_id,
          offer_id:    message.related_offer_id,
        });
        Ok(message)
      })
      .await?;

    tracing::debug!(message_id = %message.id, "message sent");
    Ok(message)
  }

  pub async fn message(&self, principal: &Principal, id: MessageId) -> Result<Message> {
    let principal = principal.clone();
    self
      .read(move |tx| {
        let message = load_message(tx, id)?;
        authorize(Some(&principal), Action::View, Target::Message(&message))
          .into_result()?;
        Ok(message)
      })
      .await
  }

  /// Mark a message read. Only the receiver may; the first `read_at` sticks.
  pub async fn mark_message_read(
    &self,
    principal: &Principal,
    id: MessageId,
  ) -> Result<Message> {
    let principal = principal.clone();
    self
      .commit(move |tx, _| {
        let mut message = load_message(tx, id)?;
        authorize(Some(&principal), Action::MarkRead, Target::Message(&message))
          .into_result()?;
        if message.read_at.is_none() {
          message.read_at = Some(Utc::now());
          tx.update_message(&message)?;
        }
        Ok(message)
      })
      .await
  }

  /// Messages exchanged with `other`, oldest first.
  pub async fn conversation(
    &self,
    principal: &Principal,
    other: UserId,
  ) -> Result<Vec<Message>> {
    let me = principal.user_id;
    self
      .read(move |tx| {
        tx.user(other)?.ok_or_else(|| Error::not_found("user", other))?;
        tx.conversation(me, other)
      })
      .await
  }

  /// Messages received by the principal, newest first.
  pub async fn inbox(&self, principal: &Principal) -> Result<Vec<Message>> {
    let me = principal.user_id;
    self.read(move |tx| tx.inbox(me)).await
  }

  // ── Notifications ─────────────────────────────────────────────────────

  /// The principal's notifications, newest first.
  pub async fn notifications(
    &self,
    principal: &Principal,
    unread_only: bool,
  ) -> Result<Vec<Notification>> {
    let me = principal.user_id;
    self.read(move |tx| tx.notifications_for(me, unread_only)).await
  }

  pub async fn mark_notification_read(
    &self,
    principal: &Principal,
    id: NotificationId,
  ) -> Result<Notification> {
    let principal = principal.clone();
    self
      .commit(move |tx, _| {
        let mut notification = load_notification(tx, id)?;
        authorize(
          Some(&principal),
          Action::MarkRead,
          Target::Notification(&notification),
        )
        .into_result()?;
        if !notification.is_read {
          tx.set_notification_read(id)?;
          notification.is_read = true;
        }
        Ok(notification)
      })
      .await
  }
}
