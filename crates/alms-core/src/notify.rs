//! Workflow events and the notification dispatcher.
//!
//! A state transition records its [`WorkflowEvent`]s in the store's outbox
//! inside the same transaction as the mutation. After the mutation commits,
//! the engine flushes the outbox: each event is mapped by
//! [`notifications_for`] to its notification records, which are inserted
//! while the event is acknowledged. A failed flush leaves events queued for
//! the next flush; it never rolls back the mutation that produced them.

use serde::{Deserialize, Serialize};

use crate::{
  Result,
  id::{ApplicationId, DonationId, MessageId, OfferId, UserId},
  notification::{NewNotification, Notification, NotificationKind},
  store::Tx,
};

/// Largest batch of outbox events handled by one flush.
pub const FLUSH_BATCH: usize = 256;

// ─── Events ──────────────────────────────────────────────────────────────────

/// A notification-worthy occurrence emitted by a state transition. Each
/// event carries every id its notifications need, so dispatch is a pure
/// mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
  ApplicationSubmitted {
    application_id: ApplicationId,
    offer_id:       OfferId,
    offer_title:    String,
    donor_id:       UserId,
    applicant_id:   UserId,
  },
  ApplicationApproved {
    application_id: ApplicationId,
    offer_id:       OfferId,
    offer_title:    String,
    applicant_id:   UserId,
    donation_id:    DonationId,
  },
  ApplicationRejected {
    application_id: ApplicationId,
    offer_id:       OfferId,
    offer_title:    String,
    applicant_id:   UserId,
    response:       Option<String>,
  },
  DonationCompleted {
    donation_id:  DonationId,
    offer_id:     OfferId,
    donor_id:     UserId,
    recipient_id: UserId,
    completed_by: UserId,
  },
  DonationCancelled {
    donation_id:  DonationId,
    offer_id:     OfferId,
    donor_id:     UserId,
    recipient_id: UserId,
    cancelled_by: UserId,
    reason:       Option<String>,
  },
  MessageSent {
    message_id:  MessageId,
    sender_id:   UserId,
    receiver_id: UserId,
    offer_id:    Option<OfferId>,
  },
  OfferExpired {
    offer_id:    OfferId,
    offer_title: String,
    creator_id:  UserId,
  },
}

// ─── Dispatch ────────────────────────────────────────────────────────────────

/// The notifications an event produces: exactly one per recipient.
pub fn notifications_for(event: &WorkflowEvent) -> Vec<NewNotification> {
  use WorkflowEvent::*;

  let note = |user_id, kind, message: String| NewNotification {
    user_id,
    kind,
    related_offer_id: None,
    related_application_id: None,
    related_message_id: None,
    message,
  };

  match event {
    ApplicationSubmitted { application_id, offer_id, offer_title, donor_id, .. } => {
      vec![NewNotification {
        related_offer_id: Some(*offer_id),
        related_application_id: Some(*application_id),
        ..note(
          *donor_id,
          NotificationKind::Application,
          format!("New application for your offer \"{offer_title}\"."),
        )
      }]
    }

    ApplicationApproved { application_id, offer_id, offer_title, applicant_id, .. } => {
      vec![NewNotification {
        related_offer_id: Some(*offer_id),
        related_application_id: Some(*application_id),
        ..note(
          *applicant_id,
          NotificationKind::Approval,
          format!("Your application for \"{offer_title}\" was approved."),
        )
      }]
    }

    ApplicationRejected { application_id, offer_id, offer_title, applicant_id, response } => {
      let mut text = format!("Your application for \"{offer_title}\" was rejected.");
      if let Some(r) = response.as_deref().filter(|r| !r.trim().is_empty()) {
        text.push_str(&format!(" Response: {r}"));
      }
      vec![NewNotification {
        related_offer_id: Some(*offer_id),
        related_application_id: Some(*application_id),
        ..note(*applicant_id, NotificationKind::Approval, text)
      }]
    }

    DonationCompleted { offer_id, donor_id, recipient_id, completed_by, .. } => {
      counterparts(*donor_id, *recipient_id, *completed_by)
        .map(|user| NewNotification {
          related_offer_id: Some(*offer_id),
          ..note(user, NotificationKind::System, "A donation was marked completed.".into())
        })
        .collect()
    }

    DonationCancelled { offer_id, donor_id, recipient_id, cancelled_by, reason, .. } => {
      let mut text = String::from("A scheduled donation was cancelled.");
      if let Some(r) = reason.as_deref().filter(|r| !r.trim().is_empty()) {
        text.push_str(&format!(" Reason: {r}"));
      }
      counterparts(*donor_id, *recipient_id, *cancelled_by)
        .map(|user| NewNotification {
          related_offer_id: Some(*offer_id),
          ..note(user, NotificationKind::System, text.clone())
        })
        .collect()
    }

    MessageSent { message_id, receiver_id, offer_id, .. } => {
      vec![NewNotification {
        related_offer_id: *offer_id,
        related_message_id: Some(*message_id),
        ..note(*receiver_id, NotificationKind::Message, "You have a new message.".into())
      }]
    }

    OfferExpired { offer_id, offer_title, creator_id } => {
      vec![NewNotification {
        related_offer_id: Some(*offer_id),
        ..note(
          *creator_id,
          NotificationKind::System,
          format!("Your offer \"{offer_title}\" has expired."),
        )
      }]
    }
  }
}

/// Everyone on the donation except `actor`. When the actor is neither party
/// (an administrator), both parties are told.
fn counterparts(
  donor: UserId,
  recipient: UserId,
  actor: UserId,
) -> impl Iterator<Item = UserId> {
  [donor, recipient].into_iter().filter(move |u| *u != actor)
}

/// Drain up to [`FLUSH_BATCH`] pending events into notifications.
pub(crate) fn flush(tx: &mut dyn Tx) -> Result<Vec<Notification>> {
  let mut created = Vec::new();
  for (event_id, event) in tx.pending_events(FLUSH_BATCH)? {
    for input in notifications_for(&event) {
      created.push(tx.insert_notification(input)?);
    }
    tx.ack_event(event_id)?;
  }
  Ok(created)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn submitted_notifies_donor() {
    let out = notifications_for(&WorkflowEvent::ApplicationSubmitted {
      application_id: ApplicationId(3),
      offer_id:       OfferId(2),
      offer_title:    "Rice".into(),
      donor_id:       UserId(1),
      applicant_id:   UserId(5),
    });
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].user_id, UserId(1));
    assert_eq!(out[0].kind, NotificationKind::Application);
    assert_eq!(out[0].related_application_id, Some(ApplicationId(3)));
  }

  #[test]
  fn approval_and_rejection_notify_applicant_as_approval() {
    let approved = notifications_for(&WorkflowEvent::ApplicationApproved {
      application_id: ApplicationId(3),
      offer_id:       OfferId(2),
      offer_title:    "Rice".into(),
      applicant_id:   UserId(5),
      donation_id:    DonationId(9),
    });
    let rejected = notifications_for(&WorkflowEvent::ApplicationRejected {
      application_id: ApplicationId(3),
      offer_id:       OfferId(2),
      offer_title:    "Rice".into(),
      applicant_id:   UserId(5),
      response:       Some("Already promised".into()),
    });
    for out in [&approved, &rejected] {
      assert_eq!(out.len(), 1);
      assert_eq!(out[0].user_id, UserId(5));
      assert_eq!(out[0].kind, NotificationKind::Approval);
    }
    assert!(rejected[0].message.contains("rejected"));
    assert!(rejected[0].message.contains("Already promised"));
  }

  #[test]
  fn message_notifies_receiver() {
    let out = notifications_for(&WorkflowEvent::MessageSent {
      message_id:  MessageId(4),
      sender_id:   UserId(1),
      receiver_id: UserId(2),
      offer_id:    None,
    });
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].user_id, UserId(2));
    assert_eq!(out[0].kind, NotificationKind::Message);
    assert_eq!(out[0].related_message_id, Some(MessageId(4)));
  }

  #[test]
  fn expiry_is_a_system_notice_for_creator() {
    let out = notifications_for(&WorkflowEvent::OfferExpired {
      offer_id:    OfferId(2),
      offer_title: "Bread".into(),
      creator_id:  UserId(8),
    });
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].user_id, UserId(8));
    assert_eq!(out[0].kind, NotificationKind::System);
  }

  #[test]
  fn completion_tells_the_other_party_only() {
    let event = |by| WorkflowEvent::DonationCompleted {
      donation_id:  DonationId(1),
      offer_id:     OfferId(1),
      donor_id:     UserId(1),
      recipient_id: UserId(2),
      completed_by: UserId(by),
    };
    let by_donor = notifications_for(&event(1));
    assert_eq!(by_donor.len(), 1);
    assert_eq!(by_donor[0].user_id, UserId(2));
    assert_eq!(notifications_for(&event(42)).len(), 2);
  }

  #[test]
  fn events_survive_a_json_round_trip() {
    let event = WorkflowEvent::ApplicationRejected {
      application_id: ApplicationId(1),
      offer_id:       OfferId(2),
      offer_title:    "Soap".into(),
      applicant_id:   UserId(3),
      response:       None,
    };
    let json = serde_json::to_string(&event).unwrap();
    assert!(json.contains("\"event\":\"application_rejected\""));
    let back: WorkflowEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(back, event);
  }
}
