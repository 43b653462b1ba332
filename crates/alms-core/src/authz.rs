//! The authorization gate.
//!
//! [`authorize`] is a pure decision over a principal, an action and the
//! target entity. It never mutates anything and never errors; a denial is an
//! ordinary value that callers turn into an [`Error`] with
//! [`Decision::into_result`].

use serde::Serialize;

use crate::{
  Error, Result,
  account::Association,
  application::Application,
  donation::Donation,
  id::UserId,
  message::Message,
  notification::Notification,
  offer::DonationOffer,
  session::Principal,
};

// ─── Vocabulary ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
  View,
  Create,
  Update,
  Delete,
  /// Apply to an offer.
  Apply,
  /// Approve or reject an application.
  Decide,
  Complete,
  Cancel,
  Review,
  MarkRead,
  /// System and back-office operations.
  Administer,
}

/// The entity an action is aimed at, with the relationships the gate needs.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
  User(UserId),
  Association(&'a Association),
  Offer(&'a DonationOffer),
  Application {
    application: &'a Application,
    offer:       &'a DonationOffer,
  },
  Donation(&'a Donation),
  /// A review of `reviewed` on `donation`.
  Review {
    donation: &'a Donation,
    reviewed: UserId,
  },
  Message(&'a Message),
  Notification(&'a Notification),
  System,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum DenyReason {
  Unauthenticated,
  Forbidden(&'static str),
  NotOwner(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
  Allow,
  Deny(DenyReason),
}

impl Decision {
  pub fn is_allowed(&self) -> bool { matches!(self, Self::Allow) }

  pub fn into_result(self) -> Result<()> {
    match self {
      Self::Allow => Ok(()),
      Self::Deny(DenyReason::Unauthenticated) => Err(Error::Unauthenticated),
      Self::Deny(DenyReason::Forbidden(why)) => Err(Error::Forbidden(why.to_owned())),
      Self::Deny(DenyReason::NotOwner(what)) => Err(Error::NotOwner(what)),
    }
  }
}

// ─── Gate ────────────────────────────────────────────────────────────────────

/// Decide whether `principal` may perform `action` on `target`.
pub fn authorize(
  principal: Option<&Principal>,
  action: Action,
  target: Target<'_>,
) -> Decision {
  use Action::*;
  use Decision::{Allow, Deny};

  let Some(p) = principal else {
    return Deny(DenyReason::Unauthenticated);
  };
  if p.is_admin() {
    return Allow;
  }
  let me = p.user_id;

  let owner_only = |owner: UserId, what: &'static str| {
    if owner == me { Allow } else { Deny(DenyReason::NotOwner(what)) }
  };
  let allow_if = |ok: bool, why: &'static str| {
    if ok { Allow } else { Deny(DenyReason::Forbidden(why)) }
  };

  match (action, target) {
    (Administer, _) => Deny(DenyReason::Forbidden("administrators only")),

    (View | Update | Delete, Target::User(id)) => owner_only(id, "user"),
    (View, Target::Association(_)) => Allow,
    (Update | Delete, Target::Association(a)) => owner_only(a.owner_id, "association"),

    (View | Create, Target::Offer(_)) => Allow,
    (Update, Target::Offer(o)) => owner_only(o.creator.user_id(), "offer"),
    (Apply, Target::Offer(o)) => allow_if(
      o.creator.user_id() != me,
      "cannot apply to your own offer",
    ),

    (Decide, Target::Application { offer, .. }) => allow_if(
      offer.creator.user_id() == me,
      "only the offer's creator may decide its applications",
    ),
    (View, Target::Application { application, offer }) => allow_if(
      application.applicant_id == me || offer.creator.user_id() == me,
      "not a party to this application",
    ),

    (View | Complete | Cancel, Target::Donation(d)) => allow_if(
      d.party_of(me).is_some(),
      "not a party to this donation",
    ),
    (Review, Target::Review { donation, reviewed }) => allow_if(
      donation.counterpart(me) == Some(reviewed),
      "reviews must come from one party of the donation about the other",
    ),

    (View, Target::Message(m)) => allow_if(
      m.sender_id == me || m.receiver_id == me,
      "not a participant in this message",
    ),
    (MarkRead, Target::Message(m)) => allow_if(
      m.receiver_id == me,
      "only the receiver may mark a message read",
    ),
    (View | MarkRead, Target::Notification(n)) => allow_if(
      n.user_id == me,
      "not your notification",
    ),

    _ => Deny(DenyReason::Forbidden("action not permitted")),
  }
}
