//! Typed numeric handles.
//!
//! Entities refer to each other only through these ids; related records are
//! resolved through the store at read time.

use serde::{Deserialize, Serialize};

macro_rules! id_type {
  ($($(#[$meta:meta])* $name:ident;)*) => {$(
    $(#[$meta])*
    #[derive(
      Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    )]
    #[serde(transparent)]
    pub struct $name(pub i64);

    impl std::fmt::Display for $name {
      fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
      }
    }

    impl From<$name> for i64 {
      fn from(id: $name) -> i64 { id.0 }
    }
  )*};
}

id_type! {
  UserId;
  AssociationId;
  OfferId;
  ApplicationId;
  DonationId;
  ReviewId;
  NotificationId;
  MessageId;
  /// Position of a pending workflow event in the outbox.
  EventId;
}
