//! The repository traits.
//!
//! [`DonationStore`] is implemented by storage backends (e.g.
//! `alms-store-sqlite`). Every engine operation runs as one call to
//! [`DonationStore::transact`], which hands the closure a [`Tx`] view of the
//! store. A backend must run the closure as a single atomic, serialized
//! unit: all of its writes commit together when it returns `Ok`, and none
//! of them survive when it returns `Err`.
//!
//! Lookups return `Ok(None)` for absence; an empty `Vec` means "no matches".
//! Neither is ever coerced into a default entity.

use std::future::Future;

use crate::{
  Result,
  account::{Association, AssociationQuery, NewAssociation, NewUser, User},
  application::{Application, ApplicationQuery, NewApplication},
  donation::{Donation, NewDonation},
  id::{
    ApplicationId, AssociationId, DonationId, EventId, MessageId, NotificationId,
    OfferId, UserId,
  },
  message::{Message, NewMessage},
  notification::{NewNotification, Notification},
  notify::WorkflowEvent,
  offer::{DonationOffer, NewOffer, OfferQuery},
  review::{NewReview, Review},
};

// ─── Tx ──────────────────────────────────────────────────────────────────────

/// Synchronous access to the store within one transaction.
///
/// Infrastructure failures surface as [`crate::Error::Store`]. `update_*`
/// methods overwrite the mutable columns of an existing row.
pub trait Tx {
  // ── Users ─────────────────────────────────────────────────────────────

  fn user(&self, id: UserId) -> Result<Option<User>>;
  fn user_by_email(&self, email: &str) -> Result<Option<User>>;
  fn users(&self) -> Result<Vec<User>>;
  fn insert_user(&mut self, input: NewUser) -> Result<User>;
  fn update_user(&mut self, user: &User) -> Result<()>;
  /// Deletes the user together with their association and notifications.
  /// Returns `false` if no such user existed.
  fn delete_user(&mut self, id: UserId) -> Result<bool>;
  /// Whether any offer, application, donation, review or message references
  /// the user.
  fn user_has_history(&self, id: UserId) -> Result<bool>;

  // ── Associations ──────────────────────────────────────────────────────

  fn association(&self, id: AssociationId) -> Result<Option<Association>>;
  fn association_by_owner(&self, owner: UserId) -> Result<Option<Association>>;
  fn association_by_email(&self, email: &str) -> Result<Option<Association>>;
  fn associations(&self, query: &AssociationQuery) -> Result<Vec<Association>>;
  fn insert_association(&mut self, input: NewAssociation) -> Result<Association>;
  fn update_association(&mut self, association: &Association) -> Result<()>;
  fn delete_association(&mut self, id: AssociationId) -> Result<bool>;

  // ── Offers ────────────────────────────────────────────────────────────

  fn offer(&self, id: OfferId) -> Result<Option<DonationOffer>>;
  fn offers(&self, query: &OfferQuery) -> Result<Vec<DonationOffer>>;
  fn insert_offer(&mut self, input: NewOffer) -> Result<DonationOffer>;
  fn update_offer(&mut self, offer: &DonationOffer) -> Result<()>;

  // ── Applications ──────────────────────────────────────────────────────

  fn application(&self, id: ApplicationId) -> Result<Option<Application>>;
  fn applications(&self, query: &ApplicationQuery) -> Result<Vec<Application>>;
  fn insert_application(&mut self, input: NewApplication) -> Result<Application>;
  fn update_application(&mut self, application: &Application) -> Result<()>;

  // ── Donations ─────────────────────────────────────────────────────────

  fn donation(&self, id: DonationId) -> Result<Option<Donation>>;
  /// Donations where `user` is donor or recipient.
  fn donations_for(&self, user: UserId) -> Result<Vec<Donation>>;
  fn insert_donation(&mut self, input: NewDonation) -> Result<Donation>;
  fn update_donation(&mut self, donation: &Donation) -> Result<()>;

  // ── Reviews ───────────────────────────────────────────────────────────

  fn insert_review(&mut self, input: NewReview) -> Result<Review>;
  /// Reviews received by `user`, newest first.
  fn reviews_of(&self, user: UserId) -> Result<Vec<Review>>;

  // ── Notifications ─────────────────────────────────────────────────────

  fn notification(&self, id: NotificationId) -> Result<Option<Notification>>;
  /// Newest first.
  fn notifications_for(&self, user: UserId, unread_only: bool)
  -> Result<Vec<Notification>>;
  fn insert_notification(&mut self, input: NewNotification) -> Result<Notification>;
  fn set_notification_read(&mut self, id: NotificationId) -> Result<()>;

  // ── Messages ──────────────────────────────────────────────────────────

  fn message(&self, id: MessageId) -> Result<Option<Message>>;
  fn insert_message(&mut self, input: NewMessage) -> Result<Message>;
  fn update_message(&mut self, message: &Message) -> Result<()>;
  /// Messages exchanged between `a` and `b` in either direction, oldest
  /// first.
  fn conversation(&self, a: UserId, b: UserId) -> Result<Vec<Message>>;
  /// Messages received by `user`, newest first.
  fn inbox(&self, user: UserId) -> Result<Vec<Message>>;

  // ── Event outbox ──────────────────────────────────────────────────────

  fn enqueue_event(&mut self, event: &WorkflowEvent) -> Result<EventId>;
  /// Oldest first, at most `limit`.
  fn pending_events(&self, limit: usize) -> Result<Vec<(EventId, WorkflowEvent)>>;
  /// Remove a dispatched event from the outbox.
  fn ack_event(&mut self, id: EventId) -> Result<()>;
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a donation store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait DonationStore: Send + Sync {
  /// Run `f` as one atomic unit. Concurrent calls are serialized, so a
  /// read-validate-write sequence inside `f` cannot interleave with another.
  fn transact<T, F>(&self, f: F) -> impl Future<Output = Result<T>> + Send + '_
  where
    T: Send + 'static,
    F: FnOnce(&mut dyn Tx) -> Result<T> + Send + 'static;
}
