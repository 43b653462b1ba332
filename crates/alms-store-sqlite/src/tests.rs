//! Integration tests for the workflow engine over an in-memory
//! `SqliteStore`.

use std::{
  future::Future,
  sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  },
};

use alms_core::{
  Engine, Error,
  account::{AssociationQuery, Role},
  application::{ApplicationStatus, Verdict},
  donation::DonationStatus,
  identity::{AssociationRegistration, LoginKind, UserRegistration},
  messaging::MessageInput,
  notification::NotificationKind,
  offer::{DonationOffer, OfferDraft, OfferKind, OfferStatus},
  review::ReviewInput,
  session::{Actor, CredentialHasher, Principal},
  store::{DonationStore, Tx},
  workflow::DecisionInput,
};
use chrono::{Duration, Utc};

use crate::SqliteStore;

/// Reversible stand-in for a real password hasher.
struct PlainHasher;

impl CredentialHasher for PlainHasher {
  fn hash(&self, plaintext: &str) -> alms_core::Result<String> {
    Ok(format!("plain:{plaintext}"))
  }

  fn verify(&self, plaintext: &str, hashed: &str) -> bool {
    hashed == format!("plain:{plaintext}")
  }
}

async fn engine() -> Engine<SqliteStore> {
  let store = SqliteStore::open_in_memory().await.expect("in-memory store");
  Engine::new(Arc::new(store), Arc::new(PlainHasher))
}

fn registration(email: &str, role: Role) -> UserRegistration {
  UserRegistration {
    first_name: "Test".into(),
    last_name:  "User".into(),
    email:      email.into(),
    password:   "hunter22".into(),
    phone:      None,
    address:    None,
    role:       Some(role),
  }
}

async fn register(e: &Engine<SqliteStore>, email: &str, role: Role) -> Principal {
  let login = e.register_user(registration(email, role)).await.unwrap();
  e.resolve_principal(Some(login.context)).await.unwrap()
}

async fn admin(e: &Engine<SqliteStore>) -> Principal {
  let p = register(e, "admin@example.org", Role::Individual).await;
  e.promote_to_admin("admin@example.org").await.unwrap();
  e.resolve_principal(Some(alms_core::session::SessionContext {
    user_id:        p.user_id,
    association_id: None,
  }))
  .await
  .unwrap()
}

fn draft(title: &str) -> OfferDraft {
  OfferDraft {
    kind:        OfferKind::Food,
    title:       title.into(),
    description: "Tinned goods".into(),
    quantity:    1,
    condition:   Some("new".into()),
    expiry_date: None,
    location:    Some("Depot".into()),
    image_urls:  vec!["https://img.example/1.jpg".into()],
  }
}

fn approve() -> DecisionInput {
  DecisionInput {
    decision:         Verdict::Approve,
    response_message: Some("See you Saturday".into()),
    handover_date:    Some(Utc::now() + Duration::days(2)),
  }
}

fn reject(why: &str) -> DecisionInput {
  DecisionInput {
    decision:         Verdict::Reject,
    response_message: Some(why.into()),
    handover_date:    None,
  }
}

fn review(donation: alms_core::id::DonationId, of: &Principal, rating: i64) -> ReviewInput {
  ReviewInput { donation_id: donation, reviewed_id: of.user_id, rating, comment: None }
}

/// Donor with one ACTIVE offer, plus a recipient.
async fn donor_offer_recipient(
  e: &Engine<SqliteStore>,
) -> (Principal, DonationOffer, Principal) {
  let donor = register(e, "donor@example.org", Role::Individual).await;
  let recipient = register(e, "recipient@example.org", Role::Recipient).await;
  let offer = e.create_offer(&donor, draft("Canned soup")).await.unwrap();
  (donor, offer, recipient)
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn end_to_end_donation_lifecycle() {
  let e = engine().await;
  let (donor, offer, recipient) = donor_offer_recipient(&e).await;
  assert_eq!(offer.status, OfferStatus::Active);
  assert_eq!(offer.creator, Actor::Individual { user_id: donor.user_id });

  let app = e
    .submit_application(&recipient, offer.id, Some("We need this".into()))
    .await
    .unwrap();
  assert_eq!(app.status, ApplicationStatus::Pending);

  let decided = e.decide_application(&donor, app.id, approve()).await.unwrap();
  assert_eq!(decided.application.status, ApplicationStatus::Approved);
  assert_eq!(decided.offer.status, OfferStatus::Fulfilled);
  let donation = decided.donation.expect("approval creates a donation");
  assert_eq!(donation.status, DonationStatus::Scheduled);
  assert_eq!(donation.donor_id, donor.user_id);
  assert_eq!(donation.recipient_id, recipient.user_id);
  assert!(donation.handover_date.is_some());

  // The stored offer reflects the approval too.
  assert_eq!(e.offer(offer.id).await.unwrap().status, OfferStatus::Fulfilled);

  let notes = e.notifications(&recipient, false).await.unwrap();
  assert!(
    notes
      .iter()
      .any(|n| n.kind == NotificationKind::Approval && n.related_application_id == Some(app.id))
  );

  let done = e.complete_donation(&recipient, donation.id, None).await.unwrap();
  assert_eq!(done.status, DonationStatus::Completed);

  let r = e.submit_review(&recipient, review(donation.id, &donor, 5)).await.unwrap();
  assert_eq!(r.rating, 5);
  assert_eq!(r.reviewer_id, recipient.user_id);

  let again = e.submit_application(&recipient, offer.id, None).await;
  assert!(matches!(again, Err(Error::InvalidState(_))), "{again:?}");
}

#[tokio::test]
async fn duplicate_application_conflicts_until_rejected() {
  let e = engine().await;
  let (donor, offer, recipient) = donor_offer_recipient(&e).await;

  let first = e.submit_application(&recipient, offer.id, None).await.unwrap();
  let dup = e.submit_application(&recipient, offer.id, None).await;
  assert!(matches!(dup, Err(Error::Conflict(_))), "{dup:?}");

  e.decide_application(&donor, first.id, reject("Already promised")).await.unwrap();
  let retry = e.submit_application(&recipient, offer.id, None).await.unwrap();
  assert_eq!(retry.status, ApplicationStatus::Pending);

  let mine = e.my_applications(&recipient).await.unwrap();
  assert_eq!(mine.len(), 2);
  let on_offer = e.offer_applications(&donor, offer.id).await.unwrap();
  assert_eq!(on_offer.len(), 2);
}

#[tokio::test]
async fn applying_to_missing_offer_is_not_found() {
  let e = engine().await;
  let recipient = register(&e, "r@example.org", Role::Recipient).await;
  let res = e.submit_application(&recipient, alms_core::id::OfferId(999), None).await;
  assert!(matches!(res, Err(Error::NotFound { entity: "offer", id: 999 })), "{res:?}");
}

#[tokio::test]
async fn creator_cannot_apply_to_own_offer() {
  let e = engine().await;
  let (donor, offer, _) = donor_offer_recipient(&e).await;
  let res = e.submit_application(&donor, offer.id, None).await;
  assert!(matches!(res, Err(Error::Forbidden(_))), "{res:?}");
}

#[tokio::test]
async fn rejection_keeps_offer_active_and_tells_the_applicant_why() {
  let e = engine().await;
  let (donor, offer, recipient) = donor_offer_recipient(&e).await;
  let app = e.submit_application(&recipient, offer.id, None).await.unwrap();

  let decided = e.decide_application(&donor, app.id, reject("Too far away")).await.unwrap();
  assert_eq!(decided.application.status, ApplicationStatus::Rejected);
  assert_eq!(decided.application.response_message.as_deref(), Some("Too far away"));
  assert!(decided.donation.is_none());
  assert_eq!(e.offer(offer.id).await.unwrap().status, OfferStatus::Active);

  let notes = e.notifications(&recipient, true).await.unwrap();
  assert_eq!(notes.len(), 1);
  assert_eq!(notes[0].kind, NotificationKind::Approval);
  assert!(notes[0].message.contains("rejected"));
  assert!(notes[0].message.contains("Too far away"));
}

#[tokio::test]
async fn submitting_notifies_the_donor() {
  let e = engine().await;
  let (donor, offer, recipient) = donor_offer_recipient(&e).await;
  let app = e.submit_application(&recipient, offer.id, None).await.unwrap();

  let notes = e.notifications(&donor, false).await.unwrap();
  assert_eq!(notes.len(), 1);
  assert_eq!(notes[0].kind, NotificationKind::Application);
  assert_eq!(notes[0].related_offer_id, Some(offer.id));
  assert_eq!(notes[0].related_application_id, Some(app.id));
}

#[tokio::test]
async fn deciding_twice_is_invalid_state() {
  let e = engine().await;
  let (donor, offer, recipient) = donor_offer_recipient(&e).await;
  let app = e.submit_application(&recipient, offer.id, None).await.unwrap();

  e.decide_application(&donor, app.id, reject("No")).await.unwrap();
  let res = e.decide_application(&donor, app.id, approve()).await;
  assert!(matches!(res, Err(Error::InvalidState(_))), "{res:?}");
}

#[tokio::test]
async fn applicant_cannot_decide_own_application() {
  let e = engine().await;
  let (_, offer, recipient) = donor_offer_recipient(&e).await;
  let app = e.submit_application(&recipient, offer.id, None).await.unwrap();

  let res = e.decide_application(&recipient, app.id, approve()).await;
  assert!(matches!(res, Err(Error::Forbidden(_))), "{res:?}");
  let app = e.application(&recipient, app.id).await.unwrap();
  assert_eq!(app.status, ApplicationStatus::Pending);
}

#[tokio::test]
async fn admin_may_decide_any_application() {
  let e = engine().await;
  let (donor, offer, recipient) = donor_offer_recipient(&e).await;
  let root = admin(&e).await;
  let app = e.submit_application(&recipient, offer.id, None).await.unwrap();

  let decided = e.decide_application(&root, app.id, approve()).await.unwrap();
  let donation = decided.donation.unwrap();
  // The donor is still the offer's creator, not the admin.
  assert_eq!(donation.donor_id, donor.user_id);
}

#[tokio::test]
async fn second_approval_on_fulfilled_offer_writes_nothing() {
  let e = engine().await;
  let (donor, offer, first) = donor_offer_recipient(&e).await;
  let second = register(&e, "second@example.org", Role::Recipient).await;

  let a = e.submit_application(&first, offer.id, None).await.unwrap();
  let b = e.submit_application(&second, offer.id, None).await.unwrap();
  e.decide_application(&donor, a.id, approve()).await.unwrap();

  let res = e.decide_application(&donor, b.id, approve()).await;
  assert!(matches!(res, Err(Error::InvalidState(_))), "{res:?}");

  let b = e.application(&donor, b.id).await.unwrap();
  assert_eq!(b.status, ApplicationStatus::Pending);
  assert!(e.my_donations(&second).await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_approvals_fulfil_the_offer_once() {
  let e = engine().await;
  let (donor, offer, first) = donor_offer_recipient(&e).await;
  let second = register(&e, "second@example.org", Role::Recipient).await;
  let a = e.submit_application(&first, offer.id, None).await.unwrap();
  let b = e.submit_application(&second, offer.id, None).await.unwrap();

  let (ra, rb) = tokio::join!(
    e.decide_application(&donor, a.id, approve()),
    e.decide_application(&donor, b.id, approve()),
  );
  let ok = [ra.is_ok(), rb.is_ok()].into_iter().filter(|x| *x).count();
  assert_eq!(ok, 1, "{ra:?} / {rb:?}");
  assert_eq!(e.my_donations(&donor).await.unwrap().len(), 1);
}

// ─── Donations ───────────────────────────────────────────────────────────────

async fn scheduled(
  e: &Engine<SqliteStore>,
) -> (Principal, Principal, alms_core::donation::Donation) {
  let (donor, offer, recipient) = donor_offer_recipient(e).await;
  let app = e.submit_application(&recipient, offer.id, None).await.unwrap();
  let decided = e.decide_application(&donor, app.id, approve()).await.unwrap();
  (donor, recipient, decided.donation.unwrap())
}

#[tokio::test]
async fn completed_donation_is_terminal() {
  let e = engine().await;
  let (donor, recipient, donation) = scheduled(&e).await;

  let done = e
    .complete_donation(&donor, donation.id, Some("Smooth handover".into()))
    .await
    .unwrap();
  assert_eq!(done.feedback_donor.as_deref(), Some("Smooth handover"));
  assert!(done.feedback_recipient.is_none());

  let res = e.cancel_donation(&recipient, donation.id, None).await;
  assert!(matches!(res, Err(Error::InvalidState(_))), "{res:?}");
  let res = e.complete_donation(&recipient, donation.id, None).await;
  assert!(matches!(res, Err(Error::InvalidState(_))), "{res:?}");
}

#[tokio::test]
async fn admin_may_complete_but_not_leave_feedback() {
  let e = engine().await;
  let (_, _, donation) = scheduled(&e).await;
  let root = admin(&e).await;

  let res = e.complete_donation(&root, donation.id, Some("Looks fine".into())).await;
  assert!(matches!(res, Err(Error::InvalidInput(_))), "{res:?}");
  assert_eq!(e.donation(&root, donation.id).await.unwrap().status, DonationStatus::Scheduled);

  let done = e.complete_donation(&root, donation.id, None).await.unwrap();
  assert_eq!(done.status, DonationStatus::Completed);
  assert!(done.feedback_donor.is_none() && done.feedback_recipient.is_none());
}

#[tokio::test]
async fn cancelled_donation_is_terminal_and_offer_stays_fulfilled() {
  let e = engine().await;
  let (donor, recipient, donation) = scheduled(&e).await;

  let cancelled = e
    .cancel_donation(&recipient, donation.id, Some("Moved away".into()))
    .await
    .unwrap();
  assert_eq!(cancelled.status, DonationStatus::Cancelled);
  assert_eq!(cancelled.cancellation_reason.as_deref(), Some("Moved away"));
  assert_eq!(e.offer(donation.offer_id).await.unwrap().status, OfferStatus::Fulfilled);

  let res = e.complete_donation(&donor, donation.id, None).await;
  assert!(matches!(res, Err(Error::InvalidState(_))), "{res:?}");

  let notes = e.notifications(&donor, false).await.unwrap();
  assert!(notes.iter().any(|n| n.kind == NotificationKind::System && n.message.contains("Moved away")));
}

#[tokio::test]
async fn outsiders_cannot_touch_a_donation() {
  let e = engine().await;
  let (_, _, donation) = scheduled(&e).await;
  let outsider = register(&e, "outsider@example.org", Role::Individual).await;

  let res = e.complete_donation(&outsider, donation.id, None).await;
  assert!(matches!(res, Err(Error::Forbidden(_))), "{res:?}");
  let res = e.donation(&outsider, donation.id).await;
  assert!(matches!(res, Err(Error::Forbidden(_))), "{res:?}");
}

// ─── Reviews ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn review_gate_rejects_each_boundary_violation() {
  let e = engine().await;
  let (donor, recipient, donation) = scheduled(&e).await;
  let outsider = register(&e, "outsider@example.org", Role::Individual).await;

  let not_done = e.submit_review(&recipient, review(donation.id, &donor, 5)).await;
  assert!(matches!(not_done, Err(Error::InvalidState(_))), "{not_done:?}");

  e.complete_donation(&donor, donation.id, None).await.unwrap();

  let wrong_party = e.submit_review(&outsider, review(donation.id, &donor, 5)).await;
  assert!(matches!(wrong_party, Err(Error::Forbidden(_))), "{wrong_party:?}");
  let self_review = e.submit_review(&recipient, review(donation.id, &recipient, 5)).await;
  assert!(matches!(self_review, Err(Error::Forbidden(_))), "{self_review:?}");

  for rating in [0, 6] {
    let res = e.submit_review(&recipient, review(donation.id, &donor, rating)).await;
    assert!(matches!(res, Err(Error::InvalidInput(_))), "rating {rating}: {res:?}");
  }

  e.submit_review(&donor, review(donation.id, &recipient, 4)).await.unwrap();
}

/// Repeated reviews of the same donation are currently accepted.
#[tokio::test]
async fn repeated_reviews_are_accepted() {
  let e = engine().await;
  let (donor, recipient, donation) = scheduled(&e).await;
  e.complete_donation(&donor, donation.id, None).await.unwrap();

  e.submit_review(&recipient, review(donation.id, &donor, 5)).await.unwrap();
  e.submit_review(&recipient, review(donation.id, &donor, 2)).await.unwrap();

  let received = e.reviews_of(donor.user_id).await.unwrap();
  assert_eq!(received.count, 2);
  assert_eq!(received.average, Some(3.5));
  assert_eq!(received.reviews[0].rating, 2, "newest first");
}

// ─── Expiry ──────────────────────────────────────────────────────────────────

/// An offer that lapses `after` from now.
async fn lapsing_offer(
  e: &Engine<SqliteStore>,
  donor: &Principal,
  after: Duration,
) -> DonationOffer {
  let mut d = draft("Yoghurt");
  d.expiry_date = Some(Utc::now() + after);
  e.create_offer(donor, d).await.unwrap()
}

#[tokio::test]
async fn lapsed_offer_refuses_applications_before_the_sweep() {
  let e = engine().await;
  let donor = register(&e, "donor@example.org", Role::Individual).await;
  let recipient = register(&e, "recipient@example.org", Role::Recipient).await;
  let offer = lapsing_offer(&e, &donor, Duration::milliseconds(150)).await;
  tokio::time::sleep(std::time::Duration::from_millis(300)).await;

  let res = e.submit_application(&recipient, offer.id, None).await;
  assert!(matches!(res, Err(Error::InvalidState(_))), "{res:?}");
  assert!(e.my_applications(&recipient).await.unwrap().is_empty());

  let swept = e.expire_due_offers(None).await.unwrap();
  assert_eq!(swept.len(), 1);
  assert_eq!(swept[0].id, offer.id);
}

#[tokio::test]
async fn lapsed_offer_cannot_be_approved() {
  let e = engine().await;
  let donor = register(&e, "donor@example.org", Role::Individual).await;
  let recipient = register(&e, "recipient@example.org", Role::Recipient).await;
  let offer = lapsing_offer(&e, &donor, Duration::milliseconds(400)).await;
  let app = e.submit_application(&recipient, offer.id, None).await.unwrap();
  tokio::time::sleep(std::time::Duration::from_millis(600)).await;

  let res = e.decide_application(&donor, app.id, approve()).await;
  assert!(matches!(res, Err(Error::InvalidState(_))), "{res:?}");
  let app = e.application(&donor, app.id).await.unwrap();
  assert_eq!(app.status, ApplicationStatus::Pending);
  assert!(e.my_donations(&recipient).await.unwrap().is_empty());
}

#[tokio::test]
async fn expire_offer_is_idempotent() {
  let e = engine().await;
  let donor = register(&e, "donor@example.org", Role::Individual).await;
  let mut d = draft("Bread");
  d.expiry_date = Some(Utc::now() + Duration::hours(1));
  let offer = e.create_offer(&donor, d).await.unwrap();

  let early = e.expire_offer(offer.id, None).await.unwrap();
  assert_eq!(early.status, OfferStatus::Active);

  let later = Utc::now() + Duration::hours(2);
  let expired = e.expire_offer(offer.id, Some(later)).await.unwrap();
  assert_eq!(expired.status, OfferStatus::Expired);
  let again = e.expire_offer(offer.id, Some(later)).await.unwrap();
  assert_eq!(again.status, OfferStatus::Expired);

  let notes = e.notifications(&donor, false).await.unwrap();
  assert_eq!(notes.iter().filter(|n| n.kind == NotificationKind::System).count(), 1);

  let recipient = register(&e, "r@example.org", Role::Recipient).await;
  let res = e.submit_application(&recipient, offer.id, None).await;
  assert!(matches!(res, Err(Error::InvalidState(_))), "{res:?}");
}

#[tokio::test]
async fn expiry_sweep_only_touches_due_active_offers() {
  let e = engine().await;
  let (donor, fulfilled, recipient) = donor_offer_recipient(&e).await;
  let app = e.submit_application(&recipient, fulfilled.id, None).await.unwrap();
  e.decide_application(&donor, app.id, approve()).await.unwrap();

  let mut soon = draft("Milk");
  soon.expiry_date = Some(Utc::now() + Duration::hours(1));
  let soon = e.create_offer(&donor, soon).await.unwrap();
  let mut late = draft("Rice");
  late.expiry_date = Some(Utc::now() + Duration::days(30));
  let late = e.create_offer(&donor, late).await.unwrap();
  let open_ended = e.create_offer(&donor, draft("Blankets")).await.unwrap();

  let expired = e.expire_due_offers(Some(Utc::now() + Duration::days(1))).await.unwrap();
  let ids: Vec<_> = expired.iter().map(|o| o.id).collect();
  assert_eq!(ids, vec![soon.id]);

  assert_eq!(e.offer(late.id).await.unwrap().status, OfferStatus::Active);
  assert_eq!(e.offer(open_ended.id).await.unwrap().status, OfferStatus::Active);
  assert_eq!(e.offer(fulfilled.id).await.unwrap().status, OfferStatus::Fulfilled);
}

// ─── Messaging ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn mark_read_is_idempotent_and_receiver_only() {
  let e = engine().await;
  let (donor, offer, recipient) = donor_offer_recipient(&e).await;

  let msg = e
    .send_message(&recipient, MessageInput {
      receiver_id:      donor.user_id,
      content:          "  Is this still available?  ".into(),
      related_offer_id: Some(offer.id),
    })
    .await
    .unwrap();
  assert_eq!(msg.content, "Is this still available?");
  assert!(msg.read_at.is_none());

  let by_sender = e.mark_message_read(&recipient, msg.id).await;
  assert!(matches!(by_sender, Err(Error::Forbidden(_))), "{by_sender:?}");

  let first = e.mark_message_read(&donor, msg.id).await.unwrap();
  let second = e.mark_message_read(&donor, msg.id).await.unwrap();
  assert!(first.read_at.is_some());
  assert_eq!(first.read_at, second.read_at);

  let notes = e.notifications(&donor, false).await.unwrap();
  assert!(notes.iter().any(|n| n.kind == NotificationKind::Message
    && n.related_message_id == Some(msg.id)));
}

#[tokio::test]
async fn message_validation() {
  let e = engine().await;
  let (donor, _, recipient) = donor_offer_recipient(&e).await;
  let send = |to, content: &str| MessageInput {
    receiver_id:      to,
    content:          content.into(),
    related_offer_id: None,
  };

  let empty = e.send_message(&recipient, send(donor.user_id, "   ")).await;
  assert!(matches!(empty, Err(Error::InvalidInput(_))), "{empty:?}");
  let to_self = e.send_message(&recipient, send(recipient.user_id, "hi")).await;
  assert!(matches!(to_self, Err(Error::InvalidInput(_))), "{to_self:?}");
  let nobody = e.send_message(&recipient, send(alms_core::id::UserId(404), "hi")).await;
  assert!(matches!(nobody, Err(Error::NotFound { .. })), "{nobody:?}");
}

#[tokio::test]
async fn conversation_is_oldest_first_and_inbox_newest_first() {
  let e = engine().await;
  let (donor, _, recipient) = donor_offer_recipient(&e).await;
  for (from, to, text) in [
    (&recipient, &donor, "one"),
    (&donor, &recipient, "two"),
    (&recipient, &donor, "three"),
  ] {
    e.send_message(from, MessageInput {
      receiver_id:      to.user_id,
      content:          text.into(),
      related_offer_id: None,
    })
    .await
    .unwrap();
  }

  let thread = e.conversation(&donor, recipient.user_id).await.unwrap();
  let texts: Vec<_> = thread.iter().map(|m| m.content.as_str()).collect();
  assert_eq!(texts, ["one", "two", "three"]);

  let inbox = e.inbox(&donor).await.unwrap();
  let texts: Vec<_> = inbox.iter().map(|m| m.content.as_str()).collect();
  assert_eq!(texts, ["three", "one"]);
}

#[tokio::test]
async fn notifications_can_be_marked_read() {
  let e = engine().await;
  let (donor, offer, recipient) = donor_offer_recipient(&e).await;
  e.submit_application(&recipient, offer.id, None).await.unwrap();

  let unread = e.notifications(&donor, true).await.unwrap();
  assert_eq!(unread.len(), 1);

  let res = e.mark_notification_read(&recipient, unread[0].id).await;
  assert!(matches!(res, Err(Error::Forbidden(_))), "{res:?}");

  let read = e.mark_notification_read(&donor, unread[0].id).await.unwrap();
  assert!(read.is_read);
  assert!(e.notifications(&donor, true).await.unwrap().is_empty());
  assert_eq!(e.notifications(&donor, false).await.unwrap().len(), 1);
}

#[tokio::test]
async fn outbox_is_drained_after_each_commit() {
  let e = engine().await;
  let (donor, offer, recipient) = donor_offer_recipient(&e).await;
  let app = e.submit_application(&recipient, offer.id, None).await.unwrap();
  e.decide_application(&donor, app.id, approve()).await.unwrap();

  assert_eq!(e.pending_events().await.unwrap(), 0);
  assert!(e.flush_notifications().await.unwrap().is_empty());
}

async fn outbox_rows(store: &SqliteStore) -> i64 {
  store
    .conn
    .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM outbox", [], |r| r.get::<_, i64>(0))?))
    .await
    .unwrap()
}

#[tokio::test]
async fn dispatched_events_leave_the_outbox() {
  let e = engine().await;
  let (_, offer, recipient) = donor_offer_recipient(&e).await;
  e.submit_application(&recipient, offer.id, None).await.unwrap();
  assert_eq!(outbox_rows(e.store()).await, 0);
}

/// Wraps a [`SqliteStore`] and fails one chosen transaction.
struct FlakyStore {
  inner:   SqliteStore,
  /// `n > 0`: the `n`th transaction from now fails. `0`: never fail.
  fail_in: AtomicUsize,
}

impl FlakyStore {
  fn fail_nth(&self, n: usize) { self.fail_in.store(n, Ordering::SeqCst); }

  fn should_fail(&self) -> bool {
    self
      .fail_in
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
      == Ok(1)
  }
}

impl DonationStore for FlakyStore {
  fn transact<T, F>(&self, f: F) -> impl Future<Output = alms_core::Result<T>> + Send + '_
  where
    T: Send + 'static,
    F: FnOnce(&mut dyn Tx) -> alms_core::Result<T> + Send + 'static,
  {
    let fail = self.should_fail();
    async move {
      if fail {
        return Err(Error::Store("connection lost".into()));
      }
      self.inner.transact(f).await
    }
  }
}

#[tokio::test]
async fn failed_dispatch_keeps_the_change_and_retries_later() {
  let store = FlakyStore {
    inner:   SqliteStore::open_in_memory().await.unwrap(),
    fail_in: AtomicUsize::new(0),
  };
  let e = Engine::new(Arc::new(store), Arc::new(PlainHasher));
  let login = e.register_user(registration("donor@example.org", Role::Individual)).await;
  let donor = e.resolve_principal(Some(login.unwrap().context)).await.unwrap();
  let login = e.register_user(registration("recipient@example.org", Role::Recipient)).await;
  let recipient = e.resolve_principal(Some(login.unwrap().context)).await.unwrap();
  let offer = e.create_offer(&donor, draft("Rice")).await.unwrap();

  // The commit goes through; the flush right after it does not.
  e.store().fail_nth(2);
  let app = e.submit_application(&recipient, offer.id, None).await.unwrap();

  let stored = e.application(&recipient, app.id).await.unwrap();
  assert_eq!(stored.status, ApplicationStatus::Pending);
  assert_eq!(e.pending_events().await.unwrap(), 1);
  assert!(e.notifications(&donor, false).await.unwrap().is_empty());

  let delivered = e.flush_notifications().await.unwrap();
  assert_eq!(delivered.len(), 1);
  assert_eq!(delivered[0].user_id, donor.user_id);
  assert_eq!(delivered[0].kind, NotificationKind::Application);
  assert_eq!(e.pending_events().await.unwrap(), 0);
  assert_eq!(outbox_rows(&e.store().inner).await, 0);
}

// ─── Persistence ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn file_store_survives_reopen() {
  let path = std::env::temp_dir().join(format!("alms-test-{}.sqlite", std::process::id()));
  let _ = std::fs::remove_file(&path);

  let e = Engine::new(Arc::new(SqliteStore::open(&path).await.unwrap()), Arc::new(PlainHasher));
  let login = e.register_user(registration("donor@example.org", Role::Individual)).await;
  let donor = e.resolve_principal(Some(login.unwrap().context)).await.unwrap();
  let offer = e.create_offer(&donor, draft("Rice")).await.unwrap();
  drop(e);

  let e = Engine::new(Arc::new(SqliteStore::open(&path).await.unwrap()), Arc::new(PlainHasher));
  assert_eq!(e.offer(offer.id).await.unwrap().title, "Rice");
  drop(e);
  let _ = std::fs::remove_file(&path);
}

// ─── Search ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn association_name_search_treats_wildcards_literally() {
  let e = engine().await;
  let mut first = association_registration();
  first.association_name = "50% Off Pantry".into();
  e.register_association(first).await.unwrap();
  let mut second = association_registration();
  second.email = "second@example.org".into();
  second.association_email = None;
  second.association_name = "500 Club".into();
  e.register_association(second).await.unwrap();

  let search = |name: &str| AssociationQuery { name: Some(name.into()), category: None };
  let hits = e.associations(search("50%")).await.unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].name, "50% Off Pantry");
  assert!(e.associations(search("_")).await.unwrap().is_empty());
  assert_eq!(e.associations(search("50")).await.unwrap().len(), 2);
}

// ─── Identity ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_email_conflicts() {
  let e = engine().await;
  register(&e, "dup@example.org", Role::Individual).await;
  let res = e.register_user(registration("DUP@example.org", Role::Recipient)).await;
  assert!(matches!(res, Err(Error::Conflict(_))), "{res:?}");
}

#[tokio::test]
async fn self_registration_as_admin_is_forbidden() {
  let e = engine().await;
  let res = e.register_user(registration("root@example.org", Role::Admin)).await;
  assert!(matches!(res, Err(Error::Forbidden(_))), "{res:?}");
}

#[tokio::test]
async fn user_login_path() {
  let e = engine().await;
  register(&e, "login@example.org", Role::Individual).await;

  let ok = e.login("login@example.org", "hunter22", LoginKind::User).await.unwrap();
  assert!(ok.association.is_none());
  assert!(ok.context.association_id.is_none());

  let bad = e.login("login@example.org", "wrong", LoginKind::User).await;
  assert!(matches!(bad, Err(Error::Unauthenticated)), "{bad:?}");
  let unknown = e.login("nobody@example.org", "hunter22", LoginKind::User).await;
  assert!(matches!(unknown, Err(Error::Unauthenticated)), "{unknown:?}");
}

fn association_registration() -> AssociationRegistration {
  AssociationRegistration {
    first_name:          "Ada".into(),
    last_name:           "Owner".into(),
    email:               "owner@example.org".into(),
    password:            "pantry-pass".into(),
    phone:               None,
    address:             None,
    association_name:    "Food Bank North".into(),
    association_email:   Some("contact@foodbank.example".into()),
    association_phone:   None,
    association_address: None,
    description:         Some("Weekly food parcels".into()),
    category:            Some("Food".into()),
    logo_url:            None,
    foundation_date:     None,
  }
}

#[tokio::test]
async fn association_login_path() {
  let e = engine().await;
  let reg = e.register_association(association_registration()).await.unwrap();
  assert_eq!(reg.user.role, Role::Recipient);
  let association = reg.association.unwrap();

  for email in ["contact@foodbank.example", "owner@example.org"] {
    let login = e.login(email, "pantry-pass", LoginKind::Association).await.unwrap();
    assert_eq!(login.context.association_id, Some(association.id));
    let p = e.resolve_principal(Some(login.context)).await.unwrap();
    assert_eq!(p.actor, Actor::Association {
      user_id:        reg.user.id,
      association_id: association.id,
    });
  }

  let bad = e.login("contact@foodbank.example", "nope", LoginKind::Association).await;
  assert!(matches!(bad, Err(Error::Unauthenticated)), "{bad:?}");
}

#[tokio::test]
async fn offers_made_for_an_association_fall_back_to_the_owner() {
  let e = engine().await;
  let reg = e.register_association(association_registration()).await.unwrap();
  let owner = e.resolve_principal(Some(reg.context)).await.unwrap();

  let offer = e.create_offer(&owner, draft("Pasta")).await.unwrap();
  assert!(matches!(offer.creator, Actor::Association { .. }));

  let association = reg.association.unwrap();
  e.delete_association(&owner, association.id).await.unwrap();
  let offer = e.offer(offer.id).await.unwrap();
  assert_eq!(offer.creator, Actor::Individual { user_id: owner.user_id });
}

#[tokio::test]
async fn association_search_filters_by_name_and_category() {
  let e = engine().await;
  e.register_association(association_registration()).await.unwrap();
  let mut other = association_registration();
  other.email = "second@example.org".into();
  other.association_email = None;
  other.association_name = "Coat Drive".into();
  other.category = Some("Clothes".into());
  e.register_association(other).await.unwrap();

  let by_name = e
    .associations(AssociationQuery { name: Some("bank".into()), category: None })
    .await
    .unwrap();
  assert_eq!(by_name.len(), 1);
  assert_eq!(by_name[0].name, "Food Bank North");

  let by_category = e
    .associations(AssociationQuery { name: None, category: Some("clothes".into()) })
    .await
    .unwrap();
  assert_eq!(by_category.len(), 1);
  assert_eq!(by_category[0].name, "Coat Drive");

  assert_eq!(e.associations(AssociationQuery::default()).await.unwrap().len(), 2);
}

#[tokio::test]
async fn users_with_history_cannot_be_deleted() {
  let e = engine().await;
  let (donor, _, recipient) = donor_offer_recipient(&e).await;

  let res = e.delete_user(&donor, donor.user_id).await;
  assert!(matches!(res, Err(Error::Conflict(_))), "{res:?}");

  let res = e.delete_user(&donor, recipient.user_id).await;
  assert!(matches!(res, Err(Error::NotOwner("user"))), "{res:?}");

  e.delete_user(&recipient, recipient.user_id).await.unwrap();
  let gone = e
    .resolve_principal(Some(alms_core::session::SessionContext {
      user_id:        recipient.user_id,
      association_id: None,
    }))
    .await;
  assert!(matches!(gone, Err(Error::Unauthenticated)), "{gone:?}");
}

#[tokio::test]
async fn only_admins_change_roles() {
  let e = engine().await;
  let user = register(&e, "u@example.org", Role::Individual).await;
  let root = admin(&e).await;

  let patch = alms_core::account::UserPatch { role: Some(Role::Admin), ..Default::default() };
  let res = e.update_user(&user, user.user_id, patch.clone()).await;
  assert!(matches!(res, Err(Error::Forbidden(_))), "{res:?}");

  let updated = e.update_user(&root, user.user_id, patch).await.unwrap();
  assert_eq!(updated.role, Role::Admin);
  assert!(updated.updated_at.is_some());
}

#[tokio::test]
async fn terminal_offers_cannot_be_edited() {
  let e = engine().await;
  let (donor, offer, recipient) = donor_offer_recipient(&e).await;

  let patch = alms_core::offer::OfferPatch { title: Some("Soup, lots".into()), ..Default::default() };
  let edited = e.update_offer(&donor, offer.id, patch.clone()).await.unwrap();
  assert_eq!(edited.title, "Soup, lots");

  let res = e.update_offer(&recipient, offer.id, patch.clone()).await;
  assert!(matches!(res, Err(Error::NotOwner("offer"))), "{res:?}");

  let app = e.submit_application(&recipient, offer.id, None).await.unwrap();
  e.decide_application(&donor, app.id, approve()).await.unwrap();
  let res = e.update_offer(&donor, offer.id, patch).await;
  assert!(matches!(res, Err(Error::InvalidState(_))), "{res:?}");
}
