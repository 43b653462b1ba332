//! The donation lifecycle: offers, applications, and donations.
//!
//! Every transition runs inside a single store transaction: the target is
//! read, the gate and the state machine are consulted, and all writes
//! (including derived entities and queued events) commit together. An
//! illegal transition returns a typed error and writes nothing.
//! [`Engine::expire_offer`] is the exception: it is a no-op
//! on offers that are not due, so expiry sweeps can be repeated safely.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Engine, Error, Result,
  application::{Application, ApplicationQuery, ApplicationStatus, NewApplication, Verdict},
  authz::{Action, Target, authorize},
  donation::{Donation, DonationStatus, NewDonation, Party},
  engine::Events,
  id::{ApplicationId, DonationId, OfferId},
  notify::WorkflowEvent,
  offer::{DonationOffer, NewOffer, OfferDraft, OfferPatch, OfferQuery, OfferStatus},
  session::Principal,
  store::{DonationStore, Tx},
};

// ─── Inputs & outputs ────────────────────────────────────────────────────────

/// A donor's decision on an application.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionInput {
  pub decision:         Verdict,
  pub response_message: Option<String>,
  /// Recorded on the donation when approving.
  pub handover_date:    Option<DateTime<Utc>>,
}

/// The result of [`Engine::decide_application`].
#[derive(Debug, Clone, Serialize)]
pub struct Decided {
  pub application: Application,
  pub offer:       DonationOffer,
  /// Present exactly when the application was approved.
  pub donation:    Option<Donation>,
}

// ─── Loaders ─────────────────────────────────────────────────────────────────

pub(crate) fn load_offer(tx: &dyn Tx, id: OfferId) -> Result<DonationOffer> {
  tx.offer(id)?.ok_or_else(|| Error::not_found("offer", id))
}

fn load_application(tx: &dyn Tx, id: ApplicationId) -> Result<Application> {
  tx.application(id)?.ok_or_else(|| Error::not_found("application", id))
}

pub(crate) fn load_donation(tx: &dyn Tx, id: DonationId) -> Result<Donation> {
  tx.donation(id)?.ok_or_else(|| Error::not_found("donation", id))
}

// ─── Transitions ─────────────────────────────────────────────────────────────

fn submit_in(
  tx: &mut dyn Tx,
  principal: &Principal,
  offer_id: OfferId,
  message: Option<String>,
  events: &mut Events,
) -> Result<Application> {
  let offer = load_offer(tx, offer_id)?;
  authorize(Some(principal), Action::Apply, Target::Offer(&offer)).into_result()?;

  if offer.status != OfferStatus::Active {
    return Err(Error::InvalidState(format!(
      "offer {offer_id} is {} and no longer accepts applications",
      offer.status,
    )));
  }
  ensure_not_lapsed(&offer, Utc::now())?;

  let existing = tx.applications(&ApplicationQuery {
    offer_id:     Some(offer_id),
    applicant_id: Some(principal.user_id),
  })?;
  if existing.iter().any(|a| a.status.blocks_reapplication()) {
    return Err(Error::Conflict(format!(
      "an active application for offer {offer_id} already exists",
    )));
  }

  let application = tx.insert_application(NewApplication {
    offer_id,
    applicant_id: principal.user_id,
    message: message.filter(|m| !m.trim().is_empty()),
  })?;

  events.push(WorkflowEvent::ApplicationSubmitted {
    application_id: application.id,
    offer_id,
    offer_title: offer.title,
    donor_id: offer.creator.user_id(),
    applicant_id: application.applicant_id,
  });
  Ok(application)
}

fn decide_in(
  tx: &mut dyn Tx,
  principal: &Principal,
  id: ApplicationId,
  input: DecisionInput,
  events: &mut Events,
) -> Result<Decided> {
  let mut application = load_application(tx, id)?;
  let mut offer = load_offer(tx, application.offer_id)?;
  authorize(
    Some(principal),
    Action::Decide,
    Target::Application { application: &application, offer: &offer },
  )
  .into_result()?;

  if application.status != ApplicationStatus::Pending {
    return Err(Error::InvalidState(format!(
      "application {id} is already {}",
      application.status,
    )));
  }
  application.response_message = input.response_message;

  match input.decision {
    Verdict::Approve => {
      if !offer.status.can_transition_to(OfferStatus::Fulfilled) {
        return Err(Error::InvalidState(format!(
          "offer {} is {} and cannot be fulfilled",
          offer.id, offer.status,
        )));
      }
      ensure_not_lapsed(&offer, Utc::now())?;
      application.status = ApplicationStatus::Approved;
      offer.status = OfferStatus::Fulfilled;
      tx.update_application(&application)?;
      tx.update_offer(&offer)?;
      let donation = tx.insert_donation(NewDonation {
        offer_id:       offer.id,
        donor_id:       offer.creator.user_id(),
        recipient_id:   application.applicant_id,
        application_id: application.id,
        handover_date:  input.handover_date,
      })?;

      events.push(WorkflowEvent::ApplicationApproved {
        application_id: application.id,
        offer_id:       offer.id,
        offer_title:    offer.title.clone(),
        applicant_id:   application.applicant_id,
        donation_id:    donation.id,
      });
      Ok(Decided { application, offer, donation: Some(donation) })
    }
    Verdict::Reject => {
      application.status = ApplicationStatus::Rejected;
      tx.update_application(&application)?;

      events.push(WorkflowEvent::ApplicationRejected {
        application_id: application.id,
        offer_id:       offer.id,
        offer_title:    offer.title.clone(),
        applicant_id:   application.applicant_id,
        response:       application.response_message.clone(),
      });
      Ok(Decided { application, offer, donation: None })
    }
  }
}

/// An ACTIVE offer whose expiry has passed is treated as expired even before
/// the sweep has stamped it. Nothing is written here: the caller's
/// transaction rolls back on the error, and the sweep records the expiry.
fn ensure_not_lapsed(offer: &DonationOffer, now: DateTime<Utc>) -> Result<()> {
  if offer.is_due_for_expiry(now) {
    return Err(Error::InvalidState(format!("offer {} has expired", offer.id)));
  }
  Ok(())
}

/// Expire `offer` if it is due at `as_of`; returns whether it changed.
fn expire_in(
  tx: &mut dyn Tx,
  offer: &mut DonationOffer,
  as_of: DateTime<Utc>,
  events: &mut Events,
) -> Result<bool> {
  if !offer.is_due_for_expiry(as_of) {
    return Ok(false);
  }
  offer.status = OfferStatus::Expired;
  tx.update_offer(offer)?;
  events.push(WorkflowEvent::OfferExpired {
    offer_id:    offer.id,
    offer_title: offer.title.clone(),
    creator_id:  offer.creator.user_id(),
  });
  Ok(true)
}

/// Shared guard for both donation transitions.
fn scheduled_donation(
  tx: &dyn Tx,
  principal: &Principal,
  id: DonationId,
  action: Action,
) -> Result<Donation> {
  let donation = load_donation(tx, id)?;
  authorize(Some(principal), action, Target::Donation(&donation)).into_result()?;
  if donation.status != DonationStatus::Scheduled {
    return Err(Error::InvalidState(format!(
      "donation {id} is already {}",
      donation.status,
    )));
  }
  Ok(donation)
}

fn complete_in(
  tx: &mut dyn Tx,
  principal: &Principal,
  id: DonationId,
  feedback: Option<String>,
  events: &mut Events,
) -> Result<Donation> {
  let mut donation = scheduled_donation(tx, principal, id, Action::Complete)?;
  match (donation.party_of(principal.user_id), feedback) {
    (Some(Party::Donor), feedback) => donation.feedback_donor = feedback,
    (Some(Party::Recipient), feedback) => donation.feedback_recipient = feedback,
    (None, Some(_)) => {
      return Err(Error::InvalidInput(
        "only the donor or recipient may leave feedback".into(),
      ));
    }
    (None, None) => {}
  }
  donation.status = DonationStatus::Completed;
  tx.update_donation(&donation)?;

  events.push(WorkflowEvent::DonationCompleted {
    donation_id:  donation.id,
    offer_id:     donation.offer_id,
    donor_id:     donation.donor_id,
    recipient_id: donation.recipient_id,
    completed_by: principal.user_id,
  });
  Ok(donation)
}

fn cancel_in(
  tx: &mut dyn Tx,
  principal: &Principal,
  id: DonationId,
  reason: Option<String>,
  events: &mut Events,
) -> Result<Donation> {
  let mut donation = scheduled_donation(tx, principal, id, Action::Cancel)?;
  donation.status = DonationStatus::Cancelled;
  donation.cancellation_reason = reason;
  // The offer stays FULFILLED.
  tx.update_donation(&donation)?;

  events.push(WorkflowEvent::DonationCancelled {
    donation_id:  donation.id,
    offer_id:     donation.offer_id,
    donor_id:     donation.donor_id,
    recipient_id: donation.recipient_id,
    cancelled_by: principal.user_id,
    reason:       donation.cancellation_reason.clone(),
  });
  Ok(donation)
}

// ─── Operations ──────────────────────────────────────────────────────────────

impl<S: DonationStore> Engine<S> {
  // ── Offers ────────────────────────────────────────────────────────────

  /// Publish an offer under the principal's acting identity.
  pub async fn create_offer(
    &self,
    principal: &Principal,
    draft: OfferDraft,
  ) -> Result<DonationOffer> {
    let quantity = draft.validate(Utc::now())?;
    let creator = principal.actor;

    let offer = self
      .commit(move |tx, _| {
        tx.insert_offer(NewOffer {
          creator,
          kind: draft.kind,
          title: draft.title,
          description: draft.description,
          quantity,
          condition: draft.condition,
          expiry_date: draft.expiry_date,
          location: draft.location,
          image_urls: draft.image_urls,
        })
      })
      .await?;

    tracing::info!(offer_id = %offer.id, creator = %creator.user_id(), "offer created");
    Ok(offer)
  }

  pub async fn offer(&self, id: OfferId) -> Result<DonationOffer> {
    self.read(move |tx| load_offer(tx, id)).await
  }

  pub async fn offers(&self, query: OfferQuery) -> Result<Vec<DonationOffer>> {
    self.read(move |tx| tx.offers(&query)).await
  }

  /// Edit an ACTIVE offer. Terminal offers are immutable.
  pub async fn update_offer(
    &self,
    principal: &Principal,
    id: OfferId,
    patch: OfferPatch,
  ) -> Result<DonationOffer> {
    let principal = principal.clone();
    self
      .commit(move |tx, _| {
        let mut offer = load_offer(tx, id)?;
        authorize(Some(&principal), Action::Update, Target::Offer(&offer)).into_result()?;
        if offer.status.is_terminal() {
          return Err(Error::InvalidState(format!(
            "offer {id} is {} and can no longer be edited",
            offer.status,
          )));
        }
        patch.apply(&mut offer, Utc::now())?;
        tx.update_offer(&offer)?;
        Ok(offer)
      })
      .await
  }

  /// Expire one offer if it is ACTIVE and past its expiry at `as_of`
  /// (default: now). Otherwise a no-op. Returns the offer as it now stands.
  pub async fn expire_offer(
    &self,
    id: OfferId,
    as_of: Option<DateTime<Utc>>,
  ) -> Result<DonationOffer> {
    let as_of = as_of.unwrap_or_else(Utc::now);
    let (offer, changed) = self
      .commit(move |tx, events| {
        let mut offer = load_offer(tx, id)?;
        let changed = expire_in(tx, &mut offer, as_of, events)?;
        Ok((offer, changed))
      })
      .await?;
    if changed {
      tracing::info!(offer_id = %id, "offer expired");
    }
    Ok(offer)
  }

  /// Expire every offer that is due at `as_of` (default: now).
  pub async fn expire_due_offers(
    &self,
    as_of: Option<DateTime<Utc>>,
  ) -> Result<Vec<DonationOffer>> {
    let as_of = as_of.unwrap_or_else(Utc::now);
    let expired = self
      .commit(move |tx, events| {
        let due = tx.offers(&OfferQuery {
          expiring_before: Some(as_of),
          ..OfferQuery::default()
        })?;
        let mut expired = Vec::new();
        for mut offer in due {
          if expire_in(tx, &mut offer, as_of, events)? {
            expired.push(offer);
          }
        }
        Ok(expired)
      })
      .await?;
    if !expired.is_empty() {
      tracing::info!(count = expired.len(), "expiry sweep");
    }
    Ok(expired)
  }

  // ── Applications ──────────────────────────────────────────────────────

  pub async fn submit_application(
    &self,
    principal: &Principal,
    offer_id: OfferId,
    message: Option<String>,
  ) -> Result<Application> {
    let principal = principal.clone();
    let application = self
      .commit(move |tx, events| submit_in(tx, &principal, offer_id, message, events))
      .await?;
    tracing::info!(
      application_id = %application.id,
      offer_id = %offer_id,
      applicant = %application.applicant_id,
      "application submitted",
    );
    Ok(application)
  }

  pub async fn decide_application(
    &self,
    principal: &Principal,
    id: ApplicationId,
    input: DecisionInput,
  ) -> Result<Decided> {
    let principal = principal.clone();
    let decided = self
      .commit(move |tx, events| decide_in(tx, &principal, id, input, events))
      .await?;
    tracing::info!(
      application_id = %id,
      status = %decided.application.status,
      offer_status = %decided.offer.status,
      donation_id = ?decided.donation.as_ref().map(|d| d.id),
      "application decided",
    );
    Ok(decided)
  }

  pub async fn application(
    &self,
    principal: &Principal,
    id: ApplicationId,
  ) -> Result<Application> {
    let principal = principal.clone();
    self
      .read(move |tx| {
        let application = load_application(tx, id)?;
        let offer = load_offer(tx, application.offer_id)?;
        authorize(
          Some(&principal),
          Action::View,
          Target::Application { application: &application, offer: &offer },
        )
        .into_result()?;
        Ok(application)
      })
      .await
  }

  /// All applications on an offer; visible to its creator.
  pub async fn offer_applications(
    &self,
    principal: &Principal,
    offer_id: OfferId,
  ) -> Result<Vec<Application>> {
    let principal = principal.clone();
    self
      .read(move |tx| {
        let offer = load_offer(tx, offer_id)?;
        authorize(Some(&principal), Action::Update, Target::Offer(&offer)).into_result()?;
        tx.applications(&ApplicationQuery { offer_id: Some(offer_id), applicant_id: None })
      })
      .await
  }

  /// Applications the principal has submitted.
  pub async fn my_applications(&self, principal: &Principal) -> Result<Vec<Application>> {
    let me = principal.user_id;
    self
      .read(move |tx| {
        tx.applications(&ApplicationQuery { offer_id: None, applicant_id: Some(me) })
      })
      .await
  }

  // ── Donations ─────────────────────────────────────────────────────────

  /// Mark a SCHEDULED donation completed. `feedback` is stored on the
  /// caller's side of the donation; an admin who is not a party may complete
  /// it but may not leave feedback.
  pub async fn complete_donation(
    &self,
    principal: &Principal,
    id: DonationId,
    feedback: Option<String>,
  ) -> Result<Donation> {
    let principal = principal.clone();
    let donation = self
      .commit(move |tx, events| complete_in(tx, &principal, id, feedback, events))
      .await?;
    tracing::info!(donation_id = %id, "donation completed");
    Ok(donation)
  }

  pub async fn cancel_donation(
    &self,
    principal: &Principal,
    id: DonationId,
    reason: Option<String>,
  ) -> Result<Donation> {
    let principal = principal.clone();
    let donation = self
      .commit(move |tx, events| cancel_in(tx, &principal, id, reason, events))
      .await?;
    tracing::info!(donation_id = %id, "donation cancelled");
    Ok(donation)
  }

  pub async fn donation(&self, principal: &Principal, id: DonationId) -> Result<Donation> {
    let principal = principal.clone();
    self
      .read(move |tx| {
        let donation = load_donation(tx, id)?;
        authorize(Some(&principal), Action::View, Target::Donation(&donation))
          .into_result()?;
        Ok(donation)
      })
      .await
  }

  /// Donations where the principal is donor or recipient.
  pub async fn my_donations(&self, principal: &Principal) -> Result<Vec<Donation>> {
    let me = principal.user_id;
    self.read(move |tx| tx.donations_for(me)).await
  }
}
