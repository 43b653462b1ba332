//! Reviews between the two parties of a completed donation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Engine, Error, Result,
  authz::{Action, Target, authorize},
  donation::{Donation, DonationStatus},
  id::{DonationId, ReviewId, UserId},
  session::Principal,
  store::DonationStore,
  workflow::load_donation,
};

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
  pub id:          ReviewId,
  pub reviewer_id: UserId,
  pub reviewed_id: UserId,
  pub donation_id: DonationId,
  pub rating:      u8,
  pub comment:     Option<String>,
  pub created_at:  DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewReview {
  pub reviewer_id: UserId,
  pub reviewed_id: UserId,
  pub donation_id: DonationId,
  pub rating:      u8,
  pub comment:     Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewInput {
  pub donation_id: DonationId,
  #[serde(alias = "reviewedUserId")]
  pub reviewed_id: UserId,
  pub rating:      i64,
  pub comment:     Option<String>,
}

/// Reviews a user has received, with their aggregate.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewsReceived {
  pub user_id: UserId,
  pub count:   usize,
  /// `None` until the first review.
  pub average: Option<f64>,
  pub reviews: Vec<Review>,
}

impl ReviewsReceived {
  pub fn new(user_id: UserId, reviews: Vec<Review>) -> Self {
    let count = reviews.len();
    let average = (count > 0).then(|| {
      reviews.iter().map(|r| f64::from(r.rating)).sum::<f64>() / count as f64
    });
    Self { user_id, count, average, reviews }
  }
}

/// The review gate. Checks, in order: the reviewer is one party of
/// `donation` reviewing the other, the donation is COMPLETED, and the rating
/// is within range.
pub fn admit(
  reviewer: UserId,
  donation: &Donation,
  reviewed: UserId,
  rating: i64,
) -> Result<u8> {
  if donation.counterpart(reviewer) != Some(reviewed) {
    return Err(Error::Forbidden(
      "only a party of the donation may review the other party".into(),
    ));
  }
  if donation.status != DonationStatus::Completed {
    return Err(Error::InvalidState(format!(
      "donation {} is {}; only completed donations can be reviewed",
      donation.id, donation.status,
    )));
  }
  if !(MIN_RATING..=MAX_RATING).contains(&rating) {
    return Err(Error::InvalidInput(format!(
      "rating must be between {MIN_RATING} and {MAX_RATING}",
    )));
  }
  u8::try_from(rating).map_err(|_| Error::InvalidInput("rating out of range".into()))
}

impl<S: DonationStore> Engine<S> {
  /// Review the other party of a completed donation. Repeated reviews of
  /// the same donation are accepted.
  pub async fn submit_review(
    &self,
    principal: &Principal,
    input: ReviewInput,
  ) -> Result<Review> {
    let principal = principal.clone();
    let review = self
      .commit(move |tx, _| {
        let donation = load_donation(tx, input.donation_id)?;
        authorize(
          Some(&principal),
          Action::Review,
          Target::Review { donation: &donation, reviewed: input.reviewed_id },
        )
        .into_result()?;
        let rating = admit(principal.user_id, &donation, input.reviewed_id, input.rating)?;

        tx.insert_review(NewReview {
          reviewer_id: principal.user_id,
          reviewed_id: input.reviewed_id,
          donation_id: donation.id,
          rating,
          comment: input.comment,
        })
      })
      .await?;

    tracing::info!(
      review_id = %review.id,
      donation_id = %review.donation_id,
      rating = review.rating,
      "review submitted",
    );
    Ok(review)
  }

  /// Public: reviews a user has received, newest first.
  pub async fn reviews_of(&self, user: UserId) -> Result<ReviewsReceived> {
    self
      .read(move |tx| {
        tx.user(user)?.ok_or_else(|| Error::not_found("user", user))?;
        Ok(ReviewsReceived::new(user, tx.reviews_of(user)?))
      })
      .await
  }
}
