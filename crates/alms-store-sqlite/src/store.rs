//! [`SqliteStore`], the SQLite implementation of [`DonationStore`].

use std::{future::Future, path::Path};

use chrono::Utc;
use rusqlite::{OptionalExtension as _, Params, Row, TransactionBehavior, params};

use alms_core::{
  Result as CoreResult,
  account::{Association, AssociationQuery, NewAssociation, NewUser, User},
  application::{Application, ApplicationQuery, ApplicationStatus, NewApplication},
  donation::{Donation, DonationStatus, NewDonation},
  id::{
    ApplicationId, AssociationId, DonationId, EventId, MessageId, NotificationId,
    OfferId, ReviewId, UserId,
  },
  message::{Message, NewMessage},
  notification::{NewNotification, Notification},
  notify::WorkflowEvent,
  offer::{DonationOffer, NewOffer, OfferQuery, OfferStatus},
  review::{NewReview, Review},
  session::Actor,
  store::{DonationStore, Tx},
};

use crate::{
  Error, Result,
  encode::{dt, encode_date, encode_dt, encode_opt_dt, json, opt_date, opt_dt, parsed},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An Alms donation store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path_display = path.as_ref().display().to_string();
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    tracing::info!(path = %path_display, "opened sqlite store");
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

impl DonationStore for SqliteStore {
  fn transact<T, F>(&self, f: F) -> impl Future<Output = CoreResult<T>> + Send + '_
  where
    T: Send + 'static,
    F: FnOnce(&mut dyn Tx) -> CoreResult<T> + Send + 'static,
  {
    async move {
      // IMMEDIATE takes the write lock up front, so a transaction never has
      // to upgrade from a read snapshot that another writer invalidated.
      let outcome = self
        .conn
        .call(move |conn| {
          let txn = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
          let outcome = f(&mut SqliteTx { conn: &txn });
          if outcome.is_ok() {
            txn.commit()?;
          }
          Ok(outcome)
        })
        .await
        .map_err(Error::from)?;

      if let Err(e) = &outcome {
        tracing::debug!(error = %e, "transaction rolled back");
      }
      outcome
    }
  }
}

// ─── Transaction view ────────────────────────────────────────────────────────

/// A [`Tx`] over an open SQLite transaction.
struct SqliteTx<'c> {
  conn: &'c rusqlite::Connection,
}

impl SqliteTx<'_> {
  fn one<T, P: Params>(
    &self,
    sql: &str,
    params: P,
    map: impl FnOnce(&Row<'_>) -> rusqlite::Result<T>,
  ) -> CoreResult<Option<T>> {
    Ok(self.conn.query_row(sql, params, map).optional().map_err(Error::from)?)
  }

  fn all<T, P: Params>(
    &self,
    sql: &str,
    params: P,
    map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
  ) -> CoreResult<Vec<T>> {
    let run = move || -> rusqlite::Result<Vec<T>> {
      let mut stmt = self.conn.prepare_cached(sql)?;
      let rows = stmt.query_map(params, map)?.collect::<rusqlite::Result<Vec<_>>>()?;
      Ok(rows)
    };
    Ok(run().map_err(Error::from)?)
  }

  fn exec<P: Params>(&self, sql: &str, params: P) -> CoreResult<usize> {
    Ok(self.conn.execute(sql, params).map_err(Error::from)?)
  }

  /// Run an INSERT and return the new rowid.
  fn insert<P: Params>(&self, sql: &str, params: P) -> CoreResult<i64> {
    self.exec(sql, params)?;
    Ok(self.conn.last_insert_rowid())
  }
}

/// Escape `LIKE` wildcards so `needle` matches literally under `ESCAPE '\'`.
fn escape_like(needle: &str) -> String {
  let mut out = String::with_capacity(needle.len());
  for c in needle.chars() {
    if matches!(c, '\\' | '%' | '_') {
      out.push('\\');
    }
    out.push(c);
  }
  out
}

// ─── Row mapping ─────────────────────────────────────────────────────────────

const USER_COLS: &str = "id, first_name, last_name, email, phone, address, bio, \
                         profile_picture, role, password_hash, created_at, updated_at";

fn user_row(row: &Row<'_>) -> rusqlite::Result<User> {
  Ok(User {
    id:              UserId(row.get(0)?),
    first_name:      row.get(1)?,
    last_name:       row.get(2)?,
    email:           row.get(3)?,
    phone:           row.get(4)?,
    address:         row.get(5)?,
    bio:             row.get(6)?,
    profile_picture: row.get(7)?,
    role:            parsed(row, 8)?,
    password_hash:   row.get(9)?,
    created_at:      dt(row, 10)?,
    updated_at:      opt_dt(row, 11)?,
  })
}

const ASSOCIATION_COLS: &str = "id, owner_id, name, email, password_hash, phone, \
                                address, description, foundation_date, category, logo_url";

fn association_row(row: &Row<'_>) -> rusqlite::Result<Association> {
  Ok(Association {
    id:              AssociationId(row.get(0)?),
    owner_id:        UserId(row.get(1)?),
    name:            row.get(2)?,
    email:           row.get(3)?,
    password_hash:   row.get(4)?,
    phone:           row.get(5)?,
    address:         row.get(6)?,
    description:     row.get(7)?,
    foundation_date: opt_date(row, 8)?,
    category:        row.get(9)?,
    logo_url:        row.get(10)?,
  })
}

const OFFER_COLS: &str = "id, creator_id, acting_association_id, kind, title, \
                          description, quantity, condition, expiry_date, location, \
                          status, created_at, image_urls";

fn offer_row(row: &Row<'_>) -> rusqlite::Result<DonationOffer> {
  let user_id = UserId(row.get(1)?);
  let creator = match row.get::<_, Option<i64>>(2)? {
    Some(a) => Actor::Association { user_id, association_id: AssociationId(a) },
    None => Actor::Individual { user_id },
  };
  Ok(DonationOffer {
    id: OfferId(row.get(0)?),
    creator,
    kind: parsed(row, 3)?,
    title: row.get(4)?,
    description: row.get(5)?,
    quantity: row.get(6)?,
    condition: row.get(7)?,
    expiry_date: opt_dt(row, 8)?,
    location: row.get(9)?,
    status: parsed(row, 10)?,
    created_at: dt(row, 11)?,
    image_urls: json(row, 12)?,
  })
}

const APPLICATION_COLS: &str =
  "id, offer_id, applicant_id, message, status, response_message, created_at";

fn application_row(row: &Row<'_>) -> rusqlite::Result<Application> {
  Ok(Application {
    id:               ApplicationId(row.get(0)?),
    offer_id:         OfferId(row.get(1)?),
    applicant_id:     UserId(row.get(2)?),
    message:          row.get(3)?,
    status:           parsed(row, 4)?,
    response_message: row.get(5)?,
    created_at:       dt(row, 6)?,
  })
}

const DONATION_COLS: &str = "id, offer_id, donor_id, recipient_id, application_id, \
                             handover_date, status, feedback_donor, feedback_recipient, \
                             cancellation_reason, created_at";

fn donation_row(row: &Row<'_>) -> rusqlite::Result<Donation> {
  Ok(Donation {
    id:                  DonationId(row.get(0)?),
    offer_id:            OfferId(row.get(1)?),
    donor_id:            UserId(row.get(2)?),
    recipient_id:        UserId(row.get(3)?),
    application_id:      ApplicationId(row.get(4)?),
    handover_date:       opt_dt(row, 5)?,
    status:              parsed(row, 6)?,
    feedback_donor:      row.get(7)?,
    feedback_recipient:  row.get(8)?,
    cancellation_reason: row.get(9)?,
    created_at:          dt(row, 10)?,
  })
}

const REVIEW_COLS: &str =
  "id, reviewer_id, reviewed_id, donation_id, rating, comment, created_at";

fn review_row(row: &Row<'_>) -> rusqlite::Result<Review> {
  Ok(Review {
    id:          ReviewId(row.get(0)?),
    reviewer_id: UserId(row.get(1)?),
    reviewed_id: UserId(row.get(2)?),
    donation_id: DonationId(row.get(3)?),
    rating:      row.get(4)?,
    comment:     row.get(5)?,
    created_at:  dt(row, 6)?,
  })
}

const NOTIFICATION_COLS: &str = "id, user_id, kind, related_offer_id, \
                                 related_application_id, related_message_id, message, \
                                 is_read, created_at";

fn notification_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
  Ok(Notification {
    id:                     NotificationId(row.get(0)?),
    user_id:                UserId(row.get(1)?),
    kind:                   parsed(row, 2)?,
    related_offer_id:       row.get::<_, Option<i64>>(3)?.map(OfferId),
    related_application_id: row.get::<_, Option<i64>>(4)?.map(ApplicationId),
    related_message_id:     row.get::<_, Option<i64>>(5)?.map(MessageId),
    message:                row.get(6)?,
    is_read:                row.get(7)?,
    created_at:             dt(row, 8)?,
  })
}

const MESSAGE_COLS: &str =
  "id, sender_id, receiver_id, related_offer_id, content, sent_at, read_at";

fn message_row(row: &Row<'_>) -> rusqlite::Result<Message> {
  Ok(Message {
    id:               MessageId(row.get(0)?),
    sender_id:        UserId(row.get(1)?),
    receiver_id:      UserId(row.get(2)?),
    related_offer_id: row.get::<_, Option<i64>>(3)?.map(OfferId),
    content:          row.get(4)?,
    sent_at:          dt(row, 5)?,
    read_at:          opt_dt(row, 6)?,
  })
}

// ─── Tx impl ─────────────────────────────────────────────────────────────────

impl Tx for SqliteTx<'_> {
  // ── Users ─────────────────────────────────────────────────────────────

  fn user(&self, id: UserId) -> CoreResult<Option<User>> {
    self.one(&format!("SELECT {USER_COLS} FROM users WHERE id = ?1"), [id.0], user_row)
  }

  fn user_by_email(&self, email: &str) -> CoreResult<Option<User>> {
    self.one(
      &format!("SELECT {USER_COLS} FROM users WHERE email = ?1"),
      [email],
      user_row,
    )
  }

  fn users(&self) -> CoreResult<Vec<User>> {
    self.all(&format!("SELECT {USER_COLS} FROM users ORDER BY id"), [], user_row)
  }

  fn insert_user(&mut self, input: NewUser) -> CoreResult<User> {
    let created_at = Utc::now();
    let id = self.insert(
      "INSERT INTO users (
         first_name, last_name, email, phone, address, role, password_hash, created_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
      params![
        input.first_name,
        input.last_name,
        input.email,
        input.phone,
        input.address,
        input.role.to_string(),
        input.password_hash,
        encode_dt(created_at),
      ],
    )?;

    Ok(User {
      id: UserId(id),
      first_name: input.first_name,
      last_name: input.last_name,
      email: input.email,
      phone: input.phone,
      address: input.address,
      bio: None,
      profile_picture: None,
      role: input.role,
      password_hash: input.password_hash,
      created_at,
      updated_at: None,
    })
  }

  fn update_user(&mut self, user: &User) -> CoreResult<()> {
    self.exec(
      "UPDATE users SET
         first_name = ?2, last_name = ?3, email = ?4, phone = ?5, address = ?6,
         bio = ?7, profile_picture = ?8, role = ?9, password_hash = ?10, updated_at = ?11
       WHERE id = ?1",
      params![
        user.id.0,
        user.first_name,
        user.last_name,
        user.email,
        user.phone,
        user.address,
        user.bio,
        user.profile_picture,
        user.role.to_string(),
        user.password_hash,
        encode_opt_dt(user.updated_at),
      ],
    )?;
    Ok(())
  }

  fn delete_user(&mut self, id: UserId) -> CoreResult<bool> {
    Ok(self.exec("DELETE FROM users WHERE id = ?1", [id.0])? > 0)
  }

  fn user_has_history(&self, id: UserId) -> CoreResult<bool> {
    let found = self.one(
      "SELECT EXISTS (SELECT 1 FROM offers       WHERE creator_id = ?1)
           OR EXISTS (SELECT 1 FROM applications WHERE applicant_id = ?1)
           OR EXISTS (SELECT 1 FROM donations    WHERE donor_id = ?1 OR recipient_id = ?1)
           OR EXISTS (SELECT 1 FROM reviews      WHERE reviewer_id = ?1 OR reviewed_id = ?1)
           OR EXISTS (SELECT 1 FROM messages     WHERE sender_id = ?1 OR receiver_id = ?1)",
      [id.0],
      |row| row.get::<_, bool>(0),
    )?;
    Ok(found.unwrap_or(false))
  }

  // ── Associations ──────────────────────────────────────────────────────

  fn association(&self, id: AssociationId) -> CoreResult<Option<Association>> {
    self.one(
      &format!("SELECT {ASSOCIATION_COLS} FROM associations WHERE id = ?1"),
      [id.0],
      association_row,
    )
  }

  fn association_by_owner(&self, owner: UserId) -> CoreResult<Option<Association>> {
    self.one(
      &format!("SELECT {ASSOCIATION_COLS} FROM associations WHERE owner_id = ?1"),
      [owner.0],
      association_row,
    )
  }

  fn association_by_email(&self, email: &str) -> CoreResult<Option<Association>> {
    self.one(
      &format!("SELECT {ASSOCIATION_COLS} FROM associations WHERE email = ?1"),
      [email],
      association_row,
    )
  }

  fn associations(&self, query: &AssociationQuery) -> CoreResult<Vec<Association>> {
    self.all(
      &format!(
        "SELECT {ASSOCIATION_COLS} FROM associations
         WHERE (?1 IS NULL OR name LIKE '%' || ?1 || '%' ESCAPE '\\')
           AND (?2 IS NULL OR category = ?2 COLLATE NOCASE)
         ORDER BY name, id"
      ),
      params![query.name.as_deref().map(escape_like), query.category],
      association_row,
    )
  }

  fn insert_association(&mut self, input: NewAssociation) -> CoreResult<Association> {
    let id = self.insert(
      "INSERT INTO associations (
         owner_id, name, email, password_hash, phone, address,
         description, foundation_date, category, logo_url
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
      params![
        input.owner_id.0,
        input.name,
        input.email,
        input.password_hash,
        input.phone,
        input.address,
        input.description,
        encode_date(input.foundation_date),
        input.category,
        input.logo_url,
      ],
    )?;

    Ok(Association {
      id:              AssociationId(id),
      owner_id:        input.owner_id,
      name:            input.name,
      email:           input.email,
      password_hash:   input.password_hash,
      phone:           input.phone,
      address:         input.address,
      description:     input.description,
      foundation_date: input.foundation_date,
      category:        input.category,
      logo_url:        input.logo_url,
    })
  }

  fn update_association(&mut self, a: &Association) -> CoreResult<()> {
    self.exec(
      "UPDATE associations SET
         owner_id = ?2, name = ?3, email = ?4, password_hash = ?5, phone = ?6,
         address = ?7, description = ?8, foundation_date = ?9, category = ?10,
         logo_url = ?11
       WHERE id = ?1",
      params![
        a.id.0,
        a.owner_id.0,
        a.name,
        a.email,
        a.password_hash,
        a.phone,
        a.address,
        a.description,
        encode_date(a.foundation_date),
        a.category,
        a.logo_url,
      ],
    )?;
    Ok(())
  }

  fn delete_association(&mut self, id: AssociationId) -> CoreResult<bool> {
    Ok(self.exec("DELETE FROM associations WHERE id = ?1", [id.0])? > 0)
  }

  // ── Offers ────────────────────────────────────────────────────────────

  fn offer(&self, id: OfferId) -> CoreResult<Option<DonationOffer>> {
    self.one(&format!("SELECT {OFFER_COLS} FROM offers WHERE id = ?1"), [id.0], offer_row)
  }

  fn offers(&self, query: &OfferQuery) -> CoreResult<Vec<DonationOffer>> {
    self.all(
      &format!(
        "SELECT {OFFER_COLS} FROM offers
         WHERE (?1 IS NULL OR status = ?1)
           AND (?2 IS NULL OR kind = ?2)
           AND (?3 IS NULL OR creator_id = ?3)
           AND (?4 IS NULL OR (status = ?5 AND expiry_date IS NOT NULL AND expiry_date <= ?4))
         ORDER BY created_at DESC, id DESC"
      ),
      params![
        query.status.map(|s| s.to_string()),
        query.kind.map(|k| k.to_string()),
        query.creator_id.map(|c| c.0),
        encode_opt_dt(query.expiring_before),
        OfferStatus::Active.to_string(),
      ],
      offer_row,
    )
  }

  fn insert_offer(&mut self, input: NewOffer) -> CoreResult<DonationOffer> {
    let created_at = Utc::now();
    let status = OfferStatus::Active;
    let image_urls = serde_json::to_string(&input.image_urls)?;
    let id = self.insert(
      "INSERT INTO offers (
         creator_id, acting_association_id, kind, title, description, quantity,
         condition, expiry_date, location, status, created_at, image_urls
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
      params![
        input.creator.user_id().0,
        input.creator.association_id().map(|a| a.0),
        input.kind.to_string(),
        input.title,
        input.description,
        input.quantity,
        input.condition,
        encode_opt_dt(input.expiry_date),
        input.location,
        status.to_string(),
        encode_dt(created_at),
        image_urls,
      ],
    )?;

    Ok(DonationOffer {
      id: OfferId(id),
      creator: input.creator,
      kind: input.kind,
      title: input.title,
      description: input.description,
      quantity: input.quantity,
      condition: input.condition,
      expiry_date: input.expiry_date,
      location: input.location,
      status,
      created_at,
      image_urls: input.image_urls,
    })
  }

  fn update_offer(&mut self, offer: &DonationOffer) -> CoreResult<()> {
    self.exec(
      "UPDATE offers SET
         kind = ?2, title = ?3, description = ?4, quantity = ?5, condition = ?6,
         expiry_date = ?7, location = ?8, status = ?9, image_urls = ?10
       WHERE id = ?1",
      params![
        offer.id.0,
        offer.kind.to_string(),
        offer.title,
        offer.description,
        offer.quantity,
        offer.condition,
        encode_opt_dt(offer.expiry_date),
        offer.location,
        offer.status.to_string(),
        serde_json::to_string(&offer.image_urls)?,
      ],
    )?;
    Ok(())
  }

  // ── Applications ──────────────────────────────────────────────────────

  fn application(&self, id: ApplicationId) -> CoreResult<Option<Application>> {
    self.one(
      &format!("SELECT {APPLICATION_COLS} FROM applications WHERE id = ?1"),
      [id.0],
      application_row,
    )
  }

  fn applications(&self, query: &ApplicationQuery) -> CoreResult<Vec<Application>> {
    self.all(
      &format!(
        "SELECT {APPLICATION_COLS} FROM applications
         WHERE (?1 IS NULL OR offer_id = ?1)
           AND (?2 IS NULL OR applicant_id = ?2)
         ORDER BY id"
      ),
      params![query.offer_id.map(|o| o.0), query.applicant_id.map(|a| a.0)],
      application_row,
    )
  }

  fn insert_application(&mut self, input: NewApplication) -> CoreResult<Application> {
    let created_at = Utc::now();
    let status = ApplicationStatus::Pending;
    let id = self.insert(
      "INSERT INTO applications (offer_id, applicant_id, message, status, created_at)
       VALUES (?1, ?2, ?3, ?4, ?5)",
      params![
        input.offer_id.0,
        input.applicant_id.0,
        input.message,
        status.to_string(),
        encode_dt(created_at),
      ],
    )?;

    Ok(Application {
      id: ApplicationId(id),
      offer_id: input.offer_id,
      applicant_id: input.applicant_id,
      message: input.message,
      status,
      response_message: None,
      created_at,
    })
  }

  fn update_application(&mut self, application: &Application) -> CoreResult<()> {
    self.exec(
      "UPDATE applications SET status = ?2, response_message = ?3 WHERE id = ?1",
      params![
        application.id.0,
        application.status.to_string(),
        application.response_message,
      ],
    )?;
    Ok(())
  }

  // ── Donations ─────────────────────────────────────────────────────────

  fn donation(&self, id: DonationId) -> CoreResult<Option<Donation>> {
    self.one(
      &format!("SELECT {DONATION_COLS} FROM donations WHERE id = ?1"),
      [id.0],
      donation_row,
    )
  }

  fn donations_for(&self, user: UserId) -> CoreResult<Vec<Donation>> {
    self.all(
      &format!(
        "SELECT {DONATION_COLS} FROM donations
         WHERE donor_id = ?1 OR recipient_id = ?1
         ORDER BY id DESC"
      ),
      [user.0],
      donation_row,
    )
  }

  fn insert_donation(&mut self, input: NewDonation) -> CoreResult<Donation> {
    let created_at = Utc::now();
    let status = DonationStatus::Scheduled;
    let id = self.insert(
      "INSERT INTO donations (
         offer_id, donor_id, recipient_id, application_id, handover_date, status, created_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
      params![
        input.offer_id.0,
        input.donor_id.0,
        input.recipient_id.0,
        input.application_id.0,
        encode_opt_dt(input.handover_date),
        status.to_string(),
        encode_dt(created_at),
      ],
    )?;

    Ok(Donation {
      id: DonationId(id),
      offer_id: input.offer_id,
      donor_id: input.donor_id,
      recipient_id: input.recipient_id,
      application_id: input.application_id,
      handover_date: input.handover_date,
      status,
      feedback_donor: None,
      feedback_recipient: None,
      cancellation_reason: None,
      created_at,
    })
  }

  fn update_donation(&mut self, d: &Donation) -> CoreResult<()> {
    self.exec(
      "UPDATE donations SET
         handover_date = ?2, status = ?3, feedback_donor = ?4,
         feedback_recipient = ?5, cancellation_reason = ?6
       WHERE id = ?1",
      params![
        d.id.0,
        encode_opt_dt(d.handover_date),
        d.status.to_string(),
        d.feedback_donor,
        d.feedback_recipient,
        d.cancellation_reason,
      ],
    )?;
    Ok(())
  }

  // ── Reviews ───────────────────────────────────────────────────────────

  fn insert_review(&mut self, input: NewReview) -> CoreResult<Review> {
    let created_at = Utc::now();
    let id = self.insert(
      "INSERT INTO reviews (reviewer_id, reviewed_id, donation_id, rating, comment, created_at)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
      params![
        input.reviewer_id.0,
        input.reviewed_id.0,
        input.donation_id.0,
        input.rating,
        input.comment,
        encode_dt(created_at),
      ],
    )?;

    Ok(Review {
      id: ReviewId(id),
      reviewer_id: input.reviewer_id,
      reviewed_id: input.reviewed_id,
      donation_id: input.donation_id,
      rating: input.rating,
      comment: input.comment,
      created_at,
    })
  }

  fn reviews_of(&self, user: UserId) -> CoreResult<Vec<Review>> {
    self.all(
      &format!("SELECT {REVIEW_COLS} FROM reviews WHERE reviewed_id = ?1 ORDER BY id DESC"),
      [user.0],
      review_row,
    )
  }

  // ── Notifications ─────────────────────────────────────────────────────

  fn notification(&self, id: NotificationId) -> CoreResult<Option<Notification>> {
    self.one(
      &format!("SELECT {NOTIFICATION_COLS} FROM notifications WHERE id = ?1"),
      [id.0],
      notification_row,
    )
  }

  fn notifications_for(
    &self,
    user: UserId,
    unread_only: bool,
  ) -> CoreResult<Vec<Notification>> {
    self.all(
      &format!(
        "SELECT {NOTIFICATION_COLS} FROM notifications
         WHERE user_id = ?1 AND (?2 = 0 OR is_read = 0)
         ORDER BY id DESC"
      ),
      params![user.0, unread_only],
      notification_row,
    )
  }

  fn insert_notification(&mut self, input: NewNotification) -> CoreResult<Notification> {
    let created_at = Utc::now();
    let id = self.insert(
      "INSERT INTO notifications (
         user_id, kind, related_offer_id, related_application_id, related_message_id,
         message, created_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
      params![
        input.user_id.0,
        input.kind.to_string(),
        input.related_offer_id.map(|o| o.0),
        input.related_application_id.map(|a| a.0),
        input.related_message_id.map(|m| m.0),
        input.message,
        encode_dt(created_at),
      ],
    )?;

    Ok(Notification {
      id: NotificationId(id),
      user_id: input.user_id,
      kind: input.kind,
      related_offer_id: input.related_offer_id,
      related_application_id: input.related_application_id,
      related_message_id: input.related_message_id,
      message: input.message,
      is_read: false,
      created_at,
    })
  }

  fn set_notification_read(&mut self, id: NotificationId) -> CoreResult<()> {
    self.exec("UPDATE notifications SET is_read = 1 WHERE id = ?1", [id.0])?;
    Ok(())
  }

  // ── Messages ──────────────────────────────────────────────────────────

  fn message(&self, id: MessageId) -> CoreResult<Option<Message>> {
    self.one(
      &format!("SELECT {MESSAGE_COLS} FROM messages WHERE id = ?1"),
      [id.0],
      message_row,
    )
  }

  fn insert_message(&mut self, input: NewMessage) -> CoreResult<Message> {
    let sent_at = Utc::now();
    let id = self.insert(
      "INSERT INTO messages (sender_id, receiver_id, related_offer_id, content, sent_at)
       VALUES (?1, ?2, ?3, ?4, ?5)",
      params![
        input.sender_id.0,
        input.receiver_id.0,
        input.related_offer_id.map(|o| o.0),
        input.content,
        encode_dt(sent_at),
      ],
    )?;

    Ok(Message {
      id: MessageId(id),
      sender_id: input.sender_id,
      receiver_id: input.receiver_id,
      related_offer_id: input.related_offer_id,
      content: input.content,
      sent_at,
      read_at: None,
    })
  }

  fn update_message(&mut self, message: &Message) -> CoreResult<()> {
    self.exec(
      "UPDATE messages SET read_at = ?2 WHERE id = ?1",
      params![message.id.0, encode_opt_dt(message.read_at)],
    )?;
    Ok(())
  }

  fn conversation(&self, a: UserId, b: UserId) -> CoreResult<Vec<Message>> {
    self.all(
      &format!(
        "SELECT {MESSAGE_COLS} FROM messages
         WHERE (sender_id = ?1 AND receiver_id = ?2)
            OR (sender_id = ?2 AND receiver_id = ?1)
         ORDER BY sent_at, id"
      ),
      [a.0, b.0],
      message_row,
    )
  }

  fn inbox(&self, user: UserId) -> CoreResult<Vec<Message>> {
    self.all(
      &format!("SELECT {MESSAGE_COLS} FROM messages WHERE receiver_id = ?1 ORDER BY id DESC"),
      [user.0],
      message_row,
    )
  }

  // ── Event outbox ──────────────────────────────────────────────────────

  fn enqueue_event(&mut self, event: &WorkflowEvent) -> CoreResult<EventId> {
    let id = self.insert(
      "INSERT INTO outbox (payload, created_at) VALUES (?1, ?2)",
      params![serde_json::to_string(event)?, encode_dt(Utc::now())],
    )?;
    Ok(EventId(id))
  }

  fn pending_events(&self, limit: usize) -> CoreResult<Vec<(EventId, WorkflowEvent)>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    self.all(
      "SELECT id, payload FROM outbox ORDER BY id LIMIT ?1",
      [limit],
      |row| Ok((EventId(row.get(0)?), json(row, 1)?)),
    )
  }

  fn ack_event(&mut self, id: EventId) -> CoreResult<()> {
    self.exec("DELETE FROM outbox WHERE id = ?1", [id.0])?;
    Ok(())
  }
}
