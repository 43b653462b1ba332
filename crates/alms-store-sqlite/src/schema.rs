//! SQL schema for the Alms SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    id              INTEGER PRIMARY KEY,
    first_name      TEXT NOT NULL,
    last_name       TEXT NOT NULL,
    email           TEXT NOT NULL UNIQUE COLLATE NOCASE,
    phone           TEXT,
    address         TEXT,
    bio             TEXT,
    profile_picture TEXT,
    role            TEXT NOT NULL,   -- 'INDIVIDUAL' | 'RECIPIENT' | 'ADMIN'
    password_hash   TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    updated_at      TEXT
);

CREATE TABLE IF NOT EXISTS associations (
    id              INTEGER PRIMARY KEY,
    owner_id        INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
    name            TEXT NOT NULL,
    email           TEXT UNIQUE COLLATE NOCASE,
    password_hash   TEXT NOT NULL,
    phone           TEXT,
    address         TEXT,
    description     TEXT,
    foundation_date TEXT,            -- YYYY-MM-DD
    category        TEXT,
    logo_url        TEXT
);

-- An offer made on behalf of an association falls back to its owner as an
-- individual if the association is deleted.
CREATE TABLE IF NOT EXISTS offers (
    id                    INTEGER PRIMARY KEY,
    creator_id            INTEGER NOT NULL REFERENCES users(id),
    acting_association_id INTEGER REFERENCES associations(id) ON DELETE SET NULL,
    kind                  TEXT NOT NULL,
    title                 TEXT NOT NULL,
    description           TEXT NOT NULL,
    quantity              INTEGER NOT NULL CHECK (quantity >= 1),
    condition             TEXT,
    expiry_date           TEXT,
    location              TEXT,
    status                TEXT NOT NULL,
    created_at            TEXT NOT NULL,
    image_urls            TEXT NOT NULL DEFAULT '[]'   -- JSON array
);

CREATE TABLE IF NOT EXISTS applications (
    id               INTEGER PRIMARY KEY,
    offer_id         INTEGER NOT NULL REFERENCES offers(id),
    applicant_id     INTEGER NOT NULL REFERENCES users(id),
    message          TEXT,
    status           TEXT NOT NULL,
    response_message TEXT,
    created_at       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS donations (
    id                  INTEGER PRIMARY KEY,
    offer_id            INTEGER NOT NULL REFERENCES offers(id),
    donor_id            INTEGER NOT NULL REFERENCES users(id),
    recipient_id        INTEGER NOT NULL REFERENCES users(id),
    application_id      INTEGER NOT NULL UNIQUE REFERENCES applications(id),
    handover_date       TEXT,
    status              TEXT NOT NULL,
    feedback_donor      TEXT,
    feedback_recipient  TEXT,
    cancellation_reason TEXT,
    created_at          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS reviews (
    id          INTEGER PRIMARY KEY,
    reviewer_id INTEGER NOT NULL REFERENCES users(id),
    reviewed_id INTEGER NOT NULL REFERENCES users(id),
    donation_id INTEGER NOT NULL REFERENCES donations(id),
    rating      INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
    comment     TEXT,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS messages (
    id               INTEGER PRIMARY KEY,
    sender_id        INTEGER NOT NULL REFERENCES users(id),
    receiver_id      INTEGER NOT NULL REFERENCES users(id),
    related_offer_id INTEGER REFERENCES offers(id),
    content          TEXT NOT NULL,
    sent_at          TEXT NOT NULL,
    read_at          TEXT
);

CREATE TABLE IF NOT EXISTS notifications (
    id                     INTEGER PRIMARY KEY,
    user_id                INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    kind                   TEXT NOT NULL,
    related_offer_id       INTEGER,
    related_application_id INTEGER,
    related_message_id     INTEGER,
    message                TEXT NOT NULL,
    is_read                INTEGER NOT NULL DEFAULT 0,
    created_at             TEXT NOT NULL
);

-- Workflow events awaiting notification dispatch. Rows are deleted once
-- their notifications are written.
CREATE TABLE IF NOT EXISTS outbox (
    id            INTEGER PRIMARY KEY,
    payload       TEXT NOT NULL,     -- JSON-encoded WorkflowEvent
    created_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS offers_status_idx        ON offers(status, expiry_date);
CREATE INDEX IF NOT EXISTS offers_creator_idx       ON offers(creator_id);
CREATE INDEX IF NOT EXISTS applications_offer_idx   ON applications(offer_id, applicant_id);
CREATE INDEX IF NOT EXISTS applications_user_idx    ON applications(applicant_id);
CREATE INDEX IF NOT EXISTS donations_donor_idx      ON donations(donor_id);
CREATE INDEX IF NOT EXISTS donations_recipient_idx  ON donations(recipient_id);
CREATE INDEX IF NOT EXISTS reviews_reviewed_idx     ON reviews(reviewed_id);
CREATE INDEX IF NOT EXISTS messages_pair_idx        ON messages(sender_id, receiver_id);
CREATE INDEX IF NOT EXISTS messages_receiver_idx    ON messages(receiver_id);
CREATE INDEX IF NOT EXISTS notifications_user_idx   ON notifications(user_id, is_read);

PRAGMA user_version = 1;
";
