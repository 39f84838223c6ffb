//! SQL schema for the Remand SQLite store, plus per-kind table metadata.
//!
//! Every entity kind has a master table (current state, mutated in place,
//! never deleted) and a history table (immutable `[valid_from, valid_to)`
//! snapshots). The history primary key exists only because SQLite wants one;
//! the join key shared with the master table is non-unique in the history
//! table, so historical foreign-key columns carry no REFERENCES constraint.

use remand_core::entity::EntityKind;

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS scrape_sessions (
    session_id   TEXT PRIMARY KEY,
    region       TEXT NOT NULL,
    started_at   TEXT NOT NULL,
    committed_at TEXT NOT NULL,
    complete     INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS sessions_region_idx
    ON scrape_sessions(region, complete, started_at);

-- ── Person ────────────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS person (
    person_id          INTEGER PRIMARY KEY,
    version            INTEGER NOT NULL DEFAULT 0,
    region             TEXT NOT NULL,
    external_id        TEXT,
    surname            TEXT,
    given_names        TEXT,
    birthdate          TEXT,
    gender             TEXT,
    race               TEXT,
    ethnicity          TEXT,
    place_of_residence TEXT
);

CREATE INDEX IF NOT EXISTS person_external_idx  ON person(region, external_id);
CREATE INDEX IF NOT EXISTS person_composite_idx ON person(region, surname, given_names, birthdate);

CREATE TABLE IF NOT EXISTS person_history (
    -- Never reference this key; join on person_id (non-unique here).
    person_history_id  INTEGER PRIMARY KEY,
    person_id          INTEGER NOT NULL,
    valid_from         TEXT NOT NULL,
    valid_to           TEXT,
    region             TEXT NOT NULL,
    external_id        TEXT,
    surname            TEXT,
    given_names        TEXT,
    birthdate          TEXT,
    gender             TEXT,
    race               TEXT,
    ethnicity          TEXT,
    place_of_residence TEXT
);

CREATE INDEX IF NOT EXISTS person_history_idx ON person_history(person_id, valid_from);

-- ── Booking ───────────────────────────────────────────────────────────────

-- last_seen_time lives only on the master row: it is refreshed by every
-- scrape that observes the booking, and keeping it out of the history table
-- means a no-op re-scrape opens no snapshot.
CREATE TABLE IF NOT EXISTS booking (
    booking_id             INTEGER PRIMARY KEY,
    version                INTEGER NOT NULL DEFAULT 0,
    person_id              INTEGER NOT NULL REFERENCES person(person_id),
    last_seen_time         TEXT NOT NULL,
    external_id            TEXT,
    admission_date         TEXT,
    admission_reason       TEXT,
    projected_release_date TEXT,
    release_date           TEXT,
    release_reason         TEXT,
    custody_status         TEXT,
    facility               TEXT,
    classification         TEXT
);

CREATE INDEX IF NOT EXISTS booking_person_idx   ON booking(person_id);
CREATE INDEX IF NOT EXISTS booking_external_idx ON booking(person_id, external_id);
CREATE INDEX IF NOT EXISTS booking_seen_idx     ON booking(last_seen_time);

CREATE TABLE IF NOT EXISTS booking_history (
    booking_history_id     INTEGER PRIMARY KEY,
    booking_id             INTEGER NOT NULL,
    valid_from             TEXT NOT NULL,
    valid_to               TEXT,
    person_id              INTEGER NOT NULL,
    external_id            TEXT,
    admission_date         TEXT,
    admission_reason       TEXT,
    projected_release_date TEXT,
    release_date           TEXT,
    release_reason         TEXT,
    custody_status         TEXT,
    facility               TEXT,
    classification         TEXT
);

CREATE INDEX IF NOT EXISTS booking_history_idx        ON booking_history(booking_id, valid_from);
CREATE INDEX IF NOT EXISTS booking_history_person_idx ON booking_history(person_id);

-- ── Arrest ────────────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS arrest (
    arrest_id    INTEGER PRIMARY KEY,
    version      INTEGER NOT NULL DEFAULT 0,
    booking_id   INTEGER NOT NULL REFERENCES booking(booking_id),
    external_id  TEXT,
    date         TEXT,
    location     TEXT,
    agency       TEXT,
    officer_name TEXT,
    officer_id   TEXT
);

CREATE INDEX IF NOT EXISTS arrest_booking_idx ON arrest(booking_id);

CREATE TABLE IF NOT EXISTS arrest_history (
    arrest_history_id INTEGER PRIMARY KEY,
    arrest_id         INTEGER NOT NULL,
    valid_from        TEXT NOT NULL,
    valid_to          TEXT,
    booking_id        INTEGER NOT NULL,
    external_id       TEXT,
    date              TEXT,
    location          TEXT,
    agency            TEXT,
    officer_name      TEXT,
    officer_id        TEXT
);

CREATE INDEX IF NOT EXISTS arrest_history_idx         ON arrest_history(arrest_id, valid_from);
CREATE INDEX IF NOT EXISTS arrest_history_booking_idx ON arrest_history(booking_id);

-- ── Bond ──────────────────────────────────────────────────────────────────

-- Bonds and sentences have no parent column; they are reached through
-- charge.bond_id / charge.sentence_id.
CREATE TABLE IF NOT EXISTS bond (
    bond_id     INTEGER PRIMARY KEY,
    version     INTEGER NOT NULL DEFAULT 0,
    external_id TEXT,
    amount      TEXT,
    bond_type   TEXT,
    status      TEXT
);

CREATE TABLE IF NOT EXISTS bond_history (
    bond_history_id INTEGER PRIMARY KEY,
    bond_id         INTEGER NOT NULL,
    valid_from      TEXT NOT NULL,
    valid_to        TEXT,
    external_id     TEXT,
    amount          TEXT,
    bond_type       TEXT,
    status          TEXT
);

CREATE INDEX IF NOT EXISTS bond_history_idx ON bond_history(bond_id, valid_from);

-- ── Sentence ──────────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS sentence (
    sentence_id     INTEGER PRIMARY KEY,
    version         INTEGER NOT NULL DEFAULT 0,
    external_id     TEXT,
    min_length      TEXT,
    max_length      TEXT,
    is_life         TEXT,
    is_probation    TEXT,
    is_suspended    TEXT,
    fine            TEXT,
    parole_possible TEXT,
    status          TEXT
);

CREATE TABLE IF NOT EXISTS sentence_history (
    sentence_history_id INTEGER PRIMARY KEY,
    sentence_id         INTEGER NOT NULL,
    valid_from          TEXT NOT NULL,
    valid_to            TEXT,
    external_id         TEXT,
    min_length          TEXT,
    max_length          TEXT,
    is_life             TEXT,
    is_probation        TEXT,
    is_suspended        TEXT,
    fine                TEXT,
    parole_possible     TEXT,
    status              TEXT
);

CREATE INDEX IF NOT EXISTS sentence_history_idx ON sentence_history(sentence_id, valid_from);

-- ── Charge ────────────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS charge (
    charge_id        INTEGER PRIMARY KEY,
    version          INTEGER NOT NULL DEFAULT 0,
    booking_id       INTEGER NOT NULL REFERENCES booking(booking_id),
    bond_id          INTEGER REFERENCES bond(bond_id),
    sentence_id      INTEGER REFERENCES sentence(sentence_id),
    external_id      TEXT,
    offense_date     TEXT,
    statute          TEXT,
    name             TEXT,
    degree           TEXT,
    charge_class     TEXT,
    level            TEXT,
    status           TEXT,
    number_of_counts TEXT,
    court_type       TEXT,
    case_number      TEXT,
    judge_name       TEXT
);

CREATE INDEX IF NOT EXISTS charge_booking_idx ON charge(booking_id);

CREATE TABLE IF NOT EXISTS charge_history (
    charge_history_id INTEGER PRIMARY KEY,
    charge_id         INTEGER NOT NULL,
    valid_from        TEXT NOT NULL,
    valid_to          TEXT,
    booking_id        INTEGER NOT NULL,
    bond_id           INTEGER,
    sentence_id       INTEGER,
    external_id       TEXT,
    offense_date      TEXT,
    statute           TEXT,
    name              TEXT,
    degree            TEXT,
    charge_class      TEXT,
    level             TEXT,
    status            TEXT,
    number_of_counts  TEXT,
    court_type        TEXT,
    case_number       TEXT,
    judge_name        TEXT
);

CREATE INDEX IF NOT EXISTS charge_history_idx         ON charge_history(charge_id, valid_from);
CREATE INDEX IF NOT EXISTS charge_history_booking_idx ON charge_history(booking_id);

-- ── Hold ──────────────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS hold (
    hold_id           INTEGER PRIMARY KEY,
    version           INTEGER NOT NULL DEFAULT 0,
    booking_id        INTEGER NOT NULL REFERENCES booking(booking_id),
    external_id       TEXT,
    jurisdiction_name TEXT,
    status            TEXT
);

CREATE INDEX IF NOT EXISTS hold_booking_idx ON hold(booking_id);

CREATE TABLE IF NOT EXISTS hold_history (
    hold_history_id   INTEGER PRIMARY KEY,
    hold_id           INTEGER NOT NULL,
    valid_from        TEXT NOT NULL,
    valid_to          TEXT,
    booking_id        INTEGER NOT NULL,
    external_id       TEXT,
    jurisdiction_name TEXT,
    status            TEXT
);

CREATE INDEX IF NOT EXISTS hold_history_idx         ON hold_history(hold_id, valid_from);
CREATE INDEX IF NOT EXISTS hold_history_booking_idx ON hold_history(booking_id);

PRAGMA user_version = 1;
";

// ─── Per-kind metadata ───────────────────────────────────────────────────────

/// Table names and column lists for one entity kind, consumed by the generic
/// matcher and snapshot writer.
pub struct KindSpec {
  pub kind:    EntityKind,
  pub master:  &'static str,
  pub history: &'static str,
  /// The shared master/history id column, e.g. `person_id`.
  pub id:      &'static str,
  /// Link columns present on both master and history rows (historical
  /// foreign keys). Subject to the same no-information merge rule as fields.
  pub links:   &'static [&'static str],
  /// Scraped field columns, in the order `EntityFields::columns` yields them.
  pub fields:  &'static [&'static str],
}

impl KindSpec {
  /// `links` then `fields`, the order every read and write uses.
  pub fn all_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
    self.links.iter().chain(self.fields.iter()).copied()
  }
}

pub const PERSON: KindSpec = KindSpec {
  kind:    EntityKind::Person,
  master:  "person",
  history: "person_history",
  id:      "person_id",
  links:   &["region"],
  fields:  &[
    "external_id",
    "surname",
    "given_names",
    "birthdate",
    "gender",
    "race",
    "ethnicity",
    "place_of_residence",
  ],
};

pub const BOOKING: KindSpec = KindSpec {
  kind:    EntityKind::Booking,
  master:  "booking",
  history: "booking_history",
  id:      "booking_id",
  links:   &["person_id"],
  fields:  &[
    "external_id",
    "admission_date",
    "admission_reason",
    "projected_release_date",
    "release_date",
    "release_reason",
    "custody_status",
    "facility",
    "classification",
  ],
};

pub const ARREST: KindSpec = KindSpec {
  kind:    EntityKind::Arrest,
  master:  "arrest",
  history: "arrest_history",
  id:      "arrest_id",
  links:   &["booking_id"],
  fields:  &[
    "external_id",
    "date",
    "location",
    "agency",
    "officer_name",
    "officer_id",
  ],
};

pub const CHARGE: KindSpec = KindSpec {
  kind:    EntityKind::Charge,
  master:  "charge",
  history: "charge_history",
  id:      "charge_id",
  links:   &["booking_id", "bond_id", "sentence_id"],
  fields:  &[
    "external_id",
    "offense_date",
    "statute",
    "name",
    "degree",
    "charge_class",
    "level",
    "status",
    "number_of_counts",
    "court_type",
    "case_number",
    "judge_name",
  ],
};

pub const HOLD: KindSpec = KindSpec {
  kind:    EntityKind::Hold,
  master:  "hold",
  history: "hold_history",
  id:      "hold_id",
  links:   &["booking_id"],
  fields:  &["external_id", "jurisdiction_name", "status"],
};

pub const BOND: KindSpec = KindSpec {
  kind:    EntityKind::Bond,
  master:  "bond",
  history: "bond_history",
  id:      "bond_id",
  links:   &[],
  fields:  &["external_id", "amount", "bond_type", "status"],
};

pub const SENTENCE: KindSpec = KindSpec {
  kind:    EntityKind::Sentence,
  master:  "sentence",
  history: "sentence_history",
  id:      "sentence_id",
  links:   &[],
  fields:  &[
    "external_id",
    "min_length",
    "max_length",
    "is_life",
    "is_probation",
    "is_suspended",
    "fine",
    "parole_possible",
    "status",
  ],
};

pub fn spec_for(kind: EntityKind) -> &'static KindSpec {
  match kind {
    EntityKind::Person => &PERSON,
    EntityKind::Booking => &BOOKING,
    EntityKind::Arrest => &ARREST,
    EntityKind::Charge => &CHARGE,
    EntityKind::Hold => &HOLD,
    EntityKind::Bond => &BOND,
    EntityKind::Sentence => &SENTENCE,
  }
}
