//! Entity kinds and their scraped field sets.
//!
//! Every field is `Option<String>`: values arrive as free text from the
//! scraping layer and are normalized (if at all) before they reach this
//! crate. `None` always means "the source did not report this field" —
//! never "known to be empty" — so a `None` can never overwrite a stored
//! value during snapshotting.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Kind ────────────────────────────────────────────────────────────────────

/// The seven kinds of record tracked by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
  Person,
  Booking,
  Arrest,
  Charge,
  Hold,
  Bond,
  Sentence,
}

impl EntityKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Person => "person",
      Self::Booking => "booking",
      Self::Arrest => "arrest",
      Self::Charge => "charge",
      Self::Hold => "hold",
      Self::Bond => "bond",
      Self::Sentence => "sentence",
    }
  }
}

impl std::str::FromStr for EntityKind {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "person" => Ok(Self::Person),
      "booking" => Ok(Self::Booking),
      "arrest" => Ok(Self::Arrest),
      "charge" => Ok(Self::Charge),
      "hold" => Ok(Self::Hold),
      "bond" => Ok(Self::Bond),
      "sentence" => Ok(Self::Sentence),
      other => Err(Error::UnknownEntityKind(other.to_string())),
    }
  }
}

impl std::fmt::Display for EntityKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Field access ────────────────────────────────────────────────────────────

/// Uniform access to an entity's scraped fields.
///
/// `columns` returns the fields as (column name, value) pairs in schema
/// order; the storage layer relies on the order being stable so master and
/// history rows can be compared and written generically.
pub trait EntityFields {
  const KIND: EntityKind;

  fn external_id(&self) -> Option<&str>;

  /// Column name/value pairs in schema order.
  fn columns(&self) -> Vec<(&'static str, Option<String>)>;

  /// True when the source reported nothing at all for this entity.
  fn is_blank(&self) -> bool {
    self.columns().iter().all(|(_, v)| v.is_none())
  }
}

// ─── Custody status vocabulary ───────────────────────────────────────────────

/// Canonical custody-status strings the engine itself writes or inspects.
/// All other values pass through opaquely.
pub mod custody_status {
  pub const IN_CUSTODY: &str = "in_custody";
  pub const RELEASED: &str = "released";
  pub const INFERRED_RELEASE: &str = "inferred_release";
  pub const UNKNOWN_REMOVED_FROM_SOURCE: &str = "unknown_removed_from_source";

  /// Statuses that end a booking. Release inference never touches a booking
  /// already in one of these.
  pub fn is_terminal(status: &str) -> bool {
    matches!(
      status,
      RELEASED | INFERRED_RELEASE | UNKNOWN_REMOVED_FROM_SOURCE
    )
  }
}

// ─── Person ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonFields {
  pub external_id:        Option<String>,
  pub surname:            Option<String>,
  pub given_names:        Option<String>,
  pub birthdate:          Option<String>,
  pub gender:             Option<String>,
  pub race:               Option<String>,
  pub ethnicity:          Option<String>,
  pub place_of_residence: Option<String>,
}

impl EntityFields for PersonFields {
  const KIND: EntityKind = EntityKind::Person;

  fn external_id(&self) -> Option<&str> { self.external_id.as_deref() }

  fn columns(&self) -> Vec<(&'static str, Option<String>)> {
    vec![
      ("external_id", self.external_id.clone()),
      ("surname", self.surname.clone()),
      ("given_names", self.given_names.clone()),
      ("birthdate", self.birthdate.clone()),
      ("gender", self.gender.clone()),
      ("race", self.race.clone()),
      ("ethnicity", self.ethnicity.clone()),
      ("place_of_residence", self.place_of_residence.clone()),
    ]
  }
}

// ─── Booking ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingFields {
  pub external_id:            Option<String>,
  pub admission_date:         Option<String>,
  pub admission_reason:       Option<String>,
  pub projected_release_date: Option<String>,
  pub release_date:           Option<String>,
  pub release_reason:         Option<String>,
  pub custody_status:         Option<String>,
  pub facility:               Option<String>,
  pub classification:         Option<String>,
}

impl EntityFields for BookingFields {
  const KIND: EntityKind = EntityKind::Booking;

  fn external_id(&self) -> Option<&str> { self.external_id.as_deref() }

  fn columns(&self) -> Vec<(&'static str, Option<String>)> {
    vec![
      ("external_id", self.external_id.clone()),
      ("admission_date", self.admission_date.clone()),
      ("admission_reason", self.admission_reason.clone()),
      ("projected_release_date", self.projected_release_date.clone()),
      ("release_date", self.release_date.clone()),
      ("release_reason", self.release_reason.clone()),
      ("custody_status", self.custody_status.clone()),
      ("facility", self.facility.clone()),
      ("classification", self.classification.clone()),
    ]
  }
}

// ─── Arrest ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrestFields {
  pub external_id:  Option<String>,
  pub date:         Option<String>,
  pub location:     Option<String>,
  pub agency:       Option<String>,
  pub officer_name: Option<String>,
  pub officer_id:   Option<String>,
}

impl EntityFields for ArrestFields {
  const KIND: EntityKind = EntityKind::Arrest;

  fn external_id(&self) -> Option<&str> { self.external_id.as_deref() }

  fn columns(&self) -> Vec<(&'static str, Option<String>)> {
    vec![
      ("external_id", self.external_id.clone()),
      ("date", self.date.clone()),
      ("location", self.location.clone()),
      ("agency", self.agency.clone()),
      ("officer_name", self.officer_name.clone()),
      ("officer_id", self.officer_id.clone()),
    ]
  }
}

// ─── Charge ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeFields {
  pub external_id:      Option<String>,
  pub offense_date:     Option<String>,
  pub statute:          Option<String>,
  pub name:             Option<String>,
  pub degree:           Option<String>,
  pub charge_class:     Option<String>,
  pub level:            Option<String>,
  pub status:           Option<String>,
  pub number_of_counts: Option<String>,
  pub court_type:       Option<String>,
  pub case_number:      Option<String>,
  pub judge_name:       Option<String>,
}

impl EntityFields for ChargeFields {
  const KIND: EntityKind = EntityKind::Charge;

  fn external_id(&self) -> Option<&str> { self.external_id.as_deref() }

  fn columns(&self) -> Vec<(&'static str, Option<String>)> {
    vec![
      ("external_id", self.external_id.clone()),
      ("offense_date", self.offense_date.clone()),
      ("statute", self.statute.clone()),
      ("name", self.name.clone()),
      ("degree", self.degree.clone()),
      ("charge_class", self.charge_class.clone()),
      ("level", self.level.clone()),
      ("status", self.status.clone()),
      ("number_of_counts", self.number_of_counts.clone()),
      ("court_type", self.court_type.clone()),
      ("case_number", self.case_number.clone()),
      ("judge_name", self.judge_name.clone()),
    ]
  }
}

// ─── Hold ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldFields {
  pub external_id:       Option<String>,
  pub jurisdiction_name: Option<String>,
  pub status:            Option<String>,
}

impl EntityFields for HoldFields {
  const KIND: EntityKind = EntityKind::Hold;

  fn external_id(&self) -> Option<&str> { self.external_id.as_deref() }

  fn columns(&self) -> Vec<(&'static str, Option<String>)> {
    vec![
      ("external_id", self.external_id.clone()),
      ("jurisdiction_name", self.jurisdiction_name.clone()),
      ("status", self.status.clone()),
    ]
  }
}

// ─── Bond ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BondFields {
  pub external_id: Option<String>,
  pub amount:      Option<String>,
  pub bond_type:   Option<String>,
  pub status:      Option<String>,
}

impl EntityFields for BondFields {
  const KIND: EntityKind = EntityKind::Bond;

  fn external_id(&self) -> Option<&str> { self.external_id.as_deref() }

  fn columns(&self) -> Vec<(&'static str, Option<String>)> {
    vec![
      ("external_id", self.external_id.clone()),
      ("amount", self.amount.clone()),
      ("bond_type", self.bond_type.clone()),
      ("status", self.status.clone()),
    ]
  }
}

// ─── Sentence ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceFields {
  pub external_id:     Option<String>,
  pub min_length:      Option<String>,
  pub max_length:      Option<String>,
  pub is_life:         Option<String>,
  pub is_probation:    Option<String>,
  pub is_suspended:    Option<String>,
  pub fine:            Option<String>,
  pub parole_possible: Option<String>,
  pub status:          Option<String>,
}

impl EntityFields for SentenceFields {
  const KIND: EntityKind = EntityKind::Sentence;

  fn external_id(&self) -> Option<&str> { self.external_id.as_deref() }

  fn columns(&self) -> Vec<(&'static str, Option<String>)> {
    vec![
      ("external_id", self.external_id.clone()),
      ("min_length", self.min_length.clone()),
      ("max_length", self.max_length.clone()),
      ("is_life", self.is_life.clone()),
      ("is_probation", self.is_probation.clone()),
      ("is_suspended", self.is_suspended.clone()),
      ("fine", self.fine.clone()),
      ("parole_possible", self.parole_possible.clone()),
      ("status", self.status.clone()),
    ]
  }
}
