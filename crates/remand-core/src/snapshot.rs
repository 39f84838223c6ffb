//! Historical snapshots and point-in-time read models.
//!
//! A snapshot is the state of one master entity over a `[valid_from,
//! valid_to)` interval of real-world time. Exactly one snapshot per master
//! entity is open (`valid_to = None`) and always mirrors the master row.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Snapshot ────────────────────────────────────────────────────────────────

/// One historical row, field values as stored text. Columns the source never
/// reported are absent from the map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
  /// The master entity's id, shared by all of its snapshots (non-unique).
  pub master_id:  i64,
  pub valid_from: DateTime<Utc>,
  pub valid_to:   Option<DateTime<Utc>>,
  pub fields:     BTreeMap<String, String>,
}

impl Snapshot {
  pub fn is_open(&self) -> bool { self.valid_to.is_none() }

  pub fn field(&self, name: &str) -> Option<&str> {
    self.fields.get(name).map(String::as_str)
  }

  /// True when `at` falls inside this snapshot's validity interval.
  pub fn contains(&self, at: DateTime<Utc>) -> bool {
    self.valid_from <= at && self.valid_to.is_none_or(|to| at < to)
  }
}

// ─── Point-in-time views ─────────────────────────────────────────────────────

/// A person and all related entities reconstructed as of one instant.
/// Assembled from history tables only; never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonView {
  pub as_of:    DateTime<Utc>,
  pub person:   Snapshot,
  pub bookings: Vec<BookingView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingView {
  pub booking: Snapshot,
  pub arrest:  Option<Snapshot>,
  pub charges: Vec<ChargeView>,
  pub holds:   Vec<Snapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeView {
  pub charge:   Snapshot,
  /// Resolved through the charge snapshot's historical bond id, so the bond
  /// shown is the one the charge referenced at `as_of`.
  pub bond:     Option<Snapshot>,
  pub sentence: Option<Snapshot>,
}
