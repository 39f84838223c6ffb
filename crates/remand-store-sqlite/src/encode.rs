//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix) so lexicographic comparison in SQL matches
//! chronological order. UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use remand_core::snapshot::Snapshot;
use rusqlite::types::Value;
use uuid::Uuid;

use crate::{Error, Result, schema::KindSpec};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Column values ───────────────────────────────────────────────────────────

/// Render a stored column value as text for a [`Snapshot`] field map.
/// Integers (historical foreign keys) become their decimal form.
pub fn value_to_text(v: &Value) -> Option<String> {
  match v {
    Value::Null => None,
    Value::Integer(i) => Some(i.to_string()),
    Value::Real(r) => Some(r.to_string()),
    Value::Text(s) => Some(s.clone()),
    Value::Blob(_) => None,
  }
}

pub fn opt_text(v: Option<String>) -> Value {
  match v {
    Some(s) => Value::Text(s),
    None => Value::Null,
  }
}

pub fn opt_int(v: Option<i64>) -> Value {
  match v {
    Some(i) => Value::Integer(i),
    None => Value::Null,
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// One history row read generically: id, validity bounds, then the spec's
/// link and field columns in `KindSpec::all_columns` order.
pub struct RawSnapshot {
  pub master_id:  i64,
  pub valid_from: String,
  pub valid_to:   Option<String>,
  pub values:     Vec<Value>,
}

impl RawSnapshot {
  /// Read from a row shaped `SELECT {id}, valid_from, valid_to, {columns}`.
  pub fn from_row(spec: &KindSpec, row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    let column_count = spec.links.len() + spec.fields.len();
    let mut values = Vec::with_capacity(column_count);
    for i in 0..column_count {
      values.push(row.get::<_, Value>(3 + i)?);
    }
    Ok(Self {
      master_id:  row.get(0)?,
      valid_from: row.get(1)?,
      valid_to:   row.get(2)?,
      values,
    })
  }

  pub fn into_snapshot(self, spec: &KindSpec) -> Result<Snapshot> {
    let valid_from = decode_dt(&self.valid_from)?;
    let valid_to = self.valid_to.as_deref().map(decode_dt).transpose()?;

    let fields = spec
      .all_columns()
      .zip(self.values.iter())
      .filter_map(|(name, v)| value_to_text(v).map(|t| (name.to_string(), t)))
      .collect();

    Ok(Snapshot { master_id: self.master_id, valid_from, valid_to, fields })
  }
}

/// Raw strings read directly from a `scrape_sessions` row.
pub struct RawSession {
  pub session_id:   String,
  pub region:       String,
  pub started_at:   String,
  pub committed_at: String,
  pub complete:     bool,
}

impl RawSession {
  pub fn into_record(self) -> Result<remand_core::session::SessionRecord> {
    Ok(remand_core::session::SessionRecord {
      session_id:   decode_uuid(&self.session_id)?,
      region:       self.region,
      started_at:   decode_dt(&self.started_at)?,
      committed_at: decode_dt(&self.committed_at)?,
      complete:     self.complete,
    })
  }
}
