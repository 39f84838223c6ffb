//! The snapshot writer: decides whether an observation changed an entity and
//! maintains the `[valid_from, valid_to)` history chain.
//!
//! Runs synchronously on the connection inside the session transaction.
//! Invariants maintained here:
//! - exactly one open snapshot per master entity, always equal to the master
//!   row's current values;
//! - snapshot intervals cover `[creation, now)` with no gaps or overlaps,
//!   including after back-dated corrections;
//! - an incoming `None` never overwrites a known value (absent-in-source is
//!   "no information").

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _, params_from_iter, types::Value};

use crate::{
  Error, Result,
  encode::{decode_dt, encode_dt},
  schema::KindSpec,
};

// ─── Outcome ─────────────────────────────────────────────────────────────────

/// What applying one observation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
  /// All comparable fields equalled the snapshot in force; nothing written.
  Unchanged,
  /// The open snapshot was closed (or amended, for an equal-timestamp
  /// observation) and the master row updated.
  SnapshotOpened { history_id: i64 },
  /// A back-dated correction was folded into a closed interval by
  /// re-splitting it; the master row was not touched.
  IntervalSplit { history_id: i64 },
}

// ─── Create ──────────────────────────────────────────────────────────────────

/// Allocate a new master row and its initial open snapshot.
///
/// `incoming` is the link+field column values in [`KindSpec`] order;
/// `master_extra` columns (e.g. `last_seen_time`) exist only on the master
/// table and never enter history.
pub fn create(
  conn: &Connection,
  spec: &KindSpec,
  incoming: &[Value],
  master_extra: &[(&'static str, Value)],
  observed_at: DateTime<Utc>,
) -> Result<i64> {
  let mut names: Vec<&str> = spec.all_columns().collect();
  let mut values: Vec<Value> = incoming.to_vec();
  for (name, value) in master_extra {
    names.push(name);
    values.push(value.clone());
  }

  let placeholders = vec!["?"; names.len()].join(", ");
  let sql = format!(
    "INSERT INTO {} ({}) VALUES ({placeholders})",
    spec.master,
    names.join(", "),
  );
  conn.execute(&sql, params_from_iter(values.iter()))?;
  let master_id = conn.last_insert_rowid();

  insert_history(conn, spec, master_id, &encode_dt(observed_at), None, incoming)?;
  Ok(master_id)
}

// ─── Apply ───────────────────────────────────────────────────────────────────

/// Apply one observation to an existing master entity.
pub fn apply(
  conn: &Connection,
  spec: &KindSpec,
  master_id: i64,
  incoming: &[Value],
  observed_at: DateTime<Utc>,
) -> Result<Applied> {
  let (open_pk, open_from_s, open_values) = open_snapshot(conn, spec, master_id)?;
  let open_from = decode_dt(&open_from_s)?;

  if observed_at >= open_from {
    if !differs(incoming, &open_values) {
      return Ok(Applied::Unchanged);
    }
    let merged = merge(incoming, &open_values);

    if observed_at == open_from {
      // Same-instant re-observation: amend the open snapshot rather than
      // closing it into a zero-width interval.
      update_history_row(conn, spec, open_pk, &merged)?;
      update_master(conn, spec, master_id, &merged)?;
      return Ok(Applied::SnapshotOpened { history_id: open_pk });
    }

    let observed_s = encode_dt(observed_at);
    let close_sql = format!(
      "UPDATE {} SET valid_to = ?1 WHERE {} = ?2 AND valid_to IS NULL",
      spec.history, spec.id,
    );
    conn.execute(&close_sql, rusqlite::params![observed_s, master_id])?;

    let history_id =
      insert_history(conn, spec, master_id, &observed_s, None, &merged)?;
    update_master(conn, spec, master_id, &merged)?;
    return Ok(Applied::SnapshotOpened { history_id });
  }

  // Back-dated correction: the observation belongs inside an already-closed
  // interval. Re-split it, leaving interval coverage intact and the master
  // row (which reflects the open snapshot) alone.
  correct_closed_interval(conn, spec, master_id, incoming, observed_at)
}

fn correct_closed_interval(
  conn: &Connection,
  spec: &KindSpec,
  master_id: i64,
  incoming: &[Value],
  observed_at: DateTime<Utc>,
) -> Result<Applied> {
  let observed_s = encode_dt(observed_at);
  let select_sql = format!(
    "SELECT {pk}, valid_from, valid_to, {cols} FROM {table}
     WHERE {id} = ?1 AND valid_from <= ?2 AND valid_to > ?2",
    pk = history_pk(spec),
    cols = columns_list(spec),
    table = spec.history,
    id = spec.id,
  );

  let row: Option<(i64, String, String, Vec<Value>)> = conn
    .query_row(
      &select_sql,
      rusqlite::params![master_id, observed_s],
      |row| {
        let mut values = Vec::with_capacity(column_count(spec));
        for i in 0..column_count(spec) {
          values.push(row.get::<_, Value>(3 + i)?);
        }
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, values))
      },
    )
    .optional()?;

  let Some((pk, from_s, to_s, existing)) = row else {
    // Nothing covers this instant: the correction predates the entity.
    return Err(Error::OutOfOrderCorrection {
      kind: spec.kind,
      master_id,
      observed_at,
    });
  };

  if !differs(incoming, &existing) {
    return Ok(Applied::Unchanged);
  }
  let merged = merge(incoming, &existing);

  if from_s == observed_s {
    // Correction lands exactly on the interval's start: amend in place.
    update_history_row(conn, spec, pk, &merged)?;
    return Ok(Applied::IntervalSplit { history_id: pk });
  }

  // Shorten the covering interval, then insert the correction over the
  // remainder `[observed_at, old valid_to)`.
  let shorten_sql = format!(
    "UPDATE {} SET valid_to = ?1 WHERE {} = ?2",
    spec.history,
    history_pk(spec),
  );
  conn.execute(&shorten_sql, rusqlite::params![observed_s, pk])?;

  let history_id =
    insert_history(conn, spec, master_id, &observed_s, Some(&to_s), &merged)?;
  Ok(Applied::IntervalSplit { history_id })
}

// ─── Comparison and merge ────────────────────────────────────────────────────

/// True when any reported incoming value differs from the stored one.
/// `Null` incoming values are "no information" and never count as a change.
fn differs(incoming: &[Value], existing: &[Value]) -> bool {
  incoming
    .iter()
    .zip(existing.iter())
    .any(|(inc, exist)| *inc != Value::Null && inc != exist)
}

/// Incoming values merged over the prior state: reported values win, absent
/// values carry the prior value forward.
fn merge(incoming: &[Value], existing: &[Value]) -> Vec<Value> {
  incoming
    .iter()
    .zip(existing.iter())
    .map(|(inc, exist)| {
      if *inc == Value::Null { exist.clone() } else { inc.clone() }
    })
    .collect()
}

// ─── Row helpers ─────────────────────────────────────────────────────────────

fn column_count(spec: &KindSpec) -> usize {
  spec.links.len() + spec.fields.len()
}

fn columns_list(spec: &KindSpec) -> String {
  spec.all_columns().collect::<Vec<_>>().join(", ")
}

fn history_pk(spec: &KindSpec) -> String {
  format!("{}_id", spec.history)
}

/// The open snapshot's primary key, `valid_from`, and column values.
fn open_snapshot(
  conn: &Connection,
  spec: &KindSpec,
  master_id: i64,
) -> Result<(i64, String, Vec<Value>)> {
  let sql = format!(
    "SELECT {pk}, valid_from, {cols} FROM {table}
     WHERE {id} = ?1 AND valid_to IS NULL",
    pk = history_pk(spec),
    cols = columns_list(spec),
    table = spec.history,
    id = spec.id,
  );

  conn
    .query_row(&sql, rusqlite::params![master_id], |row| {
      let mut values = Vec::with_capacity(column_count(spec));
      for i in 0..column_count(spec) {
        values.push(row.get::<_, Value>(2 + i)?);
      }
      Ok((row.get(0)?, row.get(1)?, values))
    })
    .optional()?
    .ok_or(Error::MissingOpenSnapshot { kind: spec.kind, master_id })
}

fn insert_history(
  conn: &Connection,
  spec: &KindSpec,
  master_id: i64,
  valid_from: &str,
  valid_to: Option<&str>,
  values: &[Value],
) -> Result<i64> {
  let placeholders: Vec<String> =
    (4..4 + values.len()).map(|i| format!("?{i}")).collect();
  let sql = format!(
    "INSERT INTO {table} ({id}, valid_from, valid_to, {cols})
     VALUES (?1, ?2, ?3, {placeholders})",
    table = spec.history,
    id = spec.id,
    cols = columns_list(spec),
    placeholders = placeholders.join(", "),
  );

  let mut params: Vec<Value> = vec![
    Value::Integer(master_id),
    Value::Text(valid_from.to_string()),
    match valid_to {
      Some(s) => Value::Text(s.to_string()),
      None => Value::Null,
    },
  ];
  params.extend(values.iter().cloned());

  conn.execute(&sql, params_from_iter(params.iter()))?;
  Ok(conn.last_insert_rowid())
}

fn update_history_row(
  conn: &Connection,
  spec: &KindSpec,
  history_id: i64,
  values: &[Value],
) -> Result<()> {
  let assignments: Vec<String> = spec
    .all_columns()
    .enumerate()
    .map(|(i, name)| format!("{name} = ?{}", i + 1))
    .collect();
  let sql = format!(
    "UPDATE {table} SET {assignments} WHERE {pk} = ?{n}",
    table = spec.history,
    assignments = assignments.join(", "),
    pk = history_pk(spec),
    n = values.len() + 1,
  );

  let mut params: Vec<Value> = values.to_vec();
  params.push(Value::Integer(history_id));
  conn.execute(&sql, params_from_iter(params.iter()))?;
  Ok(())
}

/// Bring the master row in line with the (new) open snapshot, guarded by the
/// optimistic version check. Zero affected rows means another writer got
/// there first; the whole session transaction is abandoned.
fn update_master(
  conn: &Connection,
  spec: &KindSpec,
  master_id: i64,
  values: &[Value],
) -> Result<()> {
  let version_sql =
    format!("SELECT version FROM {} WHERE {} = ?1", spec.master, spec.id);
  let version: i64 =
    conn.query_row(&version_sql, rusqlite::params![master_id], |r| r.get(0))?;

  let assignments: Vec<String> = spec
    .all_columns()
    .enumerate()
    .map(|(i, name)| format!("{name} = ?{}", i + 1))
    .collect();
  let n = values.len();
  let sql = format!(
    "UPDATE {table} SET {assignments}, version = version + 1
     WHERE {id} = ?{a} AND version = ?{b}",
    table = spec.master,
    assignments = assignments.join(", "),
    id = spec.id,
    a = n + 1,
    b = n + 2,
  );

  let mut params: Vec<Value> = values.to_vec();
  params.push(Value::Integer(master_id));
  params.push(Value::Integer(version));

  let affected = conn.execute(&sql, params_from_iter(params.iter()))?;
  if affected == 0 {
    return Err(Error::ConcurrentModification { kind: spec.kind, master_id });
  }
  Ok(())
}
