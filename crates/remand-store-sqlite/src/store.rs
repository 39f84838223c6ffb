//! The [`SqliteStore`] backend.
//!
//! All SQL runs on tokio-rusqlite's dedicated connection thread; the async
//! methods here marshal work onto it and map errors back out. Writes for one
//! region are serialized through a per-region async mutex so two concurrent
//! sessions for the same roster cannot interleave their matching.

use std::{
  collections::HashMap,
  future::Future,
  path::Path,
  sync::{Arc, Mutex},
};

use chrono::{DateTime, Utc};
use remand_core::{
  entity::EntityKind,
  graph::EntityGraph,
  session::{CommitOutcome, ReleasePolicy, SessionMetadata, SessionRecord},
  snapshot::{BookingView, ChargeView, PersonView, Snapshot},
  store::RecordStore,
};
use rusqlite::OptionalExtension as _;

use crate::{
  Error, Result,
  encode::{RawSession, RawSnapshot, encode_dt},
  release, schema,
  schema::KindSpec,
  session,
};

pub struct SqliteStore {
  conn:         tokio_rusqlite::Connection,
  region_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SqliteStore {
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store =
      Self { conn, region_locks: Mutex::new(HashMap::new()) };
    store.init_schema().await?;
    Ok(store)
  }

  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store =
      Self { conn, region_locks: Mutex::new(HashMap::new()) };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .call(|conn| {
        conn.execute_batch(schema::SCHEMA)?;
        Ok(())
      })
      .await
  }

  /// Run `f` on the connection thread, tunneling [`Error`] through
  /// tokio-rusqlite's opaque `Other` variant and back.
  async fn call<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&mut rusqlite::Connection) -> Result<T> + Send + 'static,
  {
    self
      .conn
      .call(|conn| f(conn).map_err(|e| tokio_rusqlite::Error::Other(Box::new(e))))
      .await
      .map_err(|e| match e {
        tokio_rusqlite::Error::Other(inner) => match inner.downcast::<Error>() {
          Ok(ours) => *ours,
          Err(other) => Error::Database(tokio_rusqlite::Error::Other(other)),
        },
        other => Error::Database(other),
      })
  }

  fn region_lock(&self, region: &str) -> Arc<tokio::sync::Mutex<()>> {
    let mut locks = self
      .region_locks
      .lock()
      .unwrap_or_else(std::sync::PoisonError::into_inner);
    locks.entry(region.to_string()).or_default().clone()
  }
}

// ─── Point-in-time reads ─────────────────────────────────────────────────────

/// The snapshot of one entity in force at `at`, if any.
fn snapshot_at(
  conn: &rusqlite::Connection,
  spec: &KindSpec,
  master_id: i64,
  at_s: &str,
) -> Result<Option<Snapshot>> {
  let sql = format!(
    "SELECT {id}, valid_from, valid_to, {cols} FROM {table}
     WHERE {id} = ?1 AND valid_from <= ?2
       AND (valid_to IS NULL OR valid_to > ?2)",
    id = spec.id,
    cols = spec.all_columns().collect::<Vec<_>>().join(", "),
    table = spec.history,
  );
  conn
    .query_row(&sql, rusqlite::params![master_id, at_s], |row| {
      RawSnapshot::from_row(spec, row)
    })
    .optional()?
    .map(|raw| raw.into_snapshot(spec))
    .transpose()
}

/// Distinct master ids that have ever been linked under `parent_id` in
/// `spec`'s history table.
fn ids_under(
  conn: &rusqlite::Connection,
  spec: &KindSpec,
  parent_column: &str,
  parent_id: i64,
) -> Result<Vec<i64>> {
  let sql = format!(
    "SELECT DISTINCT {id} FROM {table} WHERE {parent} = ?1 ORDER BY {id}",
    id = spec.id,
    table = spec.history,
    parent = parent_column,
  );
  let mut stmt = conn.prepare(&sql)?;
  let rows = stmt.query_map(rusqlite::params![parent_id], |r| r.get::<_, i64>(0))?;
  let mut ids = Vec::new();
  for row in rows {
    ids.push(row?);
  }
  Ok(ids)
}

fn build_person_view(
  conn: &rusqlite::Connection,
  person_id: i64,
  at: DateTime<Utc>,
) -> Result<Option<PersonView>> {
  let at_s = encode_dt(at);
  let Some(person) = snapshot_at(conn, &schema::PERSON, person_id, &at_s)?
  else {
    return Ok(None);
  };

  let mut bookings = Vec::new();
  for booking_id in ids_under(conn, &schema::BOOKING, "person_id", person_id)? {
    let Some(booking) =
      snapshot_at(conn, &schema::BOOKING, booking_id, &at_s)?
    else {
      continue;
    };

    // Conflicting external ids can leave a booking with more than one
    // arrest row; the one most recently observed as of `at` wins.
    let mut arrest: Option<Snapshot> = None;
    for arrest_id in ids_under(conn, &schema::ARREST, "booking_id", booking_id)?
    {
      if let Some(candidate) =
        snapshot_at(conn, &schema::ARREST, arrest_id, &at_s)?
        && arrest
          .as_ref()
          .is_none_or(|best| candidate.valid_from > best.valid_from)
      {
        arrest = Some(candidate);
      }
    }

    let mut holds = Vec::new();
    for hold_id in ids_under(conn, &schema::HOLD, "booking_id", booking_id)? {
      if let Some(hold) = snapshot_at(conn, &schema::HOLD, hold_id, &at_s)? {
        holds.push(hold);
      }
    }

    let mut charges = Vec::new();
    for charge_id in ids_under(conn, &schema::CHARGE, "booking_id", booking_id)?
    {
      let Some(charge) = snapshot_at(conn, &schema::CHARGE, charge_id, &at_s)?
      else {
        continue;
      };
      // The bond/sentence shown are the ones this charge snapshot linked to
      // at `at`, read back out of its historical link columns.
      let bond = linked_snapshot(conn, &schema::BOND, &charge, "bond_id", &at_s)?;
      let sentence =
        linked_snapshot(conn, &schema::SENTENCE, &charge, "sentence_id", &at_s)?;
      charges.push(ChargeView { charge, bond, sentence });
    }

    bookings.push(BookingView { booking, arrest, charges, holds });
  }

  Ok(Some(PersonView { as_of: at, person, bookings }))
}

fn linked_snapshot(
  conn: &rusqlite::Connection,
  spec: &KindSpec,
  charge: &Snapshot,
  link: &str,
  at_s: &str,
) -> Result<Option<Snapshot>> {
  let Some(raw) = charge.field(link) else { return Ok(None) };
  let id: i64 = raw
    .parse()
    .map_err(|_| Error::Corrupt(format!("{link} value {raw:?}")))?;
  snapshot_at(conn, spec, id, at_s)
}

// ─── RecordStore ─────────────────────────────────────────────────────────────

impl RecordStore for SqliteStore {
  type Error = Error;

  fn commit_session(
    &self,
    graph: EntityGraph,
    meta: SessionMetadata,
  ) -> impl Future<Output = Result<CommitOutcome>> + Send + '_ {
    async move {
      let lock = self.region_lock(&meta.region);
      let _guard = lock.lock().await;
      self
        .call(move |conn| session::commit_graph(conn, &graph, &meta))
        .await
    }
  }

  fn infer_releases<'a>(
    &'a self,
    region: &'a str,
    policy: ReleasePolicy,
  ) -> impl Future<Output = Result<u64>> + Send + 'a {
    async move {
      let lock = self.region_lock(region);
      let _guard = lock.lock().await;
      let region = region.to_string();
      self
        .call(move |conn| release::infer_releases(conn, &region, policy))
        .await
    }
  }

  fn entity_history(
    &self,
    kind: EntityKind,
    master_id: i64,
  ) -> impl Future<Output = Result<Vec<Snapshot>>> + Send + '_ {
    self.call(move |conn| {
      let spec = schema::spec_for(kind);
      let sql = format!(
        "SELECT {id}, valid_from, valid_to, {cols} FROM {table}
         WHERE {id} = ?1 ORDER BY valid_from",
        id = spec.id,
        cols = spec.all_columns().collect::<Vec<_>>().join(", "),
        table = spec.history,
      );
      let mut stmt = conn.prepare(&sql)?;
      let rows = stmt.query_map(rusqlite::params![master_id], |row| {
        RawSnapshot::from_row(spec, row)
      })?;
      let mut snapshots = Vec::new();
      for raw in rows {
        snapshots.push(raw?.into_snapshot(spec)?);
      }
      Ok(snapshots)
    })
  }

  fn person_as_of(
    &self,
    person_id: i64,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<PersonView>>> + Send + '_ {
    self.call(move |conn| build_person_view(conn, person_id, at))
  }

  fn lookup_person<'a>(
    &'a self,
    region: &'a str,
    external_id: &'a str,
  ) -> impl Future<Output = Result<Option<i64>>> + Send + 'a {
    let region = region.to_string();
    let external_id = external_id.to_string();
    self.call(move |conn| {
      Ok(
        conn
          .query_row(
            "SELECT person_id FROM person
             WHERE region = ?1 AND external_id = ?2
             ORDER BY person_id LIMIT 1",
            rusqlite::params![region, external_id],
            |row| row.get(0),
          )
          .optional()?,
      )
    })
  }

  fn latest_complete_session<'a>(
    &'a self,
    region: &'a str,
  ) -> impl Future<Output = Result<Option<SessionRecord>>> + Send + 'a {
    let region = region.to_string();
    self.call(move |conn| {
      let raw: Option<RawSession> = conn
        .query_row(
          "SELECT session_id, region, started_at, committed_at, complete
           FROM scrape_sessions
           WHERE region = ?1 AND complete = 1
           ORDER BY started_at DESC LIMIT 1",
          rusqlite::params![region],
          |row| {
            Ok(RawSession {
              session_id:   row.get(0)?,
              region:       row.get(1)?,
              started_at:   row.get(2)?,
              committed_at: row.get(3)?,
              complete:     row.get(4)?,
            })
          },
        )
        .optional()?;
      raw.map(RawSession::into_record).transpose()
    })
  }
}
