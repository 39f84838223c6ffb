//! Committing one scrape session's entity graph inside a single transaction.
//!
//! The walk runs parents before children so foreign keys always resolve:
//! person, then each booking, then the booking's arrest and holds, then each
//! charge's bond and sentence, then the charge itself (whose row carries the
//! bond/sentence links). Graph validation happens during the walk; any
//! malformed reference aborts the transaction and the store is untouched.

use std::collections::HashSet;

use remand_core::{
  entity::{EntityFields, EntityKind},
  graph::{EntityGraph, ScrapedBooking, ScrapedCharge, ScrapedPerson},
  session::{CommitOutcome, SessionMetadata, SessionReport},
};
use rusqlite::{
  Connection, OptionalExtension as _, TransactionBehavior, types::Value,
};

use crate::{
  Result,
  encode::{encode_dt, encode_uuid, opt_int, opt_text},
  matcher::{self, Match},
  schema,
  snapshot::{self, Applied},
};

/// Persist `graph` under `meta`, or short-circuit if the session id has
/// already been committed.
pub fn commit_graph(
  conn: &mut Connection,
  graph: &EntityGraph,
  meta: &SessionMetadata,
) -> Result<CommitOutcome> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  let session_id = encode_uuid(meta.session_id);
  let already: Option<i64> = tx
    .query_row(
      "SELECT 1 FROM scrape_sessions WHERE session_id = ?1",
      rusqlite::params![session_id],
      |row| row.get(0),
    )
    .optional()?;
  if already.is_some() {
    tracing::info!(
      session_id = %meta.session_id,
      region = %meta.region,
      "session already committed, skipping"
    );
    return Ok(CommitOutcome::AlreadyCommitted);
  }

  check_local_ids(graph)?;
  check_orphans(graph)?;

  let mut walk = Walk {
    tx:      &tx,
    meta,
    report:  SessionReport::default(),
    claimed: Claimed::default(),
  };
  for person in &graph.people {
    walk.person(graph, person)?;
  }
  let report = walk.report;

  tx.execute(
    "INSERT INTO scrape_sessions
       (session_id, region, started_at, committed_at, complete)
     VALUES (?1, ?2, ?3, ?4, ?5)",
    rusqlite::params![
      session_id,
      meta.region,
      encode_dt(meta.started_at),
      encode_dt(chrono::Utc::now()),
      meta.complete as i64,
    ],
  )?;

  tx.commit()?;
  tracing::info!(
    session_id = %meta.session_id,
    region = %meta.region,
    matched = report.entities_matched,
    created = report.entities_created,
    snapshots = report.snapshots_opened,
    unchanged = report.unchanged,
    ambiguous = report.ambiguous_matches,
    "session committed"
  );
  Ok(CommitOutcome::Committed(report))
}

// ─── Graph validation ────────────────────────────────────────────────────────

fn check_local_ids(graph: &EntityGraph) -> Result<()> {
  fn check<'a>(
    kind: EntityKind,
    ids: impl Iterator<Item = &'a str>,
  ) -> Result<()> {
    let mut seen = HashSet::new();
    for id in ids {
      if !seen.insert(id) {
        return Err(
          remand_core::Error::DuplicateLocalId {
            kind,
            local_id: id.to_string(),
          }
          .into(),
        );
      }
    }
    Ok(())
  }

  check(EntityKind::Person, graph.people.iter().map(|e| e.local_id.as_str()))?;
  check(
    EntityKind::Booking,
    graph.bookings.iter().map(|e| e.local_id.as_str()),
  )?;
  check(EntityKind::Arrest, graph.arrests.iter().map(|e| e.local_id.as_str()))?;
  check(EntityKind::Charge, graph.charges.iter().map(|e| e.local_id.as_str()))?;
  check(EntityKind::Hold, graph.holds.iter().map(|e| e.local_id.as_str()))?;
  check(EntityKind::Bond, graph.bonds.iter().map(|e| e.local_id.as_str()))?;
  check(
    EntityKind::Sentence,
    graph.sentences.iter().map(|e| e.local_id.as_str()),
  )
}

/// Every non-person entity must be referenced by some parent.
fn check_orphans(graph: &EntityGraph) -> Result<()> {
  fn check<'a>(
    kind: EntityKind,
    ids: impl Iterator<Item = &'a str>,
    referenced: &HashSet<&str>,
  ) -> Result<()> {
    for id in ids {
      if !referenced.contains(id) {
        return Err(
          remand_core::Error::MissingParent { kind, local_id: id.to_string() }
            .into(),
        );
      }
    }
    Ok(())
  }

  let bookings: HashSet<&str> = graph
    .people
    .iter()
    .flat_map(|p| p.bookings.iter().map(String::as_str))
    .collect();
  let arrests: HashSet<&str> = graph
    .bookings
    .iter()
    .filter_map(|b| b.arrest.as_deref())
    .collect();
  let charges: HashSet<&str> = graph
    .bookings
    .iter()
    .flat_map(|b| b.charges.iter().map(String::as_str))
    .collect();
  let holds: HashSet<&str> = graph
    .bookings
    .iter()
    .flat_map(|b| b.holds.iter().map(String::as_str))
    .collect();
  let bonds: HashSet<&str> =
    graph.charges.iter().filter_map(|c| c.bond.as_deref()).collect();
  let sentences: HashSet<&str> =
    graph.charges.iter().filter_map(|c| c.sentence.as_deref()).collect();

  check(
    EntityKind::Booking,
    graph.bookings.iter().map(|e| e.local_id.as_str()),
    &bookings,
  )?;
  check(
    EntityKind::Arrest,
    graph.arrests.iter().map(|e| e.local_id.as_str()),
    &arrests,
  )?;
  check(
    EntityKind::Charge,
    graph.charges.iter().map(|e| e.local_id.as_str()),
    &charges,
  )?;
  check(
    EntityKind::Hold,
    graph.holds.iter().map(|e| e.local_id.as_str()),
    &holds,
  )?;
  check(
    EntityKind::Bond,
    graph.bonds.iter().map(|e| e.local_id.as_str()),
    &bonds,
  )?;
  check(
    EntityKind::Sentence,
    graph.sentences.iter().map(|e| e.local_id.as_str()),
    &sentences,
  )
}

fn missing(kind: EntityKind, local_id: &str) -> crate::Error {
  remand_core::Error::MissingEntity { kind, local_id: local_id.to_string() }
    .into()
}

// ─── The walk ────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Claimed {
  people:   HashSet<i64>,
  bookings: HashSet<i64>,
  charges:  HashSet<i64>,
  holds:    HashSet<i64>,
}

struct Walk<'a> {
  tx:      &'a Connection,
  meta:    &'a SessionMetadata,
  report:  SessionReport,
  claimed: Claimed,
}

impl Walk<'_> {
  /// Write one entity given its match result. `values` is links then fields
  /// in [`schema::KindSpec`] order; `master_extra` applies only on create.
  fn write(
    &mut self,
    spec: &'static schema::KindSpec,
    matched: Match,
    values: &[Value],
    master_extra: &[(&'static str, Value)],
    local_id: &str,
  ) -> Result<i64> {
    match matched {
      Match::Existing(master_id) => {
        self.report.entities_matched += 1;
        let applied = snapshot::apply(
          self.tx,
          spec,
          master_id,
          values,
          self.meta.started_at,
        )?;
        match applied {
          Applied::Unchanged => self.report.unchanged += 1,
          Applied::SnapshotOpened { .. } | Applied::IntervalSplit { .. } => {
            self.report.snapshots_opened += 1;
          },
        }
        Ok(master_id)
      },
      Match::New | Match::Ambiguous => {
        if matched == Match::Ambiguous {
          tracing::warn!(
            kind = %spec.kind,
            local_id,
            region = %self.meta.region,
            "ambiguous match, creating new entity"
          );
          self.report.ambiguous_matches += 1;
        }
        self.report.entities_created += 1;
        self.report.snapshots_opened += 1;
        snapshot::create(
          self.tx,
          spec,
          values,
          master_extra,
          self.meta.started_at,
        )
      },
    }
  }

  fn person(
    &mut self,
    graph: &EntityGraph,
    person: &ScrapedPerson,
  ) -> Result<()> {
    let matched = matcher::match_person(
      self.tx,
      &self.meta.region,
      &person.fields,
      &self.claimed.people,
    )?;
    let mut values = vec![Value::Text(self.meta.region.clone())];
    values.extend(field_values(&person.fields));
    let person_id =
      self.write(&schema::PERSON, matched, &values, &[], &person.local_id)?;
    self.claimed.people.insert(person_id);

    for booking_ref in &person.bookings {
      let booking = graph
        .booking(booking_ref)
        .ok_or_else(|| missing(EntityKind::Booking, booking_ref))?;
      self.booking(graph, person_id, booking)?;
    }
    Ok(())
  }

  fn booking(
    &mut self,
    graph: &EntityGraph,
    person_id: i64,
    booking: &ScrapedBooking,
  ) -> Result<()> {
    let seen = encode_dt(self.meta.started_at);
    let matched = matcher::match_booking(
      self.tx,
      person_id,
      &booking.fields,
      &self.claimed.bookings,
    )?;
    let mut values = vec![Value::Integer(person_id)];
    values.extend(field_values(&booking.fields));
    let booking_id = self.write(
      &schema::BOOKING,
      matched,
      &values,
      &[("last_seen_time", Value::Text(seen.clone()))],
      &booking.local_id,
    )?;
    self.claimed.bookings.insert(booking_id);

    // Matched bookings get their last_seen_time refreshed even when nothing
    // else changed; release inference depends on it. The refresh is monotone:
    // a backdated correction session must not pull last_seen_time below a
    // later scrape's, or inference would release a booking that is still on
    // the roster.
    if matches!(matched, Match::Existing(_)) {
      self.tx.execute(
        "UPDATE booking SET last_seen_time = MAX(last_seen_time, ?1)
         WHERE booking_id = ?2",
        rusqlite::params![seen, booking_id],
      )?;
    }

    if let Some(arrest_ref) = &booking.arrest {
      let arrest = graph
        .arrest(arrest_ref)
        .ok_or_else(|| missing(EntityKind::Arrest, arrest_ref))?;
      let matched = matcher::match_arrest(
        self.tx,
        booking_id,
        arrest.fields.external_id.as_deref(),
      )?;
      let mut values = vec![Value::Integer(booking_id)];
      values.extend(field_values(&arrest.fields));
      self.write(&schema::ARREST, matched, &values, &[], &arrest.local_id)?;
    }

    for hold_ref in &booking.holds {
      let hold = graph
        .hold(hold_ref)
        .ok_or_else(|| missing(EntityKind::Hold, hold_ref))?;
      let matched = matcher::match_hold(
        self.tx,
        booking_id,
        &hold.fields,
        &self.claimed.holds,
      )?;
      let mut values = vec![Value::Integer(booking_id)];
      values.extend(field_values(&hold.fields));
      let hold_id =
        self.write(&schema::HOLD, matched, &values, &[], &hold.local_id)?;
      self.claimed.holds.insert(hold_id);
    }

    for charge_ref in &booking.charges {
      let charge = graph
        .charge(charge_ref)
        .ok_or_else(|| missing(EntityKind::Charge, charge_ref))?;
      self.charge(graph, booking_id, charge)?;
    }
    Ok(())
  }

  fn charge(
    &mut self,
    graph: &EntityGraph,
    booking_id: i64,
    charge: &ScrapedCharge,
  ) -> Result<()> {
    let matched = matcher::match_charge(
      self.tx,
      booking_id,
      &charge.fields,
      &self.claimed.charges,
    )?;

    // Bonds and sentences are matched through the existing charge's links.
    let (linked_bond, linked_sentence) = match matched {
      Match::Existing(charge_id) => self.tx.query_row(
        "SELECT bond_id, sentence_id FROM charge WHERE charge_id = ?1",
        rusqlite::params![charge_id],
        |row| {
          Ok((row.get::<_, Option<i64>>(0)?, row.get::<_, Option<i64>>(1)?))
        },
      )?,
      Match::New | Match::Ambiguous => (None, None),
    };

    let bond_id = match &charge.bond {
      Some(bond_ref) => {
        let bond = graph
          .bond(bond_ref)
          .ok_or_else(|| missing(EntityKind::Bond, bond_ref))?;
        let matched = matcher::match_linked(
          self.tx,
          "bond",
          "bond_id",
          linked_bond,
          bond.fields.external_id.as_deref(),
        )?;
        let values = field_values(&bond.fields);
        Some(self.write(&schema::BOND, matched, &values, &[], &bond.local_id)?)
      },
      None => None,
    };

    let sentence_id = match &charge.sentence {
      Some(sentence_ref) => {
        let sentence = graph
          .sentence(sentence_ref)
          .ok_or_else(|| missing(EntityKind::Sentence, sentence_ref))?;
        let matched = matcher::match_linked(
          self.tx,
          "sentence",
          "sentence_id",
          linked_sentence,
          sentence.fields.external_id.as_deref(),
        )?;
        let values = field_values(&sentence.fields);
        Some(self.write(
          &schema::SENTENCE,
          matched,
          &values,
          &[],
          &sentence.local_id,
        )?)
      },
      None => None,
    };

    // Absent bond/sentence leaves the stored link alone via the null-merge
    // rule, exactly like an unreported field.
    let mut values = vec![
      Value::Integer(booking_id),
      opt_int(bond_id),
      opt_int(sentence_id),
    ];
    values.extend(field_values(&charge.fields));
    let charge_id =
      self.write(&schema::CHARGE, matched, &values, &[], &charge.local_id)?;
    self.claimed.charges.insert(charge_id);
    Ok(())
  }
}

fn field_values(fields: &impl EntityFields) -> Vec<Value> {
  fields.columns().into_iter().map(|(_, v)| opt_text(v)).collect()
}
