//! Matching incoming scraped entities to existing master rows.
//!
//! An external id, when the source provides one, is authoritative: it either
//! finds the row or the entity is new, and no fallback runs. Without one, a
//! conservative composite match runs — it must find exactly one candidate,
//! and anything ambiguous is treated as new rather than risk merging two
//! people's records.
//!
//! Each `claimed` set holds master ids already taken by earlier entities in
//! the same session, so two incoming rows can never resolve to one master.

use std::collections::HashSet;

use remand_core::entity::{
  BookingFields, ChargeFields, HoldFields, PersonFields, custody_status,
};
use rusqlite::{Connection, OptionalExtension as _};

use crate::{Result, encode::opt_text};

/// Where one incoming entity landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Match {
  /// Resolved to this master row.
  Existing(i64),
  /// No candidate; allocate a new master row.
  New,
  /// More than one candidate. The caller allocates a new master row and
  /// counts the ambiguity.
  Ambiguous,
}

// ─── Person ──────────────────────────────────────────────────────────────────

/// External id within the region, else exact (surname, given_names,
/// birthdate) with all three present. A partial identity never matches.
pub fn match_person(
  conn: &Connection,
  region: &str,
  fields: &PersonFields,
  claimed: &HashSet<i64>,
) -> Result<Match> {
  if let Some(external_id) = fields.external_id.as_deref() {
    let ids = query_ids(
      conn,
      "SELECT person_id FROM person WHERE region = ?1 AND external_id = ?2",
      rusqlite::params![region, external_id],
    )?;
    return Ok(resolve(ids, claimed));
  }

  let (Some(surname), Some(given_names), Some(birthdate)) =
    (&fields.surname, &fields.given_names, &fields.birthdate)
  else {
    return Ok(Match::New);
  };

  let ids = query_ids(
    conn,
    "SELECT person_id FROM person
     WHERE region = ?1 AND external_id IS NULL
       AND surname = ?2 AND given_names = ?3 AND birthdate = ?4",
    rusqlite::params![region, surname, given_names, birthdate],
  )?;
  Ok(resolve(ids, claimed))
}

// ─── Booking ─────────────────────────────────────────────────────────────────

/// External id within the person, else the person's single open booking
/// (one whose custody status is absent or non-terminal), narrowed by
/// admission date when the incoming booking reports one.
pub fn match_booking(
  conn: &Connection,
  person_id: i64,
  fields: &BookingFields,
  claimed: &HashSet<i64>,
) -> Result<Match> {
  if let Some(external_id) = fields.external_id.as_deref() {
    let ids = query_ids(
      conn,
      "SELECT booking_id FROM booking
       WHERE person_id = ?1 AND external_id = ?2",
      rusqlite::params![person_id, external_id],
    )?;
    return Ok(resolve(ids, claimed));
  }

  let sql = format!(
    "SELECT booking_id, admission_date FROM booking
     WHERE person_id = ?1
       AND (custody_status IS NULL
            OR custody_status NOT IN ('{}', '{}', '{}'))
     ORDER BY booking_id",
    custody_status::RELEASED,
    custody_status::INFERRED_RELEASE,
    custody_status::UNKNOWN_REMOVED_FROM_SOURCE,
  );
  let mut stmt = conn.prepare(&sql)?;
  let rows = stmt.query_map(rusqlite::params![person_id], |row| {
    Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?))
  })?;

  let mut ids = Vec::new();
  for row in rows {
    let (id, admission_date) = row?;
    // A known, different admission date rules the candidate out; an unknown
    // one does not.
    if let (Some(incoming), Some(stored)) =
      (&fields.admission_date, &admission_date)
      && incoming != stored
    {
      continue;
    }
    ids.push(id);
  }
  Ok(resolve(ids, claimed))
}

// ─── Arrest ──────────────────────────────────────────────────────────────────

/// A booking normally has one arrest, but conflicting external ids can leave
/// it with several rows. Candidates are scanned in id order: an exact
/// external-id match wins outright, otherwise the first row whose stored id
/// does not conflict with the incoming one. When every row conflicts, the
/// arrest is new.
pub fn match_arrest(
  conn: &Connection,
  booking_id: i64,
  incoming_external_id: Option<&str>,
) -> Result<Match> {
  let mut stmt = conn.prepare(
    "SELECT arrest_id, external_id FROM arrest
     WHERE booking_id = ?1 ORDER BY arrest_id",
  )?;
  let rows = stmt.query_map(rusqlite::params![booking_id], |row| {
    Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?))
  })?;

  let mut fallback = None;
  for row in rows {
    let (id, stored) = row?;
    if incoming_external_id.is_some()
      && incoming_external_id == stored.as_deref()
    {
      return Ok(Match::Existing(id));
    }
    if fallback.is_none()
      && !external_ids_conflict(incoming_external_id, stored.as_deref())
    {
      fallback = Some(id);
    }
  }
  Ok(fallback.map_or(Match::New, Match::Existing))
}

// ─── Charge ──────────────────────────────────────────────────────────────────

/// External id within the booking, else (statute, name) equality with SQL
/// null-safe comparison. Duplicate charges on one booking are legitimate
/// (multiple counts scraped as separate rows), so surviving candidates pair
/// off against incoming charges in id order via the `claimed` set.
pub fn match_charge(
  conn: &Connection,
  booking_id: i64,
  fields: &ChargeFields,
  claimed: &HashSet<i64>,
) -> Result<Match> {
  if let Some(external_id) = fields.external_id.as_deref() {
    let ids = query_ids(
      conn,
      "SELECT charge_id FROM charge
       WHERE booking_id = ?1 AND external_id = ?2",
      rusqlite::params![booking_id, external_id],
    )?;
    return Ok(resolve(ids, claimed));
  }

  if fields.statute.is_none() && fields.name.is_none() {
    return Ok(Match::New);
  }

  let ids = query_ids(
    conn,
    "SELECT charge_id FROM charge
     WHERE booking_id = ?1 AND statute IS ?2 AND name IS ?3
     ORDER BY charge_id",
    rusqlite::params![
      booking_id,
      opt_text(fields.statute.clone()),
      opt_text(fields.name.clone())
    ],
  )?;
  Ok(first_unclaimed(ids, claimed))
}

// ─── Hold ────────────────────────────────────────────────────────────────────

/// External id within the booking, else jurisdiction name.
pub fn match_hold(
  conn: &Connection,
  booking_id: i64,
  fields: &HoldFields,
  claimed: &HashSet<i64>,
) -> Result<Match> {
  if let Some(external_id) = fields.external_id.as_deref() {
    let ids = query_ids(
      conn,
      "SELECT hold_id FROM hold WHERE booking_id = ?1 AND external_id = ?2",
      rusqlite::params![booking_id, external_id],
    )?;
    return Ok(resolve(ids, claimed));
  }

  if fields.jurisdiction_name.is_none() {
    return Ok(Match::New);
  }

  let ids = query_ids(
    conn,
    "SELECT hold_id FROM hold
     WHERE booking_id = ?1 AND jurisdiction_name IS ?2
     ORDER BY hold_id",
    rusqlite::params![booking_id, opt_text(fields.jurisdiction_name.clone())],
  )?;
  Ok(first_unclaimed(ids, claimed))
}

// ─── Bond / Sentence ─────────────────────────────────────────────────────────

/// Bonds and sentences are reached only through their charge's link column.
/// The linked row is the match unless both sides carry external ids that
/// disagree; a charge without a link gets a fresh row.
pub fn match_linked(
  conn: &Connection,
  table: &str,
  id_column: &str,
  linked_id: Option<i64>,
  incoming_external_id: Option<&str>,
) -> Result<Match> {
  let Some(linked_id) = linked_id else {
    return Ok(Match::New);
  };

  let sql = format!("SELECT external_id FROM {table} WHERE {id_column} = ?1");
  let stored: Option<Option<String>> = conn
    .query_row(&sql, rusqlite::params![linked_id], |row| row.get(0))
    .optional()?;

  Ok(match stored {
    Some(stored) => {
      if external_ids_conflict(incoming_external_id, stored.as_deref()) {
        Match::New
      } else {
        Match::Existing(linked_id)
      }
    },
    None => Match::New,
  })
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn query_ids(
  conn: &Connection,
  sql: &str,
  params: impl rusqlite::Params,
) -> Result<Vec<i64>> {
  let mut stmt = conn.prepare(sql)?;
  let rows = stmt.query_map(params, |row| row.get::<_, i64>(0))?;
  let mut ids = Vec::new();
  for row in rows {
    ids.push(row?);
  }
  Ok(ids)
}

/// Exactly one unclaimed candidate matches; zero is new; more is ambiguous.
fn resolve(ids: Vec<i64>, claimed: &HashSet<i64>) -> Match {
  let mut unclaimed = ids.into_iter().filter(|id| !claimed.contains(id));
  match (unclaimed.next(), unclaimed.next()) {
    (Some(id), None) => Match::Existing(id),
    (None, _) => Match::New,
    (Some(_), Some(_)) => Match::Ambiguous,
  }
}

/// Like [`resolve`] but duplicates pair off instead of counting as
/// ambiguous. Only used where identical siblings are expected (charges with
/// multiple counts, holds repeated per jurisdiction).
fn first_unclaimed(ids: Vec<i64>, claimed: &HashSet<i64>) -> Match {
  ids
    .into_iter()
    .find(|id| !claimed.contains(id))
    .map_or(Match::New, Match::Existing)
}

fn external_ids_conflict(incoming: Option<&str>, stored: Option<&str>) -> bool {
  matches!((incoming, stored), (Some(a), Some(b)) if a != b)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn resolve_requires_a_single_candidate() {
    let claimed = HashSet::new();
    assert_eq!(resolve(vec![], &claimed), Match::New);
    assert_eq!(resolve(vec![7], &claimed), Match::Existing(7));
    assert_eq!(resolve(vec![7, 8], &claimed), Match::Ambiguous);
  }

  #[test]
  fn resolve_skips_claimed_candidates() {
    let claimed: HashSet<i64> = [7].into_iter().collect();
    assert_eq!(resolve(vec![7, 8], &claimed), Match::Existing(8));
    assert_eq!(resolve(vec![7], &claimed), Match::New);
  }

  #[test]
  fn duplicates_pair_off_in_id_order() {
    let claimed: HashSet<i64> = [3].into_iter().collect();
    assert_eq!(first_unclaimed(vec![3, 5, 9], &claimed), Match::Existing(5));
    assert_eq!(first_unclaimed(vec![3], &claimed), Match::New);
  }

  #[test]
  fn external_id_conflict_only_when_both_present_and_unequal() {
    assert!(external_ids_conflict(Some("a"), Some("b")));
    assert!(!external_ids_conflict(Some("a"), Some("a")));
    assert!(!external_ids_conflict(None, Some("a")));
    assert!(!external_ids_conflict(Some("a"), None));
  }
}
