//! Inferring releases from absence.
//!
//! A booking still marked in custody whose `last_seen_time` predates the
//! region's most recent *complete* scrape was dropped from the roster; under
//! the region's [`ReleasePolicy`] that means released (or removed for unknown
//! reasons). The transition is an ordinary snapshot write with
//! `observed_at` set to the complete session's start, so inferred statuses
//! sit in history at the moment absence was established.

use remand_core::{entity::custody_status, session::ReleasePolicy};
use rusqlite::{Connection, OptionalExtension as _, types::Value};

use crate::{
  Result,
  encode::decode_dt,
  schema,
  snapshot::{self, Applied},
};

/// Transition every booking absent from `region`'s latest complete session.
/// Returns the number of bookings transitioned; a region with no complete
/// session is left untouched.
pub fn infer_releases(
  conn: &mut Connection,
  region: &str,
  policy: ReleasePolicy,
) -> Result<u64> {
  let tx = conn.transaction()?;

  let cutoff: Option<String> = tx
    .query_row(
      "SELECT started_at FROM scrape_sessions
       WHERE region = ?1 AND complete = 1
       ORDER BY started_at DESC LIMIT 1",
      rusqlite::params![region],
      |row| row.get(0),
    )
    .optional()?;
  let Some(cutoff) = cutoff else {
    tracing::debug!(region, "no complete session, skipping release inference");
    return Ok(0);
  };
  let observed_at = decode_dt(&cutoff)?;

  let sql = format!(
    "SELECT b.booking_id FROM booking b
     JOIN person p ON p.person_id = b.person_id
     WHERE p.region = ?1
       AND (b.custody_status IS NULL
            OR b.custody_status NOT IN ('{}', '{}', '{}'))
       AND b.last_seen_time < ?2
     ORDER BY b.booking_id",
    custody_status::RELEASED,
    custody_status::INFERRED_RELEASE,
    custody_status::UNKNOWN_REMOVED_FROM_SOURCE,
  );
  let absent: Vec<i64> = {
    let mut stmt = tx.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params![region, cutoff], |row| {
      row.get::<_, i64>(0)
    })?;
    let mut ids = Vec::new();
    for row in rows {
      ids.push(row?);
    }
    ids
  };

  let status = policy.custody_status();
  let mut transitioned = 0u64;
  for booking_id in &absent {
    // Only custody_status is observed; every other column stays put under
    // the null-merge rule.
    let values = status_only_values(status);
    let applied =
      snapshot::apply(&tx, &schema::BOOKING, *booking_id, &values, observed_at)?;
    if !matches!(applied, Applied::Unchanged) {
      transitioned += 1;
    }
  }

  tx.commit()?;
  tracing::info!(region, policy = ?policy, transitioned, "release inference");
  Ok(transitioned)
}

/// Booking column values carrying only a custody status, null everywhere
/// else, in [`schema::BOOKING`] column order.
fn status_only_values(status: &str) -> Vec<Value> {
  schema::BOOKING
    .all_columns()
    .map(|name| {
      if name == "custody_status" {
        Value::Text(status.to_string())
      } else {
        Value::Null
      }
    })
    .collect()
}
