//! Session identity, commit outcomes, and release-inference policy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::custody_status;

// ─── Session metadata ────────────────────────────────────────────────────────

/// Identity and timing of one scrape session.
///
/// `started_at` is the scrape start time; it becomes `valid_from` for every
/// snapshot the session opens and the `last_seen_time` for every booking the
/// session observes, so all rows written by one session carry one timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
  pub session_id: Uuid,
  pub region:     String,
  pub started_at: DateTime<Utc>,
  /// True when the scrape covered the region's full roster. Only complete
  /// sessions may drive release inference.
  pub complete:   bool,
}

impl SessionMetadata {
  pub fn new(region: impl Into<String>, started_at: DateTime<Utc>) -> Self {
    Self {
      session_id: Uuid::new_v4(),
      region: region.into(),
      started_at,
      complete: true,
    }
  }
}

/// A committed session as recorded in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
  pub session_id:   Uuid,
  pub region:       String,
  pub started_at:   DateTime<Utc>,
  pub committed_at: DateTime<Utc>,
  pub complete:     bool,
}

// ─── Commit outcome ──────────────────────────────────────────────────────────

/// Per-entity counters accumulated while committing one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionReport {
  /// Incoming entities resolved to an existing master row.
  pub entities_matched:  u64,
  /// Incoming entities that allocated a new master row.
  pub entities_created:  u64,
  /// Snapshots opened (including the initial snapshot of created entities).
  pub snapshots_opened:  u64,
  /// Matched entities whose fields were identical to the open snapshot.
  pub unchanged:         u64,
  /// Fallback matches that found multiple candidates and created instead.
  pub ambiguous_matches: u64,
}

/// Result of [`crate::store::RecordStore::commit_session`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommitOutcome {
  Committed(SessionReport),
  /// The session id was already fully committed; nothing was re-applied.
  AlreadyCommitted,
}

// ─── Release inference policy ────────────────────────────────────────────────

/// What disappearance from a region's roster means, configured per region by
/// the caller (not read from ambient state).
///
/// Some sources remove people on release; others remove them for transfers or
/// data hygiene, where release cannot be assumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleasePolicy {
  /// Absence means the person was released.
  InferredRelease,
  /// Absence is of unknown significance.
  UnknownRemoved,
}

impl ReleasePolicy {
  /// The custody status written to bookings absent from the latest complete
  /// scrape.
  pub fn custody_status(self) -> &'static str {
    match self {
      Self::InferredRelease => custody_status::INFERRED_RELEASE,
      Self::UnknownRemoved => custody_status::UNKNOWN_REMOVED_FROM_SOURCE,
    }
  }
}
