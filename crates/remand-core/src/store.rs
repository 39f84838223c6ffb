//! The `RecordStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `remand-store-sqlite`).
//! Higher layers (`remand-api`) depend on this abstraction, not on any
//! concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  entity::EntityKind,
  graph::EntityGraph,
  session::{CommitOutcome, ReleasePolicy, SessionMetadata, SessionRecord},
  snapshot::{PersonView, Snapshot},
};

/// Abstraction over a Remand storage backend.
///
/// Master rows are mutated in place but never deleted; every mutation closes
/// and reopens a historical snapshot. The two write operations are the only
/// entry points that change state.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait RecordStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Persist one scrape session's entity graph atomically.
  ///
  /// Every entity is matched against existing master rows (external id
  /// first, conservative composite fallback) and snapshotted only if its
  /// fields changed. Parents are written before children. Re-committing an
  /// already-committed `session_id` is a no-op returning
  /// [`CommitOutcome::AlreadyCommitted`]. On any rejection the store is left
  /// exactly as it was.
  fn commit_session(
    &self,
    graph: EntityGraph,
    meta: SessionMetadata,
  ) -> impl Future<Output = Result<CommitOutcome, Self::Error>> + Send + '_;

  /// Mark bookings absent from the region's most recent *complete* session
  /// as released (or unknown-removed, per `policy`). Returns the number of
  /// bookings transitioned. A region with no complete session is untouched.
  fn infer_releases<'a>(
    &'a self,
    region: &'a str,
    policy: ReleasePolicy,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// All snapshots of one master entity, ordered by `valid_from`.
  fn entity_history(
    &self,
    kind: EntityKind,
    master_id: i64,
  ) -> impl Future<Output = Result<Vec<Snapshot>, Self::Error>> + Send + '_;

  /// Reconstruct a person and all related entities as of `at`.
  /// Returns `None` if the person did not exist at `at`.
  fn person_as_of(
    &self,
    person_id: i64,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<PersonView>, Self::Error>> + Send + '_;

  /// Find a person master id by source-provided external id within a region.
  fn lookup_person<'a>(
    &'a self,
    region: &'a str,
    external_id: &'a str,
  ) -> impl Future<Output = Result<Option<i64>, Self::Error>> + Send + 'a;

  /// The most recent committed session flagged complete for `region`.
  fn latest_complete_session<'a>(
    &'a self,
    region: &'a str,
  ) -> impl Future<Output = Result<Option<SessionRecord>, Self::Error>> + Send + 'a;
}
