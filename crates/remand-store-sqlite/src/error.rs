//! Error type for `remand-store-sqlite`.

use chrono::{DateTime, Utc};
use remand_core::entity::EntityKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] remand_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored value that should be well formed is not (e.g. a non-numeric
  /// historical link id).
  #[error("corrupt stored value: {0}")]
  Corrupt(String),

  /// The master row's version changed between read and write — another
  /// writer touched it. The whole session rolls back for caller retry.
  #[error("concurrent modification of {kind} {master_id}")]
  ConcurrentModification { kind: EntityKind, master_id: i64 },

  /// A back-dated correction predates the entity's first snapshot; applying
  /// it would leave a gap in interval coverage.
  #[error(
    "correction at {observed_at} predates first snapshot of {kind} {master_id}"
  )]
  OutOfOrderCorrection {
    kind:        EntityKind,
    master_id:   i64,
    observed_at: DateTime<Utc>,
  },

  /// Invariant breach: a master row with no open snapshot.
  #[error("no open snapshot for {kind} {master_id}")]
  MissingOpenSnapshot { kind: EntityKind, master_id: i64 },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
