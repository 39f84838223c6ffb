//! Error types for `remand-core`.

use thiserror::Error;

use crate::entity::EntityKind;

#[derive(Debug, Error)]
pub enum Error {
  /// A parent entity names a child local id that is not in the session graph.
  #[error("{kind} {local_id:?} is referenced but not present in session graph")]
  MissingEntity { kind: EntityKind, local_id: String },

  /// A child entity exists in the session graph but no parent links to it.
  #[error("{kind} {local_id:?} has no parent in session graph")]
  MissingParent { kind: EntityKind, local_id: String },

  #[error("duplicate local id {local_id:?} for {kind} in session graph")]
  DuplicateLocalId { kind: EntityKind, local_id: String },

  #[error("unknown entity kind: {0:?}")]
  UnknownEntityKind(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
