//! Handlers for record read endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET` | `/records/:kind/:id/history` | All snapshots, oldest first |
//! | `GET` | `/people/:id` | `?as_of=<rfc3339>`, defaults to now |
//! | `GET` | `/regions/:region/people/lookup` | `?external_id=` required |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use remand_core::{
  entity::EntityKind,
  snapshot::{PersonView, Snapshot},
  store::RecordStore,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// `GET /records/:kind/:id/history`
pub async fn history<S>(
  State(store): State<Arc<S>>,
  Path((kind, id)): Path<(String, i64)>,
) -> Result<Json<Vec<Snapshot>>, ApiError>
where
  S: RecordStore,
{
  let kind: EntityKind = kind
    .parse()
    .map_err(|_| ApiError::BadRequest(format!("unknown record kind {kind:?}")))?;

  let snapshots = store
    .entity_history(kind, id)
    .await
    .map_err(ApiError::from_store)?;
  if snapshots.is_empty() {
    return Err(ApiError::NotFound(format!("no {kind} with id {id}")));
  }
  Ok(Json(snapshots))
}

#[derive(Debug, Deserialize)]
pub struct AsOfParams {
  pub as_of: Option<DateTime<Utc>>,
}

/// `GET /people/:id[?as_of=...]`
pub async fn person_as_of<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
  Query(params): Query<AsOfParams>,
) -> Result<Json<PersonView>, ApiError>
where
  S: RecordStore,
{
  let at = params.as_of.unwrap_or_else(Utc::now);
  let view = store
    .person_as_of(id, at)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!("person {id} did not exist at {at}"))
    })?;
  Ok(Json(view))
}

#[derive(Debug, Deserialize)]
pub struct LookupParams {
  pub external_id: String,
}

#[derive(Debug, Serialize)]
pub struct LookupResponse {
  pub person_id: i64,
}

/// `GET /regions/:region/people/lookup?external_id=...`
pub async fn lookup_person<S>(
  State(store): State<Arc<S>>,
  Path(region): Path<String>,
  Query(params): Query<LookupParams>,
) -> Result<Json<LookupResponse>, ApiError>
where
  S: RecordStore,
{
  let person_id = store
    .lookup_person(&region, &params.external_id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!(
        "no person with external id {:?} in region {region}",
        params.external_id
      ))
    })?;
  Ok(Json(LookupResponse { person_id }))
}
