//! Handler for `POST /regions/:region/infer-release`.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use remand_core::{session::ReleasePolicy, store::RecordStore};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct InferBody {
  pub policy: ReleasePolicy,
}

#[derive(Debug, Serialize)]
pub struct InferResponse {
  /// Bookings transitioned to the policy's terminal custody status.
  pub transitioned: u64,
}

/// `POST /regions/:region/infer-release` — body: `{"policy":"inferred_release"}`.
pub async fn infer<S>(
  State(store): State<Arc<S>>,
  Path(region): Path<String>,
  Json(body): Json<InferBody>,
) -> Result<Json<InferResponse>, ApiError>
where
  S: RecordStore,
{
  let transitioned = store
    .infer_releases(&region, body.policy)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(InferResponse { transitioned }))
}
