//! Handlers for session endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/sessions` | Body: [`CommitBody`]; 201 on commit, 200 if already committed |
//! | `GET`  | `/regions/:region/sessions/latest-complete` | Most recent complete session |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use remand_core::{
  graph::EntityGraph,
  session::{CommitOutcome, SessionMetadata, SessionRecord},
  store::RecordStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

fn default_complete() -> bool { true }

/// JSON body accepted by `POST /sessions`.
///
/// `session_id` is the idempotency key: callers retrying a failed upload
/// should resend the same id. Omitting it generates a fresh one.
#[derive(Debug, Deserialize)]
pub struct CommitBody {
  pub region:     String,
  pub started_at: DateTime<Utc>,
  pub session_id: Option<Uuid>,
  #[serde(default = "default_complete")]
  pub complete:   bool,
  pub graph:      EntityGraph,
}

/// `POST /sessions`
pub async fn commit<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<CommitBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RecordStore,
{
  let meta = SessionMetadata {
    session_id: body.session_id.unwrap_or_else(Uuid::new_v4),
    region:     body.region,
    started_at: body.started_at,
    complete:   body.complete,
  };

  let outcome = store
    .commit_session(body.graph, meta)
    .await
    .map_err(ApiError::from_store)?;

  let status = match &outcome {
    CommitOutcome::Committed(_) => StatusCode::CREATED,
    CommitOutcome::AlreadyCommitted => StatusCode::OK,
  };
  Ok((status, Json(outcome)))
}

/// `GET /regions/:region/sessions/latest-complete`
pub async fn latest_complete<S>(
  State(store): State<Arc<S>>,
  Path(region): Path<String>,
) -> Result<Json<SessionRecord>, ApiError>
where
  S: RecordStore,
{
  let record = store
    .latest_complete_session(&region)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!("no complete session for region {region}"))
    })?;
  Ok(Json(record))
}
