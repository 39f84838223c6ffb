//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// The store rejected the caller's data (malformed graph, out-of-order
  /// correction). Distinct from [`ApiError::Store`] so it maps to 422
  /// rather than 500.
  #[error("unprocessable: {0}")]
  Unprocessable(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Classify a store failure: rejections of the caller's payload become
  /// [`ApiError::Unprocessable`], everything else stays a server error.
  /// The error's source chain is walked because the SQLite backend wraps
  /// graph-validation errors from `remand-core`.
  pub fn from_store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(&e);
    while let Some(err) = current {
      if let Some(core) = err.downcast_ref::<remand_core::Error>() {
        return ApiError::Unprocessable(core.to_string());
      }
      if let Some(store) = err.downcast_ref::<remand_store_sqlite::Error>()
        && matches!(
          store,
          remand_store_sqlite::Error::OutOfOrderCorrection { .. }
        )
      {
        return ApiError::Unprocessable(store.to_string());
      }
      current = err.source();
    }
    ApiError::Store(Box::new(e))
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Unprocessable(m) => (StatusCode::UNPROCESSABLE_ENTITY, m.clone()),
      ApiError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
