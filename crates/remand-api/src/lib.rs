//! JSON REST API for Remand.
//!
//! Exposes an axum [`Router`] backed by any [`remand_core::store::RecordStore`].
//! Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", remand_api::api_router(store.clone()))
//! ```

pub mod error;
pub mod records;
pub mod releases;
pub mod sessions;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post},
};
use remand_core::store::RecordStore;
use serde::Deserialize;

pub use error::ApiError;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: RecordStore + 'static,
{
  Router::new()
    // Sessions
    .route("/sessions", post(sessions::commit::<S>))
    .route(
      "/regions/{region}/sessions/latest-complete",
      get(sessions::latest_complete::<S>),
    )
    // Release inference
    .route("/regions/{region}/infer-release", post(releases::infer::<S>))
    // Reads
    .route("/records/{kind}/{id}/history", get(records::history::<S>))
    .route("/people/{id}", get(records::person_as_of::<S>))
    .route("/regions/{region}/people/lookup", get(records::lookup_person::<S>))
    .with_state(store)
}

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use remand_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  use super::*;

  async fn app() -> Router {
    let store = SqliteStore::open_in_memory().await.expect("in-memory store");
    api_router(Arc::new(store))
  }

  async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
  ) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
      Some(v) => builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&v).unwrap()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
      .await
      .unwrap();
    let value = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
  }

  fn roster_commit(started_at: &str, facility: &str) -> Value {
    json!({
      "region": "us_xx",
      "started_at": started_at,
      "graph": {
        "people": [{
          "local_id": "p1",
          "fields": {
            "external_id": "P-1",
            "surname": "Doe",
            "given_names": "Jane",
            "birthdate": "1980-01-01"
          },
          "bookings": ["b1"]
        }],
        "bookings": [{
          "local_id": "b1",
          "fields": {
            "external_id": "B-1",
            "custody_status": "in_custody",
            "facility": facility
          }
        }]
      }
    })
  }

  #[tokio::test]
  async fn commit_then_read_history() {
    let app = app().await;

    let (status, body) = send(
      &app,
      "POST",
      "/sessions",
      Some(roster_commit("2024-01-02T00:00:00Z", "county jail")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["outcome"], "committed");
    assert_eq!(body["entities_created"], 2);

    let (status, body) =
      send(&app, "GET", "/records/person/1/history", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["fields"]["surname"], "Doe");
  }

  #[tokio::test]
  async fn recommitting_a_session_id_returns_ok_not_created() {
    let app = app().await;
    let session_id = uuid::Uuid::new_v4();
    let mut commit = roster_commit("2024-01-02T00:00:00Z", "county jail");
    commit["session_id"] = json!(session_id);

    let (status, _) = send(&app, "POST", "/sessions", Some(commit.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, "POST", "/sessions", Some(commit)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "already_committed");
  }

  #[tokio::test]
  async fn malformed_graph_is_unprocessable_not_server_error() {
    let app = app().await;

    // A booking reference that points nowhere.
    let dangling = json!({
      "region": "us_xx",
      "started_at": "2024-01-02T00:00:00Z",
      "graph": {
        "people": [{
          "local_id": "p1",
          "fields": { "external_id": "P-1" },
          "bookings": ["no-such-booking"]
        }]
      }
    });
    let (status, body) = send(&app, "POST", "/sessions", Some(dangling)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("no-such-booking"));

    // Two people sharing a local id.
    let duplicate = json!({
      "region": "us_xx",
      "started_at": "2024-01-02T00:00:00Z",
      "graph": {
        "people": [
          { "local_id": "p1", "fields": { "external_id": "P-1" } },
          { "local_id": "p1", "fields": { "external_id": "P-2" } }
        ]
      }
    });
    let (status, _) = send(&app, "POST", "/sessions", Some(duplicate)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  }

  #[tokio::test]
  async fn correction_predating_history_is_unprocessable() {
    let app = app().await;
    send(
      &app,
      "POST",
      "/sessions",
      Some(roster_commit("2024-01-02T00:00:00Z", "county jail")),
    )
    .await;

    let (status, _) = send(
      &app,
      "POST",
      "/sessions",
      Some(roster_commit("2023-12-01T00:00:00Z", "annex")),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  }

  #[tokio::test]
  async fn unknown_record_kind_is_bad_request() {
    let app = app().await;
    let (status, _) =
      send(&app, "GET", "/records/warrant/1/history", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn missing_record_is_not_found() {
    let app = app().await;
    let (status, _) = send(&app, "GET", "/records/person/9/history", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn person_as_of_reads_past_and_present() {
    let app = app().await;
    send(
      &app,
      "POST",
      "/sessions",
      Some(roster_commit("2024-01-02T00:00:00Z", "county jail")),
    )
    .await;
    send(
      &app,
      "POST",
      "/sessions",
      Some(roster_commit("2024-01-08T00:00:00Z", "annex")),
    )
    .await;

    let (status, body) = send(
      &app,
      "GET",
      "/people/1?as_of=2024-01-05T00:00:00Z",
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bookings"][0]["booking"]["fields"]["facility"], "county jail");

    let (status, body) = send(&app, "GET", "/people/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bookings"][0]["booking"]["fields"]["facility"], "annex");

    let (status, _) = send(
      &app,
      "GET",
      "/people/1?as_of=2023-06-01T00:00:00Z",
      None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn lookup_person_by_external_id() {
    let app = app().await;
    send(
      &app,
      "POST",
      "/sessions",
      Some(roster_commit("2024-01-02T00:00:00Z", "county jail")),
    )
    .await;

    let (status, body) = send(
      &app,
      "GET",
      "/regions/us_xx/people/lookup?external_id=P-1",
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["person_id"], 1);

    let (status, _) = send(
      &app,
      "GET",
      "/regions/us_xx/people/lookup?external_id=P-9",
      None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn infer_release_endpoint_transitions_absent_bookings() {
    let app = app().await;
    send(
      &app,
      "POST",
      "/sessions",
      Some(roster_commit("2024-01-02T00:00:00Z", "county jail")),
    )
    .await;

    // A later complete roster where Jane is gone.
    let empty = json!({
      "region": "us_xx",
      "started_at": "2024-01-09T00:00:00Z",
      "graph": {
        "people": [{
          "local_id": "p9",
          "fields": { "external_id": "P-9", "surname": "Roe" }
        }]
      }
    });
    send(&app, "POST", "/sessions", Some(empty)).await;

    let (status, body) = send(
      &app,
      "POST",
      "/regions/us_xx/infer-release",
      Some(json!({ "policy": "inferred_release" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transitioned"], 1);

    let (_, history) =
      send(&app, "GET", "/records/booking/1/history", None).await;
    let open = history.as_array().unwrap().last().unwrap().clone();
    assert_eq!(open["fields"]["custody_status"], "inferred_release");
  }

  #[tokio::test]
  async fn latest_complete_session_endpoint() {
    let app = app().await;
    let (status, _) = send(
      &app,
      "GET",
      "/regions/us_xx/sessions/latest-complete",
      None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    send(
      &app,
      "POST",
      "/sessions",
      Some(roster_commit("2024-01-02T00:00:00Z", "county jail")),
    )
    .await;

    let (status, body) = send(
      &app,
      "GET",
      "/regions/us_xx/sessions/latest-complete",
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["region"], "us_xx");
    assert_eq!(body["complete"], true);
  }
}
