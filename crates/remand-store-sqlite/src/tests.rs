//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{DateTime, Utc};
use remand_core::{
  entity::{
    ArrestFields, BondFields, BookingFields, ChargeFields, EntityKind,
    PersonFields, custody_status,
  },
  graph::EntityGraph,
  session::{CommitOutcome, ReleasePolicy, SessionMetadata, SessionReport},
  store::RecordStore,
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn ts(s: &str) -> DateTime<Utc> {
  DateTime::parse_from_rfc3339(s)
    .expect("test timestamp")
    .with_timezone(&Utc)
}

fn meta(region: &str, at: &str) -> SessionMetadata {
  SessionMetadata::new(region, ts(at))
}

fn incomplete(region: &str, at: &str) -> SessionMetadata {
  let mut m = meta(region, at);
  m.complete = false;
  m
}

fn committed(outcome: CommitOutcome) -> SessionReport {
  match outcome {
    CommitOutcome::Committed(report) => report,
    CommitOutcome::AlreadyCommitted => panic!("expected a fresh commit"),
  }
}

fn jane(external_id: Option<&str>) -> PersonFields {
  PersonFields {
    external_id: external_id.map(Into::into),
    surname: Some("Doe".into()),
    given_names: Some("Jane".into()),
    birthdate: Some("1980-01-01".into()),
    ..Default::default()
  }
}

fn booking(facility: &str) -> BookingFields {
  BookingFields {
    external_id: Some("B-1".into()),
    admission_date: Some("2024-01-01".into()),
    custody_status: Some(custody_status::IN_CUSTODY.into()),
    facility: Some(facility.into()),
    ..Default::default()
  }
}

fn theft_charge() -> ChargeFields {
  ChargeFields {
    statute: Some("PC 484".into()),
    name: Some("petty theft".into()),
    ..Default::default()
  }
}

/// Jane, one booking, one charge with a bond.
fn roster(facility: &str, bond_amount: &str) -> EntityGraph {
  let mut g = EntityGraph::default();
  let p = g.add_person("p1", jane(Some("P-1")));
  let b = g.add_booking(&p, "b1", booking(facility));
  let c = g.add_charge(&b, "c1", theft_charge());
  g.add_bond(
    &c,
    "bo1",
    BondFields { amount: Some(bond_amount.into()), ..Default::default() },
  );
  g
}

// ─── Commit basics ───────────────────────────────────────────────────────────

#[tokio::test]
async fn commit_creates_all_entities() {
  let s = store().await;

  let report = committed(
    s.commit_session(roster("county jail", "1000"), meta("us_xx", "2024-01-02T00:00:00Z"))
      .await
      .unwrap(),
  );

  assert_eq!(report.entities_created, 4);
  assert_eq!(report.entities_matched, 0);
  assert_eq!(report.snapshots_opened, 4);
  assert_eq!(report.unchanged, 0);

  let person_id = s.lookup_person("us_xx", "P-1").await.unwrap().unwrap();
  let history = s.entity_history(EntityKind::Person, person_id).await.unwrap();
  assert_eq!(history.len(), 1);
  assert!(history[0].is_open());
  assert_eq!(history[0].valid_from, ts("2024-01-02T00:00:00Z"));
}

#[tokio::test]
async fn recommitting_a_session_id_is_a_noop() {
  let s = store().await;
  let m = meta("us_xx", "2024-01-02T00:00:00Z");

  committed(
    s.commit_session(roster("county jail", "1000"), m.clone())
      .await
      .unwrap(),
  );
  let second = s
    .commit_session(roster("county jail", "1000"), m)
    .await
    .unwrap();

  assert!(matches!(second, CommitOutcome::AlreadyCommitted));

  let person_id = s.lookup_person("us_xx", "P-1").await.unwrap().unwrap();
  let history = s.entity_history(EntityKind::Person, person_id).await.unwrap();
  assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn identical_rescrape_opens_no_snapshots() {
  let s = store().await;

  committed(
    s.commit_session(roster("county jail", "1000"), meta("us_xx", "2024-01-02T00:00:00Z"))
      .await
      .unwrap(),
  );
  let report = committed(
    s.commit_session(roster("county jail", "1000"), meta("us_xx", "2024-01-03T00:00:00Z"))
      .await
      .unwrap(),
  );

  assert_eq!(report.entities_matched, 4);
  assert_eq!(report.entities_created, 0);
  assert_eq!(report.unchanged, 4);
  assert_eq!(report.snapshots_opened, 0);

  let person_id = s.lookup_person("us_xx", "P-1").await.unwrap().unwrap();
  let history = s.entity_history(EntityKind::Person, person_id).await.unwrap();
  assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn changed_field_closes_and_reopens_snapshot() {
  let s = store().await;

  committed(
    s.commit_session(roster("county jail", "1000"), meta("us_xx", "2024-01-02T00:00:00Z"))
      .await
      .unwrap(),
  );
  let report = committed(
    s.commit_session(roster("annex", "1000"), meta("us_xx", "2024-01-05T00:00:00Z"))
      .await
      .unwrap(),
  );

  // Only the booking changed.
  assert_eq!(report.snapshots_opened, 1);
  assert_eq!(report.unchanged, 3);

  let history = s.entity_history(EntityKind::Booking, 1).await.unwrap();
  assert_eq!(history.len(), 2);
  assert_eq!(history[0].valid_to, Some(history[1].valid_from));
  assert!(history[1].is_open());
  assert_eq!(history[0].field("facility"), Some("county jail"));
  assert_eq!(history[1].field("facility"), Some("annex"));
  assert_eq!(history[1].valid_from, ts("2024-01-05T00:00:00Z"));
}

#[tokio::test]
async fn absent_field_never_overwrites_known_value() {
  let s = store().await;

  committed(
    s.commit_session(roster("county jail", "1000"), meta("us_xx", "2024-01-02T00:00:00Z"))
      .await
      .unwrap(),
  );

  // Same booking, facility unreported this time, release date newly known.
  let mut g = EntityGraph::default();
  let p = g.add_person("p1", jane(Some("P-1")));
  g.add_booking(
    &p,
    "b1",
    BookingFields {
      external_id: Some("B-1".into()),
      release_date: Some("2024-01-06".into()),
      ..Default::default()
    },
  );
  committed(
    s.commit_session(g, meta("us_xx", "2024-01-06T00:00:00Z"))
      .await
      .unwrap(),
  );

  let history = s.entity_history(EntityKind::Booking, 1).await.unwrap();
  assert_eq!(history.len(), 2);
  let open = &history[1];
  assert_eq!(open.field("facility"), Some("county jail"));
  assert_eq!(open.field("release_date"), Some("2024-01-06"));
}

// ─── Matching ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn external_id_matches_across_name_changes() {
  let s = store().await;

  committed(
    s.commit_session(roster("county jail", "1000"), meta("us_xx", "2024-01-02T00:00:00Z"))
      .await
      .unwrap(),
  );

  let mut g = EntityGraph::default();
  g.add_person(
    "p1",
    PersonFields {
      external_id: Some("P-1".into()),
      surname: Some("Doe-Smith".into()),
      ..Default::default()
    },
  );
  let report = committed(
    s.commit_session(g, meta("us_xx", "2024-01-03T00:00:00Z"))
      .await
      .unwrap(),
  );

  assert_eq!(report.entities_matched, 1);
  assert_eq!(report.entities_created, 0);

  let person_id = s.lookup_person("us_xx", "P-1").await.unwrap().unwrap();
  let history = s.entity_history(EntityKind::Person, person_id).await.unwrap();
  assert_eq!(history.len(), 2);
  assert_eq!(history[1].field("surname"), Some("Doe-Smith"));
}

#[tokio::test]
async fn external_ids_are_scoped_to_region() {
  let s = store().await;

  let mut g = EntityGraph::default();
  g.add_person("p1", jane(Some("P-1")));
  committed(
    s.commit_session(g, meta("us_xx", "2024-01-02T00:00:00Z"))
      .await
      .unwrap(),
  );

  let mut g = EntityGraph::default();
  g.add_person("p1", jane(Some("P-1")));
  let report = committed(
    s.commit_session(g, meta("us_yy", "2024-01-02T00:00:00Z"))
      .await
      .unwrap(),
  );

  // Same id, different region: a different person.
  assert_eq!(report.entities_created, 1);
  assert!(s.lookup_person("us_yy", "P-1").await.unwrap().is_some());
  assert_ne!(
    s.lookup_person("us_xx", "P-1").await.unwrap(),
    s.lookup_person("us_yy", "P-1").await.unwrap(),
  );
}

#[tokio::test]
async fn composite_match_without_external_id() {
  let s = store().await;

  let mut g = EntityGraph::default();
  g.add_person("p1", jane(None));
  committed(
    s.commit_session(g, meta("us_xx", "2024-01-02T00:00:00Z"))
      .await
      .unwrap(),
  );

  let mut g = EntityGraph::default();
  g.add_person(
    "p1",
    PersonFields { gender: Some("female".into()), ..jane(None) },
  );
  let report = committed(
    s.commit_session(g, meta("us_xx", "2024-01-03T00:00:00Z"))
      .await
      .unwrap(),
  );

  assert_eq!(report.entities_matched, 1);
  assert_eq!(report.entities_created, 0);
}

#[tokio::test]
async fn partial_identity_never_matches() {
  let s = store().await;

  let no_birthdate =
    PersonFields { birthdate: None, ..jane(None) };

  let mut g = EntityGraph::default();
  g.add_person("p1", no_birthdate.clone());
  committed(
    s.commit_session(g, meta("us_xx", "2024-01-02T00:00:00Z"))
      .await
      .unwrap(),
  );

  let mut g = EntityGraph::default();
  g.add_person("p1", no_birthdate);
  let report = committed(
    s.commit_session(g, meta("us_xx", "2024-01-03T00:00:00Z"))
      .await
      .unwrap(),
  );

  // Missing birthdate means the composite never runs.
  assert_eq!(report.entities_matched, 0);
  assert_eq!(report.entities_created, 1);
}

#[tokio::test]
async fn ambiguous_composite_creates_instead_of_guessing() {
  let s = store().await;

  // Two distinct people with identical identifying fields.
  let mut g = EntityGraph::default();
  g.add_person("p1", jane(None));
  g.add_person("p2", jane(None));
  committed(
    s.commit_session(g, meta("us_xx", "2024-01-02T00:00:00Z"))
      .await
      .unwrap(),
  );

  let mut g = EntityGraph::default();
  g.add_person("p1", jane(None));
  let report = committed(
    s.commit_session(g, meta("us_xx", "2024-01-03T00:00:00Z"))
      .await
      .unwrap(),
  );

  assert_eq!(report.ambiguous_matches, 1);
  assert_eq!(report.entities_created, 1);
  assert_eq!(report.entities_matched, 0);
}

#[tokio::test]
async fn booking_without_external_id_matches_single_open_booking() {
  let s = store().await;

  let mut g = EntityGraph::default();
  let p = g.add_person("p1", jane(Some("P-1")));
  g.add_booking(
    &p,
    "b1",
    BookingFields {
      admission_date: Some("2024-01-01".into()),
      facility: Some("county jail".into()),
      ..Default::default()
    },
  );
  committed(
    s.commit_session(g, meta("us_xx", "2024-01-02T00:00:00Z"))
      .await
      .unwrap(),
  );

  let mut g = EntityGraph::default();
  let p = g.add_person("p1", jane(Some("P-1")));
  g.add_booking(
    &p,
    "b1",
    BookingFields {
      admission_date: Some("2024-01-01".into()),
      facility: Some("annex".into()),
      ..Default::default()
    },
  );
  let report = committed(
    s.commit_session(g, meta("us_xx", "2024-01-03T00:00:00Z"))
      .await
      .unwrap(),
  );

  assert_eq!(report.entities_matched, 2);
  let history = s.entity_history(EntityKind::Booking, 1).await.unwrap();
  assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn conflicting_arrest_external_id_creates_without_losing_the_first() {
  let s = store().await;

  let arrest = |external_id: &str, agency: &str| ArrestFields {
    external_id: Some(external_id.into()),
    agency: Some(agency.into()),
    ..Default::default()
  };

  let mut g = EntityGraph::default();
  let p = g.add_person("p1", jane(Some("P-1")));
  let b = g.add_booking(&p, "b1", booking("county jail"));
  g.add_arrest(&b, "a1", arrest("A-1", "city pd"));
  committed(
    s.commit_session(g, meta("us_xx", "2024-01-02T00:00:00Z"))
      .await
      .unwrap(),
  );

  // A different external id on the same booking is a new arrest.
  let mut g = EntityGraph::default();
  let p = g.add_person("p1", jane(Some("P-1")));
  let b = g.add_booking(&p, "b1", booking("county jail"));
  g.add_arrest(&b, "a1", arrest("A-2", "sheriff"));
  let report = committed(
    s.commit_session(g, meta("us_xx", "2024-01-03T00:00:00Z"))
      .await
      .unwrap(),
  );
  assert_eq!(report.entities_created, 1);
  assert_eq!(s.entity_history(EntityKind::Arrest, 2).await.unwrap().len(), 1);

  // Re-sending the first id matches the first row, not the second.
  let mut g = EntityGraph::default();
  let p = g.add_person("p1", jane(Some("P-1")));
  let b = g.add_booking(&p, "b1", booking("county jail"));
  g.add_arrest(&b, "a1", arrest("A-1", "state patrol"));
  let report = committed(
    s.commit_session(g, meta("us_xx", "2024-01-04T00:00:00Z"))
      .await
      .unwrap(),
  );
  assert_eq!(report.entities_created, 0);

  let first = s.entity_history(EntityKind::Arrest, 1).await.unwrap();
  assert_eq!(first.len(), 2);
  assert_eq!(first[1].field("agency"), Some("state patrol"));
  assert_eq!(s.entity_history(EntityKind::Arrest, 2).await.unwrap().len(), 1);

  // The view shows the most recently observed arrest.
  let person_id = s.lookup_person("us_xx", "P-1").await.unwrap().unwrap();
  let view = s
    .person_as_of(person_id, ts("2024-02-01T00:00:00Z"))
    .await
    .unwrap()
    .unwrap();
  let shown = view.bookings[0].arrest.as_ref().unwrap();
  assert_eq!(shown.field("external_id"), Some("A-1"));
  assert_eq!(shown.field("agency"), Some("state patrol"));
}

#[tokio::test]
async fn bond_matched_through_charge_link() {
  let s = store().await;

  committed(
    s.commit_session(roster("county jail", "1000"), meta("us_xx", "2024-01-02T00:00:00Z"))
      .await
      .unwrap(),
  );
  let report = committed(
    s.commit_session(roster("county jail", "2000"), meta("us_xx", "2024-01-03T00:00:00Z"))
      .await
      .unwrap(),
  );

  assert_eq!(report.entities_created, 0);
  let history = s.entity_history(EntityKind::Bond, 1).await.unwrap();
  assert_eq!(history.len(), 2);
  assert_eq!(history[0].field("amount"), Some("1000"));
  assert_eq!(history[1].field("amount"), Some("2000"));
}

// ─── Graph validation and atomicity ──────────────────────────────────────────

#[tokio::test]
async fn dangling_reference_rolls_back_the_whole_session() {
  let s = store().await;

  let mut g = EntityGraph::default();
  g.add_person("p1", jane(Some("P-1")));
  // A second person whose booking reference points nowhere.
  let p2 = g.add_person(
    "p2",
    PersonFields { external_id: Some("P-2".into()), ..jane(None) },
  );
  g.people
    .iter_mut()
    .find(|p| p.local_id == p2)
    .unwrap()
    .bookings
    .push("no-such-booking".into());

  let err = s
    .commit_session(g, meta("us_xx", "2024-01-02T00:00:00Z"))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(remand_core::Error::MissingEntity { .. })
  ));

  // The valid first person was not persisted either.
  assert!(s.lookup_person("us_xx", "P-1").await.unwrap().is_none());
}

#[tokio::test]
async fn orphaned_child_is_rejected() {
  let s = store().await;

  let mut g = EntityGraph::default();
  g.add_person("p1", jane(Some("P-1")));
  // Parent local id does not exist, so the booking ends up unreferenced.
  g.add_booking("nope", "b1", booking("county jail"));

  let err = s
    .commit_session(g, meta("us_xx", "2024-01-02T00:00:00Z"))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(remand_core::Error::MissingParent { .. })
  ));
  assert!(s.lookup_person("us_xx", "P-1").await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_local_id_is_rejected() {
  let s = store().await;

  let mut g = EntityGraph::default();
  g.add_person("p1", jane(Some("P-1")));
  g.add_person("p1", jane(Some("P-2")));

  let err = s
    .commit_session(g, meta("us_xx", "2024-01-02T00:00:00Z"))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(remand_core::Error::DuplicateLocalId { .. })
  ));
}

// ─── Out-of-order corrections ────────────────────────────────────────────────

#[tokio::test]
async fn backdated_correction_splits_the_closed_interval() {
  let s = store().await;

  committed(
    s.commit_session(roster("county jail", "1000"), meta("us_xx", "2024-01-02T00:00:00Z"))
      .await
      .unwrap(),
  );
  committed(
    s.commit_session(roster("annex", "1000"), meta("us_xx", "2024-01-08T00:00:00Z"))
      .await
      .unwrap(),
  );
  // A delayed batch observed between the two.
  committed(
    s.commit_session(roster("work camp", "1000"), meta("us_xx", "2024-01-05T00:00:00Z"))
      .await
      .unwrap(),
  );

  let history = s.entity_history(EntityKind::Booking, 1).await.unwrap();
  assert_eq!(history.len(), 3);
  assert_eq!(history[0].field("facility"), Some("county jail"));
  assert_eq!(history[1].field("facility"), Some("work camp"));
  assert_eq!(history[2].field("facility"), Some("annex"));

  // Coverage stays contiguous and the open snapshot is untouched.
  assert_eq!(history[0].valid_to, Some(history[1].valid_from));
  assert_eq!(history[1].valid_to, Some(history[2].valid_from));
  assert_eq!(history[1].valid_from, ts("2024-01-05T00:00:00Z"));
  assert!(history[2].is_open());
}

#[tokio::test]
async fn correction_before_first_snapshot_is_rejected() {
  let s = store().await;

  committed(
    s.commit_session(roster("county jail", "1000"), meta("us_xx", "2024-01-02T00:00:00Z"))
      .await
      .unwrap(),
  );

  let err = s
    .commit_session(roster("annex", "1000"), meta("us_xx", "2023-12-01T00:00:00Z"))
      .await
      .unwrap_err();
  assert!(matches!(err, crate::Error::OutOfOrderCorrection { .. }));

  // Rolled back: history untouched.
  let history = s.entity_history(EntityKind::Booking, 1).await.unwrap();
  assert_eq!(history.len(), 1);
}

// ─── Release inference ───────────────────────────────────────────────────────

#[tokio::test]
async fn absent_bookings_are_inferred_released() {
  let s = store().await;

  // Two people on the roster.
  let mut g = EntityGraph::default();
  let p1 = g.add_person("p1", jane(Some("P-1")));
  g.add_booking(&p1, "b1", booking("county jail"));
  let p2 = g.add_person(
    "p2",
    PersonFields {
      external_id: Some("P-2".into()),
      surname: Some("Roe".into()),
      ..Default::default()
    },
  );
  g.add_booking(
    &p2,
    "b2",
    BookingFields {
      external_id: Some("B-2".into()),
      custody_status: Some(custody_status::IN_CUSTODY.into()),
      ..Default::default()
    },
  );
  committed(
    s.commit_session(g, meta("us_xx", "2024-01-02T00:00:00Z"))
      .await
      .unwrap(),
  );

  // The next complete scrape only sees the first person.
  committed(
    s.commit_session(roster("county jail", "1000"), meta("us_xx", "2024-01-09T00:00:00Z"))
      .await
      .unwrap(),
  );

  let transitioned = s
    .infer_releases("us_xx", ReleasePolicy::InferredRelease)
    .await
    .unwrap();
  assert_eq!(transitioned, 1);

  let history = s.entity_history(EntityKind::Booking, 2).await.unwrap();
  assert_eq!(history.len(), 2);
  let open = &history[1];
  assert_eq!(
    open.field("custody_status"),
    Some(custody_status::INFERRED_RELEASE)
  );
  assert_eq!(open.valid_from, ts("2024-01-09T00:00:00Z"));

  // The still-present booking is untouched.
  let present = s.entity_history(EntityKind::Booking, 1).await.unwrap();
  assert_eq!(present.len(), 1);

  // Running again transitions nothing further.
  let again = s
    .infer_releases("us_xx", ReleasePolicy::InferredRelease)
    .await
    .unwrap();
  assert_eq!(again, 0);
}

#[tokio::test]
async fn unknown_removed_policy_writes_unknown_status() {
  let s = store().await;

  committed(
    s.commit_session(roster("county jail", "1000"), meta("us_xx", "2024-01-02T00:00:00Z"))
      .await
      .unwrap(),
  );
  let mut g = EntityGraph::default();
  g.add_person(
    "p9",
    PersonFields {
      external_id: Some("P-9".into()),
      surname: Some("Poe".into()),
      ..Default::default()
    },
  );
  committed(
    s.commit_session(g, meta("us_xx", "2024-01-09T00:00:00Z"))
      .await
      .unwrap(),
  );

  let transitioned = s
    .infer_releases("us_xx", ReleasePolicy::UnknownRemoved)
    .await
    .unwrap();
  assert_eq!(transitioned, 1);

  let history = s.entity_history(EntityKind::Booking, 1).await.unwrap();
  assert_eq!(
    history.last().unwrap().field("custody_status"),
    Some(custody_status::UNKNOWN_REMOVED_FROM_SOURCE)
  );
}

#[tokio::test]
async fn incomplete_sessions_never_drive_inference() {
  let s = store().await;

  committed(
    s.commit_session(
      roster("county jail", "1000"),
      incomplete("us_xx", "2024-01-02T00:00:00Z"),
    )
    .await
    .unwrap(),
  );
  // A later incomplete scrape that misses the booking entirely.
  let mut g = EntityGraph::default();
  g.add_person(
    "p9",
    PersonFields {
      external_id: Some("P-9".into()),
      surname: Some("Poe".into()),
      ..Default::default()
    },
  );
  committed(
    s.commit_session(g, incomplete("us_xx", "2024-01-09T00:00:00Z"))
      .await
      .unwrap(),
  );

  let transitioned = s
    .infer_releases("us_xx", ReleasePolicy::InferredRelease)
    .await
    .unwrap();
  assert_eq!(transitioned, 0);

  let history = s.entity_history(EntityKind::Booking, 1).await.unwrap();
  assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn rescrape_refreshes_last_seen_so_present_bookings_stay() {
  let s = store().await;

  committed(
    s.commit_session(roster("county jail", "1000"), meta("us_xx", "2024-01-02T00:00:00Z"))
      .await
      .unwrap(),
  );
  // Identical roster a week later: no snapshots open, but the booking is
  // re-seen and must survive inference.
  committed(
    s.commit_session(roster("county jail", "1000"), meta("us_xx", "2024-01-09T00:00:00Z"))
      .await
      .unwrap(),
  );

  let transitioned = s
    .infer_releases("us_xx", ReleasePolicy::InferredRelease)
    .await
    .unwrap();
  assert_eq!(transitioned, 0);
}

#[tokio::test]
async fn backdated_session_never_regresses_last_seen() {
  let s = store().await;

  committed(
    s.commit_session(roster("county jail", "1000"), meta("us_xx", "2024-01-02T00:00:00Z"))
      .await
      .unwrap(),
  );
  committed(
    s.commit_session(roster("county jail", "1000"), meta("us_xx", "2024-01-09T00:00:00Z"))
      .await
      .unwrap(),
  );
  // A delayed partial batch re-observes the booking between the two scrapes.
  // It must not pull last_seen_time below the 01-09 scrape's, or the booking
  // would look absent from a roster it is still on.
  committed(
    s.commit_session(
      roster("county jail", "1000"),
      incomplete("us_xx", "2024-01-05T00:00:00Z"),
    )
    .await
    .unwrap(),
  );

  let transitioned = s
    .infer_releases("us_xx", ReleasePolicy::InferredRelease)
    .await
    .unwrap();
  assert_eq!(transitioned, 0);

  let history = s.entity_history(EntityKind::Booking, 1).await.unwrap();
  assert_eq!(
    history.last().unwrap().field("custody_status"),
    Some(custody_status::IN_CUSTODY)
  );
}

// ─── Point-in-time reads ─────────────────────────────────────────────────────

#[tokio::test]
async fn person_as_of_reconstructs_past_state() {
  let s = store().await;

  committed(
    s.commit_session(roster("county jail", "1000"), meta("us_xx", "2024-01-02T00:00:00Z"))
      .await
      .unwrap(),
  );
  committed(
    s.commit_session(roster("annex", "2000"), meta("us_xx", "2024-01-08T00:00:00Z"))
      .await
      .unwrap(),
  );

  let person_id = s.lookup_person("us_xx", "P-1").await.unwrap().unwrap();

  let past = s
    .person_as_of(person_id, ts("2024-01-05T00:00:00Z"))
    .await
    .unwrap()
    .unwrap();
  assert_eq!(past.bookings.len(), 1);
  let booking = &past.bookings[0];
  assert_eq!(booking.booking.field("facility"), Some("county jail"));
  assert_eq!(booking.charges.len(), 1);
  let bond = booking.charges[0].bond.as_ref().unwrap();
  assert_eq!(bond.field("amount"), Some("1000"));

  let now = s
    .person_as_of(person_id, ts("2024-02-01T00:00:00Z"))
    .await
    .unwrap()
    .unwrap();
  assert_eq!(now.bookings[0].booking.field("facility"), Some("annex"));
  assert_eq!(
    now.bookings[0].charges[0].bond.as_ref().unwrap().field("amount"),
    Some("2000"),
  );
}

#[tokio::test]
async fn person_as_of_before_creation_is_none() {
  let s = store().await;

  committed(
    s.commit_session(roster("county jail", "1000"), meta("us_xx", "2024-01-02T00:00:00Z"))
      .await
      .unwrap(),
  );
  let person_id = s.lookup_person("us_xx", "P-1").await.unwrap().unwrap();

  let before = s
    .person_as_of(person_id, ts("2023-06-01T00:00:00Z"))
    .await
    .unwrap();
  assert!(before.is_none());
}

// ─── Sessions ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn latest_complete_session_skips_incomplete_ones() {
  let s = store().await;

  let first = meta("us_xx", "2024-01-02T00:00:00Z");
  committed(
    s.commit_session(roster("county jail", "1000"), first.clone())
      .await
      .unwrap(),
  );
  committed(
    s.commit_session(
      roster("county jail", "1000"),
      incomplete("us_xx", "2024-01-09T00:00:00Z"),
    )
    .await
    .unwrap(),
  );

  let latest = s.latest_complete_session("us_xx").await.unwrap().unwrap();
  assert_eq!(latest.session_id, first.session_id);
  assert_eq!(latest.started_at, first.started_at);
  assert!(latest.complete);

  assert!(s.latest_complete_session("us_zz").await.unwrap().is_none());
}
