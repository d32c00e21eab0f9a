use super::*;
use crate::vessel::{PositionUpdate, StaticUpdate, Vessel};
use chrono::{DateTime, TimeZone, Utc};
use std::time::Duration;

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn sample_vessel(mmsi: u32) -> Vessel {
    let mut vessel = Vessel::new(mmsi);
    vessel.apply_position(&PositionUpdate {
        lat: 26.5,
        lon: 51.2,
        speed: Some(12.3),
        course: Some(271.9),
        heading: Some(270),
        rot: Some(0.13),
        navigational_status: Some(0),
        position_accuracy: Some(true),
        timestamp: Some(ts(1000)),
    });
    vessel.apply_static(&StaticUpdate {
        name: Some("TEST TANKER".to_string()),
        destination: Some("ROTTERDAM".to_string()),
        ship_type: Some(80),
        imo: Some(9_321_483),
        callsign: Some("A8BK7".to_string()),
        draught: Some(14.3),
        dimension_to_bow: Some(200),
        dimension_to_stern: Some(50),
        dimension_to_port: Some(20),
        dimension_to_starboard: Some(12),
        eta: Some("06-12 14:30".to_string()),
        timestamp: Some(ts(2000)),
        ..Default::default()
    });
    vessel
}

#[test]
fn round_trip_preserves_every_field() {
    let store = VesselStore::open(":memory:").unwrap();
    let vessel = sample_vessel(311000123);

    store.save(&vessel).unwrap();
    let loaded = store.get(311000123).unwrap().expect("vessel not found");

    assert_eq!(loaded, vessel);
}

#[test]
fn get_missing_vessel_returns_none() {
    let store = VesselStore::open(":memory:").unwrap();
    assert!(store.get(1).unwrap().is_none());
}

#[test]
fn save_is_an_upsert() {
    let store = VesselStore::open(":memory:").unwrap();
    let mut vessel = sample_vessel(1);
    store.save(&vessel).unwrap();

    vessel.apply_position(&PositionUpdate {
        lat: 27.0,
        lon: 52.0,
        timestamp: Some(ts(3000)),
        ..Default::default()
    });
    store.save(&vessel).unwrap();

    let loaded = store.get(1).unwrap().unwrap();
    assert_eq!(loaded.lat, Some(27.0));
    assert_eq!(loaded.update_count, 3);

    let stats = store.statistics().unwrap();
    assert_eq!(stats.total_vessels, 1);
}

#[test]
fn get_all_orders_by_most_recent_update() {
    let store = VesselStore::open(":memory:").unwrap();

    for (mmsi, when) in [(1, 100), (2, 300), (3, 200)] {
        let mut vessel = Vessel::new(mmsi);
        vessel.apply_position(&PositionUpdate {
            lat: 1.0,
            lon: 1.0,
            timestamp: Some(ts(when)),
            ..Default::default()
        });
        store.save(&vessel).unwrap();
    }

    let all = store.get_all().unwrap();
    let order: Vec<u32> = all.iter().map(|v| v.mmsi).collect();
    assert_eq!(order, vec![2, 3, 1]);
}

#[test]
fn get_by_type_filters_on_code_membership() {
    let store = VesselStore::open(":memory:").unwrap();

    for (mmsi, ship_type) in [(1, Some(80)), (2, Some(70)), (3, Some(37)), (4, None)] {
        let mut vessel = Vessel::new(mmsi);
        vessel.ship_type = ship_type;
        vessel.apply_static(&StaticUpdate {
            name: Some(format!("V{mmsi}")),
            timestamp: Some(ts(i64::from(mmsi))),
            ..Default::default()
        });
        store.save(&vessel).unwrap();
    }

    let tankers_and_cargo = store.get_by_type(&[70, 80]).unwrap();
    let mut found: Vec<u32> = tankers_and_cargo.iter().map(|v| v.mmsi).collect();
    found.sort_unstable();
    assert_eq!(found, vec![1, 2]);

    assert!(store.get_by_type(&[]).unwrap().is_empty());
}

#[test]
fn bulk_save_commits_the_whole_batch() {
    let store = VesselStore::open(":memory:").unwrap();
    let vessels: Vec<Vessel> = (1u32..=25).map(sample_vessel).collect();

    let saved = store.bulk_save(vessels.iter()).unwrap();
    assert_eq!(saved, 25);

    let stats = store.statistics().unwrap();
    assert_eq!(stats.total_vessels, 25);
    assert_eq!(stats.tankers, 25);
    assert_eq!(stats.with_position, 25);
}

#[test]
fn history_is_append_only_and_ordered() {
    let store = VesselStore::open(":memory:").unwrap();

    store
        .append_history(1, 10.0, 20.0, Some(12.0), None, None, ts(100), Some("a"))
        .unwrap();
    store
        .append_history(1, 10.5, 20.5, Some(11.0), Some(90.0), Some(88), ts(200), None)
        .unwrap();
    store
        .append_history(2, 50.0, 3.0, None, None, None, ts(150), Some("north_sea"))
        .unwrap();

    let samples = store.history(1, 100).unwrap();
    assert_eq!(samples.len(), 2);
    assert_eq!(samples[0].recorded_at, ts(100));
    assert_eq!(samples[0].region.as_deref(), Some("a"));
    assert_eq!(samples[1].lat, 10.5);
    assert_eq!(samples[1].heading, Some(88));

    assert_eq!(store.statistics().unwrap().history_samples, 3);
}

#[test]
fn update_region_sets_denormalized_column_without_touching_state() {
    let store = VesselStore::open(":memory:").unwrap();
    let vessel = sample_vessel(1);
    store.save(&vessel).unwrap();

    store.update_region(1, Some("persian_gulf")).unwrap();

    // Vessel state is unchanged by the side-channel write
    let loaded = store.get(1).unwrap().unwrap();
    assert_eq!(loaded, vessel);

    store.update_region(1, None).unwrap();
}

#[test]
fn schema_migration_tolerates_existing_column() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vessels.db");

    // Opening twice runs the ALTER TABLE migration twice; the second run
    // must tolerate the already-present column
    {
        let store = VesselStore::open(&path).unwrap();
        store.save(&sample_vessel(1)).unwrap();
    }
    let store = VesselStore::open(&path).unwrap();
    assert!(store.get(1).unwrap().is_some());
}

#[test]
fn reopen_preserves_saved_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vessels.db");
    let vessel = sample_vessel(311000123);

    {
        let store = VesselStore::open(&path).unwrap();
        store.save(&vessel).unwrap();
    }

    let store = VesselStore::open(&path).unwrap();
    assert_eq!(store.get(311000123).unwrap().unwrap(), vessel);
}

#[tokio::test]
async fn async_store_offers_identical_semantics() {
    let store = AsyncVesselStore::open(":memory:", Duration::from_secs(5)).unwrap();
    let vessel = sample_vessel(1);

    store.save(vessel.clone()).await.unwrap();
    assert_eq!(store.get(1).await.unwrap().unwrap(), vessel);

    store
        .append_history(1, 26.5, 51.2, Some(12.3), None, None, ts(500), None)
        .await
        .unwrap();
    assert_eq!(store.history(1, 10).await.unwrap().len(), 1);

    store
        .update_region(1, Some("persian_gulf".to_string()))
        .await
        .unwrap();

    let saved = store.bulk_save(vec![sample_vessel(2), sample_vessel(3)]).await.unwrap();
    assert_eq!(saved, 2);

    let stats = store.statistics().await.unwrap();
    assert_eq!(stats.total_vessels, 3);

    let tankers = store.get_by_type(vec![80]).await.unwrap();
    assert_eq!(tankers.len(), 3);
}
