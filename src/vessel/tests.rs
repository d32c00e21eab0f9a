use super::*;
use chrono::TimeZone;

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn position(lat: f64, lon: f64) -> PositionUpdate {
    PositionUpdate {
        lat,
        lon,
        ..Default::default()
    }
}

#[test]
fn new_vessel_is_empty_except_identity() {
    let vessel = Vessel::new(311000123);

    assert_eq!(vessel.mmsi, 311000123);
    assert!(vessel.lat.is_none());
    assert!(vessel.name.is_none());
    assert!(vessel.first_seen.is_none());
    assert_eq!(vessel.update_count, 0);
    assert!(!vessel.has_position());
}

#[test]
fn position_update_sets_coordinates_and_metadata() {
    let mut vessel = Vessel::new(1);
    vessel.apply_position(&PositionUpdate {
        speed: Some(12.34),
        course: Some(271.96),
        rot: Some(0.127),
        heading: Some(270),
        navigational_status: Some(5),
        position_accuracy: Some(true),
        timestamp: Some(ts(1000)),
        ..position(26.5, 51.2)
    });

    assert_eq!(vessel.lat, Some(26.5));
    assert_eq!(vessel.lon, Some(51.2));
    // Rounded at the point of update: speed/course to 1 decimal, rot to 2
    assert_eq!(vessel.speed, Some(12.3));
    assert_eq!(vessel.course, Some(272.0));
    assert_eq!(vessel.rot, Some(0.13));
    assert_eq!(vessel.heading, Some(270));
    assert_eq!(vessel.navigational_status, Some(5));
    assert_eq!(vessel.position_accuracy, Some(true));
    assert_eq!(vessel.last_update, Some(ts(1000)));
    assert_eq!(vessel.first_seen, Some(ts(1000)));
    assert_eq!(vessel.update_count, 1);
}

#[test]
fn position_update_is_idempotent_except_counters() {
    let mut vessel = Vessel::new(1);
    let update = PositionUpdate {
        speed: Some(8.0),
        navigational_status: Some(0),
        timestamp: Some(ts(1000)),
        ..position(10.0, 20.0)
    };

    vessel.apply_position(&update);
    let first = vessel.clone();
    vessel.apply_position(&PositionUpdate {
        timestamp: Some(ts(2000)),
        ..update
    });

    assert_eq!(vessel.update_count, first.update_count + 1);
    assert_eq!(vessel.last_update, Some(ts(2000)));
    // Every other field is unchanged on the second application
    assert_eq!(vessel.lat, first.lat);
    assert_eq!(vessel.lon, first.lon);
    assert_eq!(vessel.speed, first.speed);
    assert_eq!(vessel.navigational_status, first.navigational_status);
    assert_eq!(vessel.first_seen, first.first_seen);
}

#[test]
fn absent_fields_do_not_overwrite() {
    let mut vessel = Vessel::new(1);
    vessel.apply_position(&PositionUpdate {
        speed: Some(14.0),
        course: Some(90.0),
        ..position(10.0, 20.0)
    });

    // Bare coordinates: speed and course must survive
    vessel.apply_position(&position(11.0, 21.0));

    assert_eq!(vessel.lat, Some(11.0));
    assert_eq!(vessel.speed, Some(14.0));
    assert_eq!(vessel.course, Some(90.0));

    // Present fields overwrite, including previously-set values
    vessel.apply_position(&PositionUpdate {
        speed: Some(2.0),
        ..position(11.0, 21.0)
    });
    assert_eq!(vessel.speed, Some(2.0));
}

#[test]
fn out_of_range_nav_status_is_dropped() {
    let mut vessel = Vessel::new(1);
    vessel.apply_position(&PositionUpdate {
        navigational_status: Some(99),
        ..position(10.0, 20.0)
    });
    assert_eq!(vessel.navigational_status, None);

    // And an invalid code does not clobber a valid one
    vessel.apply_position(&PositionUpdate {
        navigational_status: Some(1),
        ..position(10.0, 20.0)
    });
    vessel.apply_position(&PositionUpdate {
        navigational_status: Some(16),
        ..position(10.0, 20.0)
    });
    assert_eq!(vessel.navigational_status, Some(1));
}

#[test]
fn static_update_trims_strings_and_skips_empty() {
    let mut vessel = Vessel::new(1);
    vessel.apply_static(&StaticUpdate {
        name: Some("  EVER GIVEN  ".to_string()),
        destination: Some("ROTTERDAM".to_string()),
        callsign: Some("   ".to_string()),
        ship_type: Some(80),
        draught: Some(14.27),
        ..Default::default()
    });

    assert_eq!(vessel.name.as_deref(), Some("EVER GIVEN"));
    assert_eq!(vessel.destination.as_deref(), Some("ROTTERDAM"));
    assert_eq!(vessel.callsign, None);
    assert_eq!(vessel.ship_type, Some(80));
    assert_eq!(vessel.draught, Some(14.3));
    assert_eq!(vessel.update_count, 1);

    // Empty string must not clobber an existing value
    vessel.apply_static(&StaticUpdate {
        destination: Some("".to_string()),
        ..Default::default()
    });
    assert_eq!(vessel.destination.as_deref(), Some("ROTTERDAM"));
}

#[test]
fn dimensions_combine_only_as_complete_pairs() {
    let mut vessel = Vessel::new(1);

    // Bow only: no partial length estimate
    vessel.apply_static(&StaticUpdate {
        dimension_to_bow: Some(200),
        ..Default::default()
    });
    assert_eq!(vessel.length, None);
    assert_eq!(vessel.dimension_to_bow, Some(200));

    // Stern arriving in a *later* update still does not pair retroactively
    vessel.apply_static(&StaticUpdate {
        dimension_to_stern: Some(50),
        ..Default::default()
    });
    assert_eq!(vessel.length, None);

    // Both in the same update
    vessel.apply_static(&StaticUpdate {
        dimension_to_bow: Some(200),
        dimension_to_stern: Some(50),
        dimension_to_port: Some(20),
        dimension_to_starboard: Some(12),
        ..Default::default()
    });
    assert_eq!(vessel.length, Some(250.0));
    assert_eq!(vessel.width, Some(32.0));
}

#[test]
fn first_seen_is_immutable() {
    let mut vessel = Vessel::new(1);
    vessel.apply_static(&StaticUpdate {
        name: Some("A".to_string()),
        timestamp: Some(ts(100)),
        ..Default::default()
    });
    vessel.apply_position(&PositionUpdate {
        timestamp: Some(ts(200)),
        ..position(1.0, 2.0)
    });
    vessel.apply_position(&PositionUpdate {
        timestamp: Some(ts(300)),
        ..position(1.0, 2.0)
    });

    assert_eq!(vessel.first_seen, Some(ts(100)));
    assert_eq!(vessel.last_update, Some(ts(300)));
    assert_eq!(vessel.update_count, 3);
}

#[test]
fn merge_prefers_incoming_non_null_values() {
    let mut existing = Vessel::new(1);
    existing.apply_static(&StaticUpdate {
        name: Some("OLD NAME".to_string()),
        destination: Some("SINGAPORE".to_string()),
        timestamp: Some(ts(100)),
        ..Default::default()
    });

    let mut incoming = Vessel::new(1);
    incoming.apply_position(&PositionUpdate {
        speed: Some(10.0),
        timestamp: Some(ts(200)),
        ..position(5.0, 6.0)
    });
    incoming.apply_static(&StaticUpdate {
        name: Some("NEW NAME".to_string()),
        timestamp: Some(ts(250)),
        ..Default::default()
    });

    let merged = Vessel::merge(&existing, &incoming);

    assert_eq!(merged.name.as_deref(), Some("NEW NAME"));
    // Existing value kept where incoming is null
    assert_eq!(merged.destination.as_deref(), Some("SINGAPORE"));
    assert_eq!(merged.lat, Some(5.0));
    assert_eq!(merged.speed, Some(10.0));
    assert_eq!(merged.first_seen, Some(ts(100)));
    assert_eq!(merged.last_update, Some(ts(250)));
    // Both records represent real update events
    assert_eq!(merged.update_count, 3);
}

#[test]
fn merge_keeps_earlier_first_seen_regardless_of_direction() {
    let mut a = Vessel::new(1);
    a.apply_position(&PositionUpdate {
        timestamp: Some(ts(500)),
        ..position(1.0, 1.0)
    });
    let mut b = Vessel::new(1);
    b.apply_position(&PositionUpdate {
        timestamp: Some(ts(100)),
        ..position(2.0, 2.0)
    });

    assert_eq!(Vessel::merge(&a, &b).first_seen, Some(ts(100)));
    assert_eq!(Vessel::merge(&b, &a).first_seen, Some(ts(100)));
    assert_eq!(Vessel::merge(&a, &b).last_update, Some(ts(500)));
}

#[test]
fn static_then_position_loses_nothing() {
    let mut vessel = Vessel::new(1);
    vessel.apply_static(&StaticUpdate {
        destination: Some("HOUSTON".to_string()),
        ..Default::default()
    });
    vessel.apply_position(&position(29.5, -94.0));

    assert_eq!(vessel.destination.as_deref(), Some("HOUSTON"));
    assert_eq!(vessel.lat, Some(29.5));
    assert_eq!(vessel.lon, Some(-94.0));
    assert!(vessel.has_position());
}

#[test]
fn type_band_helpers() {
    let mut vessel = Vessel::new(1);
    assert!(!vessel.is_tanker());

    vessel.ship_type = Some(70);
    assert!(vessel.is_cargo());
    assert!(!vessel.is_tanker());

    vessel.ship_type = Some(84);
    assert!(vessel.is_tanker());
    assert!(!vessel.is_cargo());
}

#[test]
fn deadweight_estimated_only_for_tankers_with_full_dimensions() {
    let mut vessel = Vessel::new(1);
    vessel.ship_type = Some(80);
    vessel.length = Some(250.0);
    vessel.width = Some(40.0);

    // Missing draught: no estimate
    vessel.estimate_deadweight();
    assert_eq!(vessel.deadweight, None);

    vessel.draught = Some(15.0);
    vessel.estimate_deadweight();
    assert_eq!(vessel.deadweight, Some((250.0f64 * 40.0 * 15.0 * 0.75) as u32));

    // Reported tonnage is never overwritten by the estimate
    vessel.deadweight = Some(99_999);
    vessel.estimate_deadweight();
    assert_eq!(vessel.deadweight, Some(99_999));

    // Non-tankers are not estimated
    let mut cargo = Vessel::new(2);
    cargo.ship_type = Some(70);
    cargo.length = Some(100.0);
    cargo.width = Some(20.0);
    cargo.draught = Some(8.0);
    cargo.estimate_deadweight();
    assert_eq!(cargo.deadweight, None);
}
