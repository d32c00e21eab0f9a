use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(test)]
mod tests;

/// Ship-type code band for cargo vessels (IMO codes 70-79).
pub const CARGO_TYPES: std::ops::RangeInclusive<u16> = 70..=79;

/// Ship-type code band for tankers (IMO codes 80-89).
pub const TANKER_TYPES: std::ops::RangeInclusive<u16> = 80..=89;

/// A tracked vessel, keyed by MMSI.
///
/// Every attribute except the MMSI is optional: AIS reports are fragmentary,
/// so a record is assembled incrementally from position reports and
/// static/voyage reports. Fields are only ever overwritten by updates that
/// actually carry them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vessel {
    /// Maritime Mobile Service Identity (unique vessel ID)
    pub mmsi: u32,

    // Position data
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Speed over ground in knots, rounded to 1 decimal
    pub speed: Option<f64>,
    /// Course over ground in degrees, rounded to 1 decimal
    pub course: Option<f64>,
    /// True heading in degrees
    pub heading: Option<u16>,
    /// Rate of turn, rounded to 2 decimals
    pub rot: Option<f64>,
    /// AIS navigational status code (0-15)
    pub navigational_status: Option<u8>,
    pub position_accuracy: Option<bool>,

    // Static data
    pub name: Option<String>,
    pub imo: Option<u32>,
    pub callsign: Option<String>,
    /// IMO ship type code
    pub ship_type: Option<u16>,

    // Dimensions
    pub length: Option<f64>,
    pub width: Option<f64>,
    /// Maximum static draught in meters, rounded to 1 decimal
    pub draught: Option<f64>,
    pub dimension_to_bow: Option<u16>,
    pub dimension_to_stern: Option<u16>,
    pub dimension_to_port: Option<u16>,
    pub dimension_to_starboard: Option<u16>,

    // Voyage data
    pub destination: Option<String>,
    /// Estimated time of arrival, "MM-DD HH:MM"
    pub eta: Option<String>,
    pub cargo: Option<String>,
    /// Deadweight tonnage
    pub deadweight: Option<u32>,
    pub gross_tonnage: Option<u32>,

    // Tracking metadata
    pub last_update: Option<DateTime<Utc>>,
    /// Set once on the first update, never overwritten
    pub first_seen: Option<DateTime<Utc>>,
    pub update_count: u64,
}

/// Partial position data decoded from a position report.
///
/// Latitude and longitude are mandatory; everything else overwrites the
/// vessel only when present.
#[derive(Clone, Debug, Default)]
pub struct PositionUpdate {
    pub lat: f64,
    pub lon: f64,
    pub speed: Option<f64>,
    pub course: Option<f64>,
    pub heading: Option<u16>,
    pub rot: Option<f64>,
    /// Raw navigational status code; values outside 0-15 are dropped
    pub navigational_status: Option<u8>,
    pub position_accuracy: Option<bool>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Partial static/voyage data decoded from a static report.
#[derive(Clone, Debug, Default)]
pub struct StaticUpdate {
    pub name: Option<String>,
    pub destination: Option<String>,
    pub ship_type: Option<u16>,
    pub imo: Option<u32>,
    pub callsign: Option<String>,
    pub draught: Option<f64>,
    pub dimension_to_bow: Option<u16>,
    pub dimension_to_stern: Option<u16>,
    pub dimension_to_port: Option<u16>,
    pub dimension_to_starboard: Option<u16>,
    pub eta: Option<String>,
    pub cargo: Option<String>,
    pub deadweight: Option<u32>,
    pub gross_tonnage: Option<u32>,
    pub timestamp: Option<DateTime<Utc>>,
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Trim a string field; empty or whitespace-only values count as absent.
fn clean_string(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl Vessel {
    /// Create a new vessel with all optional fields empty.
    pub fn new(mmsi: u32) -> Self {
        Self {
            mmsi,
            lat: None,
            lon: None,
            speed: None,
            course: None,
            heading: None,
            rot: None,
            navigational_status: None,
            position_accuracy: None,
            name: None,
            imo: None,
            callsign: None,
            ship_type: None,
            length: None,
            width: None,
            draught: None,
            dimension_to_bow: None,
            dimension_to_stern: None,
            dimension_to_port: None,
            dimension_to_starboard: None,
            destination: None,
            eta: None,
            cargo: None,
            deadweight: None,
            gross_tonnage: None,
            last_update: None,
            first_seen: None,
            update_count: 0,
        }
    }

    /// Apply a position report.
    ///
    /// Latitude/longitude always overwrite; optional fields overwrite only
    /// when present. Fixed-point wire values are rounded here so repeated
    /// reads are stable. An out-of-range navigational status code is dropped
    /// rather than rejected.
    pub fn apply_position(&mut self, update: &PositionUpdate) {
        self.lat = Some(update.lat);
        self.lon = Some(update.lon);

        if let Some(speed) = update.speed {
            self.speed = Some(round_to(speed, 1));
        }
        if let Some(course) = update.course {
            self.course = Some(round_to(course, 1));
        }
        if let Some(heading) = update.heading {
            self.heading = Some(heading);
        }
        if let Some(rot) = update.rot {
            self.rot = Some(round_to(rot, 2));
        }
        if let Some(status) = update.navigational_status {
            if status <= 15 {
                self.navigational_status = Some(status);
            }
        }
        if let Some(accuracy) = update.position_accuracy {
            self.position_accuracy = Some(accuracy);
        }

        self.touch(update.timestamp);
    }

    /// Apply a static/voyage report.
    ///
    /// String fields are trimmed before storage; empty strings count as
    /// absent and do not overwrite. Length and width are derived only when
    /// both offsets of the pair arrive in the same update.
    pub fn apply_static(&mut self, update: &StaticUpdate) {
        if let Some(name) = clean_string(update.name.clone()) {
            self.name = Some(name);
        }
        if let Some(destination) = clean_string(update.destination.clone()) {
            self.destination = Some(destination);
        }
        if let Some(ship_type) = update.ship_type {
            self.ship_type = Some(ship_type);
        }
        if let Some(imo) = update.imo {
            self.imo = Some(imo);
        }
        if let Some(callsign) = clean_string(update.callsign.clone()) {
            self.callsign = Some(callsign);
        }
        if let Some(draught) = update.draught {
            self.draught = Some(round_to(draught, 1));
        }

        if let Some(bow) = update.dimension_to_bow {
            self.dimension_to_bow = Some(bow);
        }
        if let Some(stern) = update.dimension_to_stern {
            self.dimension_to_stern = Some(stern);
        }
        if let Some(port) = update.dimension_to_port {
            self.dimension_to_port = Some(port);
        }
        if let Some(starboard) = update.dimension_to_starboard {
            self.dimension_to_starboard = Some(starboard);
        }
        // A partial pair does not produce a partial estimate
        if let (Some(bow), Some(stern)) = (update.dimension_to_bow, update.dimension_to_stern) {
            self.length = Some(f64::from(bow) + f64::from(stern));
        }
        if let (Some(port), Some(starboard)) =
            (update.dimension_to_port, update.dimension_to_starboard)
        {
            self.width = Some(f64::from(port) + f64::from(starboard));
        }

        if let Some(eta) = clean_string(update.eta.clone()) {
            self.eta = Some(eta);
        }
        if let Some(cargo) = clean_string(update.cargo.clone()) {
            self.cargo = Some(cargo);
        }
        if let Some(deadweight) = update.deadweight {
            self.deadweight = Some(deadweight);
        }
        if let Some(gross_tonnage) = update.gross_tonnage {
            self.gross_tonnage = Some(gross_tonnage);
        }

        self.touch(update.timestamp);
    }

    fn touch(&mut self, timestamp: Option<DateTime<Utc>>) {
        let now = timestamp.unwrap_or_else(Utc::now);
        self.last_update = Some(now);
        if self.first_seen.is_none() {
            self.first_seen = Some(now);
        }
        self.update_count += 1;
    }

    /// Reconcile two independently-built records for the same MMSI.
    ///
    /// For every attribute the incoming non-null value wins. `last_update`
    /// takes the more recent of the two, `first_seen` the earlier, and
    /// `update_count` the sum: both records represent real, distinct update
    /// events, not a read-modify-write of the same one.
    pub fn merge(existing: &Vessel, incoming: &Vessel) -> Vessel {
        fn pick<T: Clone>(incoming: &Option<T>, existing: &Option<T>) -> Option<T> {
            incoming.clone().or_else(|| existing.clone())
        }

        let last_update = match (incoming.last_update, existing.last_update) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        let first_seen = match (incoming.first_seen, existing.first_seen) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        Vessel {
            mmsi: existing.mmsi,
            lat: pick(&incoming.lat, &existing.lat),
            lon: pick(&incoming.lon, &existing.lon),
            speed: pick(&incoming.speed, &existing.speed),
            course: pick(&incoming.course, &existing.course),
            heading: pick(&incoming.heading, &existing.heading),
            rot: pick(&incoming.rot, &existing.rot),
            navigational_status: pick(
                &incoming.navigational_status,
                &existing.navigational_status,
            ),
            position_accuracy: pick(&incoming.position_accuracy, &existing.position_accuracy),
            name: pick(&incoming.name, &existing.name),
            imo: pick(&incoming.imo, &existing.imo),
            callsign: pick(&incoming.callsign, &existing.callsign),
            ship_type: pick(&incoming.ship_type, &existing.ship_type),
            length: pick(&incoming.length, &existing.length),
            width: pick(&incoming.width, &existing.width),
            draught: pick(&incoming.draught, &existing.draught),
            dimension_to_bow: pick(&incoming.dimension_to_bow, &existing.dimension_to_bow),
            dimension_to_stern: pick(&incoming.dimension_to_stern, &existing.dimension_to_stern),
            dimension_to_port: pick(&incoming.dimension_to_port, &existing.dimension_to_port),
            dimension_to_starboard: pick(
                &incoming.dimension_to_starboard,
                &existing.dimension_to_starboard,
            ),
            destination: pick(&incoming.destination, &existing.destination),
            eta: pick(&incoming.eta, &existing.eta),
            cargo: pick(&incoming.cargo, &existing.cargo),
            deadweight: pick(&incoming.deadweight, &existing.deadweight),
            gross_tonnage: pick(&incoming.gross_tonnage, &existing.gross_tonnage),
            last_update,
            first_seen,
            update_count: existing.update_count + incoming.update_count,
        }
    }

    /// A vessel "has position" iff both latitude and longitude are set.
    /// All position-dependent queries use this predicate.
    pub fn has_position(&self) -> bool {
        self.lat.is_some() && self.lon.is_some()
    }

    /// True if the ship type code falls in the tanker band (80-89).
    pub fn is_tanker(&self) -> bool {
        self.ship_type.is_some_and(|t| TANKER_TYPES.contains(&t))
    }

    /// True if the ship type code falls in the cargo band (70-79).
    pub fn is_cargo(&self) -> bool {
        self.ship_type.is_some_and(|t| CARGO_TYPES.contains(&t))
    }

    /// Fill in an estimated deadweight for tankers that report hull
    /// dimensions but no tonnage. Block-coefficient approximation.
    pub fn estimate_deadweight(&mut self) {
        if !self.is_tanker() || self.deadweight.is_some() {
            return;
        }
        if let (Some(length), Some(width), Some(draught)) = (self.length, self.width, self.draught)
        {
            self.deadweight = Some((length * width * draught * 0.75) as u32);
        }
    }
}
