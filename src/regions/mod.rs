use crate::vessel::Vessel;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;


/// Axis-aligned bounding box, inclusive on all four edges.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }

    /// A point exactly on a boundary belongs to the box.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        self.south <= lat && lat <= self.north && self.west <= lon && lon <= self.east
    }

    /// Corner-pair form used by the upstream subscription request:
    /// `[[south, west], [north, east]]`.
    pub fn corners(&self) -> [[f64; 2]; 2] {
        [[self.south, self.west], [self.north, self.east]]
    }
}

/// Port or terminal marker inside a region. Descriptive only; never
/// consulted by membership logic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub label: String,
}

/// A named tracking region. Regions are static at runtime and may overlap.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    pub bounds: BoundingBox,
    #[serde(default)]
    pub ports: Vec<Port>,
}

impl Region {
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        self.bounds.contains(lat, lon)
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.bounds.south + self.bounds.north) / 2.0,
            (self.bounds.west + self.bounds.east) / 2.0,
        )
    }
}

#[derive(Default)]
struct IndexState {
    /// region name -> MMSIs currently inside
    region_vessels: HashMap<String, HashSet<u32>>,
    /// MMSI -> region names currently containing it
    vessel_regions: HashMap<u32, HashSet<String>>,
}

/// Bidirectional region-membership cache.
///
/// Membership is recomputed on each position change and diffed against the
/// previous set, so `regions_for` and `vessels_in` are plain index reads.
/// Both directions live under one lock so they can never disagree.
pub struct RegionIndex {
    regions: Vec<Region>,
    state: RwLock<IndexState>,
}

/// Index statistics for observability.
#[derive(Debug, Clone, Serialize)]
pub struct RegionIndexStats {
    pub vessels_indexed: usize,
    pub membership_entries: usize,
    pub regions: usize,
}

impl RegionIndex {
    pub fn new(regions: Vec<Region>) -> Self {
        Self {
            regions,
            state: RwLock::new(IndexState::default()),
        }
    }

    /// The configured region set, in configuration order.
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn region(&self, name: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.name == name)
    }

    /// Recompute membership for a vessel's current position and apply the
    /// diff to both directions of the index. A vessel without a position is
    /// a no-op.
    pub fn update(&self, vessel: &Vessel) {
        let (Some(lat), Some(lon)) = (vessel.lat, vessel.lon) else {
            return;
        };

        let current: HashSet<String> = self
            .regions
            .iter()
            .filter(|r| r.contains(lat, lon))
            .map(|r| r.name.clone())
            .collect();

        let mut state = self.state.write().unwrap();
        let previous = state
            .vessel_regions
            .insert(vessel.mmsi, current.clone())
            .unwrap_or_default();

        for name in current.difference(&previous) {
            state
                .region_vessels
                .entry(name.clone())
                .or_default()
                .insert(vessel.mmsi);
        }
        for name in previous.difference(&current) {
            if let Some(members) = state.region_vessels.get_mut(name) {
                members.remove(&vessel.mmsi);
            }
        }
    }

    /// Region names currently containing the vessel.
    pub fn regions_for(&self, mmsi: u32) -> HashSet<String> {
        self.state
            .read()
            .unwrap()
            .vessel_regions
            .get(&mmsi)
            .cloned()
            .unwrap_or_default()
    }

    /// MMSIs of vessels currently inside the region.
    pub fn vessels_in(&self, region: &str) -> HashSet<u32> {
        self.state
            .read()
            .unwrap()
            .region_vessels
            .get(region)
            .cloned()
            .unwrap_or_default()
    }

    /// Purge a vessel from both directions of the index.
    pub fn remove(&self, mmsi: u32) {
        let mut state = self.state.write().unwrap();
        if let Some(regions) = state.vessel_regions.remove(&mmsi) {
            for name in regions {
                if let Some(members) = state.region_vessels.get_mut(&name) {
                    members.remove(&mmsi);
                }
            }
        }
    }

    pub fn stats(&self) -> RegionIndexStats {
        let state = self.state.read().unwrap();
        RegionIndexStats {
            vessels_indexed: state.vessel_regions.len(),
            membership_entries: state.region_vessels.values().map(HashSet::len).sum(),
            regions: self.regions.len(),
        }
    }
}
