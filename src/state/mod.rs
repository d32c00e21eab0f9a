//! In-memory authoritative vessel cache.
//!
//! The state service owns merge application and is the single source of
//! truth for all read-side consumers. Durable writes and the region index
//! are owned here exclusively; no other component touches them directly.

use crate::regions::{RegionIndex, RegionIndexStats};
use crate::store::{AsyncVesselStore, StoreStats};
use crate::vessel::Vessel;
use anyhow::Result;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};


/// Aggregate counts reported to observers.
#[derive(Debug, Clone, Serialize)]
pub struct Statistics {
    pub total_vessels: usize,
    pub active_vessels: usize,
    pub ship_type_counts: HashMap<u16, usize>,
    pub store: StoreStats,
    pub regions: RegionIndexStats,
}

pub struct StateService {
    /// Lock-free concurrent map; the per-key entry lock makes each merge
    /// atomic per identity under concurrent batch workers
    vessels: DashMap<u32, Vessel>,
    store: AsyncVesselStore,
    regions: Arc<RegionIndex>,
}

impl StateService {
    pub fn new(store: AsyncVesselStore, regions: Arc<RegionIndex>) -> Self {
        Self {
            vessels: DashMap::new(),
            store,
            regions,
        }
    }

    /// Load the durable store into the cache. Called once on startup,
    /// before any live update is accepted, so a restart does not present an
    /// empty map to consumers.
    pub async fn rehydrate(&self) -> Result<usize> {
        let vessels = self.store.get_all().await?;
        let count = vessels.len();

        for vessel in vessels {
            // Merge rather than overwrite, in case a live update raced us
            match self.vessels.entry(vessel.mmsi) {
                dashmap::mapref::entry::Entry::Occupied(mut entry) => {
                    // The cached record is the live one here, so it is the
                    // incoming side of the merge
                    let merged = Vessel::merge(&vessel, entry.get());
                    *entry.get_mut() = merged;
                }
                dashmap::mapref::entry::Entry::Vacant(entry) => {
                    self.regions.update(&vessel);
                    entry.insert(vessel);
                }
            }
        }

        info!(vessels = count, "Rehydrated vessel cache from store");
        Ok(count)
    }

    /// Merge an updated vessel into the cache, refresh region membership,
    /// and enqueue durable writes.
    ///
    /// A durable-write failure is logged and swallowed: the in-memory state
    /// stays authoritative and the next update to the same identity retries
    /// the write.
    pub async fn update(&self, incoming: Vessel) -> Vessel {
        let mmsi = incoming.mmsi;

        let merged = match self.vessels.entry(mmsi) {
            dashmap::mapref::entry::Entry::Occupied(mut entry) => {
                let mut merged = Vessel::merge(entry.get(), &incoming);
                merged.estimate_deadweight();
                *entry.get_mut() = merged.clone();
                merged
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let mut vessel = incoming;
                vessel.estimate_deadweight();
                entry.insert(vessel.clone());
                vessel
            }
        };

        self.regions.update(&merged);
        let region = first_region(&self.regions, mmsi);

        if let Err(e) = self.store.save(merged.clone()).await {
            warn!(mmsi, error = %e, "Durable write failed; cache remains authoritative");
        } else if let Err(e) = self.store.update_region(mmsi, region.clone()).await {
            warn!(mmsi, error = %e, "Region update failed");
        }

        if let (Some(lat), Some(lon), Some(recorded_at)) =
            (merged.lat, merged.lon, merged.last_update)
        {
            if let Err(e) = self
                .store
                .append_history(
                    mmsi,
                    lat,
                    lon,
                    merged.speed,
                    merged.course,
                    merged.heading,
                    recorded_at,
                    region,
                )
                .await
            {
                warn!(mmsi, error = %e, "History append failed");
            }
        }

        merged
    }

    pub fn get(&self, mmsi: u32) -> Option<Vessel> {
        self.vessels.get(&mmsi).map(|v| v.clone())
    }

    /// All cached vessels.
    pub fn all(&self) -> Vec<Vessel> {
        self.vessels.iter().map(|v| v.value().clone()).collect()
    }

    /// Cached vessels with a position.
    pub fn active(&self) -> Vec<Vessel> {
        self.vessels
            .iter()
            .filter(|v| v.value().has_position())
            .map(|v| v.value().clone())
            .collect()
    }

    /// Cached vessels whose ship-type code is in `type_codes`.
    pub fn by_type(&self, type_codes: &[u16]) -> Vec<Vessel> {
        self.vessels
            .iter()
            .filter(|v| {
                v.value()
                    .ship_type
                    .is_some_and(|t| type_codes.contains(&t))
            })
            .map(|v| v.value().clone())
            .collect()
    }

    /// Cached vessels currently inside the named region.
    pub fn in_region(&self, region: &str) -> Vec<Vessel> {
        self.regions
            .vessels_in(region)
            .into_iter()
            .filter_map(|mmsi| self.get(mmsi))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.vessels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vessels.is_empty()
    }

    /// The static region configuration, for read-side consumers.
    pub fn region_index(&self) -> &RegionIndex {
        &self.regions
    }

    pub async fn statistics(&self) -> Statistics {
        let mut ship_type_counts: HashMap<u16, usize> = HashMap::new();
        let mut active_vessels = 0;
        for entry in self.vessels.iter() {
            let vessel = entry.value();
            if vessel.has_position() {
                active_vessels += 1;
            }
            if let Some(ship_type) = vessel.ship_type {
                *ship_type_counts.entry(ship_type).or_insert(0) += 1;
            }
        }

        let store = match self.store.statistics().await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "Store statistics unavailable");
                StoreStats::default()
            }
        };

        Statistics {
            total_vessels: self.vessels.len(),
            active_vessels,
            ship_type_counts,
            store,
            regions: self.regions.stats(),
        }
    }

    /// Flush the full cache to the durable store. Called on shutdown so a
    /// clean stop cannot lose live updates to write ordering.
    pub async fn close(&self) -> Result<()> {
        let vessels = self.all();
        let count = vessels.len();
        let saved = self.store.bulk_save(vessels).await?;
        info!(saved, total = count, "Flushed vessel cache to store");
        Ok(())
    }
}

fn first_region(regions: &RegionIndex, mmsi: u32) -> Option<String> {
    let mut names: Vec<String> = regions.regions_for(mmsi).into_iter().collect();
    names.sort();
    names.into_iter().next()
}
