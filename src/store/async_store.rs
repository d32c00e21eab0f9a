//! Non-blocking facade over [`VesselStore`].
//!
//! Offers the identical operation set but never blocks the calling task's
//! thread: each operation runs on the blocking thread pool and is bounded by
//! a per-operation timeout so a wedged disk cannot stall the stream hot path.

use super::{HistorySample, StoreStats, VesselStore};
use crate::vessel::Vessel;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use tokio::time::timeout;

#[derive(Clone)]
pub struct AsyncVesselStore {
    inner: Arc<VesselStore>,
    op_timeout: Duration,
}

impl AsyncVesselStore {
    /// Open or create the store at `db_path`.
    pub fn open<P: AsRef<Path>>(db_path: P, op_timeout: Duration) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(VesselStore::open(db_path)?),
            op_timeout,
        })
    }

    /// Wrap an existing blocking store.
    pub fn from_store(store: Arc<VesselStore>, op_timeout: Duration) -> Self {
        Self {
            inner: store,
            op_timeout,
        }
    }

    async fn run<T, F>(&self, op: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&VesselStore) -> Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.inner);
        let handle = task::spawn_blocking(move || f(&store));

        timeout(self.op_timeout, handle)
            .await
            .with_context(|| format!("Store operation '{op}' timed out"))?
            .with_context(|| format!("Store operation '{op}' panicked"))?
    }

    pub async fn save(&self, vessel: Vessel) -> Result<()> {
        self.run("save", move |store| store.save(&vessel)).await
    }

    pub async fn bulk_save(&self, vessels: Vec<Vessel>) -> Result<usize> {
        self.run("bulk_save", move |store| store.bulk_save(vessels.iter()))
            .await
    }

    pub async fn get(&self, mmsi: u32) -> Result<Option<Vessel>> {
        self.run("get", move |store| store.get(mmsi)).await
    }

    pub async fn get_all(&self) -> Result<Vec<Vessel>> {
        self.run("get_all", |store| store.get_all()).await
    }

    pub async fn get_by_type(&self, type_codes: Vec<u16>) -> Result<Vec<Vessel>> {
        self.run("get_by_type", move |store| store.get_by_type(&type_codes))
            .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn append_history(
        &self,
        mmsi: u32,
        lat: f64,
        lon: f64,
        speed: Option<f64>,
        course: Option<f64>,
        heading: Option<u16>,
        recorded_at: DateTime<Utc>,
        region: Option<String>,
    ) -> Result<()> {
        self.run("append_history", move |store| {
            store.append_history(
                mmsi,
                lat,
                lon,
                speed,
                course,
                heading,
                recorded_at,
                region.as_deref(),
            )
        })
        .await
    }

    pub async fn history(&self, mmsi: u32, limit: u32) -> Result<Vec<HistorySample>> {
        self.run("history", move |store| store.history(mmsi, limit))
            .await
    }

    pub async fn update_region(&self, mmsi: u32, region: Option<String>) -> Result<()> {
        self.run("update_region", move |store| {
            store.update_region(mmsi, region.as_deref())
        })
        .await
    }

    pub async fn statistics(&self) -> Result<StoreStats> {
        self.run("statistics", |store| store.statistics()).await
    }
}
