//! WebSocket client for the upstream AIS feed.
//!
//! Owns the connection lifecycle: connect, subscribe, decode, dispatch to a
//! caller-supplied listener, and reconnect with exponential backoff when the
//! link drops. An optional batch worker decouples frame receipt from
//! downstream processing so a slow store cannot back-pressure the socket.

use crate::config::StreamConfig;
use crate::regions::Region;
use crate::vessel::Vessel;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::join_all;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, sleep, timeout, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

mod messages;

pub use messages::{
    AisFrame, DimensionMsg, EtaMsg, PositionReportMsg, ShipStaticDataMsg, SubscriptionRequest,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Receives every successfully processed report, with the client's fully
/// updated record for that identity.
#[async_trait]
pub trait VesselListener: Send + Sync {
    async fn on_position(&self, vessel: &Vessel);
    async fn on_static(&self, vessel: &Vessel);
}

/// Monotonic counters for the lifetime of the client.
#[derive(Default)]
struct Counters {
    positions: AtomicU64,
    statics: AtomicU64,
    decode_errors: AtomicU64,
    capacity_dropped: AtomicU64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StreamStats {
    pub positions: u64,
    pub statics: u64,
    pub decode_errors: u64,
    pub capacity_dropped: u64,
    pub tracked: usize,
}

struct Inner {
    config: StreamConfig,
    boxes: Vec<[[f64; 2]; 2]>,
    listener: Arc<dyn VesselListener>,
    /// Tracked identities and the client's own accumulated view of each.
    /// Bounded by the capacity ceiling for new identities only.
    vessels: DashMap<u32, Vessel>,
    counters: Counters,
    shutdown: watch::Sender<bool>,
}

#[derive(Clone)]
pub struct StreamClient {
    inner: Arc<Inner>,
}

impl StreamClient {
    pub fn new(
        config: StreamConfig,
        regions: &[Region],
        listener: Arc<dyn VesselListener>,
    ) -> Self {
        let boxes = regions.iter().map(|r| r.bounds.corners()).collect();
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                config,
                boxes,
                listener,
                vessels: DashMap::new(),
                counters: Counters::default(),
                shutdown,
            }),
        }
    }

    /// Connect and process frames until [`stop`](Self::stop) is called.
    /// Connection failures reconnect with exponential backoff; the attempt
    /// counter resets on every successful subscription.
    pub async fn run(self) -> Result<()> {
        let inner = &self.inner;
        let mut attempt: u32 = 0;

        loop {
            if inner.stopped() {
                return Ok(());
            }

            match inner.connect_and_listen(&mut attempt).await {
                Ok(()) => {
                    info!("Stream client stopped");
                    return Ok(());
                }
                Err(e) => {
                    if inner.stopped() {
                        return Ok(());
                    }
                    let delay = backoff_delay(
                        Duration::from_secs(inner.config.reconnect_base_secs),
                        Duration::from_secs(inner.config.reconnect_max_secs),
                        attempt,
                    );
                    attempt += 1;
                    warn!(
                        attempt,
                        delay_secs = delay.as_secs(),
                        error = %e,
                        "Stream connection lost; reconnecting"
                    );

                    // Guard against a stop that landed before the subscribe
                    let mut shutdown = inner.shutdown.subscribe();
                    if inner.stopped() {
                        return Ok(());
                    }
                    tokio::select! {
                        _ = sleep(delay) => {}
                        _ = shutdown.changed() => return Ok(()),
                    }
                }
            }
        }
    }

    /// Request shutdown. Idempotent; suppresses any further reconnection.
    pub fn stop(&self) {
        // send_replace updates the value even when no receiver is alive
        self.inner.shutdown.send_replace(true);
    }

    pub fn stats(&self) -> StreamStats {
        self.inner.stats()
    }

    /// Number of identities currently tracked.
    pub fn tracked(&self) -> usize {
        self.inner.vessels.len()
    }
}

impl Inner {
    fn stopped(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn stats(&self) -> StreamStats {
        StreamStats {
            positions: self.counters.positions.load(Ordering::Relaxed),
            statics: self.counters.statics.load(Ordering::Relaxed),
            decode_errors: self.counters.decode_errors.load(Ordering::Relaxed),
            capacity_dropped: self.counters.capacity_dropped.load(Ordering::Relaxed),
            tracked: self.vessels.len(),
        }
    }

    async fn connect_and_listen(self: &Arc<Self>, attempt: &mut u32) -> Result<()> {
        info!(url = %self.config.url, "Connecting to AIS stream");
        let connect_timeout = Duration::from_secs(self.config.connect_timeout_secs);
        let (ws, _) = timeout(connect_timeout, connect_async(&self.config.url))
            .await
            .context("Connection attempt timed out")?
            .context("WebSocket handshake failed")?;
        let (mut tx, mut rx) = ws.split();

        // One subscription covers the entire region set
        let request = SubscriptionRequest {
            api_key: self.config.api_key.clone(),
            bounding_boxes: self.boxes.clone(),
            filter_message_types: vec![
                "PositionReport".to_string(),
                "ShipStaticData".to_string(),
            ],
        };
        let payload = serde_json::to_string(&request).context("Failed to encode subscription")?;
        tx.send(Message::Text(payload.into()))
            .await
            .context("Failed to send subscription")?;
        info!(bounding_boxes = self.boxes.len(), "Subscription sent");
        *attempt = 0;

        // The queue holds raw frames; the worker drains them in bounded
        // batches and processes each batch concurrently. A configured batch
        // size of zero is clamped: the bounded channel needs capacity >= 1
        let (queue, worker) = if self.config.concurrent {
            let (queue_tx, queue_rx) = mpsc::channel::<String>(self.config.batch_size.max(1) * 64);
            let worker = tokio::spawn(Arc::clone(self).batch_worker(queue_rx));
            (Some(queue_tx), Some(worker))
        } else {
            (None, None)
        };

        let result = self.listen(&mut tx, &mut rx, queue.as_ref()).await;

        // Close the queue and let the worker finish what it holds
        drop(queue);
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                error!(error = %e, "Batch worker aborted");
            }
        }
        let _ = tx.send(Message::Close(None)).await;

        result
    }

    async fn listen(
        &self,
        tx: &mut SplitSink<WsStream, Message>,
        rx: &mut SplitStream<WsStream>,
        queue: Option<&mpsc::Sender<String>>,
    ) -> Result<()> {
        let ping_interval = Duration::from_secs(self.config.ping_interval_secs);
        let pong_wait = Duration::from_secs(self.config.pong_wait_secs);
        let mut ping_timer = interval(ping_interval);
        let mut summary_timer = interval(Duration::from_secs(45));
        summary_timer.tick().await;
        let mut last_pong = Instant::now();
        let mut shutdown = self.shutdown.subscribe();
        if self.stopped() {
            return Ok(());
        }

        loop {
            tokio::select! {
                _ = shutdown.changed() => return Ok(()),
                _ = ping_timer.tick() => {
                    if last_pong.elapsed() > ping_interval + pong_wait {
                        bail!("Keep-alive timed out");
                    }
                    tx.send(Message::Ping(Vec::new().into()))
                        .await
                        .context("Ping failed")?;
                }
                _ = summary_timer.tick() => {
                    let stats = self.stats();
                    info!(
                        tracked = stats.tracked,
                        positions = stats.positions,
                        statics = stats.statics,
                        decode_errors = stats.decode_errors,
                        capacity_dropped = stats.capacity_dropped,
                        "Stream summary"
                    );
                }
                frame = rx.next() => {
                    match frame {
                        None => bail!("Stream closed by server"),
                        Some(Err(e)) => bail!("WebSocket error: {e}"),
                        Some(Ok(Message::Text(text))) => {
                            match queue {
                                Some(queue) => {
                                    if queue.send(text.to_string()).await.is_err() {
                                        bail!("Batch worker gone");
                                    }
                                }
                                None => self.process_raw(&text).await,
                            }
                        }
                        Some(Ok(Message::Pong(_))) => {
                            last_pong = Instant::now();
                        }
                        Some(Ok(Message::Ping(data))) => {
                            tx.send(Message::Pong(data)).await.context("Pong failed")?;
                        }
                        Some(Ok(Message::Close(_))) => bail!("Server closed the connection"),
                        Some(Ok(_)) => {}
                    }
                }
            }
        }
    }

    /// Drain the queue in batches of at most `batch_size`, processing each
    /// batch concurrently. Batches themselves run sequentially.
    async fn batch_worker(self: Arc<Self>, mut queue: mpsc::Receiver<String>) {
        let batch_size = self.config.batch_size.max(1);
        let mut batch = Vec::with_capacity(batch_size);

        loop {
            let received = queue.recv_many(&mut batch, batch_size).await;
            if received == 0 {
                break;
            }
            join_all(batch.drain(..).map(|raw| {
                let inner = &self;
                async move { inner.process_raw(&raw).await }
            }))
            .await;
        }
        debug!("Batch worker drained");
    }

    async fn process_raw(&self, raw: &str) {
        match serde_json::from_str::<AisFrame>(raw) {
            Ok(AisFrame::PositionReport { report }) => self.handle_position(report).await,
            Ok(AisFrame::ShipStaticData { report }) => self.handle_static(report).await,
            Ok(AisFrame::Unknown) => {}
            Err(e) => {
                self.counters.decode_errors.fetch_add(1, Ordering::Relaxed);
                debug!(error = %e, "Dropping undecodable frame");
            }
        }
    }

    async fn handle_position(&self, report: PositionReportMsg) {
        let Some(mut vessel) = self.admit(report.user_id) else {
            return;
        };
        vessel.apply_position(&report.to_update());
        let snapshot = vessel.clone();
        drop(vessel);

        self.counters.positions.fetch_add(1, Ordering::Relaxed);
        self.listener.on_position(&snapshot).await;
    }

    async fn handle_static(&self, report: ShipStaticDataMsg) {
        let Some(mut vessel) = self.admit(report.user_id) else {
            return;
        };
        vessel.apply_static(&report.to_update());
        let snapshot = vessel.clone();
        drop(vessel);

        self.counters.statics.fetch_add(1, Ordering::Relaxed);
        self.listener.on_static(&snapshot).await;
    }

    /// Capacity policy: updates to known identities are always accepted;
    /// a new identity is admitted only while the tracked set is below the
    /// ceiling.
    fn admit(&self, mmsi: u32) -> Option<dashmap::mapref::one::RefMut<'_, u32, Vessel>> {
        if !self.vessels.contains_key(&mmsi) && self.vessels.len() >= self.config.max_vessels {
            self.counters.capacity_dropped.fetch_add(1, Ordering::Relaxed);
            debug!(mmsi, "Tracking ceiling reached; dropping new identity");
            return None;
        }
        Some(self.vessels.entry(mmsi).or_insert_with(|| Vessel::new(mmsi)))
    }
}

/// Delay before reconnect attempt `attempt` (zero-based): base doubled per
/// attempt, capped at `max`.
fn backoff_delay(base: Duration, max: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.min(16));
    base.saturating_mul(factor).min(max)
}
