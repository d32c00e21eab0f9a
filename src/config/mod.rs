//! TOML configuration with serde defaults.
//!
//! Every field is optional in the file; an empty config is a fully usable
//! one (apart from the API key, which normally arrives via `AIS_API_KEY`).

use crate::regions::{BoundingBox, Port, Region};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;


#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default = "default_regions")]
    pub regions: Vec<Region>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_max_vessels")]
    pub max_vessels: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_concurrent")]
    pub concurrent: bool,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    #[serde(default = "default_pong_wait_secs")]
    pub pong_wait_secs: u64,
    #[serde(default = "default_reconnect_base_secs")]
    pub reconnect_base_secs: u64,
    #[serde(default = "default_reconnect_max_secs")]
    pub reconnect_max_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
    #[serde(default = "default_op_timeout_secs")]
    pub op_timeout_secs: u64,
}

fn default_url() -> String {
    "wss://stream.aisstream.io/v0/stream".to_string()
}

fn default_api_key() -> String {
    std::env::var("AIS_API_KEY").unwrap_or_default()
}

fn default_max_vessels() -> usize {
    500
}

fn default_batch_size() -> usize {
    10
}

fn default_concurrent() -> bool {
    true
}

fn default_connect_timeout_secs() -> u64 {
    20
}

fn default_ping_interval_secs() -> u64 {
    30
}

fn default_pong_wait_secs() -> u64 {
    10
}

fn default_reconnect_base_secs() -> u64 {
    5
}

fn default_reconnect_max_secs() -> u64 {
    300
}

fn default_db_path() -> String {
    "data/vessels.db".to_string()
}

fn default_op_timeout_secs() -> u64 {
    5
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            stream: StreamConfig::default(),
            store: StoreConfig::default(),
            regions: default_regions(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            api_key: default_api_key(),
            max_vessels: default_max_vessels(),
            batch_size: default_batch_size(),
            concurrent: default_concurrent(),
            connect_timeout_secs: default_connect_timeout_secs(),
            ping_interval_secs: default_ping_interval_secs(),
            pong_wait_secs: default_pong_wait_secs(),
            reconnect_base_secs: default_reconnect_base_secs(),
            reconnect_max_secs: default_reconnect_max_secs(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            op_timeout_secs: default_op_timeout_secs(),
        }
    }
}

pub fn load_config(path: &str) -> Result<TrackerConfig> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read config file {path}"))?;
    let mut config: TrackerConfig =
        toml::from_str(&content).with_context(|| format!("Failed to parse config file {path}"))?;
    if config.regions.is_empty() {
        config.regions = default_regions();
    }
    Ok(config)
}

fn region(name: &str, south: f64, west: f64, north: f64, east: f64, ports: Vec<Port>) -> Region {
    Region {
        name: name.to_string(),
        bounds: BoundingBox::new(south, west, north, east),
        ports,
    }
}

fn port(name: &str, lat: f64, lon: f64, label: &str) -> Port {
    Port {
        name: name.to_string(),
        lat,
        lon,
        label: label.to_string(),
    }
}

/// The shipping chokepoints and basins watched out of the box, with the
/// major oil terminals in each.
pub fn default_regions() -> Vec<Region> {
    vec![
        region(
            "persian_gulf",
            22.0,
            48.0,
            30.0,
            60.0,
            vec![
                port("Ras Tanura", 26.6408, 50.1735, "Saudi Arabia"),
                port("Mina Al Ahmadi", 29.0769, 48.1631, "Kuwait"),
                port("Kharg Island", 29.2603, 50.3241, "Iran"),
                port("Jebel Ali", 25.0118, 55.0618, "UAE"),
                port("Fujairah", 25.1164, 56.3365, "UAE"),
                port("Das Island", 25.15, 52.87, "UAE"),
                port("Ruwais", 24.11, 52.73, "UAE"),
            ],
        ),
        region(
            "singapore_strait",
            0.0,
            100.0,
            6.0,
            106.0,
            vec![
                port("Singapore Port", 1.2644, 103.8224, "Singapore"),
                port("Port Klang", 2.9922, 101.3919, "Malaysia"),
                port("Tanjung Pelepas", 1.3644, 103.5478, "Malaysia"),
            ],
        ),
        region(
            "suez_canal",
            29.0,
            32.0,
            32.0,
            34.0,
            vec![
                port("Port Said", 31.2653, 32.3019, "Egypt"),
                port("Suez Port", 29.9668, 32.5498, "Egypt"),
            ],
        ),
        region(
            "us_gulf",
            25.0,
            -98.0,
            31.0,
            -80.0,
            vec![
                port("Houston", 29.7604, -95.3698, "USA"),
                port("Corpus Christi", 27.8006, -97.3964, "USA"),
                port("Louisiana Offshore", 29.0, -90.0, "USA"),
                port("Port Arthur", 29.8688, -93.93, "USA"),
            ],
        ),
        region(
            "north_sea",
            51.0,
            -4.0,
            62.0,
            10.0,
            vec![
                port("Rotterdam", 51.9225, 4.4792, "Netherlands"),
                port("Antwerp", 51.2194, 4.4025, "Belgium"),
            ],
        ),
        region("mediterranean", 30.0, -6.0, 46.0, 37.0, Vec::new()),
        region("malacca", 1.0, 98.0, 6.0, 105.0, Vec::new()),
        region("gibraltar", 35.0, -6.0, 37.0, -5.0, Vec::new()),
        region("panama", 8.0, -80.0, 10.0, -79.0, Vec::new()),
    ]
}
