//! Wire schema for the upstream AIS feed.
//!
//! Frames are JSON objects with a `MessageType` discriminator and a nested
//! payload keyed by the same name. Only position reports and static/voyage
//! reports are decoded; any other kind deserializes to `Unknown` and is
//! ignored by the dispatcher.

use crate::vessel::{PositionUpdate, StaticUpdate};
use serde::{Deserialize, Serialize};

/// Subscription request sent once per connection, enumerating every
/// bounding box of interest. One call covers the whole region set; one call
/// per region would multiply upstream quota usage.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionRequest {
    #[serde(rename = "APIKey")]
    pub api_key: String,
    #[serde(rename = "BoundingBoxes")]
    pub bounding_boxes: Vec<[[f64; 2]; 2]>,
    #[serde(rename = "FilterMessageTypes")]
    pub filter_message_types: Vec<String>,
}

/// Inbound frame, discriminated by `MessageType`.
#[derive(Debug, Clone)]
pub enum AisFrame {
    PositionReport { report: PositionReportMsg },
    ShipStaticData { report: ShipStaticDataMsg },
    Unknown,
}

// Decoded in two stages: `#[serde(other)]` on an adjacently-tagged enum
// cannot ignore an unrecognized frame's `Message` payload, so the
// discriminator is read first and the payload parsed only for the two
// recognized kinds.
impl<'de> Deserialize<'de> for AisFrame {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct RawFrame {
            #[serde(rename = "MessageType")]
            message_type: String,
            #[serde(rename = "Message", default)]
            message: serde_json::Value,
        }

        #[derive(Deserialize)]
        struct PositionEnvelope {
            #[serde(rename = "PositionReport")]
            report: PositionReportMsg,
        }

        #[derive(Deserialize)]
        struct StaticEnvelope {
            #[serde(rename = "ShipStaticData")]
            report: ShipStaticDataMsg,
        }

        let raw = RawFrame::deserialize(deserializer)?;
        match raw.message_type.as_str() {
            "PositionReport" => {
                let envelope: PositionEnvelope =
                    serde_json::from_value(raw.message).map_err(serde::de::Error::custom)?;
                Ok(AisFrame::PositionReport {
                    report: envelope.report,
                })
            }
            "ShipStaticData" => {
                let envelope: StaticEnvelope =
                    serde_json::from_value(raw.message).map_err(serde::de::Error::custom)?;
                Ok(AisFrame::ShipStaticData {
                    report: envelope.report,
                })
            }
            _ => Ok(AisFrame::Unknown),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PositionReportMsg {
    #[serde(rename = "UserID")]
    pub user_id: u32,
    #[serde(rename = "Latitude")]
    pub latitude: f64,
    #[serde(rename = "Longitude")]
    pub longitude: f64,
    #[serde(rename = "Sog")]
    pub sog: Option<f64>,
    #[serde(rename = "Cog")]
    pub cog: Option<f64>,
    #[serde(rename = "TrueHeading")]
    pub true_heading: Option<u16>,
    #[serde(rename = "RateOfTurn")]
    pub rate_of_turn: Option<f64>,
    #[serde(rename = "NavigationalStatus")]
    pub navigational_status: Option<u8>,
    #[serde(rename = "PositionAccuracy")]
    pub position_accuracy: Option<bool>,
}

impl PositionReportMsg {
    /// Map wire sentinels ("not available" markers) to absent fields:
    /// heading 511 and rate-of-turn -128.
    pub fn to_update(&self) -> PositionUpdate {
        PositionUpdate {
            lat: self.latitude,
            lon: self.longitude,
            speed: self.sog,
            course: self.cog,
            heading: self.true_heading.filter(|&h| h != 511),
            rot: self.rate_of_turn.filter(|&r| r != -128.0),
            navigational_status: self.navigational_status,
            position_accuracy: self.position_accuracy,
            timestamp: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShipStaticDataMsg {
    #[serde(rename = "UserID")]
    pub user_id: u32,
    #[serde(rename = "Name")]
    pub name: Option<String>,
    #[serde(rename = "Destination")]
    pub destination: Option<String>,
    #[serde(rename = "Type")]
    pub ship_type: Option<u16>,
    #[serde(rename = "ImoNumber")]
    pub imo_number: Option<u32>,
    #[serde(rename = "CallSign")]
    pub call_sign: Option<String>,
    #[serde(rename = "MaximumStaticDraught")]
    pub maximum_static_draught: Option<f64>,
    #[serde(rename = "Dimension")]
    pub dimension: Option<DimensionMsg>,
    #[serde(rename = "Eta")]
    pub eta: Option<EtaMsg>,
}

/// Distances from the reporting antenna to bow (A), stern (B), port (C)
/// and starboard (D), in meters.
#[derive(Debug, Clone, Deserialize)]
pub struct DimensionMsg {
    #[serde(rename = "A")]
    pub to_bow: Option<u16>,
    #[serde(rename = "B")]
    pub to_stern: Option<u16>,
    #[serde(rename = "C")]
    pub to_port: Option<u16>,
    #[serde(rename = "D")]
    pub to_starboard: Option<u16>,
}

/// Structured ETA payload. AIS uses in-band sentinels for "not available"
/// (month 0, day 0, hour 24, minute 60).
#[derive(Debug, Clone, Deserialize)]
pub struct EtaMsg {
    #[serde(rename = "Month")]
    pub month: Option<u8>,
    #[serde(rename = "Day")]
    pub day: Option<u8>,
    #[serde(rename = "Hour")]
    pub hour: Option<u8>,
    #[serde(rename = "Minute")]
    pub minute: Option<u8>,
}

impl EtaMsg {
    /// Render to "MM-DD HH:MM" when every component is present and in
    /// range; otherwise the ETA is treated as absent.
    pub fn format(&self) -> Option<String> {
        let month = self.month.filter(|m| (1..=12).contains(m))?;
        let day = self.day.filter(|d| (1..=31).contains(d))?;
        let hour = self.hour.filter(|h| *h < 24)?;
        let minute = self.minute.filter(|m| *m < 60)?;
        Some(format!("{month:02}-{day:02} {hour:02}:{minute:02}"))
    }
}

impl ShipStaticDataMsg {
    pub fn to_update(&self) -> StaticUpdate {
        let dimension = self.dimension.as_ref();
        StaticUpdate {
            name: self.name.clone(),
            destination: self.destination.clone(),
            ship_type: self.ship_type,
            imo: self.imo_number.filter(|&imo| imo != 0),
            callsign: self.call_sign.clone(),
            draught: self.maximum_static_draught.filter(|&d| d != 0.0),
            dimension_to_bow: dimension.and_then(|d| d.to_bow),
            dimension_to_stern: dimension.and_then(|d| d.to_stern),
            dimension_to_port: dimension.and_then(|d| d.to_port),
            dimension_to_starboard: dimension.and_then(|d| d.to_starboard),
            eta: self.eta.as_ref().and_then(EtaMsg::format),
            cargo: None,
            deadweight: None,
            gross_tonnage: None,
            timestamp: None,
        }
    }
}
