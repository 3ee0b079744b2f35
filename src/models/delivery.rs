use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::geo::haversine_km;
use crate::models::display_status;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeliveryStatus(String);

impl DeliveryStatus {
    pub const PENDING_ASSIGNMENT: &'static str = "PENDING_ASSIGNMENT";
    pub const ASSIGNED: &'static str = "ASSIGNED";
    pub const PICKED_UP: &'static str = "PICKED_UP";
    pub const IN_TRANSIT: &'static str = "IN_TRANSIT";
    pub const DELIVERED: &'static str = "DELIVERED";
    pub const FAILED: &'static str = "FAILED";
    pub const CANCELLED: &'static str = "CANCELLED";

    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.0.to_ascii_uppercase().as_str(),
            Self::DELIVERED | Self::CANCELLED | Self::FAILED
        )
    }

    pub fn display(&self) -> String {
        display_status(&self.0)
    }
}

impl Default for DeliveryStatus {
    fn default() -> Self {
        Self::new(Self::PENDING_ASSIGNMENT)
    }
}

/// Fulfillment record for an order. The client only ever reads snapshots of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    #[serde(default)]
    pub id: Option<i64>,
    pub order_id: i64,
    #[serde(default)]
    pub status: DeliveryStatus,
    #[serde(default)]
    pub driver_id: Option<i64>,
    #[serde(default)]
    pub driver_name: Option<String>,
    #[serde(default)]
    pub driver_phone: Option<String>,
    #[serde(default)]
    pub delivery_address: Option<String>,
    #[serde(default)]
    pub current_latitude: Option<f64>,
    #[serde(default)]
    pub current_longitude: Option<f64>,
    #[serde(default)]
    pub delivery_latitude: Option<f64>,
    #[serde(default)]
    pub delivery_longitude: Option<f64>,
    #[serde(default)]
    pub estimated_delivery_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub pickup_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub delivered_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub last_location_update: Option<NaiveDateTime>,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
}

impl Delivery {
    pub fn has_driver(&self) -> bool {
        self.driver_id.is_some()
    }

    pub fn current_position(&self) -> Option<GeoPoint> {
        Some(GeoPoint {
            lat: self.current_latitude?,
            lng: self.current_longitude?,
        })
    }

    pub fn destination(&self) -> Option<GeoPoint> {
        Some(GeoPoint {
            lat: self.delivery_latitude?,
            lng: self.delivery_longitude?,
        })
    }

    /// Straight-line distance between the driver and the drop-off, when both are known.
    pub fn remaining_km(&self) -> Option<f64> {
        let here = self.current_position()?;
        let there = self.destination()?;
        Some(haversine_km(&here, &there))
    }
}
