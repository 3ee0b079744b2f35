use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::models::display_status;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderStatus(String);

impl OrderStatus {
    pub const PENDING: &'static str = "PENDING";
    pub const CONFIRMED: &'static str = "CONFIRMED";
    pub const PREPARING: &'static str = "PREPARING";
    pub const IN_TRANSIT: &'static str = "IN_TRANSIT";
    pub const DELIVERED: &'static str = "DELIVERED";
    pub const COMPLETED: &'static str = "COMPLETED";
    pub const CANCELLED: &'static str = "CANCELLED";
    pub const FAILED: &'static str = "FAILED";

    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.0.to_ascii_uppercase().as_str(),
            Self::DELIVERED | Self::COMPLETED | Self::CANCELLED | Self::FAILED
        )
    }

    pub fn display(&self) -> String {
        display_status(&self.0)
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        Self::new("UNKNOWN")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    #[serde(default)]
    pub id: Option<i64>,
    pub product_id: i64,
    #[serde(default)]
    pub product_name: Option<String>,
    pub quantity: u32,
    #[serde(default)]
    pub unit_price: Option<f64>,
    #[serde(default)]
    pub subtotal: Option<f64>,
}

/// Snapshot of a placed order. Replaced wholesale by every successful fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub merchant_id: Option<i64>,
    #[serde(default)]
    pub driver_id: Option<i64>,
    #[serde(default)]
    pub total_amount: Option<f64>,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub delivery_address: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub updated_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub estimated_delivery_time: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub product_id: i64,
    pub quantity: u32,
    pub unit_price: f64,
}

/// Payload for `POST /orders`. Only built through `checkout::build_order_request`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub user_id: i64,
    pub merchant_id: i64,
    pub delivery_address: String,
    pub special_instructions: Option<String>,
    pub items: Vec<OrderItemRequest>,
}
