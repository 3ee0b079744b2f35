//! Backend seams. The tracker and checkout only see these traits; the
//! `reqwest` implementation lives in [`http`].

pub mod http;

use async_trait::async_trait;

use crate::error::OrderError;
use crate::models::delivery::Delivery;
use crate::models::order::{CreateOrderRequest, Order};

pub use http::HttpGateway;

#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Fails with `OrderError::Validation` before any I/O when the request is malformed.
    async fn create(&self, request: &CreateOrderRequest) -> Result<Order, OrderError>;

    async fn get_by_id(&self, order_id: i64) -> Result<Order, OrderError>;
}

#[async_trait]
pub trait DeliveryGateway: Send + Sync {
    /// `Ok(None)` means no delivery has been created for the order yet.
    async fn get_by_order_id(&self, order_id: i64) -> Result<Option<Delivery>, OrderError>;
}

/// Supplies the bearer token for each request.
pub trait AuthTokenProvider: Send + Sync {
    fn token(&self) -> Option<String>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: Option<String>) -> Self {
        Self(token)
    }
}

impl AuthTokenProvider for StaticToken {
    fn token(&self) -> Option<String> {
        self.0.clone()
    }
}
