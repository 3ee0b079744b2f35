use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::checkout::validate_request;
use crate::error::{AppError, OrderError};
use crate::gateway::{AuthTokenProvider, DeliveryGateway, OrderGateway};
use crate::models::delivery::{Delivery, DeliveryStatus};
use crate::models::order::{CreateOrderRequest, Order};

/// The backend answers either `{ "data": T, ... }` or a bare `T`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data } => data,
            Envelope::Bare(inner) => inner,
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

#[derive(Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    auth: Arc<dyn AuthTokenProvider>,
}

impl HttpGateway {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        auth: Arc<dyn AuthTokenProvider>,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| AppError::Internal(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, OrderError> {
        let builder = match self.auth.token() {
            Some(token) => builder.bearer_auth(token.trim()),
            None => builder,
        };

        builder.send().await.map_err(|err| {
            if err.is_timeout() {
                OrderError::Network("request timed out".to_string())
            } else {
                OrderError::Network(err.to_string())
            }
        })
    }

    pub async fn cancel_order(&self, order_id: i64) -> Result<Order, OrderError> {
        let response = self
            .send(self.client.post(self.url(&format!("/orders/{order_id}/cancel"))))
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(OrderError::NotFound(format!("order {order_id}")));
        }
        decode(response).await
    }

    pub async fn update_delivery_status(
        &self,
        delivery_id: i64,
        status: &DeliveryStatus,
    ) -> Result<Delivery, OrderError> {
        let request = self
            .client
            .put(self.url(&format!("/deliveries/{delivery_id}/status")))
            .query(&[("status", status.as_str())]);
        let response = self.send(request).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(OrderError::NotFound(format!("delivery {delivery_id}")));
        }
        decode(response).await
    }

    pub async fn cancel_delivery(
        &self,
        delivery_id: i64,
        reason: &str,
    ) -> Result<Delivery, OrderError> {
        let request = self
            .client
            .post(self.url(&format!("/deliveries/{delivery_id}/cancel")))
            .query(&[("reason", reason)]);
        let response = self.send(request).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(OrderError::NotFound(format!("delivery {delivery_id}")));
        }
        decode(response).await
    }
}

#[async_trait]
impl OrderGateway for HttpGateway {
    async fn create(&self, request: &CreateOrderRequest) -> Result<Order, OrderError> {
        validate_request(request)?;

        let response = self
            .send(self.client.post(self.url("/orders")).json(request))
            .await?;
        decode(response).await
    }

    async fn get_by_id(&self, order_id: i64) -> Result<Order, OrderError> {
        let response = self
            .send(self.client.get(self.url(&format!("/orders/{order_id}"))))
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(OrderError::NotFound(format!("order {order_id}")));
        }
        decode(response).await
    }
}

#[async_trait]
impl DeliveryGateway for HttpGateway {
    async fn get_by_order_id(&self, order_id: i64) -> Result<Option<Delivery>, OrderError> {
        let response = self
            .send(
                self.client
                    .get(self.url(&format!("/deliveries/order/{order_id}"))),
            )
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(order_id, "no delivery for order yet");
            return Ok(None);
        }
        decode(response).await.map(Some)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, OrderError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|err| OrderError::Network(format!("failed to read response body: {err}")))?;

    if !status.is_success() {
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message.or(b.error))
            .unwrap_or(body);

        return Err(OrderError::Remote {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str::<Envelope<T>>(&body)
        .map(Envelope::into_inner)
        .map_err(|err| OrderError::Decode(err.to_string()))
}
