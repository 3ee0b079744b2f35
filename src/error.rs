use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Pre-flight checks on an order request. Raised before any network call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("customer identifier is missing")]
    MissingCustomer,

    #[error("merchant identifier is missing")]
    MissingMerchant,

    #[error("delivery address is missing {0}")]
    IncompleteAddress(&'static str),

    #[error("payment details are missing {0}")]
    IncompletePayment(&'static str),

    #[error("cart line {index} is invalid: {reason}")]
    InvalidLine { index: usize, reason: String },

    #[error("cart contains age-restricted items and the customer is not age verified")]
    AgeVerificationRequired,
}

#[derive(Debug, Clone, Error)]
pub enum OrderError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("backend returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl OrderError {
    /// Message to show the customer, if any. Expected absence is never shown.
    pub fn user_message(&self) -> Option<String> {
        match self {
            OrderError::NotFound(_) => None,
            OrderError::Validation(err) => Some(err.to_string()),
            OrderError::Remote { message, .. } if !message.is_empty() => Some(message.clone()),
            OrderError::Remote { .. } | OrderError::Network(_) | OrderError::Decode(_) => {
                Some("Something went wrong talking to the store. Please try again.".to_string())
            }
        }
    }

    /// Network failures are left for the next scheduled poll to retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OrderError::Network(_))
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackerError {
    #[error("tracker has been stopped")]
    Stopped,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("preference store error: {0}")]
    Preferences(String),

    #[error("invalid input: {0}")]
    Input(String),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Order(OrderError::Validation(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Order(OrderError::Validation(_)) | AppError::Input(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Order(OrderError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Order(OrderError::Remote { .. } | OrderError::Network(_)) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::Tracker(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}
