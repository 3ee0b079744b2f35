use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Serialize;

use crate::error::{AppError, OrderError};
use crate::geo::format_distance;
use crate::state::AppState;
use crate::tracker::{TrackerState, TrackingSnapshot};

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/tracking", get(get_tracking))
}

/// Snapshot plus the display fields a storefront page renders.
#[derive(Debug, Serialize)]
pub struct TrackingView {
    #[serde(flatten)]
    pub snapshot: TrackingSnapshot,
    pub order_status: Option<String>,
    pub delivery_status: Option<String>,
    pub driver_assigned: bool,
    pub remaining_distance: Option<String>,
}

impl From<TrackingSnapshot> for TrackingView {
    fn from(snapshot: TrackingSnapshot) -> Self {
        let order_status = snapshot.order.as_ref().map(|o| o.status.display());
        let delivery_status = snapshot.delivery.as_ref().map(|d| d.status.display());
        let driver_assigned = snapshot.delivery.as_ref().is_some_and(|d| d.has_driver());
        let remaining_distance = snapshot
            .delivery
            .as_ref()
            .and_then(|d| d.remaining_km())
            .map(format_distance);

        Self {
            snapshot,
            order_status,
            delivery_status,
            driver_assigned,
            remaining_distance,
        }
    }
}

async fn get_tracking(State(state): State<Arc<AppState>>) -> Result<Json<TrackingView>, AppError> {
    let snapshot = state.reader.current();

    if snapshot.state == TrackerState::Idle {
        return Err(OrderError::NotFound("no order is being tracked".to_string()).into());
    }

    Ok(Json(TrackingView::from(snapshot)))
}
