use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{Request, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower::ServiceExt;

use order_tracker::api::rest::router;
use order_tracker::checkout::{place_order, OrderDraft};
use order_tracker::gateway::{HttpGateway, StaticToken};
use order_tracker::models::cart::{CartLine, PriceInput};
use order_tracker::models::customer::{CustomerIdentity, DeliveryAddress, PaymentDetails};
use order_tracker::observability::metrics::Metrics;
use order_tracker::state::AppState;
use order_tracker::tracker::{OrderTracker, TrackerConfig, TrackerState};

#[derive(Default)]
struct Backend {
    order_calls: AtomicUsize,
    delivery_calls: AtomicUsize,
    created: std::sync::Mutex<Option<Value>>,
}

async fn get_order(State(backend): State<Arc<Backend>>, Path(id): Path<i64>) -> Json<Value> {
    let call = backend.order_calls.fetch_add(1, Ordering::SeqCst);
    let status = if call < 2 { "PREPARING" } else { "DELIVERED" };

    Json(json!({
        "success": true,
        "data": {
            "id": id,
            "userId": 3,
            "merchantId": 1,
            "totalAmount": 13.79,
            "status": status,
            "deliveryAddress": "1 Main St, Springfield, IL, 62701",
            "items": [{ "productId": 10, "quantity": 2, "unitPrice": 5.0 }]
        }
    }))
}

async fn get_delivery(
    State(backend): State<Arc<Backend>>,
    Path(order_id): Path<i64>,
) -> axum::response::Response {
    let call = backend.delivery_calls.fetch_add(1, Ordering::SeqCst);
    if call == 0 {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Delivery not found" })),
        )
            .into_response();
    }

    Json(json!({
        "id": 900,
        "orderId": order_id,
        "status": "IN_TRANSIT",
        "driverId": 5,
        "driverName": "Sam",
        "currentLatitude": 39.7817,
        "currentLongitude": -89.6501,
        "deliveryLatitude": 39.7990,
        "deliveryLongitude": -89.6440
    }))
    .into_response()
}

async fn create_order(State(backend): State<Arc<Backend>>, Json(body): Json<Value>) -> Json<Value> {
    *backend.created.lock().unwrap() = Some(body);

    Json(json!({
        "data": { "id": 77, "userId": 3, "merchantId": 1, "status": "PENDING" }
    }))
}

async fn spawn_backend() -> (String, Arc<Backend>) {
    let backend = Arc::new(Backend::default());
    let app = Router::new()
        .route("/api/orders", post(create_order))
        .route("/api/orders/:id", get(get_order))
        .route("/api/deliveries/order/:id", get(get_delivery))
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/api/"), backend)
}

fn gateway(base_url: &str) -> Arc<HttpGateway> {
    Arc::new(
        HttpGateway::new(
            base_url,
            Duration::from_millis(500),
            Arc::new(StaticToken::new(Some("test-token".to_string()))),
        )
        .unwrap(),
    )
}

fn tracker_for(gateway: Arc<HttpGateway>, metrics: Metrics) -> OrderTracker {
    let config = TrackerConfig {
        poll_interval: Duration::from_millis(200),
        request_timeout: Duration::from_millis(150),
        stop_on_terminal: true,
    };
    OrderTracker::new(gateway.clone(), gateway, config, metrics)
}

fn setup() -> (Router, OrderTracker) {
    let metrics = Metrics::new();
    // Never contacted while the tracker is idle.
    let tracker = tracker_for(gateway("http://127.0.0.1:9/api"), metrics.clone());
    let state = AppState::new(tracker.reader(), metrics);
    (router(Arc::new(state)), tracker)
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn health_reports_idle_tracker() {
    let (app, _tracker) = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["tracker"], "idle");
    assert_eq!(body["order_id"], Value::Null);
    assert_eq!(body["cycles_completed"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let (app, _tracker) = setup();
    let response = app.oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("active_trackers"));
}

#[tokio::test]
async fn tracking_is_not_found_while_idle() {
    let (app, _tracker) = setup();
    let response = app.oneshot(get_request("/tracking")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("no order is being tracked"));
}

#[tokio::test]
async fn tracks_order_until_delivered() {
    let (base_url, backend) = spawn_backend().await;
    let metrics = Metrics::new();
    let tracker = tracker_for(gateway(&base_url), metrics.clone());
    let mut reader = tracker.reader();
    let app = router(Arc::new(AppState::new(tracker.reader(), metrics.clone())));

    tracker.start(42).unwrap();

    let last = tokio::time::timeout(Duration::from_secs(10), reader.stopped())
        .await
        .expect("tracker should stop once the order is delivered");

    assert_eq!(last.state, TrackerState::Stopped);
    assert_eq!(last.order_id, Some(42));
    assert!(last.cycles_completed >= 3);
    assert_eq!(last.order.as_ref().unwrap().status.as_str(), "DELIVERED");
    assert!(backend.delivery_calls.load(Ordering::SeqCst) >= 2);

    let response = app.oneshot(get_request("/tracking")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["state"], "stopped");
    assert_eq!(body["order_status"], "delivered");
    assert_eq!(body["delivery"]["orderId"], 42);
    assert_eq!(body["delivery_status"], "in transit");
    assert_eq!(body["driver_assigned"], true);
    assert_eq!(body["remaining_distance"], "2.0 km");
    assert_eq!(metrics.active_trackers.get(), 0);
}

#[tokio::test]
async fn placed_order_is_sent_to_backend_and_tracked() {
    let (base_url, backend) = spawn_backend().await;
    let gateway = gateway(&base_url);

    let draft = OrderDraft {
        cart: vec![CartLine {
            product_id: 10,
            name: Some("Sparkling water".to_string()),
            quantity: 2,
            price: Some(PriceInput::Text("$5.00".to_string())),
            is_alcohol: false,
        }],
        address: Some(DeliveryAddress {
            line1: "1 Main St".to_string(),
            line2: String::new(),
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            zip: "62701".to_string(),
        }),
        payment: Some(PaymentDetails {
            card_name: "A Customer".to_string(),
            card_number: "4242424242424242".to_string(),
            exp: "12/30".to_string(),
            cvc: "123".to_string(),
        }),
        customer: CustomerIdentity {
            id: Some(3),
            age_verified: false,
        },
        merchant_id: Some(1),
        special_instructions: Some("   ".to_string()),
    };

    let order = place_order(gateway.as_ref(), &draft).await.unwrap();
    assert_eq!(order.id, 77);

    let sent = backend.created.lock().unwrap().clone().unwrap();
    assert_eq!(sent["userId"], 3);
    assert_eq!(sent["merchantId"], 1);
    assert_eq!(sent["deliveryAddress"], "1 Main St, Springfield, IL, 62701");
    assert_eq!(sent["items"][0]["unitPrice"], 5.0);
    assert_eq!(sent["items"][0]["quantity"], 2);
    assert!(sent.get("specialInstructions").map_or(true, Value::is_null));

    let tracker = tracker_for(gateway, Metrics::new());
    let reader = tracker.reader();
    tracker.track_placed(order).unwrap();

    let first = reader.current();
    assert_eq!(first.state, TrackerState::Polling);
    assert_eq!(first.order_id, Some(77));

    tracker.stop();
    assert_eq!(reader.current().state, TrackerState::Stopped);
}
