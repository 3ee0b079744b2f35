use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures::StreamExt;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use order_tracker::api::rest::router;
use order_tracker::api::rest::tracking::TrackingView;
use order_tracker::checkout::{place_order, OrderDraft};
use order_tracker::config::Config;
use order_tracker::error::AppError;
use order_tracker::gateway::{HttpGateway, StaticToken};
use order_tracker::models::cart::CartLine;
use order_tracker::models::customer::{CustomerIdentity, DeliveryAddress, PaymentDetails};
use order_tracker::models::delivery::DeliveryStatus;
use order_tracker::models::order::Order;
use order_tracker::observability::metrics::Metrics;
use order_tracker::preferences::{LocalPreferenceStore, ADDRESS_KEY, PAYMENT_KEY};
use order_tracker::pricing::summarize;
use order_tracker::state::AppState;
use order_tracker::tracker::{OrderTracker, TrackerConfig, TrackerState, TrackingSnapshot};

#[derive(Parser)]
#[command(name = "order-tracker", about = "Place storefront orders and follow their delivery")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show subtotal, tax, delivery fee and total for a cart file
    Quote {
        #[arg(long)]
        cart: PathBuf,
    },
    /// Place an order from a cart file, then track it
    Place {
        #[arg(long)]
        cart: PathBuf,
        #[arg(long)]
        merchant: i64,
        #[arg(long)]
        instructions: Option<String>,
        /// Exit once the order is created
        #[arg(long)]
        no_track: bool,
    },
    /// Track an existing order until it finishes or Ctrl-C
    Track { order_id: i64 },
    /// Cancel an order
    Cancel { order_id: i64 },
    /// Driver action: move a delivery to a new status
    UpdateDelivery { delivery_id: i64, status: String },
    /// Driver action: cancel a delivery
    CancelDelivery {
        delivery_id: i64,
        #[arg(long)]
        reason: String,
    },
    /// Save the delivery address used for new orders
    SetAddress {
        #[arg(long)]
        line1: String,
        #[arg(long, default_value = "")]
        line2: String,
        #[arg(long)]
        city: String,
        #[arg(long)]
        state: String,
        #[arg(long)]
        zip: String,
    },
    /// Save the payment details required to place orders
    SetPayment {
        #[arg(long, default_value = "")]
        card_name: String,
        #[arg(long)]
        card_number: String,
        #[arg(long)]
        exp: String,
        #[arg(long)]
        cvc: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let metrics = Metrics::new();
    let gateway = Arc::new(HttpGateway::new(
        &config.api_base_url,
        config.request_timeout,
        Arc::new(StaticToken::new(config.auth_token.clone())),
    )?);

    match cli.command {
        Command::Quote { cart } => {
            let summary = summarize(&read_cart(&cart)?)?;
            info!(
                subtotal = summary.subtotal,
                tax = summary.tax,
                delivery_fee = summary.delivery_fee,
                total = summary.total,
                "order summary"
            );
        }
        Command::Place {
            cart,
            merchant,
            instructions,
            no_track,
        } => {
            let prefs = LocalPreferenceStore::open(&config.preferences_path)?;
            let cart = read_cart(&cart)?;
            let summary = summarize(&cart)?;
            info!(total = summary.total, lines = cart.len(), "placing order");

            let draft = OrderDraft {
                cart,
                address: prefs.address(),
                payment: prefs.payment(),
                customer: CustomerIdentity {
                    id: config.customer_id,
                    age_verified: config.customer_age_verified,
                },
                merchant_id: Some(merchant),
                special_instructions: instructions,
            };

            let order = match place_order(gateway.as_ref(), &draft).await {
                Ok(order) => {
                    metrics
                        .orders_created_total
                        .with_label_values(&["success"])
                        .inc();
                    order
                }
                Err(err) => {
                    metrics
                        .orders_created_total
                        .with_label_values(&["error"])
                        .inc();
                    if let Some(message) = err.user_message() {
                        error!(%message, "order was not placed");
                    }
                    return Err(err.into());
                }
            };

            if !no_track {
                track(&config, gateway, metrics, Some(order.clone()), order.id).await?;
            }
        }
        Command::Track { order_id } => {
            track(&config, gateway, metrics, None, order_id).await?;
        }
        Command::Cancel { order_id } => {
            let order = gateway.cancel_order(order_id).await?;
            info!(order_id = order.id, status = %order.status.display(), "order cancelled");
        }
        Command::UpdateDelivery {
            delivery_id,
            status,
        } => {
            let status = DeliveryStatus::new(status.to_ascii_uppercase());
            let delivery = gateway.update_delivery_status(delivery_id, &status).await?;
            info!(delivery_id, status = %delivery.status.display(), "delivery updated");
        }
        Command::CancelDelivery {
            delivery_id,
            reason,
        } => {
            let delivery = gateway.cancel_delivery(delivery_id, &reason).await?;
            info!(delivery_id, status = %delivery.status.display(), "delivery cancelled");
        }
        Command::SetAddress {
            line1,
            line2,
            city,
            state,
            zip,
        } => {
            let address = DeliveryAddress {
                line1,
                line2,
                city,
                state,
                zip,
            };
            if let Some(missing) = address.missing_component() {
                warn!(missing, "saved address is incomplete; orders will be rejected");
            }
            LocalPreferenceStore::open(&config.preferences_path)?.set(ADDRESS_KEY, &address)?;
            info!(address = %address.format(), "delivery address saved");
        }
        Command::SetPayment {
            card_name,
            card_number,
            exp,
            cvc,
        } => {
            let payment = PaymentDetails {
                card_name,
                card_number,
                exp,
                cvc,
            };
            if let Some(missing) = payment.missing_component() {
                warn!(missing, "saved payment details are incomplete");
            }
            LocalPreferenceStore::open(&config.preferences_path)?.set(PAYMENT_KEY, &payment)?;
            info!("payment details saved");
        }
    }

    Ok(())
}

async fn track(
    config: &Config,
    gateway: Arc<HttpGateway>,
    metrics: Metrics,
    placed: Option<Order>,
    order_id: i64,
) -> Result<(), AppError> {
    let tracker = OrderTracker::new(
        gateway.clone(),
        gateway,
        TrackerConfig::from(config),
        metrics.clone(),
    );
    let reader = tracker.reader();

    if let Some(port) = config.status_port {
        let state = Arc::new(AppState::new(reader.clone(), metrics));
        tokio::spawn(serve_status(port, state));
    }

    match placed {
        Some(order) => tracker.track_placed(order)?,
        None => tracker.start(order_id)?,
    };

    let mut updates = reader.stream();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            next = updates.next() => match next {
                Some(snapshot) => {
                    log_snapshot(&snapshot);
                    if snapshot.state == TrackerState::Stopped {
                        break;
                    }
                }
                None => break,
            },
            _ = &mut shutdown => {
                info!(order_id, "shutdown requested");
                tracker.stop();
                break;
            }
        }
    }

    Ok(())
}

fn log_snapshot(snapshot: &TrackingSnapshot) {
    let view = TrackingView::from(snapshot.clone());

    info!(
        order_id = ?view.snapshot.order_id,
        tracker = ?view.snapshot.state,
        order_status = view.order_status.as_deref().unwrap_or("-"),
        delivery_status = view.delivery_status.as_deref().unwrap_or("awaiting driver"),
        driver = view
            .snapshot
            .delivery
            .as_ref()
            .and_then(|d| d.driver_name.as_deref())
            .unwrap_or("-"),
        remaining = view.remaining_distance.as_deref().unwrap_or("-"),
        "tracking update"
    );
}

async fn serve_status(port: u16, state: Arc<AppState>) {
    let bind_addr = format!("127.0.0.1:{port}");
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, %bind_addr, "failed to bind status server");
            return;
        }
    };

    info!(status_port = port, "status server started");

    if let Err(err) = axum::serve(listener, router(state)).await {
        error!(error = %err, "status server failed");
    }
}

fn read_cart(path: &Path) -> Result<Vec<CartLine>, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|err| AppError::Input(format!("failed to read {}: {err}", path.display())))?;

    serde_json::from_str(&raw)
        .map_err(|err| AppError::Input(format!("invalid cart file {}: {err}", path.display())))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
    }
}
