use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error};

use crate::error::OrderError;
use crate::tracker::Shared;

/// Drives poll cycles for one tracking generation.
///
/// Cycles start on a fixed grid measured from the first one, so a slow
/// cycle does not push back the next. Cycles run as their own tasks inside
/// a `JoinSet`; aborting this loop drops the set and cancels them.
pub(crate) async fn run_poll_loop(shared: Arc<Shared>, generation: u64, order_id: i64) {
    debug!(order_id, generation, "poll loop started");

    let mut ticker = time::interval(shared.config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut cycles = JoinSet::new();
    let mut seq: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                seq += 1;
                cycles.spawn(poll_cycle(shared.clone(), generation, order_id, seq));
            }
            Some(joined) = cycles.join_next() => {
                if let Err(err) = joined {
                    if err.is_panic() {
                        error!(order_id, error = %err, "poll cycle panicked");
                    }
                }

                if !shared.cycle_finished(generation) {
                    break;
                }
            }
        }
    }

    debug!(order_id, generation, "poll loop finished");
}

/// Fetches the order and its delivery concurrently. Each result is applied
/// as soon as it arrives; one failing does not hold back the other.
async fn poll_cycle(shared: Arc<Shared>, generation: u64, order_id: i64, seq: u64) {
    let timeout = shared.config.request_timeout;

    let order_poll = async {
        let started = Instant::now();
        let result = with_timeout(timeout, shared.orders.get_by_id(order_id)).await;
        record(&shared, "order", outcome_label(&result), started.elapsed());
        shared.apply_order(generation, seq, result);
    };

    let delivery_poll = async {
        let started = Instant::now();
        let result = with_timeout(timeout, shared.deliveries.get_by_order_id(order_id)).await;
        let outcome = match &result {
            Ok(None) => "absent",
            other => outcome_label(other),
        };
        record(&shared, "delivery", outcome, started.elapsed());
        shared.apply_delivery(generation, seq, result);
    };

    tokio::join!(order_poll, delivery_poll);
}

async fn with_timeout<T>(
    limit: Duration,
    request: impl Future<Output = Result<T, OrderError>>,
) -> Result<T, OrderError> {
    time::timeout(limit, request).await.unwrap_or_else(|_| {
        Err(OrderError::Network(format!(
            "request timed out after {}ms",
            limit.as_millis()
        )))
    })
}

fn outcome_label<T>(result: &Result<T, OrderError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(OrderError::NotFound(_)) => "not_found",
        Err(OrderError::Network(_)) => "network_error",
        Err(_) => "error",
    }
}

fn record(shared: &Shared, entity: &str, outcome: &str, elapsed: Duration) {
    shared
        .metrics
        .polls_total
        .with_label_values(&[entity, outcome])
        .inc();
    shared
        .metrics
        .poll_latency_seconds
        .with_label_values(&[entity])
        .observe(elapsed.as_secs_f64());
}
