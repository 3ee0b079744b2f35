use serde::Serialize;

use crate::checkout::resolve_lines;
use crate::error::ValidationError;
use crate::models::cart::CartLine;

const TAX_RATE: f64 = 0.08;
const DELIVERY_FEE: f64 = 2.99;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OrderSummary {
    pub subtotal: f64,
    pub tax: f64,
    pub delivery_fee: f64,
    pub total: f64,
}

/// Client-side totals shown before the order is placed. The backend's
/// `totalAmount` on the created order is authoritative.
pub fn summarize(lines: &[CartLine]) -> Result<OrderSummary, ValidationError> {
    let items = resolve_lines(lines)?;

    let subtotal = items
        .iter()
        .map(|item| item.unit_price * f64::from(item.quantity))
        .sum::<f64>();

    Ok(summary_from_subtotal(subtotal))
}

fn summary_from_subtotal(subtotal: f64) -> OrderSummary {
    let subtotal = round_cents(subtotal);
    let tax = round_cents(subtotal * TAX_RATE);

    OrderSummary {
        subtotal,
        tax,
        delivery_fee: DELIVERY_FEE,
        total: round_cents(subtotal + tax + DELIVERY_FEE),
    }
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
