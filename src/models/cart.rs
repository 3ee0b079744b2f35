use serde::{Deserialize, Serialize};

/// Prices arrive from the catalog either as JSON numbers or as decimal strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PriceInput {
    Number(f64),
    Text(String),
}

impl PriceInput {
    /// A finite, non-negative price, or `None`. Never falls back to zero.
    pub fn resolve(&self) -> Option<f64> {
        let value = match self {
            PriceInput::Number(n) => *n,
            PriceInput::Text(raw) => raw.trim().trim_start_matches('$').parse::<f64>().ok()?,
        };

        (value.is_finite() && value >= 0.0).then_some(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    #[serde(alias = "id")]
    pub product_id: i64,
    #[serde(default)]
    pub name: Option<String>,
    pub quantity: u32,
    #[serde(default)]
    pub price: Option<PriceInput>,
    #[serde(default)]
    pub is_alcohol: bool,
}

impl CartLine {
    pub fn unit_price(&self) -> Option<f64> {
        self.price.as_ref().and_then(PriceInput::resolve)
    }
}
