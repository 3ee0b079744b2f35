use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveryAddress {
    #[serde(default)]
    pub line1: String,
    #[serde(default)]
    pub line2: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip: String,
}

impl DeliveryAddress {
    /// First required component that is blank.
    pub fn missing_component(&self) -> Option<&'static str> {
        [
            (&self.line1, "street line"),
            (&self.city, "city"),
            (&self.state, "state"),
            (&self.zip, "postal code"),
        ]
        .into_iter()
        .find(|(value, _)| value.trim().is_empty())
        .map(|(_, name)| name)
    }

    pub fn format(&self) -> String {
        [&self.line1, &self.line2, &self.city, &self.state, &self.zip]
            .into_iter()
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Locally stored payment stub. Checked for presence, never sent to the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    #[serde(default)]
    pub card_name: String,
    #[serde(default)]
    pub card_number: String,
    #[serde(default)]
    pub exp: String,
    #[serde(default)]
    pub cvc: String,
}

impl PaymentDetails {
    pub fn missing_component(&self) -> Option<&'static str> {
        [
            (&self.card_number, "card number"),
            (&self.exp, "expiry"),
            (&self.cvc, "cvc"),
        ]
        .into_iter()
        .find(|(value, _)| value.trim().is_empty())
        .map(|(_, name)| name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerIdentity {
    pub id: Option<i64>,
    pub age_verified: bool,
}
