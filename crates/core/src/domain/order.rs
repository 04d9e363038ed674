use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::item::CartItem;
use crate::pricing::CartPricing;
use crate::session::SessionKey;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Short reference that is easy to read out over the phone.
    pub fn reference(&self) -> String {
        self.0.chars().filter(|ch| ch.is_ascii_alphanumeric()).take(6).collect::<String>().to_uppercase()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub item: CartItem,
    pub line_total: Decimal,
}

/// A finalized cart snapshot handed to the persistence collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub caller_phone: String,
    pub customer_name: String,
    pub notes: Option<String>,
    pub lines: Vec<OrderLine>,
    pub subtotal: Decimal,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn from_cart(
        id: OrderId,
        caller: &SessionKey,
        customer_name: impl Into<String>,
        notes: Option<String>,
        items: &[CartItem],
        pricing: &CartPricing,
        created_at: DateTime<Utc>,
    ) -> Self {
        let lines = items
            .iter()
            .zip(pricing.line_items.iter())
            .map(|(item, line)| OrderLine { item: item.clone(), line_total: line.line_total })
            .collect();

        Self {
            id,
            caller_phone: caller.as_str().to_string(),
            customer_name: customer_name.into(),
            notes,
            lines,
            subtotal: pricing.subtotal,
            total: pricing.total,
            created_at,
        }
    }

    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|line| line.item.quantity()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::OrderId;

    #[test]
    fn reference_is_six_uppercase_characters() {
        let id = OrderId("3f2a9c1e-0000-4000-8000-000000000000".to_string());
        assert_eq!(id.reference(), "3F2A9C");
    }
}
