use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

fn default_quantity() -> u32 {
    1
}

/// An item under construction. Every draft belongs to exactly one menu
/// category; the remaining fields are validated against that category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDraft {
    pub category: String,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub protein: Option<String>,
    #[serde(default)]
    pub salads: Vec<String>,
    #[serde(default)]
    pub sauces: Vec<String>,
    /// Priced add-ons other than cheese, which is tracked by `cheese`.
    #[serde(default)]
    pub extras: BTreeSet<String>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub cheese: bool,
    #[serde(default)]
    pub is_combo: bool,
    #[serde(default)]
    pub chips_size: Option<String>,
    #[serde(default)]
    pub chips_salt: Option<String>,
    #[serde(default)]
    pub drink_brand: Option<String>,
}

impl ItemDraft {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            size: None,
            protein: None,
            salads: Vec::new(),
            sauces: Vec::new(),
            extras: BTreeSet::new(),
            quantity: 1,
            cheese: false,
            is_combo: false,
            chips_size: None,
            chips_salt: None,
            drink_brand: None,
        }
    }

    /// Drops the meal-only choices when an item stops being a meal.
    pub fn clear_meal_choices(&mut self) {
        self.is_combo = false;
        self.chips_size = None;
        self.chips_salt = None;
        self.drink_brand = None;
    }
}

/// Appends `value` unless it is already present, keeping first-mention order.
pub fn push_unique(list: &mut Vec<String>, value: impl Into<String>) {
    let value = value.into();
    if !list.contains(&value) {
        list.push(value);
    }
}

/// A priced entry in the cart. `unit_price` and `total_price` are always
/// recomputed from `details` whenever the item changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    #[serde(flatten)]
    pub details: ItemDraft,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub name: String,
}

impl CartItem {
    pub fn category(&self) -> &str {
        &self.details.category
    }

    pub fn quantity(&self) -> u32 {
        self.details.quantity
    }

    pub fn is_combo(&self) -> bool {
        self.details.is_combo
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{push_unique, ItemDraft};

    #[test]
    fn push_unique_keeps_first_mention_order() {
        let mut sauces = Vec::new();
        push_unique(&mut sauces, "garlic");
        push_unique(&mut sauces, "bbq");
        push_unique(&mut sauces, "garlic");

        assert_eq!(sauces, vec!["garlic".to_string(), "bbq".to_string()]);
    }

    #[test]
    fn draft_deserializes_with_defaults() {
        let draft: ItemDraft =
            serde_json::from_value(json!({ "category": "kebab", "size": "small" }))
                .expect("draft should decode");

        assert_eq!(draft.quantity, 1);
        assert!(!draft.is_combo);
        assert!(draft.extras.is_empty());
    }
}
