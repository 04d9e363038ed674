//! Per-session cart: ordered items, the in-progress item builder and the
//! mutation operations that act on them.

pub mod builder;
pub mod fields;
pub mod operations;

use serde::{Deserialize, Serialize};

use crate::domain::item::{CartItem, ItemDraft};
use crate::errors::OrderError;
use crate::menu::MenuCatalog;
use crate::pricing::PricingEngine;

pub use builder::{BuilderState, ItemBuilder};
pub use operations::{BatchItem, BatchItemResult, BatchOutcome, ConvertOutcome, MealOptions};

/// Ceilings applied to cart mutations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLimits {
    pub max_quantity: u32,
    pub max_batch_size: usize,
    pub max_cart_items: usize,
}

impl Default for OrderLimits {
    fn default() -> Self {
        Self { max_quantity: 50, max_batch_size: 10, max_cart_items: 30 }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Validates a caller supplied index against the current length.
    pub fn position(&self, index: i64) -> Result<usize, OrderError> {
        usize::try_from(index)
            .ok()
            .filter(|position| *position < self.items.len())
            .ok_or(OrderError::IndexOutOfRange { index, len: self.items.len() })
    }

    pub fn get(&self, index: i64) -> Result<&CartItem, OrderError> {
        let position = self.position(index)?;
        Ok(&self.items[position])
    }

    pub(crate) fn push(&mut self, item: CartItem, limits: &OrderLimits) -> Result<usize, OrderError> {
        if self.items.len() >= limits.max_cart_items {
            return Err(OrderError::LimitExceeded {
                what: "cart items".to_string(),
                limit: limits.max_cart_items,
            });
        }
        self.items.push(item);
        Ok(self.items.len() - 1)
    }

    pub(crate) fn replace(&mut self, position: usize, item: CartItem) {
        self.items[position] = item;
    }

    pub(crate) fn remove(&mut self, position: usize) -> CartItem {
        self.items.remove(position)
    }

    pub(crate) fn clear(&mut self) -> usize {
        let removed = self.items.len();
        self.items.clear();
        removed
    }
}

/// Fields that must be present before a draft can enter the cart.
pub fn missing_fields(catalog: &MenuCatalog, draft: &ItemDraft) -> Result<Vec<String>, OrderError> {
    let category = catalog.category(&draft.category)?;
    let mut missing = Vec::new();
    if draft.size.is_none() && category.implied_size().is_none() {
        missing.push("size".to_string());
    }
    if category.requires_protein() && draft.protein.is_none() {
        missing.push("protein".to_string());
    }
    if catalog.is_drink(&draft.category) && draft.drink_brand.is_none() {
        missing.push("drink_brand".to_string());
    }
    Ok(missing)
}

/// Turns a complete draft into a priced cart item. Implied sizes and meal
/// defaults are filled in; price and name are always recomputed.
pub fn finalize_draft<P>(
    catalog: &MenuCatalog,
    pricing: &P,
    mut draft: ItemDraft,
) -> Result<CartItem, OrderError>
where
    P: PricingEngine + ?Sized,
{
    let missing = missing_fields(catalog, &draft)?;
    if !missing.is_empty() {
        let category = catalog.category(&draft.category)?;
        return Err(OrderError::IncompleteConfiguration {
            category: category.display_name.clone(),
            missing,
        });
    }

    let category = catalog.category(&draft.category)?;
    if draft.size.is_none() {
        draft.size = category.implied_size().map(str::to_string);
    }
    if draft.is_combo {
        let meal = catalog.meal_rules();
        draft.chips_size.get_or_insert_with(|| meal.default_chips_size.clone());
        draft.chips_salt.get_or_insert_with(|| meal.default_chips_salt.clone());
        draft.drink_brand.get_or_insert_with(|| meal.default_drink.clone());
    }

    let unit_price = pricing.unit_price(catalog, &draft)?;
    let total_price = pricing.price_item(catalog, &draft)?;
    let name = item_name(catalog, &draft);
    Ok(CartItem { details: draft, unit_price, total_price, name })
}

/// Human readable label, e.g. "Large Chicken Kebab Meal" or "Can of Coke".
pub fn item_name(catalog: &MenuCatalog, draft: &ItemDraft) -> String {
    let display = catalog
        .category(&draft.category)
        .map(|category| category.display_name.clone())
        .unwrap_or_else(|_| title_case(&draft.category));

    if catalog.is_drink(&draft.category) {
        let brand = draft.drink_brand.as_deref().map(title_case).unwrap_or(display);
        return match draft.size.as_deref() {
            Some(size) => format!("{} of {}", title_case(size), brand),
            None => brand,
        };
    }

    let mut words = Vec::new();
    if let Some(size) = &draft.size {
        words.push(title_case(size));
    }
    if let Some(protein) = &draft.protein {
        words.push(title_case(protein));
    }
    words.push(display);
    if draft.is_combo {
        words.push("Meal".to_string());
    }
    words.join(" ")
}

fn title_case(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
