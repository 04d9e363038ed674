//! Index-addressed cart mutations. Each operation validates fully against a
//! working copy before the cart is touched.

use serde::Serialize;
use tracing::{debug, info};

use crate::cart::fields::apply_changes;
use crate::cart::{finalize_draft, Cart, OrderLimits};
use crate::domain::fields::{FieldChanges, FieldValue, ItemField};
use crate::domain::item::{CartItem, ItemDraft};
use crate::errors::OrderError;
use crate::menu::{ComboMatch, MenuCatalog};
use crate::parser::TextParser;
use crate::pricing::PricingEngine;

pub fn edit_item<P>(
    catalog: &MenuCatalog,
    pricing: &P,
    limits: &OrderLimits,
    cart: &mut Cart,
    index: i64,
    changes: &FieldChanges,
) -> Result<CartItem, OrderError>
where
    P: PricingEngine + ?Sized,
{
    let position = cart.position(index)?;
    if changes.is_empty() {
        return Err(OrderError::invalid_value("updates", "no changes were given"));
    }

    let current = &cart.items()[position];
    let draft = apply_changes(catalog, limits, &current.details, changes)?;
    let updated = finalize_draft(catalog, pricing, draft)?;
    cart.replace(position, updated.clone());

    info!(
        event_name = "order.cart.item_edited",
        index = position,
        fields = changes.len(),
        unit_price = %updated.unit_price,
        "cart item edited"
    );
    Ok(updated)
}

pub fn remove_item(cart: &mut Cart, index: i64) -> Result<CartItem, OrderError> {
    let position = cart.position(index)?;
    let removed = cart.remove(position);
    info!(event_name = "order.cart.item_removed", index = position, name = %removed.name, "cart item removed");
    Ok(removed)
}

pub fn clear_cart(cart: &mut Cart) -> usize {
    let removed = cart.clear();
    info!(event_name = "order.cart.cleared", removed, "cart cleared");
    removed
}

/// Meal choices for [`convert_to_meal`]. Unset choices keep whatever the item
/// already has, falling back to the menu defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MealOptions {
    pub indices: Option<Vec<i64>>,
    pub drink_brand: Option<String>,
    pub chips_size: Option<String>,
    pub chips_salt: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConvertOutcome {
    pub converted: Vec<usize>,
    /// Requested positions that cannot be meals, e.g. drinks.
    pub skipped: Vec<usize>,
}

pub fn convert_to_meal<P>(
    catalog: &MenuCatalog,
    pricing: &P,
    limits: &OrderLimits,
    cart: &mut Cart,
    options: &MealOptions,
) -> Result<ConvertOutcome, OrderError>
where
    P: PricingEngine + ?Sized,
{
    if cart.is_empty() {
        return Err(OrderError::EmptyCart);
    }

    let targets: Vec<usize> = match &options.indices {
        Some(indices) if !indices.is_empty() => {
            let mut positions = Vec::with_capacity(indices.len());
            for index in indices {
                let position = cart.position(*index)?;
                if !positions.contains(&position) {
                    positions.push(position);
                }
            }
            positions
        }
        _ => (0..cart.len()).collect(),
    };

    let (eligible, skipped): (Vec<usize>, Vec<usize>) = targets
        .into_iter()
        .partition(|position| catalog.is_meal_eligible(cart.items()[*position].category()));
    if eligible.is_empty() {
        return Err(OrderError::NoEligibleItems);
    }

    let mut changes = FieldChanges::new().with(ItemField::IsCombo, FieldValue::Flag(true));
    if let Some(drink) = &options.drink_brand {
        changes.insert(ItemField::DrinkBrand, FieldValue::text(drink.as_str()));
    }
    if let Some(size) = &options.chips_size {
        changes.insert(ItemField::ChipsSize, FieldValue::text(size.as_str()));
    }
    if let Some(salt) = &options.chips_salt {
        changes.insert(ItemField::ChipsSalt, FieldValue::text(salt.as_str()));
    }

    let mut converted_items = Vec::with_capacity(eligible.len());
    for position in &eligible {
        let draft = apply_changes(catalog, limits, &cart.items()[*position].details, &changes)?;
        converted_items.push((*position, finalize_draft(catalog, pricing, draft)?));
    }
    for (position, item) in converted_items {
        cart.replace(position, item);
    }

    info!(
        event_name = "order.cart.converted_to_meal",
        converted = eligible.len(),
        skipped = skipped.len(),
        "items converted to meals"
    );
    Ok(ConvertOutcome { converted: eligible, skipped })
}

/// One entry of a batch add: free text for the parser, or a category with
/// explicit properties.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchItem {
    Description(String),
    Structured { category: String, changes: FieldChanges },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BatchItemResult {
    pub position: usize,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<CartItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub results: Vec<BatchItemResult>,
    pub added: usize,
    pub failed: usize,
    /// Standalone main + side + drink groups present after the batch.
    pub combos: Vec<ComboMatch>,
}

/// Adds several items. An oversized batch is rejected outright; otherwise
/// each entry succeeds or fails on its own and earlier successes stay.
pub fn add_multiple_items<P>(
    parser: &TextParser,
    pricing: &P,
    limits: &OrderLimits,
    cart: &mut Cart,
    items: &[BatchItem],
) -> Result<BatchOutcome, OrderError>
where
    P: PricingEngine + ?Sized,
{
    if items.is_empty() {
        return Err(OrderError::invalid_value("items", "no items were given"));
    }
    if items.len() > limits.max_batch_size {
        return Err(OrderError::LimitExceeded {
            what: "batch size".to_string(),
            limit: limits.max_batch_size,
        });
    }

    let catalog = parser.catalog();
    let mut results = Vec::with_capacity(items.len());
    for (position, entry) in items.iter().enumerate() {
        let outcome = build_batch_item(parser, pricing, limits, entry)
            .and_then(|item| cart.push(item.clone(), limits).map(|_| item));
        match outcome {
            Ok(item) => results.push(BatchItemResult { position, ok: true, item: Some(item), error: None }),
            Err(error) => {
                debug!(event_name = "order.cart.batch_item_rejected", position, error = %error, "batch entry rejected");
                results.push(BatchItemResult {
                    position,
                    ok: false,
                    item: None,
                    error: Some(error.user_message()),
                });
            }
        }
    }

    let added = results.iter().filter(|result| result.ok).count();
    let combos = catalog.combo_rules_for(cart.items());
    info!(
        event_name = "order.cart.batch_added",
        added,
        failed = results.len() - added,
        combos = combos.len(),
        "batch processed"
    );

    Ok(BatchOutcome { failed: results.len() - added, added, results, combos })
}

fn build_batch_item<P>(
    parser: &TextParser,
    pricing: &P,
    limits: &OrderLimits,
    entry: &BatchItem,
) -> Result<CartItem, OrderError>
where
    P: PricingEngine + ?Sized,
{
    let catalog = parser.catalog();
    let draft = match entry {
        BatchItem::Description(text) => parser.parse(text)?,
        BatchItem::Structured { category, changes } => {
            let category = catalog
                .resolve_category(category)
                .ok_or_else(|| OrderError::UnknownCategory(category.clone()))?;
            let mut base = ItemDraft::new(category.name.clone());
            base.cheese = category.default_cheese;
            apply_changes(catalog, limits, &base, changes)?
        }
    };
    finalize_draft(catalog, pricing, draft)
}
