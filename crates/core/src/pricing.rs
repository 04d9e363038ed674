use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::item::{CartItem, ItemDraft};
use crate::errors::OrderError;
use crate::menu::MenuCatalog;

/// Rounds to cents, half away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub index: usize,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    /// Quantity times unit price, less any combo discount folded into this line.
    pub line_total: Decimal,
    pub combo_discount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedCombo {
    pub rule: String,
    pub main_index: usize,
    pub side_index: usize,
    pub drink_index: usize,
    pub discount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartPricing {
    pub line_items: Vec<PricedLine>,
    pub combos: Vec<AppliedCombo>,
    /// Sum of line prices before combo discounts.
    pub subtotal: Decimal,
    pub total: Decimal,
}

impl CartPricing {
    /// Combo savings already folded into the line totals.
    pub fn discount_total(&self) -> Decimal {
        self.line_items.iter().map(|line| line.combo_discount).sum()
    }
}

pub trait PricingEngine: Send + Sync {
    /// Price of a single unit of the item.
    fn unit_price(&self, catalog: &MenuCatalog, item: &ItemDraft) -> Result<Decimal, OrderError>;

    fn price_item(&self, catalog: &MenuCatalog, item: &ItemDraft) -> Result<Decimal, OrderError> {
        Ok(round_money(self.unit_price(catalog, item)? * Decimal::from(item.quantity)))
    }

    fn price_cart(&self, catalog: &MenuCatalog, items: &[CartItem]) -> Result<CartPricing, OrderError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DeterministicPricingEngine;

impl PricingEngine for DeterministicPricingEngine {
    fn unit_price(&self, catalog: &MenuCatalog, item: &ItemDraft) -> Result<Decimal, OrderError> {
        let category = catalog.category(&item.category)?;
        let size = item
            .size
            .as_deref()
            .or_else(|| category.implied_size())
            .ok_or_else(|| OrderError::IncompleteConfiguration {
                category: category.display_name.clone(),
                missing: vec!["size".to_string()],
            })?;

        let mut price = if item.is_combo {
            let chips_size =
                item.chips_size.as_deref().unwrap_or(catalog.meal_rules().default_chips_size.as_str());
            catalog.meal_price(&item.category, size)? + catalog.chips_upgrade(chips_size)?
        } else {
            catalog.base_price(&item.category, size)?
        };

        for extra in &item.extras {
            price += catalog.addon_delta(&item.category, extra)?;
        }
        if item.cheese && !category.default_cheese {
            price += catalog.addon_delta(&item.category, "cheese")?;
        }

        Ok(round_money(price))
    }

    fn price_cart(&self, catalog: &MenuCatalog, items: &[CartItem]) -> Result<CartPricing, OrderError> {
        if items.is_empty() {
            return Err(OrderError::EmptyCart);
        }

        let mut line_items = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let unit_price = self.unit_price(catalog, &item.details)?;
            let line_total = round_money(unit_price * Decimal::from(item.quantity()));
            line_items.push(PricedLine {
                index,
                name: item.name.clone(),
                quantity: item.quantity(),
                unit_price,
                line_total,
                combo_discount: Decimal::ZERO,
            });
        }
        let subtotal: Decimal = line_items.iter().map(|line| line.line_total).sum();

        let mut combos = Vec::new();
        for found in catalog.combo_rules_for(items) {
            let discount = combo_discount(
                catalog,
                &items[found.main_index],
                &items[found.side_index],
                &items[found.drink_index],
            )?;
            if discount <= Decimal::ZERO {
                continue;
            }
            let line = &mut line_items[found.main_index];
            line.combo_discount += discount;
            line.line_total -= discount;
            combos.push(AppliedCombo {
                rule: found.rule,
                main_index: found.main_index,
                side_index: found.side_index,
                drink_index: found.drink_index,
                discount,
            });
        }

        let total = round_money(line_items.iter().map(|line| line.line_total).sum());
        Ok(CartPricing { line_items, combos, subtotal: round_money(subtotal), total })
    }
}

/// Saving from pricing a standalone main, side and drink as one meal. Only
/// the size prices take part, so add-ons keep their own charge.
fn combo_discount(
    catalog: &MenuCatalog,
    main: &CartItem,
    side: &CartItem,
    drink: &CartItem,
) -> Result<Decimal, OrderError> {
    let size_of = |item: &CartItem| -> Result<String, OrderError> {
        let category = catalog.category(item.category())?;
        item.details
            .size
            .clone()
            .or_else(|| category.implied_size().map(str::to_string))
            .ok_or_else(|| OrderError::Internal(format!("cart item `{}` has no size", item.name)))
    };

    let main_size = size_of(main)?;
    let side_size = size_of(side)?;
    let drink_size = size_of(drink)?;

    let Ok(upgrade) = catalog.chips_upgrade(&side_size) else {
        return Ok(Decimal::ZERO);
    };
    let standalone = catalog.base_price(main.category(), &main_size)?
        + catalog.base_price(side.category(), &side_size)?
        + catalog.base_price(drink.category(), &drink_size)?;
    let as_meal = catalog.meal_price(main.category(), &main_size)? + upgrade;

    Ok(round_money(standalone - as_meal))
}
