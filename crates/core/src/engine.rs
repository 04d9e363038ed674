use std::sync::Arc;

use tracing::info;

use crate::cart::operations::{self, BatchItem, BatchOutcome, ConvertOutcome, MealOptions};
use crate::cart::OrderLimits;
use crate::domain::fields::{FieldChanges, FieldValue, ItemField};
use crate::domain::item::{CartItem, ItemDraft};
use crate::errors::OrderError;
use crate::menu::MenuCatalog;
use crate::parser::TextParser;
use crate::pricing::{CartPricing, DeterministicPricingEngine, PricingEngine};
use crate::session::OrderSession;

/// Outcome of adding the builder's draft to the cart.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddedItem {
    pub position: usize,
    pub item: CartItem,
}

/// Order-construction operations over a caller's [`OrderSession`]. Every
/// operation is synchronous and either fully applies or returns an error.
pub struct OrderEngine<P = DeterministicPricingEngine> {
    catalog: Arc<MenuCatalog>,
    parser: TextParser,
    pricing: P,
    limits: OrderLimits,
}

impl OrderEngine<DeterministicPricingEngine> {
    pub fn new(catalog: Arc<MenuCatalog>, limits: OrderLimits) -> Self {
        Self::with_pricing(catalog, limits, DeterministicPricingEngine)
    }
}

impl<P> OrderEngine<P>
where
    P: PricingEngine,
{
    pub fn with_pricing(catalog: Arc<MenuCatalog>, limits: OrderLimits, pricing: P) -> Self {
        let parser = TextParser::new(catalog.clone(), limits.max_quantity);
        Self { catalog, parser, pricing, limits }
    }

    pub fn catalog(&self) -> &MenuCatalog {
        &self.catalog
    }

    pub fn limits(&self) -> &OrderLimits {
        &self.limits
    }

    pub fn parse(&self, text: &str) -> Result<ItemDraft, OrderError> {
        self.parser.parse(text)
    }

    /// Parses a description and adds it straight to the cart.
    pub fn quick_add(&self, session: &mut OrderSession, text: &str) -> Result<AddedItem, OrderError> {
        let draft = self.parser.parse(text)?;
        let item = crate::cart::finalize_draft(&self.catalog, &self.pricing, draft)?;
        let position = session.cart.push(item.clone(), &self.limits)?;
        info!(
            event_name = "order.cart.item_added",
            position,
            name = %item.name,
            unit_price = %item.unit_price,
            "item added from description"
        );
        Ok(AddedItem { position, item })
    }

    pub fn start_configuration(&self, session: &mut OrderSession, category: &str) -> Result<ItemDraft, OrderError> {
        let draft = session.builder.start(&self.catalog, category)?.clone();
        info!(event_name = "order.builder.started", category = %draft.category, "item configuration started");
        Ok(draft)
    }

    pub fn set_property(
        &self,
        session: &mut OrderSession,
        field: ItemField,
        value: &FieldValue,
    ) -> Result<ItemDraft, OrderError> {
        Ok(session.builder.set_property(&self.catalog, &self.limits, field, value)?.clone())
    }

    pub fn missing_fields(&self, session: &OrderSession) -> Result<Vec<String>, OrderError> {
        session.builder.missing(&self.catalog)
    }

    pub fn add_to_cart(&self, session: &mut OrderSession) -> Result<AddedItem, OrderError> {
        let item = session.builder.build(&self.catalog, &self.pricing)?;
        let position = session.cart.push(item.clone(), &self.limits)?;
        session.builder.reset();
        info!(
            event_name = "order.cart.item_added",
            position,
            name = %item.name,
            unit_price = %item.unit_price,
            "configured item added"
        );
        Ok(AddedItem { position, item })
    }

    /// Drops the draft in progress, if any.
    pub fn cancel_configuration(&self, session: &mut OrderSession) -> Option<ItemDraft> {
        session.builder.reset()
    }

    pub fn edit_item(
        &self,
        session: &mut OrderSession,
        index: i64,
        changes: &FieldChanges,
    ) -> Result<CartItem, OrderError> {
        operations::edit_item(&self.catalog, &self.pricing, &self.limits, &mut session.cart, index, changes)
    }

    pub fn remove_item(&self, session: &mut OrderSession, index: i64) -> Result<CartItem, OrderError> {
        operations::remove_item(&mut session.cart, index)
    }

    pub fn clear_cart(&self, session: &mut OrderSession) -> usize {
        session.last_quote = None;
        operations::clear_cart(&mut session.cart)
    }

    pub fn convert_to_meal(
        &self,
        session: &mut OrderSession,
        options: &MealOptions,
    ) -> Result<ConvertOutcome, OrderError> {
        operations::convert_to_meal(&self.catalog, &self.pricing, &self.limits, &mut session.cart, options)
    }

    pub fn add_multiple_items(
        &self,
        session: &mut OrderSession,
        items: &[BatchItem],
    ) -> Result<BatchOutcome, OrderError> {
        operations::add_multiple_items(&self.parser, &self.pricing, &self.limits, &mut session.cart, items)
    }

    /// Prices the cart and remembers the quote on the session.
    pub fn price_cart(&self, session: &mut OrderSession) -> Result<CartPricing, OrderError> {
        let pricing = self.pricing.price_cart(&self.catalog, session.cart.items())?;
        session.last_quote = Some(pricing.clone());
        Ok(pricing)
    }

    pub fn quote(&self, items: &[CartItem]) -> Result<CartPricing, OrderError> {
        self.pricing.price_cart(&self.catalog, items)
    }
}
