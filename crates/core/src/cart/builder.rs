use serde::{Deserialize, Serialize};

use crate::cart::fields::apply_changes;
use crate::cart::{finalize_draft, missing_fields, OrderLimits};
use crate::domain::fields::{FieldChanges, FieldValue, ItemField};
use crate::domain::item::{CartItem, ItemDraft};
use crate::errors::OrderError;
use crate::menu::MenuCatalog;
use crate::pricing::PricingEngine;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuilderState {
    Empty,
    Configuring,
}

/// Stepwise construction of one cart item across several conversational
/// turns. At most one draft exists per session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemBuilder {
    draft: Option<ItemDraft>,
}

impl ItemBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> BuilderState {
        match self.draft {
            Some(_) => BuilderState::Configuring,
            None => BuilderState::Empty,
        }
    }

    pub fn draft(&self) -> Option<&ItemDraft> {
        self.draft.as_ref()
    }

    /// Starts a new draft, replacing any unfinished one.
    pub fn start(&mut self, catalog: &MenuCatalog, raw_category: &str) -> Result<&ItemDraft, OrderError> {
        let category = catalog
            .resolve_category(raw_category)
            .ok_or_else(|| OrderError::UnknownCategory(raw_category.trim().to_string()))?;

        let mut draft = ItemDraft::new(category.name.clone());
        draft.cheese = category.default_cheese;
        Ok(self.draft.insert(draft))
    }

    pub fn set_property(
        &mut self,
        catalog: &MenuCatalog,
        limits: &OrderLimits,
        field: ItemField,
        value: &FieldValue,
    ) -> Result<&ItemDraft, OrderError> {
        let current = self.draft.as_ref().ok_or(OrderError::NoActiveConfiguration)?;
        let changes = FieldChanges::new().with(field, value.clone());
        let updated = apply_changes(catalog, limits, current, &changes)?;
        Ok(self.draft.insert(updated))
    }

    /// Required fields the active draft still lacks.
    pub fn missing(&self, catalog: &MenuCatalog) -> Result<Vec<String>, OrderError> {
        let draft = self.draft.as_ref().ok_or(OrderError::NoActiveConfiguration)?;
        missing_fields(catalog, draft)
    }

    /// Prices the active draft without consuming it. The caller appends the
    /// item to the cart and then calls [`ItemBuilder::reset`].
    pub fn build<P>(&self, catalog: &MenuCatalog, pricing: &P) -> Result<CartItem, OrderError>
    where
        P: PricingEngine + ?Sized,
    {
        let draft = self.draft.as_ref().ok_or(OrderError::NoActiveConfiguration)?;
        finalize_draft(catalog, pricing, draft.clone())
    }

    pub fn reset(&mut self) -> Option<ItemDraft> {
        self.draft.take()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{BuilderState, ItemBuilder};
    use crate::cart::OrderLimits;
    use crate::domain::fields::{FieldValue, ItemField};
    use crate::errors::OrderError;
    use crate::menu::MenuCatalog;
    use crate::pricing::DeterministicPricingEngine;

    #[test]
    fn happy_path_moves_from_empty_to_configuring_and_back() {
        let catalog = MenuCatalog::reference().expect("menu");
        let limits = OrderLimits::default();
        let mut builder = ItemBuilder::new();
        assert_eq!(builder.state(), BuilderState::Empty);

        builder.start(&catalog, "Kebab").expect("known category");
        assert_eq!(builder.state(), BuilderState::Configuring);
        builder.set_property(&catalog, &limits, ItemField::Size, &FieldValue::text("large")).expect("size");
        builder.set_property(&catalog, &limits, ItemField::Protein, &FieldValue::text("lamb")).expect("protein");

        let item = builder.build(&catalog, &DeterministicPricingEngine).expect("complete");
        assert_eq!(item.unit_price, Decimal::new(1600, 2));
        builder.reset();
        assert_eq!(builder.state(), BuilderState::Empty);
    }

    #[test]
    fn unknown_category_keeps_the_builder_empty() {
        let catalog = MenuCatalog::reference().expect("menu");
        let mut builder = ItemBuilder::new();

        assert_eq!(
            builder.start(&catalog, "pizza").map(|_| ()),
            Err(OrderError::UnknownCategory("pizza".to_string()))
        );
        assert_eq!(builder.state(), BuilderState::Empty);
    }

    #[test]
    fn invalid_value_does_not_partially_update() {
        let catalog = MenuCatalog::reference().expect("menu");
        let limits = OrderLimits::default();
        let mut builder = ItemBuilder::new();
        builder.start(&catalog, "kebab").expect("known category");
        builder.set_property(&catalog, &limits, ItemField::Size, &FieldValue::text("small")).expect("size");

        let before = builder.clone();
        let result = builder.set_property(&catalog, &limits, ItemField::Size, &FieldValue::text("medium"));
        assert!(matches!(result, Err(OrderError::InvalidPropertyValue { .. })));
        assert_eq!(builder, before);
    }

    #[test]
    fn incomplete_and_absent_drafts_cannot_be_built() {
        let catalog = MenuCatalog::reference().expect("menu");
        let mut builder = ItemBuilder::new();
        assert_eq!(
            builder.build(&catalog, &DeterministicPricingEngine).map(|_| ()),
            Err(OrderError::NoActiveConfiguration)
        );

        builder.start(&catalog, "kebab").expect("known category");
        let error = builder.build(&catalog, &DeterministicPricingEngine).expect_err("incomplete");
        assert!(matches!(error, OrderError::IncompleteConfiguration { ref missing, .. } if missing.len() == 2));
        assert_eq!(builder.missing(&catalog).map(|missing| missing.len()).ok(), Some(2));
    }

    #[test]
    fn set_property_without_a_draft_is_a_state_error() {
        let catalog = MenuCatalog::reference().expect("menu");
        let mut builder = ItemBuilder::new();
        let result = builder.set_property(
            &catalog,
            &OrderLimits::default(),
            ItemField::Size,
            &FieldValue::text("small"),
        );
        assert_eq!(result.map(|_| ()), Err(OrderError::NoActiveConfiguration));
    }
}
