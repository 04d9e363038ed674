use async_trait::async_trait;
use serde_json::{json, Value};

use orderline_core::domain::fields::{FieldChanges, FieldValue, ItemField};
use orderline_core::domain::item::CartItem;
use orderline_core::errors::{ApplicationError, OrderError};
use orderline_core::session::SessionKey;

use super::{to_json, Tool, ToolContext};
use crate::args::{normalize_changes, ToolArgs};

pub(crate) const DESCRIPTION_KEYS: &[&str] =
    &["description", "itemDescription", "text", "item", "order"];
const CATEGORY_KEYS: &[&str] = &["category", "itemType", "type", "item"];
const PROPERTY_KEYS: &[&str] = &["property", "field", "name"];

pub(crate) fn added_message(item: &CartItem) -> String {
    if item.quantity() > 1 {
        format!("Added {} x {} for ${}", item.quantity(), item.name, item.total_price)
    } else {
        format!("Added {} for ${}", item.name, item.total_price)
    }
}

/// Parses a spoken description and adds it to the cart in one step.
pub struct QuickAddItem;

#[async_trait]
impl Tool for QuickAddItem {
    fn name(&self) -> &'static str {
        "quickAddItem"
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        session: &SessionKey,
        args: &ToolArgs,
    ) -> Result<Value, ApplicationError> {
        let description = args.require_text(DESCRIPTION_KEYS, "description")?;
        let (added, cart_size) = ctx.session(session, |state| {
            let added = ctx.engine.quick_add(state, &description)?;
            Ok((added, state.cart.len()))
        })?;

        Ok(json!({
            "item": to_json(&added.item)?,
            "itemIndex": added.position,
            "cartSize": cart_size,
            "message": added_message(&added.item),
        }))
    }
}

pub struct StartItemConfiguration;

#[async_trait]
impl Tool for StartItemConfiguration {
    fn name(&self) -> &'static str {
        "startItemConfiguration"
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        session: &SessionKey,
        args: &ToolArgs,
    ) -> Result<Value, ApplicationError> {
        let category = args.require_text(CATEGORY_KEYS, "category")?;
        let (draft, missing) = ctx.session(session, |state| {
            let draft = ctx.engine.start_configuration(state, &category)?;
            let missing = ctx.engine.missing_fields(state)?;
            Ok((draft, missing))
        })?;

        Ok(json!({
            "state": "configuring",
            "draft": to_json(&draft)?,
            "missing": missing,
        }))
    }
}

/// Sets one property (`{property, value}`) or several (`{size: .., protein: ..}`)
/// on the item being configured. Either every property is applied or none.
pub struct SetItemProperty;

impl SetItemProperty {
    fn changes(args: &ToolArgs) -> Result<FieldChanges, OrderError> {
        match args.text(PROPERTY_KEYS) {
            Some(property) => {
                let field: ItemField = property.parse()?;
                let value = args.get(&["value"]).map(FieldValue::from_json).unwrap_or(FieldValue::Null);
                Ok(FieldChanges::new().with(field, value))
            }
            None => normalize_changes(&Value::Object(args.as_map().clone())),
        }
    }
}

#[async_trait]
impl Tool for SetItemProperty {
    fn name(&self) -> &'static str {
        "setItemProperty"
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        session: &SessionKey,
        args: &ToolArgs,
    ) -> Result<Value, ApplicationError> {
        let changes = Self::changes(args)?;
        let (draft, missing) = ctx.session(session, |state| {
            let mut draft = None;
            for (field, value) in changes.iter() {
                draft = Some(ctx.engine.set_property(state, *field, value)?);
            }
            let missing = ctx.engine.missing_fields(state)?;
            Ok((draft, missing))
        })?;

        Ok(json!({
            "draft": to_json(&draft)?,
            "missing": missing,
            "readyToAdd": missing.is_empty(),
        }))
    }
}

pub struct AddItemToCart;

#[async_trait]
impl Tool for AddItemToCart {
    fn name(&self) -> &'static str {
        "addItemToCart"
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        session: &SessionKey,
        _args: &ToolArgs,
    ) -> Result<Value, ApplicationError> {
        let (added, cart_size) = ctx.session(session, |state| {
            let added = ctx.engine.add_to_cart(state)?;
            Ok((added, state.cart.len()))
        })?;

        Ok(json!({
            "item": to_json(&added.item)?,
            "itemIndex": added.position,
            "cartSize": cart_size,
            "message": added_message(&added.item),
        }))
    }
}

pub struct CancelItemConfiguration;

#[async_trait]
impl Tool for CancelItemConfiguration {
    fn name(&self) -> &'static str {
        "cancelItemConfiguration"
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        session: &SessionKey,
        _args: &ToolArgs,
    ) -> Result<Value, ApplicationError> {
        let dropped = ctx.session(session, |state| Ok(ctx.engine.cancel_configuration(state)))?;
        Ok(json!({
            "cancelled": dropped.is_some(),
            "draft": to_json(&dropped)?,
        }))
    }
}
