use async_trait::async_trait;
use serde_json::{json, Value};

use orderline_core::cart::{BatchItem, MealOptions};
use orderline_core::domain::fields::FieldChanges;
use orderline_core::errors::{ApplicationError, OrderError};
use orderline_core::session::SessionKey;

use super::builder::DESCRIPTION_KEYS;
use super::{cart_lines, priced_cart_lines, to_json, Tool, ToolContext};
use crate::args::{normalize_changes, ToolArgs};

const INDEX_KEYS: &[&str] = &["index", "itemIndex", "item_index", "position"];
const CHANGE_KEYS: &[&str] = &["changes", "updates", "fields", "properties", "modifications"];

pub struct EditCartItem;

impl EditCartItem {
    /// Changes come from a dedicated payload key when present, otherwise
    /// every argument other than the index is treated as a property.
    fn changes(args: &ToolArgs) -> Result<FieldChanges, OrderError> {
        match args.get(CHANGE_KEYS) {
            Some(payload) => normalize_changes(payload),
            None => normalize_changes(&Value::Object(args.without(INDEX_KEYS))),
        }
    }
}

#[async_trait]
impl Tool for EditCartItem {
    fn name(&self) -> &'static str {
        "editCartItem"
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        session: &SessionKey,
        args: &ToolArgs,
    ) -> Result<Value, ApplicationError> {
        let index = args.index(INDEX_KEYS)?;
        let changes = Self::changes(args)?;
        let updated = ctx.session(session, |state| ctx.engine.edit_item(state, index, &changes))?;

        Ok(json!({
            "itemIndex": index,
            "updatedItem": to_json(&updated)?,
            "message": format!("Updated to {} (${})", updated.name, updated.total_price),
        }))
    }
}

pub struct RemoveCartItem;

#[async_trait]
impl Tool for RemoveCartItem {
    fn name(&self) -> &'static str {
        "removeCartItem"
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        session: &SessionKey,
        args: &ToolArgs,
    ) -> Result<Value, ApplicationError> {
        let index = args.index(INDEX_KEYS)?;
        let (removed, remaining) = ctx.session(session, |state| {
            if state.cart.is_empty() {
                return Err(OrderError::EmptyCart);
            }
            let removed = ctx.engine.remove_item(state, index)?;
            Ok((removed, state.cart.len()))
        })?;

        Ok(json!({
            "removedItem": to_json(&removed)?,
            "cartSize": remaining,
            "message": format!("Removed {}", removed.name),
        }))
    }
}

pub struct ClearCart;

#[async_trait]
impl Tool for ClearCart {
    fn name(&self) -> &'static str {
        "clearCart"
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        session: &SessionKey,
        _args: &ToolArgs,
    ) -> Result<Value, ApplicationError> {
        let removed = ctx.session(session, |state| Ok(ctx.engine.clear_cart(state)))?;
        Ok(json!({ "removedCount": removed }))
    }
}

pub struct ConvertItemsToMeals;

#[async_trait]
impl Tool for ConvertItemsToMeals {
    fn name(&self) -> &'static str {
        "convertItemsToMeals"
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        session: &SessionKey,
        args: &ToolArgs,
    ) -> Result<Value, ApplicationError> {
        let options = MealOptions {
            indices: args.indices(&["indices", "itemIndices", "item_indices", "index", "itemIndex"])?,
            drink_brand: args.text(&["drinkBrand", "drink_brand", "drink"]),
            chips_size: args.text(&["chipsSize", "chips_size"]),
            chips_salt: args.text(&["chipsSalt", "chips_salt", "salt"]),
        };

        let (outcome, items) = ctx.session(session, |state| {
            let outcome = ctx.engine.convert_to_meal(state, &options)?;
            Ok((outcome, state.cart.items().to_vec()))
        })?;

        let converted: Vec<Value> = outcome
            .converted
            .iter()
            .filter_map(|position| items.get(*position))
            .map(to_json)
            .collect::<Result<_, _>>()?;

        Ok(json!({
            "converted": outcome.converted,
            "skipped": outcome.skipped,
            "items": converted,
            "cart": to_json(&cart_lines(&items))?,
        }))
    }
}

pub struct AddMultipleItems;

impl AddMultipleItems {
    fn entries(args: &ToolArgs) -> Result<Vec<BatchItem>, OrderError> {
        let raw = args
            .get(&["items", "orders", "descriptions"])
            .ok_or_else(|| OrderError::invalid_value("items", "a list of items is required"))?;
        let decoded;
        let list = match raw {
            Value::Array(list) => list,
            Value::String(encoded) => {
                decoded = serde_json::from_str::<Value>(encoded).map_err(|_| {
                    OrderError::invalid_value("items", "expected a list of items")
                })?;
                decoded
                    .as_array()
                    .ok_or_else(|| OrderError::invalid_value("items", "expected a list of items"))?
            }
            _ => return Err(OrderError::invalid_value("items", "expected a list of items")),
        };

        list.iter().map(batch_entry).collect()
    }
}

fn batch_entry(entry: &Value) -> Result<BatchItem, OrderError> {
    match entry {
        Value::String(text) => Ok(BatchItem::Description(text.clone())),
        Value::Object(_) => {
            let fields = ToolArgs::from_value(entry)?;
            if let Some(text) = fields.text(DESCRIPTION_KEYS) {
                return Ok(BatchItem::Description(text));
            }
            let category = fields.require_text(&["category", "itemType", "type"], "category")?;
            let rest = fields.without(&["category", "itemType", "type"]);
            let changes =
                if rest.is_empty() { FieldChanges::new() } else { normalize_changes(&Value::Object(rest))? };
            Ok(BatchItem::Structured { category, changes })
        }
        _ => Err(OrderError::invalid_value("items", "each item must be a description or an object")),
    }
}

#[async_trait]
impl Tool for AddMultipleItems {
    fn name(&self) -> &'static str {
        "addMultipleItems"
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        session: &SessionKey,
        args: &ToolArgs,
    ) -> Result<Value, ApplicationError> {
        let entries = Self::entries(args)?;
        let (outcome, cart_size) = ctx.session(session, |state| {
            let outcome = ctx.engine.add_multiple_items(state, &entries)?;
            Ok((outcome, state.cart.len()))
        })?;

        Ok(json!({
            "results": to_json(&outcome.results)?,
            "added": outcome.added,
            "failed": outcome.failed,
            "combos": to_json(&outcome.combos)?,
            "cartSize": cart_size,
            "message": format!("Added {} of {} items", outcome.added, outcome.results.len()),
        }))
    }
}

pub struct PriceCart;

#[async_trait]
impl Tool for PriceCart {
    fn name(&self) -> &'static str {
        "priceCart"
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        session: &SessionKey,
        _args: &ToolArgs,
    ) -> Result<Value, ApplicationError> {
        let pricing = ctx.session(session, |state| ctx.engine.price_cart(state))?;

        Ok(json!({
            "lineItems": to_json(&pricing.line_items)?,
            "combos": to_json(&pricing.combos)?,
            "subtotal": pricing.subtotal,
            "total": pricing.total,
            "message": format!("Your total is ${}", pricing.total),
        }))
    }
}

/// Read-only view of the cart and any item being configured.
pub struct GetCartState;

#[async_trait]
impl Tool for GetCartState {
    fn name(&self) -> &'static str {
        "getCartState"
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        session: &SessionKey,
        _args: &ToolArgs,
    ) -> Result<Value, ApplicationError> {
        let snapshot = ctx.session(session, |state| Ok(state.clone()))?;
        let items = snapshot.cart.items();
        let pricing = if items.is_empty() { None } else { Some(ctx.engine.quote(items)?) };
        let missing = match snapshot.builder.draft() {
            Some(_) => ctx.engine.missing_fields(&snapshot)?,
            None => Vec::new(),
        };

        Ok(json!({
            "items": match &pricing {
                Some(pricing) => to_json(&priced_cart_lines(items, pricing))?,
                None => to_json(&cart_lines(items))?,
            },
            "itemCount": items.len(),
            "total": pricing.as_ref().map(|pricing| pricing.total),
            "builderState": to_json(&snapshot.builder.state())?,
            "draft": to_json(&snapshot.builder.draft())?,
            "missing": missing,
        }))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use orderline_core::errors::ErrorKind;

    use crate::tools::test_support::Harness;

    async fn harness_with(descriptions: &[&str]) -> Harness {
        let harness = Harness::new();
        for description in descriptions {
            let result = harness.call("quickAddItem", json!({ "description": description })).await;
            assert!(result.ok, "{description}: {:?}", result.error);
        }
        harness
    }

    #[tokio::test]
    async fn edit_accepts_every_payload_shape() {
        let harness = harness_with(&["small lamb kebab"]).await;

        let flat = harness.call("editCartItem", json!({ "index": 0, "size": "large" })).await;
        assert_eq!(flat.data["updatedItem"]["size"], json!("large"));

        let pairs = harness
            .call(
                "editCartItem",
                json!({ "itemIndex": "0", "changes": [{ "property": "protein", "value": "chicken" }] }),
            )
            .await;
        assert_eq!(pairs.data["updatedItem"]["protein"], json!("chicken"));

        let encoded = harness
            .call("editCartItem", json!({ "index": 0, "updates": "{\"quantity\": 2}" }))
            .await;
        assert_eq!(encoded.data["updatedItem"]["quantity"], json!(2));
        assert_eq!(encoded.data["updatedItem"]["total_price"], json!("32.00"));
    }

    #[tokio::test]
    async fn edit_and_remove_reject_bad_indices() {
        let harness = harness_with(&["large chips"]).await;

        let edit = harness.call("editCartItem", json!({ "index": 3, "size": "small" })).await;
        assert_eq!(edit.error_kind, Some(ErrorKind::NotFound));

        let negative = harness.call("removeCartItem", json!({ "index": -1 })).await;
        assert_eq!(negative.error_kind, Some(ErrorKind::NotFound));

        harness.call("clearCart", json!({})).await;
        let empty = harness.call("removeCartItem", json!({ "index": 0 })).await;
        assert_eq!(empty.error_kind, Some(ErrorKind::State));
    }

    #[tokio::test]
    async fn meal_conversion_and_chips_upgrade_follow_menu_prices() {
        let harness = harness_with(&["small chicken kebab", "can of coke"]).await;

        let converted = harness.call("convertItemsToMeals", json!({})).await;
        assert!(converted.ok, "{:?}", converted.error);
        assert_eq!(converted.data["converted"], json!([0]));
        assert_eq!(converted.data["items"][0]["unit_price"], json!("17.00"));

        let upgraded = harness.call("editCartItem", json!({ "index": 0, "chipsSize": "large" })).await;
        assert_eq!(upgraded.data["updatedItem"]["unit_price"], json!("20.00"));

        let again = harness
            .call("convertItemsToMeals", json!({ "indices": [0], "chipsSize": "large" }))
            .await;
        assert_eq!(again.data["items"][0]["unit_price"], json!("20.00"));
    }

    #[tokio::test]
    async fn meal_conversion_needs_an_eligible_item() {
        let harness = Harness::new();
        let empty = harness.call("convertItemsToMeals", json!({})).await;
        assert_eq!(empty.error_kind, Some(ErrorKind::State));

        let harness = harness_with(&["large chips"]).await;
        let none = harness.call("convertItemsToMeals", json!({})).await;
        assert_eq!(none.error_kind, Some(ErrorKind::Validation));
    }

    #[tokio::test]
    async fn oversized_batches_add_nothing() {
        let harness = Harness::new();
        let items: Vec<String> = (0..20).map(|_| "small chips".to_string()).collect();

        let result = harness.call("addMultipleItems", json!({ "items": items })).await;

        assert_eq!(result.error_kind, Some(ErrorKind::LimitExceeded));
        let state = harness.call("getCartState", json!({})).await;
        assert_eq!(state.data["itemCount"], json!(0));
    }

    #[tokio::test]
    async fn batches_report_each_item_and_detect_combos() {
        let harness = Harness::new();

        let result = harness
            .call(
                "addMultipleItems",
                json!({ "items": [
                    "large chicken kebab",
                    { "category": "chips", "size": "large" },
                    "a pizza",
                    { "description": "can of sprite" },
                ] }),
            )
            .await;

        assert!(result.ok, "{:?}", result.error);
        assert_eq!(result.data["added"], json!(3));
        assert_eq!(result.data["failed"], json!(1));
        assert_eq!(result.data["results"][2]["ok"], json!(false));
        assert_eq!(result.data["combos"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn price_cart_total_matches_line_items() {
        let harness =
            harness_with(&["large chicken kebab", "large chips", "can of sprite", "small hsp with lamb"]).await;

        let priced = harness.call("priceCart", json!({})).await;
        assert_eq!(priced.data["total"], json!("40.00"));

        let again = harness.call("priceCart", json!({})).await;
        assert_eq!(again.data["total"], priced.data["total"]);

        let state = harness.call("getCartState", json!({})).await;
        assert_eq!(state.data["total"], json!("40.00"));
        assert_eq!(state.data["items"][3]["index"], json!(3));
    }

    #[tokio::test]
    async fn combo_savings_show_up_in_the_item_lines() {
        let harness = harness_with(&["small lamb kebab", "small chips", "can of coke"]).await;

        let priced = harness.call("priceCart", json!({})).await;
        assert_eq!(priced.data["total"], json!("17.00"));
        assert!(priced.data.get("discount").is_none());
        assert_eq!(priced.data["lineItems"][0]["combo_discount"], json!("3.50"));

        let state = harness.call("getCartState", json!({})).await;
        let lines = state.data["items"].as_array().cloned().unwrap_or_default();
        let line_totals: Vec<&str> = lines.iter().filter_map(|line| line["line_total"].as_str()).collect();
        assert_eq!(line_totals, ["8.50", "5.00", "3.50"]);
        assert_eq!(lines[0]["combo_discount"], json!("3.50"));
        assert_eq!(state.data["total"], json!("17.00"));
    }

    #[tokio::test]
    async fn pricing_an_empty_cart_is_a_state_error() {
        let harness = Harness::new();
        let priced = harness.call("priceCart", json!({})).await;
        assert_eq!(priced.error_kind, Some(ErrorKind::State));
        assert_eq!(priced.error.as_deref(), Some("the cart is empty"));
    }
}
