use async_trait::async_trait;
use chrono::{Datelike, Local, NaiveDateTime};
use serde_json::{json, Value};

use orderline_core::errors::{ApplicationError, OrderError};
use orderline_core::menu::{BusinessProfile, Category, MenuCatalog};
use orderline_core::session::SessionKey;

use super::{to_json, Tool, ToolContext};
use crate::args::ToolArgs;

/// Menu listing for the agent. An optional `category` narrows it to one entry.
pub struct GetMenu;

fn category_view(category: &Category) -> Result<Value, ApplicationError> {
    Ok(json!({
        "name": category.name,
        "displayName": category.display_name,
        "sizes": to_json(&category.sizes)?,
        "defaultSize": category.implied_size(),
        "proteins": category.proteins,
        "salads": category.salads,
        "sauces": category.sauces,
        "addons": to_json(&category.addons)?,
        "cheeseIncluded": category.default_cheese,
        "mealEligible": category.meal_eligible,
        "mealPrices": to_json(&category.meal_prices)?,
    }))
}

fn menu_view(catalog: &MenuCatalog, only: Option<&Category>) -> Result<Value, ApplicationError> {
    let categories: Vec<Value> = match only {
        Some(category) => vec![category_view(category)?],
        None => catalog.categories().iter().map(category_view).collect::<Result<_, _>>()?,
    };
    let meal = catalog.meal_rules();

    Ok(json!({
        "categories": categories,
        "meal": {
            "chipsUpgrades": to_json(&meal.chips_upgrades)?,
            "chipsSalts": meal.chips_salts,
            "drinkBrands": meal.drink_brands,
            "defaultChipsSize": meal.default_chips_size,
            "defaultChipsSalt": meal.default_chips_salt,
            "defaultDrink": meal.default_drink,
        },
        "combos": to_json(catalog.combos())?,
    }))
}

#[async_trait]
impl Tool for GetMenu {
    fn name(&self) -> &'static str {
        "getMenu"
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        _session: &SessionKey,
        args: &ToolArgs,
    ) -> Result<Value, ApplicationError> {
        let catalog = ctx.engine.catalog();
        let only = match args.text(&["category", "itemType"]) {
            Some(raw) => Some(
                catalog.resolve_category(&raw).ok_or_else(|| OrderError::UnknownCategory(raw.clone()))?,
            ),
            None => None,
        };
        menu_view(catalog, only)
    }
}

pub struct GetBusinessInfo;

fn business_view(profile: &BusinessProfile, now: NaiveDateTime) -> Result<Value, ApplicationError> {
    let today = profile
        .hours_on(now.weekday())
        .map(|window| format!("{}-{}", window.open.format("%H:%M"), window.close.format("%H:%M")));

    Ok(json!({
        "name": profile.name,
        "phone": profile.phone,
        "openNow": profile.is_open_at(now),
        "todayHours": today,
        "hours": to_json(&profile.hours)?,
    }))
}

#[async_trait]
impl Tool for GetBusinessInfo {
    fn name(&self) -> &'static str {
        "getBusinessInfo"
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        _session: &SessionKey,
        _args: &ToolArgs,
    ) -> Result<Value, ApplicationError> {
        business_view(ctx.engine.catalog().business(), Local::now().naive_local())
    }
}
