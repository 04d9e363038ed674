//! Menu catalog: categories, sizes, proteins, add-ons, meal pricing and combo
//! rules. Loaded once at startup and read-only afterwards.

pub mod profile;

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::item::CartItem;
use crate::errors::OrderError;

pub use profile::{BusinessProfile, OpeningHours};

const REFERENCE_MENU: &str = include_str!("reference.toml");

#[derive(Debug, Error)]
pub enum MenuError {
    #[error("could not read menu file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse menu: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid menu: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub sizes: BTreeMap<String, Decimal>,
    #[serde(default)]
    pub default_size: Option<String>,
    #[serde(default)]
    pub size_aliases: BTreeMap<String, String>,
    #[serde(default)]
    pub proteins: Vec<String>,
    #[serde(default)]
    pub salads: Vec<String>,
    #[serde(default)]
    pub sauces: Vec<String>,
    #[serde(default)]
    pub addons: BTreeMap<String, Decimal>,
    #[serde(default)]
    pub default_cheese: bool,
    #[serde(default)]
    pub meal_eligible: bool,
    #[serde(default)]
    pub meal_prices: BTreeMap<String, Decimal>,
}

impl Category {
    pub fn resolve_size(&self, raw: &str) -> Option<&str> {
        let normalized = normalize_key(raw);
        if let Some((size, _)) = self.sizes.get_key_value(&normalized) {
            return Some(size.as_str());
        }
        self.size_aliases
            .get(&normalized)
            .and_then(|target| self.sizes.get_key_value(target))
            .map(|(size, _)| size.as_str())
    }

    /// The size used when the caller never names one.
    pub fn implied_size(&self) -> Option<&str> {
        if let Some(size) = &self.default_size {
            return Some(size.as_str());
        }
        if self.sizes.len() == 1 {
            return self.sizes.keys().next().map(String::as_str);
        }
        None
    }

    pub fn size_names(&self) -> String {
        self.sizes.keys().cloned().collect::<Vec<_>>().join(" or ")
    }

    pub fn accepts_cheese(&self) -> bool {
        self.default_cheese || self.addons.contains_key("cheese")
    }

    pub fn requires_protein(&self) -> bool {
        !self.proteins.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealRules {
    pub chips_category: String,
    pub drink_category: String,
    pub default_chips_size: String,
    pub default_chips_salt: String,
    pub default_drink: String,
    pub chips_upgrades: BTreeMap<String, Decimal>,
    pub chips_salts: Vec<String>,
    pub drink_brands: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComboRule {
    pub name: String,
    pub main_categories: Vec<String>,
    pub side_category: String,
    pub drink_category: String,
    #[serde(default)]
    pub drink_sizes: Vec<String>,
}

/// One standalone main + side + drink group found in a cart. Each match
/// covers a single unit of each of the three lines.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ComboMatch {
    pub rule: String,
    pub main_index: usize,
    pub side_index: usize,
    pub drink_index: usize,
}

#[derive(Debug, Deserialize)]
struct MenuDocument {
    business: profile::BusinessDocument,
    meal: MealRules,
    categories: Vec<Category>,
    #[serde(default)]
    combos: Vec<ComboRule>,
}

#[derive(Clone, Debug)]
pub struct MenuCatalog {
    business: BusinessProfile,
    meal: MealRules,
    categories: Vec<Category>,
    combos: Vec<ComboRule>,
}

impl MenuCatalog {
    /// The menu embedded in the crate.
    pub fn reference() -> Result<Self, MenuError> {
        Self::from_toml_str(REFERENCE_MENU)
    }

    pub fn load(path: &Path) -> Result<Self, MenuError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| MenuError::ReadFile { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, MenuError> {
        let document: MenuDocument = toml::from_str(raw)?;
        let catalog = Self {
            business: BusinessProfile::from_document(document.business)?,
            meal: document.meal,
            categories: document.categories,
            combos: document.combos,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn business(&self) -> &BusinessProfile {
        &self.business
    }

    pub fn meal_rules(&self) -> &MealRules {
        &self.meal
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn combos(&self) -> &[ComboRule] {
        &self.combos
    }

    pub fn category(&self, name: &str) -> Result<&Category, OrderError> {
        self.categories
            .iter()
            .find(|category| category.name == name)
            .ok_or_else(|| OrderError::InvalidCategory(name.to_string()))
    }

    /// Looks a category up by its name or one of its aliases.
    pub fn resolve_category(&self, raw: &str) -> Option<&Category> {
        let normalized = normalize_key(raw);
        self.categories.iter().find(|category| {
            category.name == normalized
                || category.aliases.iter().any(|alias| normalize_key(alias) == normalized)
        })
    }

    pub fn base_price(&self, category: &str, size: &str) -> Result<Decimal, OrderError> {
        let entry = self.category(category)?;
        entry.sizes.get(size).copied().ok_or_else(|| OrderError::InvalidSize {
            category: entry.display_name.clone(),
            size: size.to_string(),
        })
    }

    pub fn is_valid_protein(&self, category: &str, protein: &str) -> bool {
        self.category(category)
            .map(|entry| entry.proteins.iter().any(|candidate| candidate == protein))
            .unwrap_or(false)
    }

    pub fn addon_delta(&self, category: &str, addon: &str) -> Result<Decimal, OrderError> {
        let entry = self.category(category)?;
        entry.addons.get(addon).copied().ok_or_else(|| OrderError::UnknownAddon {
            category: entry.display_name.clone(),
            addon: addon.to_string(),
        })
    }

    /// Combo base price for a meal: already includes default chips and drink.
    pub fn meal_price(&self, category: &str, size: &str) -> Result<Decimal, OrderError> {
        let entry = self.category(category)?;
        if !entry.meal_eligible {
            return Err(OrderError::invalid_value(
                "is_combo",
                format!("{} can't be made into a meal", entry.display_name),
            ));
        }
        entry.meal_prices.get(size).copied().ok_or_else(|| OrderError::InvalidSize {
            category: format!("{} meal", entry.display_name),
            size: size.to_string(),
        })
    }

    pub fn chips_upgrade(&self, chips_size: &str) -> Result<Decimal, OrderError> {
        self.meal.chips_upgrades.get(chips_size).copied().ok_or_else(|| {
            OrderError::invalid_value(
                "chips_size",
                format!(
                    "meal chips come in {}",
                    self.meal.chips_upgrades.keys().cloned().collect::<Vec<_>>().join(" or ")
                ),
            )
        })
    }

    pub fn is_chips(&self, category: &str) -> bool {
        self.meal.chips_category == category
    }

    pub fn is_drink(&self, category: &str) -> bool {
        self.meal.drink_category == category
    }

    pub fn is_meal_eligible(&self, category: &str) -> bool {
        self.category(category).map(|entry| entry.meal_eligible).unwrap_or(false)
    }

    /// Finds standalone main + side + drink groups. Lines already converted
    /// to meals never take part, and each unit is used at most once.
    pub fn combo_rules_for(&self, items: &[CartItem]) -> Vec<ComboMatch> {
        let mut remaining: Vec<u32> = items.iter().map(CartItem::quantity).collect();
        let mut matches = Vec::new();

        for rule in &self.combos {
            let is_side = |item: &CartItem| !item.is_combo() && item.category() == rule.side_category;
            let is_drink = |item: &CartItem| {
                item.category() == rule.drink_category
                    && (rule.drink_sizes.is_empty()
                        || item
                            .details
                            .size
                            .as_ref()
                            .map(|size| rule.drink_sizes.contains(size))
                            .unwrap_or(false))
            };

            for (main_index, main) in items.iter().enumerate() {
                if main.is_combo() || !rule.main_categories.iter().any(|name| name == main.category()) {
                    continue;
                }

                while remaining[main_index] > 0 {
                    let side = first_available(items, &remaining, main_index, &is_side);
                    let drink = first_available(items, &remaining, main_index, &is_drink);
                    let (Some(side_index), Some(drink_index)) = (side, drink) else {
                        break;
                    };
                    if side_index == drink_index {
                        break;
                    }

                    remaining[main_index] -= 1;
                    remaining[side_index] -= 1;
                    remaining[drink_index] -= 1;
                    matches.push(ComboMatch {
                        rule: rule.name.clone(),
                        main_index,
                        side_index,
                        drink_index,
                    });
                }
            }
        }

        matches
    }

    fn validate(&self) -> Result<(), MenuError> {
        if self.categories.is_empty() {
            return Err(MenuError::Invalid("menu must define at least one category".to_string()));
        }

        let mut seen = BTreeSet::new();
        for category in &self.categories {
            if category.name != normalize_key(&category.name) {
                return Err(MenuError::Invalid(format!(
                    "category name `{}` must be lowercase",
                    category.name
                )));
            }
            if !seen.insert(category.name.as_str()) {
                return Err(MenuError::Invalid(format!("category `{}` defined twice", category.name)));
            }
            validate_category(category)?;
        }

        for required in [&self.meal.chips_category, &self.meal.drink_category] {
            if !seen.contains(required.as_str()) {
                return Err(MenuError::Invalid(format!(
                    "meal rules reference unknown category `{required}`"
                )));
            }
        }
        if !self.meal.chips_upgrades.contains_key(&self.meal.default_chips_size) {
            return Err(MenuError::Invalid(
                "meal.default_chips_size must have an entry in meal.chips_upgrades".to_string(),
            ));
        }
        if !self.meal.chips_salts.contains(&self.meal.default_chips_salt) {
            return Err(MenuError::Invalid(
                "meal.default_chips_salt must be listed in meal.chips_salts".to_string(),
            ));
        }
        if !self.meal.drink_brands.contains(&self.meal.default_drink) {
            return Err(MenuError::Invalid(
                "meal.default_drink must be listed in meal.drink_brands".to_string(),
            ));
        }
        if self.meal.chips_upgrades.values().any(|delta| delta.is_sign_negative()) {
            return Err(MenuError::Invalid("meal chips upgrades cannot be negative".to_string()));
        }

        for rule in &self.combos {
            let referenced =
                rule.main_categories.iter().chain([&rule.side_category, &rule.drink_category]);
            for name in referenced {
                if !seen.contains(name.as_str()) {
                    return Err(MenuError::Invalid(format!(
                        "combo `{}` references unknown category `{name}`",
                        rule.name
                    )));
                }
            }
            for main in &rule.main_categories {
                let eligible = self.categories.iter().any(|c| &c.name == main && c.meal_eligible);
                if !eligible {
                    return Err(MenuError::Invalid(format!(
                        "combo `{}` main category `{main}` is not meal eligible",
                        rule.name
                    )));
                }
            }
        }

        Ok(())
    }
}

fn validate_category(category: &Category) -> Result<(), MenuError> {
    let name = &category.name;
    if category.sizes.is_empty() {
        return Err(MenuError::Invalid(format!("category `{name}` has no sizes")));
    }
    let prices = category.sizes.values().chain(category.meal_prices.values());
    if prices.clone().any(|price| price.is_sign_negative()) {
        return Err(MenuError::Invalid(format!("category `{name}` has a negative price")));
    }
    if let Some(default_size) = &category.default_size {
        if !category.sizes.contains_key(default_size) {
            return Err(MenuError::Invalid(format!(
                "category `{name}` default size `{default_size}` is not one of its sizes"
            )));
        }
    }
    for (alias, target) in &category.size_aliases {
        if !category.sizes.contains_key(target) {
            return Err(MenuError::Invalid(format!(
                "category `{name}` size alias `{alias}` points at unknown size `{target}`"
            )));
        }
    }
    if category.meal_eligible {
        for size in category.sizes.keys() {
            if !category.meal_prices.contains_key(size) {
                return Err(MenuError::Invalid(format!(
                    "meal eligible category `{name}` has no meal price for size `{size}`"
                )));
            }
        }
    }
    Ok(())
}

fn first_available<F>(items: &[CartItem], remaining: &[u32], skip: usize, predicate: F) -> Option<usize>
where
    F: Fn(&CartItem) -> bool,
{
    items
        .iter()
        .enumerate()
        .find(|(index, item)| *index != skip && remaining[*index] > 0 && predicate(item))
        .map(|(index, _)| index)
}

pub(crate) fn normalize_key(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use rust_decimal::Decimal;

    use super::{MenuCatalog, MenuError};
    use crate::domain::item::{CartItem, ItemDraft};
    use crate::errors::OrderError;

    fn item(category: &str, size: &str, quantity: u32) -> CartItem {
        CartItem {
            details: ItemDraft {
                size: Some(size.to_string()),
                quantity,
                extras: BTreeSet::new(),
                ..ItemDraft::new(category)
            },
            unit_price: Decimal::ZERO,
            total_price: Decimal::ZERO,
            name: category.to_string(),
        }
    }

    #[test]
    fn reference_menu_exposes_prices() {
        let catalog = MenuCatalog::reference().expect("reference menu loads");

        assert_eq!(catalog.base_price("kebab", "small").ok(), Some(Decimal::new(1200, 2)));
        assert_eq!(catalog.meal_price("kebab", "large").ok(), Some(Decimal::new(2200, 2)));
        assert_eq!(catalog.chips_upgrade("large").ok(), Some(Decimal::new(300, 2)));
        assert_eq!(catalog.addon_delta("kebab", "extra meat").ok(), Some(Decimal::new(300, 2)));
        assert!(catalog.is_valid_protein("hsp", "chicken"));
        assert!(!catalog.is_valid_protein("chips", "chicken"));
    }

    #[test]
    fn missing_keys_are_user_errors() {
        let catalog = MenuCatalog::reference().expect("reference menu loads");

        assert!(matches!(
            catalog.base_price("pizza", "small"),
            Err(OrderError::InvalidCategory(ref name)) if name == "pizza"
        ));
        assert!(matches!(catalog.base_price("kebab", "medium"), Err(OrderError::InvalidSize { .. })));
        assert!(matches!(catalog.addon_delta("drink", "cheese"), Err(OrderError::UnknownAddon { .. })));
        assert!(catalog.meal_price("hsp", "small").is_err());
    }

    #[test]
    fn categories_resolve_by_alias_and_size_alias() {
        let catalog = MenuCatalog::reference().expect("reference menu loads");

        assert_eq!(catalog.resolve_category("Halal  Snack Pack").map(|c| c.name.as_str()), Some("hsp"));
        let drink = catalog.category("drink").expect("drink category");
        assert_eq!(drink.resolve_size("large"), Some("bottle"));
        assert_eq!(drink.implied_size(), Some("can"));
        assert_eq!(catalog.category("kebab").expect("kebab").implied_size(), None);
    }

    #[test]
    fn combo_detection_pairs_units_once() {
        let catalog = MenuCatalog::reference().expect("reference menu loads");
        let items = vec![
            item("kebab", "small", 2),
            item("chips", "small", 1),
            item("drink", "can", 2),
            item("drink", "bottle", 1),
        ];

        let matches = catalog.combo_rules_for(&items);
        assert_eq!(matches.len(), 1);
        assert_eq!((matches[0].main_index, matches[0].side_index, matches[0].drink_index), (0, 1, 2));
    }

    #[test]
    fn bottles_do_not_complete_a_combo() {
        let catalog = MenuCatalog::reference().expect("reference menu loads");
        let items = vec![item("kebab", "small", 1), item("chips", "large", 1), item("drink", "bottle", 1)];

        assert!(catalog.combo_rules_for(&items).is_empty());
    }

    #[test]
    fn invalid_documents_are_rejected() {
        let raw = r#"
[business]
name = "Broken"

[meal]
chips_category = "chips"
drink_category = "drink"
default_chips_size = "small"
default_chips_salt = "plain salt"
default_drink = "coke"
chips_salts = ["plain salt"]
drink_brands = ["coke"]
chips_upgrades = { small = "0" }

[[categories]]
name = "kebab"
display_name = "Kebab"
meal_eligible = true
sizes = { small = "10.00" }
"#;

        let error = MenuCatalog::from_toml_str(raw).expect_err("menu should be rejected");
        assert!(matches!(error, MenuError::Invalid(_)));
    }
}
