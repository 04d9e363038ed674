use std::collections::BTreeSet;

use crate::cart::OrderLimits;
use crate::domain::fields::{FieldChanges, FieldValue, ItemField};
use crate::domain::item::{push_unique, ItemDraft};
use crate::errors::OrderError;
use crate::menu::{Category, MenuCatalog};
use crate::parser::rules::{canonical_term, TermKind};

/// Applies every change to a copy of `draft`. The original is only replaced
/// when all of them validate. `is_combo` is applied before the meal choices
/// so a single change set can turn an item into a meal and pick its drink.
pub fn apply_changes(
    catalog: &MenuCatalog,
    limits: &OrderLimits,
    draft: &ItemDraft,
    changes: &FieldChanges,
) -> Result<ItemDraft, OrderError> {
    let mut updated = draft.clone();
    for (field, value) in changes.iter() {
        apply_field(catalog, limits, &mut updated, *field, value)?;
    }
    Ok(updated)
}

pub fn apply_field(
    catalog: &MenuCatalog,
    limits: &OrderLimits,
    draft: &mut ItemDraft,
    field: ItemField,
    value: &FieldValue,
) -> Result<(), OrderError> {
    let category = catalog.category(&draft.category)?;
    let is_chips = catalog.is_chips(&category.name);
    let is_drink = catalog.is_drink(&category.name);
    let meal = catalog.meal_rules();

    match field {
        ItemField::Size => {
            let raw = value.as_text(field)?;
            let size = category.resolve_size(&raw).ok_or_else(|| {
                OrderError::invalid_value(
                    "size",
                    format!("{} comes in {}", category.display_name, category.size_names()),
                )
            })?;
            draft.size = Some(size.to_string());
        }
        ItemField::Protein => {
            if !category.requires_protein() {
                return Err(OrderError::invalid_value(
                    "protein",
                    format!("{} doesn't take a protein", category.display_name),
                ));
            }
            let protein = canonical_term(TermKind::Protein, &value.as_text(field)?);
            if !catalog.is_valid_protein(&category.name, &protein) {
                return Err(OrderError::invalid_value(
                    "protein",
                    format!("choose one of {}", category.proteins.join(", ")),
                ));
            }
            draft.protein = Some(protein);
        }
        ItemField::Salads => {
            draft.salads = choose_from(category, value, field, TermKind::Salad, &category.salads)?;
        }
        ItemField::Sauces => {
            draft.sauces = choose_from(category, value, field, TermKind::Sauce, &category.sauces)?;
        }
        ItemField::Extras => {
            // Cheese lives in its own field. Naming it here turns it on and
            // leaving it out keeps whatever the item already had.
            let mut extras = BTreeSet::new();
            let mut cheese = draft.cheese;
            for raw in value.as_list(field)? {
                let extra = canonical_term(TermKind::Extra, &raw);
                if extra == "cheese" && category.accepts_cheese() {
                    cheese = true;
                } else if category.addons.contains_key(&extra) {
                    extras.insert(extra);
                } else {
                    return Err(OrderError::invalid_value(
                        "extras",
                        format!("`{extra}` is not an add-on for {}", category.display_name),
                    ));
                }
            }
            draft.extras = extras;
            draft.cheese = cheese;
        }
        ItemField::Quantity => {
            let quantity = value.as_quantity(field)?;
            if quantity < 1 {
                return Err(OrderError::invalid_value("quantity", "quantity must be at least 1"));
            }
            if quantity > i64::from(limits.max_quantity) {
                return Err(OrderError::LimitExceeded {
                    what: "quantity".to_string(),
                    limit: limits.max_quantity as usize,
                });
            }
            draft.quantity = u32::try_from(quantity)
                .map_err(|_| OrderError::invalid_value("quantity", "quantity is too large"))?;
        }
        ItemField::Cheese => {
            let cheese = value.as_flag(field)?;
            if cheese && !category.accepts_cheese() {
                return Err(OrderError::invalid_value(
                    "cheese",
                    format!("{} can't have cheese", category.display_name),
                ));
            }
            draft.cheese = cheese;
        }
        ItemField::IsCombo => {
            if value.as_flag(field)? {
                if !category.meal_eligible {
                    return Err(OrderError::invalid_value(
                        "is_combo",
                        format!("{} can't be made into a meal", category.display_name),
                    ));
                }
                draft.is_combo = true;
            } else {
                draft.clear_meal_choices();
            }
        }
        ItemField::ChipsSize => {
            if value.is_null() {
                draft.chips_size = None;
                return Ok(());
            }
            if !draft.is_combo {
                let reason = if is_chips {
                    "set the size of chips with `size`".to_string()
                } else {
                    "chips size only applies to meals".to_string()
                };
                return Err(OrderError::invalid_value("chips_size", reason));
            }
            let size = value.as_text(field)?;
            if !meal.chips_upgrades.contains_key(&size) {
                return Err(OrderError::invalid_value(
                    "chips_size",
                    format!(
                        "meal chips come in {}",
                        meal.chips_upgrades.keys().cloned().collect::<Vec<_>>().join(" or ")
                    ),
                ));
            }
            draft.chips_size = Some(size);
        }
        ItemField::ChipsSalt => {
            if value.is_null() {
                draft.chips_salt = None;
                return Ok(());
            }
            if !draft.is_combo && !is_chips {
                return Err(OrderError::invalid_value("chips_salt", "only chips and meals take salt"));
            }
            let salt = canonical_term(TermKind::ChipsSalt, &value.as_text(field)?);
            if !meal.chips_salts.contains(&salt) {
                return Err(OrderError::invalid_value(
                    "chips_salt",
                    format!("choose one of {}", meal.chips_salts.join(", ")),
                ));
            }
            draft.chips_salt = Some(salt);
        }
        ItemField::DrinkBrand => {
            if value.is_null() {
                draft.drink_brand = None;
                return Ok(());
            }
            if !draft.is_combo && !is_drink {
                return Err(OrderError::invalid_value(
                    "drink_brand",
                    "only drinks and meals come with a drink",
                ));
            }
            let brand = canonical_term(TermKind::DrinkBrand, &value.as_text(field)?);
            if !meal.drink_brands.contains(&brand) {
                return Err(OrderError::invalid_value(
                    "drink_brand",
                    format!("choose one of {}", meal.drink_brands.join(", ")),
                ));
            }
            draft.drink_brand = Some(brand);
        }
    }

    Ok(())
}

/// Replaces a list field. Every entry must be offered by the category;
/// "everything" selects the full list.
fn choose_from(
    category: &Category,
    value: &FieldValue,
    field: ItemField,
    kind: TermKind,
    offered: &[String],
) -> Result<Vec<String>, OrderError> {
    let mut chosen = Vec::new();
    for raw in value.as_list(field)? {
        let term = canonical_term(kind, &raw);
        if kind == TermKind::Salad && matches!(term.as_str(), "everything" | "all" | "the lot") {
            for entry in offered {
                push_unique(&mut chosen, entry.as_str());
            }
            continue;
        }
        if !offered.contains(&term) {
            let reason = if offered.is_empty() {
                format!("{} doesn't come with {}", category.display_name, field)
            } else {
                format!("`{term}` isn't available; choose from {}", offered.join(", "))
            };
            return Err(OrderError::invalid_value(field.as_str(), reason));
        }
        push_unique(&mut chosen, term);
    }
    Ok(chosen)
}

#[cfg(test)]
mod tests {
    use super::apply_changes;
    use crate::cart::OrderLimits;
    use crate::domain::fields::{FieldChanges, FieldValue, ItemField};
    use crate::domain::item::ItemDraft;
    use crate::errors::{ErrorKind, OrderError};
    use crate::menu::MenuCatalog;

    fn kebab() -> ItemDraft {
        ItemDraft { size: Some("small".into()), protein: Some("lamb".into()), ..ItemDraft::new("kebab") }
    }

    fn apply(draft: &ItemDraft, changes: FieldChanges) -> Result<ItemDraft, OrderError> {
        let catalog = MenuCatalog::reference().expect("menu");
        apply_changes(&catalog, &OrderLimits::default(), draft, &changes)
    }

    #[test]
    fn synonyms_are_canonicalized() {
        let updated = apply(
            &kebab(),
            FieldChanges::new()
                .with(ItemField::Sauces, FieldValue::text("barbecue, garlic"))
                .with(ItemField::Protein, FieldValue::text("Chicken")),
        )
        .expect("valid changes");

        assert_eq!(updated.sauces, vec!["bbq", "garlic"]);
        assert_eq!(updated.protein.as_deref(), Some("chicken"));
    }

    #[test]
    fn a_bad_value_leaves_the_draft_untouched() {
        let draft = kebab();
        let result = apply(
            &draft,
            FieldChanges::new()
                .with(ItemField::Size, FieldValue::text("large"))
                .with(ItemField::Protein, FieldValue::text("tofu")),
        );

        assert!(matches!(result, Err(OrderError::InvalidPropertyValue { ref field, .. }) if field == "protein"));
        assert_eq!(draft.size.as_deref(), Some("small"));
    }

    #[test]
    fn meal_choices_follow_is_combo_in_the_same_change_set() {
        let updated = apply(
            &kebab(),
            FieldChanges::new()
                .with(ItemField::DrinkBrand, FieldValue::text("sprite"))
                .with(ItemField::IsCombo, FieldValue::Flag(true)),
        )
        .expect("valid changes");

        assert!(updated.is_combo);
        assert_eq!(updated.drink_brand.as_deref(), Some("sprite"));
    }

    #[test]
    fn meal_only_fields_are_rejected_on_plain_items() {
        let error = apply(&kebab(), FieldChanges::new().with(ItemField::ChipsSize, FieldValue::text("large")))
            .expect_err("not a meal");
        assert_eq!(error.kind(), ErrorKind::Validation);

        let chips = ItemDraft { size: Some("small".into()), ..ItemDraft::new("chips") };
        let salted = apply(&chips, FieldChanges::new().with(ItemField::ChipsSalt, FieldValue::text("plain salt")))
            .expect("chips take salt");
        assert_eq!(salted.chips_salt.as_deref(), Some("plain salt"));
    }

    #[test]
    fn quantity_limits_apply() {
        let too_many = apply(&kebab(), FieldChanges::new().with(ItemField::Quantity, FieldValue::Number(51)));
        assert!(matches!(too_many, Err(OrderError::LimitExceeded { limit: 50, .. })));

        let zero = apply(&kebab(), FieldChanges::new().with(ItemField::Quantity, FieldValue::Number(0)));
        assert_eq!(zero.map_err(|error| error.kind()).err(), Some(ErrorKind::Validation));
    }

    #[test]
    fn turning_a_meal_off_clears_its_choices() {
        let meal = ItemDraft { is_combo: true, drink_brand: Some("coke".into()), ..kebab() };
        let updated = apply(&meal, FieldChanges::new().with(ItemField::IsCombo, FieldValue::Flag(false)))
            .expect("valid change");

        assert!(!updated.is_combo);
        assert_eq!(updated.drink_brand, None);
    }

    #[test]
    fn hsp_cannot_become_a_meal_and_drinks_have_no_cheese() {
        let hsp = ItemDraft { size: Some("small".into()), ..ItemDraft::new("hsp") };
        assert!(apply(&hsp, FieldChanges::new().with(ItemField::IsCombo, FieldValue::Flag(true))).is_err());

        let drink = ItemDraft::new("drink");
        assert!(apply(&drink, FieldChanges::new().with(ItemField::Cheese, FieldValue::Flag(true))).is_err());
    }
}
