use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;

use crate::errors::OrderError;
use crate::parser::rules::number_value;

/// The item properties that can be set while configuring or editing an item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemField {
    Size,
    Protein,
    Salads,
    Sauces,
    Extras,
    Quantity,
    Cheese,
    IsCombo,
    ChipsSize,
    ChipsSalt,
    DrinkBrand,
}

impl ItemField {
    pub const ALL: [ItemField; 11] = [
        Self::Size,
        Self::Protein,
        Self::Salads,
        Self::Sauces,
        Self::Extras,
        Self::Quantity,
        Self::Cheese,
        Self::IsCombo,
        Self::ChipsSize,
        Self::ChipsSalt,
        Self::DrinkBrand,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Size => "size",
            Self::Protein => "protein",
            Self::Salads => "salads",
            Self::Sauces => "sauces",
            Self::Extras => "extras",
            Self::Quantity => "quantity",
            Self::Cheese => "cheese",
            Self::IsCombo => "is_combo",
            Self::ChipsSize => "chips_size",
            Self::ChipsSalt => "chips_salt",
            Self::DrinkBrand => "drink_brand",
        }
    }
}

impl fmt::Display for ItemField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemField {
    type Err = OrderError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match to_snake_case(raw).as_str() {
            "size" => Ok(Self::Size),
            "protein" | "meat" => Ok(Self::Protein),
            "salads" | "salad" => Ok(Self::Salads),
            "sauces" | "sauce" => Ok(Self::Sauces),
            "extras" | "extra" | "addons" | "add_ons" | "addon" => Ok(Self::Extras),
            "quantity" | "qty" | "count" => Ok(Self::Quantity),
            "cheese" => Ok(Self::Cheese),
            "is_combo" | "combo" | "meal" | "is_meal" => Ok(Self::IsCombo),
            "chips_size" | "chip_size" => Ok(Self::ChipsSize),
            "chips_salt" | "chip_salt" | "salt" => Ok(Self::ChipsSalt),
            "drink_brand" | "drink" | "brand" => Ok(Self::DrinkBrand),
            "category" => Err(OrderError::invalid_value(
                "category",
                "the category of an item cannot be changed; remove it and add a new item",
            )),
            other => Err(OrderError::invalid_value(other, "unknown item property")),
        }
    }
}

fn to_snake_case(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 4);
    for (position, ch) in raw.trim().chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if position > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else if ch == '-' || ch == ' ' {
            out.push('_');
        } else {
            out.push(ch);
        }
    }
    out
}

/// A loosely typed property value as it arrives from a tool call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    Null,
    Flag(bool),
    Number(i64),
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(flag) => Self::Flag(*flag),
            Value::Number(number) => match number.as_i64() {
                Some(integer) => Self::Number(integer),
                None => Self::Text(number.to_string()),
            },
            Value::String(text) => Self::Text(text.clone()),
            Value::Array(values) => Self::List(
                values
                    .iter()
                    .map(|entry| match entry {
                        Value::String(text) => text.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
            ),
            Value::Object(map) => match map.get("value") {
                Some(inner) => Self::from_json(inner),
                None => Self::Text(value.to_string()),
            },
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(text) => {
                let normalized = text.trim().to_ascii_lowercase();
                normalized.is_empty() || normalized == "none" || normalized == "null"
            }
            _ => false,
        }
    }

    /// Single lowercase word or phrase.
    pub fn as_text(&self, field: ItemField) -> Result<String, OrderError> {
        let text = match self {
            Self::Text(text) => text.trim().to_ascii_lowercase(),
            Self::Number(number) => number.to_string(),
            Self::List(values) if values.len() == 1 => values[0].trim().to_ascii_lowercase(),
            _ => return Err(OrderError::invalid_value(field.as_str(), "expected a single value")),
        };
        if text.is_empty() {
            return Err(OrderError::invalid_value(field.as_str(), "value is empty"));
        }
        Ok(text)
    }

    /// Accepts a list, a comma separated string, or an "x and y" phrase.
    pub fn as_list(&self, field: ItemField) -> Result<Vec<String>, OrderError> {
        let raw: Vec<String> = match self {
            Self::Null | Self::Flag(false) => Vec::new(),
            Self::List(values) => values.clone(),
            Self::Text(text) => text
                .split(',')
                .flat_map(|part| part.split(" and "))
                .map(str::to_string)
                .collect(),
            Self::Flag(true) | Self::Number(_) => {
                return Err(OrderError::invalid_value(field.as_str(), "expected a list of names"))
            }
        };

        Ok(raw
            .into_iter()
            .map(|entry| entry.trim().to_ascii_lowercase())
            .filter(|entry| !entry.is_empty() && entry != "none")
            .collect())
    }

    pub fn as_flag(&self, field: ItemField) -> Result<bool, OrderError> {
        match self {
            Self::Flag(flag) => Ok(*flag),
            Self::Number(0) => Ok(false),
            Self::Number(1) => Ok(true),
            Self::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "yeah" | "on" | "1" => Ok(true),
                "false" | "no" | "n" | "nope" | "off" | "0" => Ok(false),
                _ => Err(OrderError::invalid_value(field.as_str(), "expected yes or no")),
            },
            _ => Err(OrderError::invalid_value(field.as_str(), "expected yes or no")),
        }
    }

    pub fn as_quantity(&self, field: ItemField) -> Result<i64, OrderError> {
        match self {
            Self::Number(number) => Ok(*number),
            Self::Text(text) => {
                let trimmed = text.trim().to_ascii_lowercase();
                trimmed
                    .parse::<i64>()
                    .ok()
                    .or_else(|| number_value(&trimmed).map(i64::from))
                    .ok_or_else(|| OrderError::invalid_value(field.as_str(), "expected a number"))
            }
            _ => Err(OrderError::invalid_value(field.as_str(), "expected a number")),
        }
    }
}

/// The canonical set of field changes produced from any accepted edit payload
/// shape. Entries are kept in [`ItemField`] order and a later change to the
/// same field replaces the earlier.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldChanges {
    changes: Vec<(ItemField, FieldValue)>,
}

impl FieldChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: ItemField, value: FieldValue) {
        match self.changes.binary_search_by(|(current, _)| current.cmp(&field)) {
            Ok(position) => self.changes[position].1 = value,
            Err(position) => self.changes.insert(position, (field, value)),
        }
    }

    pub fn with(mut self, field: ItemField, value: FieldValue) -> Self {
        self.insert(field, value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &(ItemField, FieldValue)> {
        self.changes.iter()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{FieldChanges, FieldValue, ItemField};

    #[test]
    fn field_names_accept_camel_snake_and_aliases() {
        assert_eq!("chipsSize".parse::<ItemField>().ok(), Some(ItemField::ChipsSize));
        assert_eq!("drink_brand".parse::<ItemField>().ok(), Some(ItemField::DrinkBrand));
        assert_eq!("Meal".parse::<ItemField>().ok(), Some(ItemField::IsCombo));
        assert_eq!("sauce".parse::<ItemField>().ok(), Some(ItemField::Sauces));
        assert!("category".parse::<ItemField>().is_err());
        assert!("colour".parse::<ItemField>().is_err());
    }

    #[test]
    fn nested_value_objects_are_unwrapped() {
        let value = FieldValue::from_json(&json!({ "value": "large" }));
        assert_eq!(value, FieldValue::Text("large".to_string()));
    }

    #[test]
    fn text_lists_split_on_commas_and_and() {
        let list = FieldValue::text("Garlic, chilli and BBQ")
            .as_list(ItemField::Sauces)
            .expect("list should parse");
        assert_eq!(list, vec!["garlic", "chilli", "bbq"]);
    }

    #[test]
    fn quantity_accepts_number_words() {
        assert_eq!(FieldValue::text("three").as_quantity(ItemField::Quantity).ok(), Some(3));
        assert_eq!(FieldValue::Number(2).as_quantity(ItemField::Quantity).ok(), Some(2));
        assert!(FieldValue::text("lots").as_quantity(ItemField::Quantity).is_err());
    }

    #[test]
    fn later_changes_replace_earlier_ones() {
        let changes = FieldChanges::new()
            .with(ItemField::Size, FieldValue::text("small"))
            .with(ItemField::Size, FieldValue::text("large"));

        assert_eq!(changes.len(), 1);
        assert_eq!(
            changes.iter().next().map(|(_, value)| value.clone()),
            Some(FieldValue::text("large"))
        );
    }
}
